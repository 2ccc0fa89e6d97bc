//! Class-like host types and their instances.

use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info};

use crate::{
    engine::{CompositionEngine, CompositionReport},
    errors::{OverrideError, Result},
    host::HostType,
    invocation::Invocation,
    policy::{MethodNames, OverridePolicy},
    propagator::TransitivePropagator,
    registry::{ChainReport, OverrideChainRegistry},
    snapshot::{method_fn, MethodDef, MethodFn, Visibility},
    unit::UnitDef,
    value::{Block, Value},
    OverridableConfig,
};

/// Whether a class has been given the ability to have its methods chained
/// over. Once active it stays active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverrideCapability {
    Uninitialized,
    Active,
}

struct ClassState {
    methods: IndexMap<String, MethodDef>,
    /// Included units, oldest first
    units: Vec<Arc<UnitDef>>,
    /// Shadow layer wrappers per name, oldest first
    shadow: IndexMap<String, Vec<MethodDef>>,
    capability: OverrideCapability,
    policy: Option<OverridePolicy>,
}

/// A class: owns its declared methods, the units composed onto it, and the
/// private shadow layer that keeps superseded originals reachable.
pub struct ClassDef {
    name: String,
    superclass: Option<Arc<ClassDef>>,
    config: OverridableConfig,
    engine: Arc<CompositionEngine>,
    state: RwLock<ClassState>,
    registry: RwLock<OverrideChainRegistry>,
    /// Serializes composition events on this class
    composition: Mutex<()>,
}

impl ClassDef {
    pub fn new(name: impl Into<String>) -> Arc<Self> {
        let config = OverridableConfig::default();
        let engine = Arc::new(CompositionEngine::new(&config));
        Self::with_config(name, None, config, engine)
    }

    pub fn subclass(name: impl Into<String>, superclass: &Arc<ClassDef>) -> Arc<Self> {
        Self::with_config(
            name,
            Some(Arc::clone(superclass)),
            superclass.config.clone(),
            Arc::clone(&superclass.engine),
        )
    }

    pub fn with_config(
        name: impl Into<String>,
        superclass: Option<Arc<ClassDef>>,
        config: OverridableConfig,
        engine: Arc<CompositionEngine>,
    ) -> Arc<Self> {
        let name = name.into();
        Arc::new(Self {
            registry: RwLock::new(OverrideChainRegistry::new(name.clone())),
            name,
            superclass,
            config,
            engine,
            state: RwLock::new(ClassState {
                methods: IndexMap::new(),
                units: Vec::new(),
                shadow: IndexMap::new(),
                capability: OverrideCapability::Uninitialized,
                policy: None,
            }),
            composition: Mutex::new(()),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn superclass(&self) -> Option<&Arc<ClassDef>> {
        self.superclass.as_ref()
    }

    pub fn config(&self) -> &OverridableConfig {
        &self.config
    }

    /// Declare (or redeclare) a method on the class itself
    pub fn define_method(&self, name: &str, visibility: Visibility, implementation: MethodFn) {
        let method = MethodDef::new(name, visibility, self.name.clone(), implementation);
        self.state.write().methods.insert(name.to_string(), method);
    }

    /// Declare a public method from a closure
    pub fn define<F>(&self, name: &str, f: F)
    where
        F: Fn(&Invocation<'_>) -> Result<Value> + Send + Sync + 'static,
    {
        self.define_method(name, Visibility::Public, method_fn(f));
    }

    /// Change the visibility of a method the class declares
    pub fn set_visibility(&self, name: &str, visibility: Visibility) -> Result<()> {
        let mut state = self.state.write();
        let method = state
            .methods
            .get_mut(name)
            .ok_or_else(|| OverrideError::method_not_found(name, &self.name))?;
        method.visibility = visibility;
        Ok(())
    }

    pub fn capability(&self) -> OverrideCapability {
        self.state.read().capability
    }

    /// Give the class the ability to have its methods chained over. Returns
    /// `false` when it already had it.
    pub fn enable_overrides(&self) -> bool {
        let mut state = self.state.write();
        if state.capability == OverrideCapability::Active {
            return false;
        }
        state.capability = OverrideCapability::Active;
        info!(class = %self.name, "overrides enabled");
        true
    }

    /// Mark exactly `names` as eligible for units composed from now on
    pub fn overrides(&self, names: impl Into<MethodNames>) -> Result<()> {
        self.restrict_overrides([("only", names.into())])
    }

    /// Apply `only` / `except` options to the class policy
    pub fn restrict_overrides<I, K>(&self, options: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, MethodNames)>,
        K: AsRef<str>,
    {
        let mut policy = self.policy().unwrap_or_default();
        policy.restrict(options)?;
        self.enable_overrides();
        debug!(class = %self.name, ?policy, "override policy updated");
        self.state.write().policy = Some(policy);
        Ok(())
    }

    pub fn policy(&self) -> Option<OverridePolicy> {
        self.state.read().policy.clone()
    }

    /// Policy used for plain (non propagating) units, if overrides are active
    pub(crate) fn active_policy(&self) -> Option<OverridePolicy> {
        let state = self.state.read();
        match state.capability {
            OverrideCapability::Active => state.policy.clone(),
            OverrideCapability::Uninitialized => None,
        }
    }

    /// Compose `unit` onto the class. Eligible methods are moved into the
    /// shadow layer first, then the unit joins the resolution order.
    /// Including a unit that is already included does nothing.
    pub fn include(&self, unit: Arc<UnitDef>) -> Result<CompositionReport> {
        let _composing = self.composition.lock();

        if self.includes(&unit) {
            debug!(class = %self.name, unit = unit.name(), "unit already included");
            return Ok(CompositionReport::empty(&self.name, unit.name()));
        }

        let report = TransitivePropagator::new(&self.engine).propagate(self, &unit)?;
        self.state.write().units.push(unit);
        Ok(report)
    }

    /// Whether `unit` was included directly or through another unit
    pub fn includes(&self, unit: &UnitDef) -> bool {
        self.state
            .read()
            .units
            .iter()
            .any(|u| std::ptr::eq(u.as_ref(), unit) || u.includes(unit))
    }

    pub fn instantiate(self: &Arc<Self>) -> Instance {
        Instance {
            class: Arc::clone(self),
        }
    }

    /// Whether this class is `other` or inherits from it
    pub fn is_a(&self, other: &ClassDef) -> bool {
        std::ptr::eq(self, other)
            || self
                .superclass
                .as_ref()
                .is_some_and(|parent| parent.is_a(other))
    }

    /// Every implementation of `name` in resolution order
    pub fn method_chain(&self, name: &str) -> Vec<MethodDef> {
        let mut chain = Vec::new();
        {
            let state = self.state.read();
            if let Some(method) = state.methods.get(name) {
                chain.push(method.clone());
            }
            for unit in state.units.iter().rev() {
                unit.collect_chain(name, &mut chain);
            }
            if let Some(wrappers) = state.shadow.get(name) {
                chain.extend(wrappers.iter().rev().cloned());
            }
        }
        if let Some(parent) = &self.superclass {
            chain.extend(parent.method_chain(name));
        }
        chain
    }

    /// Names of the class, its units and shadow layer in resolution order
    pub fn ancestors(&self) -> Vec<String> {
        let mut ancestors = vec![self.name.clone()];
        {
            let state = self.state.read();
            for unit in state.units.iter().rev() {
                ancestors.extend(unit.ancestors());
            }
            if !state.shadow.is_empty() {
                ancestors.push(self.shadow_layer_name());
            }
        }
        if let Some(parent) = &self.superclass {
            ancestors.extend(parent.ancestors());
        }
        ancestors
    }

    pub fn chain_report(&self) -> ChainReport {
        self.registry.read().report()
    }

    /// Run `f` against this class's shadow chains
    pub fn with_registry<R>(&self, f: impl FnOnce(&OverrideChainRegistry) -> R) -> R {
        f(&self.registry.read())
    }

    fn shadow_layer_name(&self) -> String {
        format!("{}::OverriddenMethods", self.name)
    }
}

impl HostType for ClassDef {
    fn host_name(&self) -> &str {
        &self.name
    }

    fn declared_methods(&self) -> Vec<(String, Visibility)> {
        self.state
            .read()
            .methods
            .values()
            .map(|m| (m.name.clone(), m.visibility))
            .collect()
    }

    fn has_own_method(&self, name: &str) -> bool {
        self.state.read().methods.contains_key(name)
    }

    fn own_method(&self, name: &str) -> Option<MethodDef> {
        self.state.read().methods.get(name).cloned()
    }

    fn remove_method(&self, name: &str) -> Option<MethodDef> {
        self.state.write().methods.shift_remove(name)
    }

    fn restore_method(&self, method: MethodDef) {
        self.state
            .write()
            .methods
            .insert(method.name.clone(), method);
    }

    fn install_method(&self, name: &str, implementation: MethodFn, visibility: Visibility) {
        let wrapper = MethodDef::new(name, visibility, self.shadow_layer_name(), implementation);
        self.state
            .write()
            .shadow
            .entry(name.to_string())
            .or_default()
            .push(wrapper);
    }

    fn uninstall_method(&self, name: &str) {
        let mut state = self.state.write();
        if let Some(wrappers) = state.shadow.get_mut(name) {
            wrappers.pop();
            if wrappers.is_empty() {
                state.shadow.shift_remove(name);
            }
        }
    }

    fn shadow_visibility(&self, name: &str) -> Option<Visibility> {
        self.state
            .read()
            .shadow
            .get(name)
            .and_then(|wrappers| wrappers.last())
            .map(|w| w.visibility)
    }

    fn chain_registry(&self) -> Option<&RwLock<OverrideChainRegistry>> {
        Some(&self.registry)
    }
}

impl std::fmt::Debug for ClassDef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassDef")
            .field("name", &self.name)
            .field("superclass", &self.superclass.as_ref().map(|s| s.name()))
            .field("capability", &self.capability())
            .finish()
    }
}

/// An instance of a class. Cheap to clone.
#[derive(Clone, Debug)]
pub struct Instance {
    class: Arc<ClassDef>,
}

impl Instance {
    pub fn class(&self) -> &Arc<ClassDef> {
        &self.class
    }

    pub fn describe(&self) -> String {
        format!("#<{}>", self.class.name())
    }

    /// Call a public method from outside the type
    pub fn call(&self, name: &str, args: &[Value]) -> Result<Value> {
        self.send_external(name, args, None, None)
    }

    /// Call a public method from outside the type, passing a trailing block
    pub fn call_with_block(&self, name: &str, args: &[Value], block: Block) -> Result<Value> {
        self.send_external(name, args, Some(&block), None)
    }

    /// Call a method on behalf of `caller`; protected methods are reachable
    /// when the caller's class is the receiver's class or a subclass of it.
    pub fn call_from(&self, caller: &Instance, name: &str, args: &[Value]) -> Result<Value> {
        self.send_external(name, args, None, Some(caller))
    }

    /// Whether a public implementation of `name` is reachable
    pub fn responds_to(&self, name: &str) -> bool {
        self.class
            .method_chain(name)
            .first()
            .is_some_and(|m| m.visibility == Visibility::Public)
    }

    fn send_external(
        &self,
        name: &str,
        args: &[Value],
        block: Option<&Block>,
        caller: Option<&Instance>,
    ) -> Result<Value> {
        let chain = self.class.method_chain(name);
        let first = chain
            .first()
            .ok_or_else(|| OverrideError::method_not_found(name, &self.describe()))?;

        let allowed = match first.visibility {
            Visibility::Public => true,
            Visibility::Protected => caller.is_some_and(|c| c.class.is_a(&self.class)),
            Visibility::Private => false,
        };
        if !allowed {
            return Err(OverrideError::visibility(
                name,
                first.visibility,
                &self.describe(),
            ));
        }

        Invocation::dispatch(self, name, &chain, 0, args, block, 0)
    }

    pub(crate) fn send_internal(
        &self,
        name: &str,
        args: &[Value],
        block: Option<&Block>,
        depth: usize,
    ) -> Result<Value> {
        let chain = self.class.method_chain(name);
        if chain.is_empty() {
            return Err(OverrideError::method_not_found(name, &self.describe()));
        }
        Invocation::dispatch(self, name, &chain, 0, args, block, depth)
    }
}
