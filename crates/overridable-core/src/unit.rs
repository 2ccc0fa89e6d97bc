//! Behavior units (mixins).

use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;
use tracing::debug;

use crate::{
    errors::{OverrideError, Result},
    host::{BehaviorUnit, HostType},
    invocation::Invocation,
    policy::{MethodNames, OverridePolicy},
    registry::OverrideChainRegistry,
    snapshot::{method_fn, MethodDef, MethodFn, Visibility},
    value::Value,
};

#[derive(Default)]
struct UnitState {
    methods: IndexMap<String, MethodDef>,
    policy: Option<OverridePolicy>,
    /// Units this unit includes, oldest first
    includes: Vec<Arc<UnitDef>>,
}

/// A named set of methods composed onto classes.
///
/// A propagating unit makes the classes it lands on chain their own
/// methods under the unit's methods, so the unit can call the originals.
pub struct UnitDef {
    name: String,
    propagating: bool,
    state: RwLock<UnitState>,
}

impl UnitDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            propagating: false,
            state: RwLock::new(UnitState::default()),
        }
    }

    /// A unit that participates in transitive override propagation
    pub fn propagating(name: impl Into<String>) -> Self {
        Self {
            propagating: true,
            ..Self::new(name)
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_propagating(&self) -> bool {
        self.propagating
    }

    pub fn define_method(&self, name: &str, visibility: Visibility, implementation: MethodFn) {
        let method = MethodDef::new(name, visibility, self.name.clone(), implementation);
        self.state.write().methods.insert(name.to_string(), method);
    }

    pub fn define<F>(&self, name: &str, f: F)
    where
        F: Fn(&Invocation<'_>) -> Result<Value> + Send + Sync + 'static,
    {
        self.define_method(name, Visibility::Public, method_fn(f));
    }

    /// Narrow which of this unit's methods are chained over on the classes
    /// it lands on. Repeated calls replace earlier options.
    pub fn restrict<I, K>(&self, options: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, MethodNames)>,
        K: AsRef<str>,
    {
        let mut policy = self.policy().unwrap_or_default();
        policy.restrict(options)?;
        debug!(unit = %self.name, ?policy, "unit policy updated");
        self.state.write().policy = Some(policy);
        Ok(())
    }

    /// Explicit policy set through [`UnitDef::restrict`]
    pub fn policy(&self) -> Option<OverridePolicy> {
        self.state.read().policy.clone()
    }

    /// Nest `unit` inside this one. Its methods sit below this unit's
    /// methods wherever this unit is composed.
    pub fn include(&self, unit: Arc<UnitDef>) -> Result<()> {
        if std::ptr::eq(self, unit.as_ref()) || unit.includes(self) {
            return Err(OverrideError::CyclicInclude {
                unit: unit.name().to_string(),
                into: self.name.clone(),
            });
        }
        if self.includes(&unit) {
            return Ok(());
        }
        debug!(unit = %self.name, nested = unit.name(), "nested unit included");
        self.state.write().includes.push(unit);
        Ok(())
    }

    /// Whether `unit` is nested in this unit at any depth
    pub fn includes(&self, unit: &UnitDef) -> bool {
        self.state
            .read()
            .includes
            .iter()
            .any(|u| std::ptr::eq(u.as_ref(), unit) || u.includes(unit))
    }

    /// Every nested unit, innermost and oldest first, without duplicates
    pub fn nested_units(&self) -> Vec<Arc<UnitDef>> {
        let mut out: Vec<Arc<UnitDef>> = Vec::new();
        for unit in self.state.read().includes.iter() {
            for nested in unit.nested_units().into_iter().chain([Arc::clone(unit)]) {
                if !out.iter().any(|seen| Arc::ptr_eq(seen, &nested)) {
                    out.push(nested);
                }
            }
        }
        out
    }

    /// Names of this unit and its nested units in resolution order
    pub fn ancestors(&self) -> Vec<String> {
        let mut ancestors = vec![self.name.clone()];
        for unit in self.state.read().includes.iter().rev() {
            ancestors.extend(unit.ancestors());
        }
        ancestors
    }

    /// Append this unit's implementations of `name` in resolution order
    pub(crate) fn collect_chain(&self, name: &str, chain: &mut Vec<MethodDef>) {
        let state = self.state.read();
        if let Some(method) = state.methods.get(name) {
            chain.push(method.clone());
        }
        for unit in state.includes.iter().rev() {
            unit.collect_chain(name, chain);
        }
    }
}

impl BehaviorUnit for UnitDef {
    fn unit_name(&self) -> &str {
        &self.name
    }

    fn method_names(&self) -> Vec<String> {
        self.state.read().methods.keys().cloned().collect()
    }
}

/// A unit can be asked to act as a host, but it has no shadow layer, so the
/// engine refuses to compose onto it.
impl HostType for UnitDef {
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

    fn install_method(&self, _name: &str, _implementation: MethodFn, _visibility: Visibility) {}

    fn uninstall_method(&self, _name: &str) {}

    fn shadow_visibility(&self, _name: &str) -> Option<Visibility> {
        None
    }

    fn chain_registry(&self) -> Option<&RwLock<OverrideChainRegistry>> {
        None
    }
}

impl std::fmt::Debug for UnitDef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnitDef")
            .field("name", &self.name)
            .field("propagating", &self.propagating)
            .field("methods", &self.method_names())
            .finish()
    }
}
