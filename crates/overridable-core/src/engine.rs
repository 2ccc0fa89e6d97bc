//! The composition engine: moves eligible host methods into the shadow layer
//! before a behavior unit's methods join the host.

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use indexmap::IndexSet;
use serde::Serialize;
use tracing::{debug, info, info_span, warn};

use crate::{
    errors::{OverrideError, Result},
    host::{BehaviorUnit, HostType},
    policy::OverridePolicy,
    registry::OverrideChainRegistry,
    snapshot::{method_fn, MethodSnapshot},
    OverridableConfig,
};

/// Outcome of one composition event
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CompositionReport {
    pub host: String,
    pub unit: String,
    /// Composition events that ran, in order
    pub events: Vec<u64>,
    /// Names moved into the shadow layer, in processing order
    pub shadowed: Vec<String>,
}

impl CompositionReport {
    pub fn empty(host: &str, unit: &str) -> Self {
        Self {
            host: host.to_string(),
            unit: unit.to_string(),
            ..Default::default()
        }
    }

    /// Whether no method was shadowed
    pub fn is_noop(&self) -> bool {
        self.shadowed.is_empty()
    }

    pub(crate) fn absorb(&mut self, other: CompositionReport) {
        self.events.extend(other.events);
        self.shadowed.extend(other.shadowed);
    }
}

pub struct CompositionEngine {
    verify_visibility: bool,
    events: AtomicU64,
    shadowed: AtomicU64,
}

impl CompositionEngine {
    pub fn new(config: &OverridableConfig) -> Self {
        Self {
            verify_visibility: config.verify_visibility,
            events: AtomicU64::new(0),
            shadowed: AtomicU64::new(0),
        }
    }

    /// Number of composition events started so far
    pub fn event_count(&self) -> u64 {
        self.events.load(Ordering::SeqCst)
    }

    /// Number of methods moved into shadow layers so far
    pub fn shadowed_count(&self) -> u64 {
        self.shadowed.load(Ordering::SeqCst)
    }

    /// Shadow every method `host` declares that `policy` allows and `unit`
    /// is about to replace.
    ///
    /// Names are processed in host declaration order. Each name's
    /// snapshot/remove/install triple commits on its own: a failure rolls
    /// back only the name being processed and stops the event.
    pub fn compose(
        &self,
        host: &dyn HostType,
        unit: &dyn BehaviorUnit,
        policy: &OverridePolicy,
    ) -> Result<CompositionReport> {
        self.compose_with(host, unit, std::slice::from_ref(policy))
    }

    /// Like [`CompositionEngine::compose`], with a name eligible when any of
    /// `policies` allows it
    pub fn compose_with(
        &self,
        host: &dyn HostType,
        unit: &dyn BehaviorUnit,
        policies: &[OverridePolicy],
    ) -> Result<CompositionReport> {
        let registry = host
            .chain_registry()
            .ok_or_else(|| OverrideError::unsupported_host(host.host_name()))?;

        let event = self.events.fetch_add(1, Ordering::SeqCst) + 1;
        let span = info_span!("compose", host = host.host_name(), unit = unit.unit_name(), event);
        let _entered = span.enter();

        let mut report = CompositionReport::empty(host.host_name(), unit.unit_name());
        report.events.push(event);

        let incoming: IndexSet<String> = unit.method_names().into_iter().collect();
        let declared = host.declared_methods();
        let declared_names = declared.iter().map(|(name, _)| name.as_str());
        let candidates: Vec<String> = OverridePolicy::eligible_under_any(policies, declared_names)
            .into_iter()
            .filter(|name| incoming.contains(name) && host.has_own_method(name))
            .collect();

        if candidates.is_empty() {
            debug!("no eligible methods to shadow");
            return Ok(report);
        }

        let mut registry = registry.write();
        for name in candidates {
            if self.shadow_method(host, &mut registry, &name, event)? {
                report.shadowed.push(name);
            }
        }

        self.shadowed
            .fetch_add(report.shadowed.len() as u64, Ordering::SeqCst);
        info!(shadowed = ?report.shadowed, "composition complete");
        Ok(report)
    }

    fn shadow_method(
        &self,
        host: &dyn HostType,
        registry: &mut OverrideChainRegistry,
        name: &str,
        event: u64,
    ) -> Result<bool> {
        let Some(original) = host.own_method(name) else {
            return Ok(false);
        };

        let snapshot = registry.record(MethodSnapshot::capture(host.host_name(), &original, event));
        host.remove_method(name);

        let delegate = Arc::clone(&snapshot);
        let wrapper = method_fn(move |invocation| delegate.invoke(invocation));
        host.install_method(name, wrapper, snapshot.visibility());
        debug!(method = name, visibility = %snapshot.visibility(), "method shadowed");

        if self.verify_visibility {
            let actual = host.shadow_visibility(name);
            if actual != Some(snapshot.visibility()) {
                warn!(method = name, ?actual, "visibility changed, rolling back");
                host.uninstall_method(name);
                registry.discard_latest(name);
                host.restore_method(snapshot.to_method());
                return Err(OverrideError::VisibilityInvariantViolation {
                    host: host.host_name().to_string(),
                    method: name.to_string(),
                    expected: snapshot.visibility(),
                    actual: actual.map_or_else(|| "nothing".to_string(), |v| v.to_string()),
                });
            }
        }

        Ok(true)
    }
}

impl Default for CompositionEngine {
    fn default() -> Self {
        Self::new(&OverridableConfig::default())
    }
}

impl std::fmt::Debug for CompositionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompositionEngine")
            .field("verify_visibility", &self.verify_visibility)
            .field("events", &self.event_count())
            .finish()
    }
}
