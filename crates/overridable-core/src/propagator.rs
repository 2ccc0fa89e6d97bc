//! Transitive override propagation for units that chain over the methods of
//! whatever class they land on.

use tracing::debug;

use crate::{
    class::ClassDef,
    engine::{CompositionEngine, CompositionReport},
    errors::Result,
    policy::OverridePolicy,
    unit::UnitDef,
};

pub struct TransitivePropagator<'a> {
    engine: &'a CompositionEngine,
}

impl<'a> TransitivePropagator<'a> {
    pub fn new(engine: &'a CompositionEngine) -> Self {
        Self { engine }
    }

    /// Policy a propagating unit applies to the class it lands on. Without
    /// an explicit policy every method of the unit is eligible.
    pub fn derive_policy(unit: &UnitDef) -> OverridePolicy {
        unit.policy().unwrap_or_default()
    }

    /// Run the shadowing step for `unit` and every unit nested in it before
    /// they join `host`. Nested units go first so the outer unit sits on top.
    pub fn propagate(&self, host: &ClassDef, unit: &UnitDef) -> Result<CompositionReport> {
        let mut report = CompositionReport::empty(host.name(), unit.name());
        for nested in unit.nested_units() {
            if host.includes(&nested) {
                continue;
            }
            report.absorb(self.compose_member(host, &nested)?);
        }
        report.absorb(self.compose_member(host, unit)?);
        Ok(report)
    }

    fn compose_member(&self, host: &ClassDef, unit: &UnitDef) -> Result<CompositionReport> {
        if unit.is_propagating() {
            if host.enable_overrides() {
                debug!(class = host.name(), unit = unit.name(), "overrides enabled by propagating unit");
            }
            // the host's own overrides stay eligible next to the unit's
            let mut policies = vec![Self::derive_policy(unit)];
            policies.extend(host.active_policy());
            return self.engine.compose_with(host, unit, &policies);
        }

        match host.active_policy() {
            Some(policy) => self.engine.compose(host, unit, &policy),
            None => {
                debug!(class = host.name(), unit = unit.name(), "overrides not enabled, plain composition");
                Ok(CompositionReport::empty(host.name(), unit.name()))
            }
        }
    }
}
