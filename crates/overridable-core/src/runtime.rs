//! Overridable runtime - named classes and units sharing one configuration
//! and one composition engine.
//!
//! Used by front ends such as the composition shell, which refer to types by
//! name rather than by handle.

use std::sync::Arc;

use dashmap::{mapref::entry::Entry, DashMap};
use serde::Serialize;
use tracing::{debug, info};

use crate::{
    class::ClassDef,
    engine::{CompositionEngine, CompositionReport},
    errors::{OverrideError, Result},
    unit::UnitDef,
    OverridableConfig,
};

/// A named composition target
#[derive(Debug, Clone)]
pub enum Target {
    Class(Arc<ClassDef>),
    Unit(Arc<UnitDef>),
}

/// Counters describing a runtime
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuntimeStats {
    pub classes: usize,
    pub units: usize,
    pub composition_events: u64,
    pub shadowed_methods: u64,
}

pub struct OverrideRuntime {
    config: OverridableConfig,
    engine: Arc<CompositionEngine>,
    classes: DashMap<String, Arc<ClassDef>>,
    units: DashMap<String, Arc<UnitDef>>,
}

impl OverrideRuntime {
    pub fn new(config: OverridableConfig) -> Self {
        let engine = Arc::new(CompositionEngine::new(&config));
        Self {
            config,
            engine,
            classes: DashMap::new(),
            units: DashMap::new(),
        }
    }

    pub fn config(&self) -> &OverridableConfig {
        &self.config
    }

    pub fn engine(&self) -> &Arc<CompositionEngine> {
        &self.engine
    }

    /// Define a class, optionally inheriting from an existing one
    pub fn define_class(&self, name: &str, superclass: Option<&str>) -> Result<Arc<ClassDef>> {
        if self.units.contains_key(name) {
            return Err(OverrideError::AlreadyDefined {
                name: name.to_string(),
            });
        }
        let superclass = superclass.map(|s| self.class(s)).transpose()?;

        match self.classes.entry(name.to_string()) {
            Entry::Occupied(_) => Err(OverrideError::AlreadyDefined {
                name: name.to_string(),
            }),
            Entry::Vacant(slot) => {
                let class = ClassDef::with_config(
                    name,
                    superclass,
                    self.config.clone(),
                    Arc::clone(&self.engine),
                );
                debug!(class = name, "class defined");
                Ok(Arc::clone(slot.insert(class).value()))
            }
        }
    }

    /// Define a behavior unit
    pub fn define_unit(&self, name: &str, propagating: bool) -> Result<Arc<UnitDef>> {
        if self.classes.contains_key(name) {
            return Err(OverrideError::AlreadyDefined {
                name: name.to_string(),
            });
        }

        match self.units.entry(name.to_string()) {
            Entry::Occupied(_) => Err(OverrideError::AlreadyDefined {
                name: name.to_string(),
            }),
            Entry::Vacant(slot) => {
                let unit = if propagating {
                    UnitDef::propagating(name)
                } else {
                    UnitDef::new(name)
                };
                debug!(unit = name, propagating, "unit defined");
                Ok(Arc::clone(slot.insert(Arc::new(unit)).value()))
            }
        }
    }

    pub fn class(&self, name: &str) -> Result<Arc<ClassDef>> {
        self.classes
            .get(name)
            .map(|c| Arc::clone(c.value()))
            .ok_or_else(|| OverrideError::UnknownClass {
                name: name.to_string(),
            })
    }

    pub fn unit(&self, name: &str) -> Result<Arc<UnitDef>> {
        self.units
            .get(name)
            .map(|u| Arc::clone(u.value()))
            .ok_or_else(|| OverrideError::UnknownUnit {
                name: name.to_string(),
            })
    }

    /// Look a name up as a class first, then as a unit
    pub fn target(&self, name: &str) -> Result<Target> {
        if let Ok(class) = self.class(name) {
            return Ok(Target::Class(class));
        }
        self.unit(name).map(Target::Unit)
    }

    /// Compose unit `unit` into class or unit `target`
    pub fn include(&self, target: &str, unit: &str) -> Result<CompositionReport> {
        let unit = self.unit(unit)?;
        match self.target(target)? {
            Target::Class(class) => {
                let report = class.include(unit)?;
                info!(class = target, unit = %report.unit, shadowed = report.shadowed.len(), "unit included");
                Ok(report)
            }
            Target::Unit(outer) => {
                outer.include(Arc::clone(&unit))?;
                Ok(CompositionReport::empty(outer.name(), unit.name()))
            }
        }
    }

    /// Class names, sorted
    pub fn class_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.classes.iter().map(|c| c.key().clone()).collect();
        names.sort();
        names
    }

    /// Unit names, sorted
    pub fn unit_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.units.iter().map(|u| u.key().clone()).collect();
        names.sort();
        names
    }

    pub fn stats(&self) -> RuntimeStats {
        RuntimeStats {
            classes: self.classes.len(),
            units: self.units.len(),
            composition_events: self.engine.event_count(),
            shadowed_methods: self.engine.shadowed_count(),
        }
    }
}

impl Default for OverrideRuntime {
    fn default() -> Self {
        Self::new(OverridableConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::value::Value;

    #[test]
    fn test_names_are_unique_across_classes_and_units() {
        let runtime = OverrideRuntime::default();
        runtime.define_class("Thing", None).unwrap();
        runtime.define_unit("Mixin", false).unwrap();

        assert!(matches!(
            runtime.define_class("Thing", None),
            Err(OverrideError::AlreadyDefined { .. })
        ));
        assert!(runtime.define_unit("Thing", true).is_err());
        assert!(runtime.define_class("Mixin", None).is_err());
        assert!(matches!(
            runtime.define_class("Child", Some("Nope")),
            Err(OverrideError::UnknownClass { .. })
        ));
    }

    #[test]
    fn test_include_through_runtime() {
        let runtime = OverrideRuntime::default();
        let thing = runtime.define_class("Thing", None).unwrap();
        thing.define("f", |_| Ok(Value::from("Thing.f")));
        thing.overrides("f").unwrap();

        let unit = runtime.define_unit("B", false).unwrap();
        unit.define("f", |inv| Ok(Value::from(format!("{}B.f", inv.call_super()?))));
        let nested = runtime.define_unit("N", false).unwrap();
        runtime.include("N", "B").unwrap();
        assert!(nested.includes(&unit));

        let report = runtime.include("Thing", "N").unwrap();
        assert_eq!(report.shadowed, vec!["f"]);
        assert_eq!(
            thing.instantiate().call("f", &[]).unwrap(),
            Value::from("Thing.fB.f")
        );

        let stats = runtime.stats();
        assert_eq!(stats.classes, 1);
        assert_eq!(stats.units, 2);
        assert_eq!(stats.shadowed_methods, 1);
        assert!(matches!(
            runtime.include("Thing", "Missing"),
            Err(OverrideError::UnknownUnit { .. })
        ));
    }
}
