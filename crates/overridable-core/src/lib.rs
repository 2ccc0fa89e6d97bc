//! # Overridable Core
//!
//! Override composition for class-like types:
//! - Per-class override policies (whitelist / blacklist of method names)
//! - Shadow chains preserving superseded implementations
//! - A composition engine that moves eligible methods into a private shadow
//!   layer before a behavior unit is composed onto the class
//! - Explicit delegation (`call_super`) from a unit's method to the
//!   implementation it superseded
//! - Transitive propagation for units that make every class they land on
//!   chain its own methods under theirs
//!
//! ```
//! use std::sync::Arc;
//! use overridable_core::{ClassDef, UnitDef, Value};
//!
//! let thing = ClassDef::new("Thing");
//! thing.define("greet", |_| Ok(Value::from("This is Thing.")));
//! thing.overrides("greet").unwrap();
//!
//! let unit = UnitDef::new("ModuleC");
//! unit.define("greet", |inv| {
//!     Ok(Value::from(format!("{}This is ModuleC.", inv.call_super()?)))
//! });
//! thing.include(Arc::new(unit)).unwrap();
//!
//! let greeting = thing.instantiate().call("greet", &[]).unwrap();
//! assert_eq!(greeting, Value::from("This is Thing.This is ModuleC."));
//! ```

#![warn(clippy::all)]

use serde::{Deserialize, Serialize};

pub mod class;
pub mod engine;
pub mod errors;
pub mod host;
pub mod invocation;
pub mod policy;
pub mod propagator;
pub mod registry;
pub mod runtime;
pub mod snapshot;
pub mod unit;
pub mod value;

// Re-export commonly used types
pub use class::{ClassDef, Instance, OverrideCapability};
pub use engine::{CompositionEngine, CompositionReport};
pub use errors::{OverrideError, Result};
pub use host::{BehaviorUnit, HostType};
pub use invocation::Invocation;
pub use policy::{MethodNames, OverridePolicy};
pub use propagator::TransitivePropagator;
pub use registry::{ChainEntry, ChainReport, OverrideChainRegistry};
pub use runtime::{OverrideRuntime, RuntimeStats, Target};
pub use snapshot::{method_fn, MethodDef, MethodFn, MethodSnapshot, Visibility};
pub use unit::UnitDef;
pub use value::{Block, Value};

/// Crate version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize tracing for overridable components
pub fn init_tracing() {
    let mut filter = tracing_subscriber::EnvFilter::from_default_env();
    if let Ok(directive) = "overridable_core=info".parse() {
        filter = filter.add_directive(directive);
    }
    // a subscriber may already be installed by the embedding application
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// Runtime configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OverridableConfig {
    /// Check that each shadowed method keeps its visibility
    pub verify_visibility: bool,
    /// Maximum nesting of method calls, including super calls
    pub max_call_depth: usize,
    /// Enable debug mode
    pub debug: bool,
}

impl Default for OverridableConfig {
    fn default() -> Self {
        Self {
            verify_visibility: true,
            max_call_depth: 1000,
            debug: false,
        }
    }
}
