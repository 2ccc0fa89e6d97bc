//! Collaborator contracts between the composition engine and the object
//! model that owns methods.

use parking_lot::RwLock;

use crate::{
    registry::OverrideChainRegistry,
    snapshot::{MethodDef, MethodFn, Visibility},
};

/// A type whose methods can be shadowed
pub trait HostType {
    fn host_name(&self) -> &str;

    /// Methods the host itself declares, in declaration order
    fn declared_methods(&self) -> Vec<(String, Visibility)>;

    fn has_own_method(&self, name: &str) -> bool;

    /// Current live implementation the host declares under `name`
    fn own_method(&self, name: &str) -> Option<MethodDef>;

    fn remove_method(&self, name: &str) -> Option<MethodDef>;

    /// Put a previously removed method back on the declaration surface
    fn restore_method(&self, method: MethodDef);

    /// Install `implementation` into the host's private shadow layer
    fn install_method(&self, name: &str, implementation: MethodFn, visibility: Visibility);

    /// Remove the newest shadow layer entry for `name`
    fn uninstall_method(&self, name: &str);

    /// Visibility of the newest shadow layer entry for `name`
    fn shadow_visibility(&self, name: &str) -> Option<Visibility>;

    /// Shadow chains of this host, or `None` when the host cannot own a
    /// shadow layer
    fn chain_registry(&self) -> Option<&RwLock<OverrideChainRegistry>>;
}

/// A cohesive set of named methods composed onto a host
pub trait BehaviorUnit {
    fn unit_name(&self) -> &str;

    /// Names the unit declares. Their implementations join the host through
    /// its resolution order, not through the engine.
    fn method_names(&self) -> Vec<String>;
}
