//! Method descriptors and the immutable snapshots preserved when a host
//! method is shadowed.

use std::{fmt, sync::Arc};

use serde::{Deserialize, Serialize};

use crate::{errors::Result, invocation::Invocation, value::Value};

/// Visibility tag carried by every method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Visibility {
    #[default]
    Public,
    Protected,
    Private,
}

impl Visibility {
    pub fn parse(tag: &str) -> Option<Self> {
        match tag {
            "public" => Some(Visibility::Public),
            "protected" => Some(Visibility::Protected),
            "private" => Some(Visibility::Private),
            _ => None,
        }
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Visibility::Public => "public",
            Visibility::Protected => "protected",
            Visibility::Private => "private",
        })
    }
}

/// Implementation of a method, bound to no particular receiver
pub type MethodFn = Arc<dyn Fn(&Invocation<'_>) -> Result<Value> + Send + Sync>;

/// Wrap a closure as a [`MethodFn`]
pub fn method_fn<F>(f: F) -> MethodFn
where
    F: Fn(&Invocation<'_>) -> Result<Value> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// A named method as declared on a class or a behavior unit
#[derive(Clone)]
pub struct MethodDef {
    pub name: String,
    pub visibility: Visibility,
    /// Class, unit or shadow layer that holds this entry
    pub owner: String,
    pub implementation: MethodFn,
}

impl MethodDef {
    pub fn new(
        name: impl Into<String>,
        visibility: Visibility,
        owner: impl Into<String>,
        implementation: MethodFn,
    ) -> Self {
        Self {
            name: name.into(),
            visibility,
            owner: owner.into(),
            implementation,
        }
    }

    pub fn invoke(&self, invocation: &Invocation<'_>) -> Result<Value> {
        (self.implementation)(invocation)
    }
}

impl fmt::Debug for MethodDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodDef")
            .field("name", &self.name)
            .field("visibility", &self.visibility)
            .field("owner", &self.owner)
            .field("implementation", &"<function>")
            .finish()
    }
}

/// One method's implementation and visibility, captured together when the
/// method was shadowed. Never mutated after creation.
#[derive(Clone)]
pub struct MethodSnapshot {
    name: String,
    visibility: Visibility,
    host: String,
    event: u64,
    implementation: MethodFn,
}

impl MethodSnapshot {
    /// Capture a host's live method during composition event `event`
    pub fn capture(host: &str, method: &MethodDef, event: u64) -> Self {
        Self {
            name: method.name.clone(),
            visibility: method.visibility,
            host: host.to_string(),
            event,
            implementation: Arc::clone(&method.implementation),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn visibility(&self) -> Visibility {
        self.visibility
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Composition event that produced this snapshot
    pub fn event(&self) -> u64 {
        self.event
    }

    pub fn invoke(&self, invocation: &Invocation<'_>) -> Result<Value> {
        (self.implementation)(invocation)
    }

    /// Rebuild the method this snapshot was taken from
    pub fn to_method(&self) -> MethodDef {
        MethodDef::new(
            self.name.clone(),
            self.visibility,
            self.host.clone(),
            Arc::clone(&self.implementation),
        )
    }
}

impl fmt::Debug for MethodSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodSnapshot")
            .field("name", &self.name)
            .field("visibility", &self.visibility)
            .field("host", &self.host)
            .field("event", &self.event)
            .finish()
    }
}
