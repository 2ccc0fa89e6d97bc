//! Call frames and the delegation protocol.
//!
//! A call resolves its method name to a chain of entries (see
//! [`ClassDef::method_chain`](crate::class::ClassDef::method_chain)) and runs
//! the first one. Every entry receives an [`Invocation`] that points at its
//! own position, so `call_super` simply runs the next entry below it.

use tracing::trace;

use crate::{
    class::Instance,
    errors::{OverrideError, Result},
    snapshot::MethodDef,
    value::{Block, Value},
};

/// Context handed to a running method implementation
pub struct Invocation<'a> {
    receiver: &'a Instance,
    method: &'a str,
    chain: &'a [MethodDef],
    position: usize,
    args: &'a [Value],
    block: Option<&'a Block>,
    depth: usize,
}

impl<'a> Invocation<'a> {
    /// Run `chain[position]` for `receiver`
    pub(crate) fn dispatch(
        receiver: &Instance,
        method: &str,
        chain: &[MethodDef],
        position: usize,
        args: &[Value],
        block: Option<&Block>,
        depth: usize,
    ) -> Result<Value> {
        let limit = receiver.class().config().max_call_depth;
        if depth > limit {
            return Err(OverrideError::CallDepthExceeded {
                method: method.to_string(),
                limit,
            });
        }

        let entry = chain
            .get(position)
            .ok_or_else(|| OverrideError::no_super(method, &receiver.describe()))?;
        trace!(method, owner = %entry.owner, position, depth, "dispatch");

        let invocation = Invocation {
            receiver,
            method,
            chain,
            position,
            args,
            block,
            depth,
        };
        entry.invoke(&invocation)
    }

    pub fn receiver(&self) -> &Instance {
        self.receiver
    }

    pub fn method_name(&self) -> &str {
        self.method
    }

    pub fn args(&self) -> &[Value] {
        self.args
    }

    pub fn arg(&self, index: usize) -> Option<&Value> {
        self.args.get(index)
    }

    pub fn block(&self) -> Option<&Block> {
        self.block
    }

    /// Owner of the entry currently running
    pub fn owner(&self) -> &str {
        &self.chain[self.position].owner
    }

    /// Whether an implementation exists below this one
    pub fn has_super(&self) -> bool {
        self.position + 1 < self.chain.len()
    }

    /// Call the predecessor with the same arguments and block
    pub fn call_super(&self) -> Result<Value> {
        self.call_super_with(self.args, self.block)
    }

    /// Call the predecessor with transformed arguments and/or block
    pub fn call_super_with(&self, args: &[Value], block: Option<&Block>) -> Result<Value> {
        if !self.has_super() {
            return Err(OverrideError::no_super(
                self.method,
                &self.receiver.describe(),
            ));
        }
        Self::dispatch(
            self.receiver,
            self.method,
            self.chain,
            self.position + 1,
            args,
            block,
            self.depth + 1,
        )
    }

    /// Call another method on the receiver from inside the type. Private and
    /// protected methods are reachable.
    pub fn call_self(&self, name: &str, args: &[Value]) -> Result<Value> {
        self.receiver.send_internal(name, args, None, self.depth + 1)
    }

    /// Invoke the trailing callback
    pub fn yield_block(&self, args: &[Value]) -> Result<Value> {
        let block = self.block.ok_or_else(|| OverrideError::NoBlockGiven {
            method: self.method.to_string(),
        })?;
        block(args)
    }
}
