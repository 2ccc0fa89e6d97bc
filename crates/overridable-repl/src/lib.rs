//! Overridable REPL - interactive composition shell for the overridable
//! engine
//!
//! This crate provides the shell's command parsing, method body templates and
//! output notification on top of `overridable-core`.

pub mod repl;

// Re-export commonly used types for convenience
pub use repl::{
    BufferedNotifier, CallOutcome, ConsoleNotifier, MethodTemplate, Repl, ReplCommand, ReplNotifier,
};
