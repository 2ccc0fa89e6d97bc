//! Where shell output goes
//!
//! The shell reports four kinds of events: echoed script input, command
//! output, errors and method call outcomes. The console notifier prints
//! them; the buffered notifier keeps them for inspection.

use std::{fmt, sync::Arc};

use parking_lot::Mutex;

/// The result of one `.call` as seen by the shell
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallOutcome<'a> {
    /// Class the receiver was instantiated from
    pub class: &'a str,
    pub method: &'a str,
    /// Formatted return value
    pub output: &'a str,
    pub duration_ms: u64,
}

impl fmt::Display for CallOutcome<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{} => {}", self.class, self.method, self.output)
    }
}

pub trait ReplNotifier: Send + Sync {
    /// A non-interactive line about to run
    fn on_input(&self, line: &str);

    /// Output of a definition, composition or inspection command
    fn on_output(&self, content: &str);

    fn on_error(&self, content: &str);

    /// A completed method call. `quiet` asks for the bare value.
    fn on_call(&self, outcome: &CallOutcome<'_>, quiet: bool);
}

/// Prints to stdout, errors to stderr
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleNotifier;

impl ReplNotifier for ConsoleNotifier {
    fn on_input(&self, line: &str) {
        println!(">> {line}");
    }

    fn on_output(&self, content: &str) {
        if !content.is_empty() {
            println!("{content}");
        }
    }

    fn on_error(&self, content: &str) {
        eprintln!("{content}");
    }

    fn on_call(&self, outcome: &CallOutcome<'_>, quiet: bool) {
        if quiet {
            println!("{}", outcome.output);
        } else {
            println!("{outcome} ({}ms)", outcome.duration_ms);
        }
    }
}

/// Collects every event as a line of text. Clones share the same buffer, so
/// one clone can be handed to the shell and the other read afterwards.
#[derive(Debug, Default, Clone)]
pub struct BufferedNotifier {
    lines: Arc<Mutex<Vec<String>>>,
}

impl BufferedNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().clone()
    }

    fn push(&self, line: String) {
        self.lines.lock().push(line);
    }
}

impl ReplNotifier for BufferedNotifier {
    fn on_input(&self, line: &str) {
        self.push(format!("> {line}"));
    }

    fn on_output(&self, content: &str) {
        self.push(content.to_string());
    }

    fn on_error(&self, content: &str) {
        self.push(format!("error: {content}"));
    }

    // timing is left out so recorded sessions are stable
    fn on_call(&self, outcome: &CallOutcome<'_>, quiet: bool) {
        if quiet {
            self.push(outcome.output.to_string());
        } else {
            self.push(outcome.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_buffered_clones_share_lines() {
        let notifier = BufferedNotifier::new();
        let shell_side: Box<dyn ReplNotifier> = Box::new(notifier.clone());

        let outcome = CallOutcome {
            class: "Thing",
            method: "f",
            output: "\"x\"",
            duration_ms: 3,
        };
        shell_side.on_input(".call Thing f");
        shell_side.on_call(&outcome, false);
        shell_side.on_call(&outcome, true);
        shell_side.on_error("boom");

        assert_eq!(
            notifier.lines(),
            vec![
                "> .call Thing f",
                "Thing#f => \"x\"",
                "\"x\"",
                "error: boom",
            ]
        );
    }
}
