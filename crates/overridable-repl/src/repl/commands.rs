//! Shell command parsing and definitions
//!
//! Every shell input is a dot-command (.class, .def, .include, ...).

use anyhow::{anyhow, Result};
use overridable_core::{MethodNames, Visibility};

/// Available shell commands
#[derive(Debug, Clone, PartialEq)]
pub enum ReplCommand {
    /// Show help information
    Help,
    /// Exit the shell
    Quit,
    /// Toggle quiet mode
    Quiet,
    /// Toggle debug mode
    Debug,
    /// Show runtime statistics
    Stats,
    /// Define a class, optionally with a superclass
    DefineClass {
        name: String,
        superclass: Option<String>,
    },
    /// Define a behavior unit
    DefineUnit { name: String, propagating: bool },
    /// Define a method on a class or unit from a body template
    DefineMethod {
        owner: String,
        method: String,
        visibility: Visibility,
        template: String,
    },
    /// Mark class methods as overridable
    Overrides { class: String, methods: Vec<String> },
    /// Apply only/except options to a class or unit
    Restrict {
        target: String,
        options: Vec<(String, MethodNames)>,
    },
    /// Include a unit into a class or unit
    Include { target: String, unit: String },
    /// Call a method on a fresh instance of a class
    Call {
        class: String,
        method: String,
        args: Vec<String>,
    },
    /// Print the shadow chains of a class as JSON
    Chain(String),
}

/// Parse a command string into a ReplCommand
pub fn parse_command(input: &str) -> Result<ReplCommand> {
    let trimmed = input.trim();

    let Some(body) = trimmed.strip_prefix('.') else {
        return Err(anyhow!("Commands must start with '.'"));
    };

    let parts: Vec<&str> = body.split_whitespace().collect();

    if parts.is_empty() {
        return Err(anyhow!("Empty command"));
    }

    match parts[0] {
        "help" | "h" => Ok(ReplCommand::Help),
        "quit" | "q" | "exit" => Ok(ReplCommand::Quit),
        "quiet" => Ok(ReplCommand::Quiet),
        "debug" => Ok(ReplCommand::Debug),
        "stats" | "statistics" => Ok(ReplCommand::Stats),
        "class" => match parts.len() {
            2 | 3 => Ok(ReplCommand::DefineClass {
                name: parts[1].to_string(),
                superclass: parts.get(2).map(|s| s.to_string()),
            }),
            _ => Err(anyhow!("Usage: .class <name> [superclass]")),
        },
        "unit" => match parts.as_slice() {
            [_, name] => Ok(ReplCommand::DefineUnit {
                name: name.to_string(),
                propagating: false,
            }),
            [_, name, "propagate"] => Ok(ReplCommand::DefineUnit {
                name: name.to_string(),
                propagating: true,
            }),
            _ => Err(anyhow!("Usage: .unit <name> [propagate]")),
        },
        "def" => parse_def(body),
        "overrides" => {
            if parts.len() < 3 {
                return Err(anyhow!("Usage: .overrides <class> <method>..."));
            }
            Ok(ReplCommand::Overrides {
                class: parts[1].to_string(),
                methods: parts[2..].iter().map(|s| s.to_string()).collect(),
            })
        }
        "restrict" => {
            if parts.len() < 3 {
                return Err(anyhow!(
                    "Usage: .restrict <target> [only=a,b] [except=c]"
                ));
            }
            let options = parts[2..]
                .iter()
                .map(|option| {
                    option
                        .split_once('=')
                        .map(|(key, names)| (key.to_string(), MethodNames::parse_list(names)))
                        .ok_or_else(|| anyhow!("Expected key=names, got '{option}'"))
                })
                .collect::<Result<Vec<_>>>()?;
            Ok(ReplCommand::Restrict {
                target: parts[1].to_string(),
                options,
            })
        }
        "include" => {
            if parts.len() != 3 {
                return Err(anyhow!("Usage: .include <target> <unit>"));
            }
            Ok(ReplCommand::Include {
                target: parts[1].to_string(),
                unit: parts[2].to_string(),
            })
        }
        "call" => {
            if parts.len() < 3 {
                return Err(anyhow!("Usage: .call <class> <method> [args...]"));
            }
            Ok(ReplCommand::Call {
                class: parts[1].to_string(),
                method: parts[2].to_string(),
                args: parts[3..].iter().map(|s| s.to_string()).collect(),
            })
        }
        "chain" => {
            if parts.len() != 2 {
                return Err(anyhow!("Usage: .chain <class>"));
            }
            Ok(ReplCommand::Chain(parts[1].to_string()))
        }
        _ => Err(anyhow!("Unknown command: .{}", parts[0])),
    }
}

/// `.def OWNER METHOD [visibility] TEMPLATE...`; the template keeps its
/// inner spacing.
fn parse_def(body: &str) -> Result<ReplCommand> {
    let usage = || anyhow!("Usage: .def <owner> <method> [public|protected|private] <template>");

    let rest = body.trim_start().strip_prefix("def").ok_or_else(usage)?;
    let (owner, rest) = next_word(rest).ok_or_else(usage)?;
    let (method, rest) = next_word(rest).ok_or_else(usage)?;

    let (visibility, template) = match next_word(rest) {
        Some((word, tail)) => match Visibility::parse(word) {
            Some(visibility) => (visibility, tail),
            None => (Visibility::Public, rest),
        },
        None => (Visibility::Public, rest),
    };

    Ok(ReplCommand::DefineMethod {
        owner: owner.to_string(),
        method: method.to_string(),
        visibility,
        template: template.trim().to_string(),
    })
}

fn next_word(input: &str) -> Option<(&str, &str)> {
    let input = input.trim_start();
    if input.is_empty() {
        return None;
    }
    match input.find(char::is_whitespace) {
        Some(end) => Some((&input[..end], &input[end..])),
        None => Some((input, "")),
    }
}
