//! Composition shell functionality
//!
//! This module wraps the core runtime with an interactive command set:
//! - Defining classes, units and template-bodied methods
//! - Marking methods overridable and restricting propagation
//! - Including units and calling methods to observe the resulting chains
//! - Output formatting and notifications

use std::{fs, path::Path, time::Instant};

use anyhow::{anyhow, Context, Result};
use overridable_core::{
    HostType, MethodNames, OverridableConfig, OverrideRuntime, RuntimeStats, Target, Value,
    Visibility,
};
use serde::Serialize;
use tracing::debug;

pub mod commands;
pub mod notifier;
pub mod template;

pub use commands::ReplCommand;
pub use notifier::{BufferedNotifier, CallOutcome, ConsoleNotifier, ReplNotifier};
pub use template::MethodTemplate;

#[derive(Serialize)]
struct SessionStats {
    #[serde(flatten)]
    runtime: RuntimeStats,
    debug: bool,
    quiet: bool,
}

/// Interactive shell over an [`OverrideRuntime`]
pub struct Repl {
    /// Core runtime
    runtime: OverrideRuntime,
    /// Current notifier for output
    notifier: Box<dyn ReplNotifier>,
    /// Whether the shell is running
    running: bool,
    /// Quiet mode (suppress timing info)
    quiet: bool,
    /// Debug mode
    debug: bool,
}

impl Repl {
    /// Create a new shell with the given runtime
    pub fn new(runtime: OverrideRuntime) -> Result<Self> {
        let debug = runtime.config().debug;
        Ok(Self {
            runtime,
            notifier: Box::new(ConsoleNotifier),
            running: true,
            quiet: false,
            debug,
        })
    }

    /// Create a new shell over a fresh runtime built from `config`
    pub fn with_config(config: OverridableConfig) -> Result<Self> {
        Self::new(OverrideRuntime::new(config))
    }

    pub fn runtime(&self) -> &OverrideRuntime {
        &self.runtime
    }

    /// Set the notifier for this shell
    pub fn set_notifier(&mut self, notifier: Box<dyn ReplNotifier>) {
        self.notifier = notifier;
    }

    /// Get a reference to the current notifier
    pub fn notifier(&self) -> &dyn ReplNotifier {
        self.notifier.as_ref()
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn is_quiet(&self) -> bool {
        self.quiet
    }

    /// Parse shell input into a command
    pub fn parse_input(&self, input: &str) -> Result<ReplCommand> {
        commands::parse_command(input)
    }

    /// Run one line of input and report its output through the notifier.
    /// Blank lines and `#` comments yield `None`. Errors are returned, not
    /// reported.
    pub fn process_line(&mut self, line: &str) -> Result<Option<String>> {
        let trimmed = line.trim();
        if is_blank(trimmed) {
            return Ok(None);
        }

        let command = self.parse_input(trimmed)?;
        if let ReplCommand::Call {
            class,
            method,
            args,
        } = &command
        {
            let (output, duration_ms) = self.execute_call(class, method, args)?;
            let outcome = CallOutcome {
                class,
                method,
                output: &output,
                duration_ms,
            };
            self.notifier.on_call(&outcome, self.quiet);
            return Ok(Some(output));
        }

        let output = self.handle_command(command)?;
        self.notifier.on_output(&output);
        Ok(Some(output))
    }

    /// Run every line of a script file, stopping at the first failure
    pub fn run_script(&mut self, path: &Path) -> Result<Vec<String>> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read script {}", path.display()))?;

        let mut outputs = Vec::new();
        for (number, line) in content.lines().enumerate() {
            if !self.running {
                break;
            }
            if is_blank(line.trim()) {
                continue;
            }
            self.notifier.on_input(line.trim());
            let output = self
                .process_line(line)
                .with_context(|| format!("{}:{}: {}", path.display(), number + 1, line.trim()))?;
            outputs.extend(output);
        }
        Ok(outputs)
    }

    /// Handle a shell command
    pub fn handle_command(&mut self, command: ReplCommand) -> Result<String> {
        debug!(?command, "handling command");
        match command {
            ReplCommand::Help => Ok(self.get_help_text()),
            ReplCommand::Quit => {
                self.running = false;
                Ok("Goodbye!".to_string())
            }
            ReplCommand::Quiet => {
                self.quiet = !self.quiet;
                Ok(format!(
                    "Quiet mode: {}",
                    if self.quiet { "on" } else { "off" }
                ))
            }
            ReplCommand::Debug => {
                self.debug = !self.debug;
                Ok(format!(
                    "Debug mode: {}",
                    if self.debug { "on" } else { "off" }
                ))
            }
            ReplCommand::Stats => self.show_stats(),
            ReplCommand::DefineClass { name, superclass } => {
                self.runtime.define_class(&name, superclass.as_deref())?;
                Ok(match superclass {
                    Some(parent) => format!("Defined class {name} < {parent}"),
                    None => format!("Defined class {name}"),
                })
            }
            ReplCommand::DefineUnit { name, propagating } => {
                self.runtime.define_unit(&name, propagating)?;
                Ok(if propagating {
                    format!("Defined propagating unit {name}")
                } else {
                    format!("Defined unit {name}")
                })
            }
            ReplCommand::DefineMethod {
                owner,
                method,
                visibility,
                template,
            } => self.define_method(&owner, &method, visibility, &template),
            ReplCommand::Overrides { class, methods } => {
                let target = self.runtime.class(&class)?;
                target.overrides(methods.clone())?;
                Ok(format!("{class} overrides: {}", methods.join(", ")))
            }
            ReplCommand::Restrict { target, options } => self.restrict(&target, options),
            ReplCommand::Include { target, unit } => self.include(&target, &unit),
            ReplCommand::Call {
                class,
                method,
                args,
            } => self.execute_call(&class, &method, &args).map(|(output, _)| output),
            ReplCommand::Chain(class) => {
                let report = self.runtime.class(&class)?.chain_report();
                Ok(report.to_json()?)
            }
        }
    }

    /// Call `method` on a new instance of `class` and return the formatted
    /// result with timing
    pub fn execute_call(
        &mut self,
        class: &str,
        method: &str,
        args: &[String],
    ) -> Result<(String, u64)> {
        let start = Instant::now();
        let receiver = self.runtime.class(class)?.instantiate();
        let args: Vec<Value> = args.iter().map(String::as_str).map(parse_argument).collect();

        let value = receiver.call(method, &args)?;
        let duration = start.elapsed().as_millis() as u64;
        Ok((self.format_value(&value), duration))
    }

    fn define_method(
        &mut self,
        owner: &str,
        method: &str,
        visibility: Visibility,
        template: &str,
    ) -> Result<String> {
        let body = MethodTemplate::parse(template);
        let delegates = body.calls_super();
        match self.runtime.target(owner)? {
            Target::Class(class) => class.define_method(method, visibility, body.into_method()),
            Target::Unit(unit) => unit.define_method(method, visibility, body.into_method()),
        }
        let mut output = format!("Defined {visibility} {owner}#{method}");
        if delegates {
            output.push_str(" (calls super)");
        }
        Ok(output)
    }

    fn restrict(&mut self, target: &str, options: Vec<(String, MethodNames)>) -> Result<String> {
        match self.runtime.target(target)? {
            Target::Class(class) => {
                class.restrict_overrides(options)?;
                Ok(format!("{target} policy: {:?}", class.policy().unwrap_or_default()))
            }
            Target::Unit(unit) => {
                unit.restrict(options)?;
                Ok(format!("{target} policy: {:?}", unit.policy().unwrap_or_default()))
            }
        }
    }

    fn include(&mut self, target: &str, unit: &str) -> Result<String> {
        let report = self.runtime.include(target, unit)?;
        let mut output = if report.shadowed.is_empty() {
            format!("Included {unit} into {target}")
        } else {
            format!(
                "Included {unit} into {target} (shadowed: {})",
                report.shadowed.join(", ")
            )
        };

        if self.debug {
            if let Ok(class) = self.runtime.class(target) {
                output.push_str(&format!("\n  ancestors: {}", class.ancestors().join(" > ")));
                let shadowed: Vec<String> = report
                    .shadowed
                    .iter()
                    .map(|name| {
                        let vis = class
                            .shadow_visibility(name)
                            .map_or_else(|| "?".to_string(), |v| v.to_string());
                        format!("{name} ({vis})")
                    })
                    .collect();
                if !shadowed.is_empty() {
                    output.push_str(&format!("\n  shadow layer: {}", shadowed.join(", ")));
                }
            }
        }
        Ok(output)
    }

    /// Format a value for display
    fn format_value(&self, value: &Value) -> String {
        match value {
            Value::Null => "null".to_string(),
            Value::Boolean(b) => b.to_string(),
            Value::Integer(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::String(s) => format!("\"{s}\""),
            Value::List(items) => {
                let formatted: Vec<String> = items.iter().map(|v| self.format_value(v)).collect();
                format!("[{}]", formatted.join(", "))
            }
        }
    }

    /// Get help text
    fn get_help_text(&self) -> String {
        r#"Overridable Shell Commands:
  .help    - Show this help message
  .quit    - Exit the shell
  .quiet   - Toggle quiet mode (hide timing info)
  .debug   - Toggle debug mode (show ancestors after .include)
  .stats   - Show runtime statistics

Definitions:
  .class <name> [superclass]                 - Define a class
  .unit <name> [propagate]                   - Define a unit
  .def <owner> <method> [visibility] <body>  - Define a method

Composition:
  .overrides <class> <method>...             - Mark methods overridable
  .restrict <target> [only=a,b] [except=c]   - Narrow eligible methods
  .include <target> <unit>                   - Include a unit
  .call <class> <method> [args...]           - Call a method on a new instance
  .chain <class>                             - Show shadow chains as JSON

Method bodies:
  {super} result of the overridden method, {args} all arguments joined
  with '-', {0} {1} ... single arguments."#
            .to_string()
    }

    /// Show runtime statistics
    fn show_stats(&self) -> Result<String> {
        let stats = SessionStats {
            runtime: self.runtime.stats(),
            debug: self.debug,
            quiet: self.quiet,
        };
        serde_json::to_string_pretty(&stats).map_err(|e| anyhow!("Failed to format stats: {e}"))
    }

    /// Show exit statistics
    pub fn show_exit_stats(&self) {
        if !self.quiet {
            let stats = self.runtime.stats();
            println!(
                "\nSession complete. {} composition events, {} methods shadowed.",
                stats.composition_events, stats.shadowed_methods
            );
        }
    }
}

fn is_blank(line: &str) -> bool {
    line.is_empty() || line.starts_with('#')
}

/// Integers stay integers; everything else is passed as a string
fn parse_argument(arg: &str) -> Value {
    arg.parse::<i64>()
        .map(Value::from)
        .unwrap_or_else(|_| Value::from(arg))
}
