use std::{
    io::{self, IsTerminal},
    path::Path,
    process::ExitCode,
};

use anyhow::Result;
use clap::{Arg, Command};
use overridable_core::{init_tracing, OverridableConfig, OverrideRuntime};
use overridable_repl::repl::Repl;

fn main() -> Result<ExitCode> {
    // Initialize logging
    init_tracing();

    // Parse command line arguments
    let matches = Command::new("overridable-repl")
        .version(overridable_core::VERSION)
        .about("Interactive shell for composing overridable classes and units")
        .arg(
            Arg::new("file")
                .value_name("FILE")
                .help("Run a shell script file instead of reading input interactively")
                .index(1),
        )
        .arg(
            Arg::new("debug")
                .long("debug")
                .help("Enable debug mode")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("max-depth")
                .long("max-depth")
                .value_name("DEPTH")
                .help("Maximum nesting of method and super calls")
                .value_parser(clap::value_parser!(usize)),
        )
        .get_matches();

    let input_file = matches.get_one::<String>("file").cloned();
    let debug = matches.get_flag("debug");

    let mut config = OverridableConfig {
        debug,
        ..Default::default()
    };
    if let Some(depth) = matches.get_one::<usize>("max-depth") {
        config.max_call_depth = *depth;
    }

    println!("Overridable REPL v{}", overridable_core::VERSION);
    if debug {
        println!("Debug mode: enabled");
    }

    let runtime = OverrideRuntime::new(config);
    let mut repl = Repl::new(runtime)?;

    println!("Type .help for help, .quit to exit");
    println!();

    let status = match input_file {
        Some(file) => run_file(&mut repl, Path::new(&file)),
        None => run_interactive(&mut repl)?,
    };

    // Show exit statistics
    repl.show_exit_stats();

    Ok(status)
}

/// Run a script, stopping at the first failing line
fn run_file(repl: &mut Repl, path: &Path) -> ExitCode {
    match repl.run_script(path) {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            repl.notifier().on_error(&format!("Error: {e:#}"));
            ExitCode::FAILURE
        }
    }
}

fn run_interactive(repl: &mut Repl) -> Result<ExitCode> {
    use rustyline::{error::ReadlineError, DefaultEditor};

    let mut rl = DefaultEditor::new()?;
    let echo = !io::stdin().is_terminal();

    while repl.is_running() {
        match rl.readline("override> ") {
            Ok(line) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                rl.add_history_entry(trimmed)?;

                // Echo piped input
                if echo {
                    repl.notifier().on_input(trimmed);
                }

                // keep going after errors
                if let Err(e) = repl.process_line(trimmed) {
                    repl.notifier().on_error(&format!("Error: {e}"));
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("Use .quit to exit");
            }
            Err(ReadlineError::Eof) => {
                println!("Goodbye!");
                break;
            }
            Err(err) => {
                eprintln!("Error: {err}");
                return Ok(ExitCode::FAILURE);
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}
