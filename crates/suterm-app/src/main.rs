//! suterm line-based front end.
//!
//! Reads commands from stdin and prints results to stdout/stderr. The
//! config path comes from the first CLI argument or `SUTERM_CONFIG`.
//! `:prev`, `:next`, `:complete <prefix>`, `:export [dir]` and `:cancel`
//! stand in for the arrow keys, Tab, the export menu and Ctrl+C.
//! `:builtins` lists the commands the engine answers itself.

mod repl;

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::thread;

use anyhow::{Context, Result};

use repl::{UiCommand, parse_line};
use suterm_terminal::{CancelToken, Completion, DispatchOutcome, ExecutionResult, TerminalEngine};
use suterm_types::config::TerminalConfig;

const CLEAR_SCREEN: &str = "\x1b[2J\x1b[H";

fn load_config() -> Result<TerminalConfig> {
    let path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("SUTERM_CONFIG").ok());
    match path {
        Some(p) => {
            TerminalConfig::load(Path::new(&p)).with_context(|| format!("loading config {p}"))
        },
        None => Ok(TerminalConfig::default()),
    }
}

/// Forward stdin lines to the main loop. `:cancel` is handled here so it
/// lands while a command is still running.
fn spawn_input(cancel: CancelToken) -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if parse_line(&line) == UiCommand::Cancel {
                cancel.cancel();
                continue;
            }
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

fn show(result: &ExecutionResult) {
    if !result.stdout.is_empty() {
        println!("{}", result.stdout);
    }
    if !result.stderr.is_empty() {
        eprintln!("{}", result.stderr);
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = load_config()?;
    log::info!(
        "Starting suterm (shell {}, su {})",
        config.shell,
        config.su_binary
    );

    let mut engine = TerminalEngine::from_config(config);
    if !engine.initialize() {
        log::warn!("Engine self-test failed; shell commands may not work");
    }
    println!("Enhanced Superuser Terminal. Type 'help' for available commands.");

    let input = spawn_input(engine.cancel_token());
    let mut stdout = io::stdout();
    loop {
        print!("{}", engine.prompt());
        stdout.flush()?;
        let Ok(line) = input.recv() else {
            println!();
            break;
        };
        match parse_line(&line) {
            UiCommand::Submit(text) => match engine.dispatch(&text) {
                DispatchOutcome::Completed(result) => show(&result),
                DispatchOutcome::Clear => print!("{CLEAR_SCREEN}"),
                DispatchOutcome::Exit => break,
            },
            UiCommand::Prev => println!("{}", engine.history_navigate(-1)),
            UiCommand::Next => println!("{}", engine.history_navigate(1)),
            UiCommand::Complete(prefix) => match engine.autocomplete(&prefix) {
                Completion::Unique(name) => println!("{name}"),
                Completion::Suggestions(names) => println!("Suggestions: {}", names.join(", ")),
                Completion::NoMatch => {},
            },
            UiCommand::Export(dir) => {
                let dir = dir
                    .unwrap_or_else(|| PathBuf::from(engine.session().current_directory()));
                match engine.export_history(&dir) {
                    Ok(path) => println!("History exported to: {}", path.display()),
                    Err(e) => eprintln!("Export failed: {e}"),
                }
            },
            UiCommand::Builtins => {
                for (usage, description) in engine.builtins() {
                    println!("  {usage:<16} - {description}");
                }
            },
            // Consumed by the input thread.
            UiCommand::Cancel => {},
        }
    }

    log::info!("Session ended after {} commands", engine.session().history().len());
    Ok(())
}
