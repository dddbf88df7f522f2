//! Line protocol for the REPL front end.
//!
//! Lines starting with `:` drive the UI-side features (history replay,
//! completion, export, cancellation); everything else is submitted to the
//! engine verbatim.

use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiCommand {
    /// Text for `dispatch`.
    Submit(String),
    /// Previous history entry.
    Prev,
    /// Next history entry.
    Next,
    Complete(String),
    /// Export transcript; `None` means the current directory.
    Export(Option<PathBuf>),
    /// Interrupt the running command.
    Cancel,
    /// List the engine's builtins.
    Builtins,
}

pub fn parse_line(line: &str) -> UiCommand {
    let Some(rest) = line.trim_start().strip_prefix(':') else {
        return UiCommand::Submit(line.to_string());
    };
    let (verb, arg) = match rest.split_once(char::is_whitespace) {
        Some((v, a)) => (v, a.trim()),
        None => (rest.trim(), ""),
    };
    match verb {
        "prev" | "up" => UiCommand::Prev,
        "next" | "down" => UiCommand::Next,
        "complete" | "tab" => UiCommand::Complete(arg.to_string()),
        "export" if arg.is_empty() => UiCommand::Export(None),
        "export" => UiCommand::Export(Some(PathBuf::from(arg))),
        "cancel" => UiCommand::Cancel,
        "builtins" => UiCommand::Builtins,
        _ => UiCommand::Submit(line.to_string()),
    }
}
