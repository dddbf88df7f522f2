//! Error types for suterm.

use std::io;

/// Errors produced inside the suterm engine.
///
/// None of these reach the UI directly: every component renders them into
/// an `ExecutionResult` at its boundary.
#[derive(Debug, thiserror::Error)]
pub enum SutermError {
    #[error("{0}: command not found")]
    CommandNotFound(String),

    #[error("{0}")]
    ResourceMissing(String),

    #[error("process error: {0}")]
    Process(String),

    /// Shell-style filesystem message, shown verbatim (`ls: x: Not a directory`).
    #[error("{0}")]
    Filesystem(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("platform error: {0}")]
    Platform(String),

    #[error("export error: {0}")]
    Export(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, SutermError>;
