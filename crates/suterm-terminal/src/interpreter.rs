//! Builtin trait, registry, and the uniform result record.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use suterm_platform::{RootService, SystemInfoService, TimeService};
use suterm_types::config::TerminalConfig;
use suterm_types::error::{Result, SutermError};

use crate::runner::ProcessRunner;

/// Outcome of one dispatched command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionResult {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    pub duration_millis: i64,
}

impl ExecutionResult {
    /// Empty output, exit 0, zero duration.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            ..Self::default()
        }
    }

    pub fn failure(stderr: impl Into<String>, exit_code: i32) -> Self {
        Self {
            stderr: stderr.into(),
            exit_code,
            ..Self::default()
        }
    }

    pub fn with_duration(mut self, elapsed: Duration) -> Self {
        self.duration_millis = i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX);
        self
    }

    pub fn is_success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Read-only view of the session and services handed to every builtin.
pub struct Context<'a> {
    /// Session working directory.
    pub cwd: &'a str,
    /// Raw session history, oldest first.
    pub history: &'a [String],
    pub config: &'a TerminalConfig,
    pub time: &'a dyn TimeService,
    pub system: &'a dyn SystemInfoService,
    pub root: &'a dyn RootService,
    /// For the few builtins that deliberately shell out (`ps`).
    pub runner: &'a dyn ProcessRunner,
    /// Whether `initialize` succeeded.
    pub initialized: bool,
}

/// A command answered by the engine without spawning a shell.
pub trait Builtin {
    /// The command name (what the user types).
    fn name(&self) -> &str;

    /// One-line description.
    fn description(&self) -> &str;

    /// Usage string (e.g. "ls \[path\]").
    fn usage(&self) -> &str;

    /// Produce the command's stdout, or an error rendered as stderr.
    fn execute(&self, args: &[&str], ctx: &Context<'_>) -> Result<String>;
}

/// Registry of builtins with dispatch by name.
pub struct BuiltinRegistry {
    commands: HashMap<String, Box<dyn Builtin>>,
}

impl BuiltinRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            commands: HashMap::new(),
        }
    }

    /// Register a builtin. Replaces any existing builtin with the same name.
    pub fn register(&mut self, cmd: Box<dyn Builtin>) {
        self.commands.insert(cmd.name().to_string(), cmd);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.commands.contains_key(name)
    }

    /// Run a builtin and wrap its output.
    ///
    /// Filesystem errors become shell-style stderr with exit 1. An unknown
    /// name is `CommandNotFound`; any other error is returned for the
    /// dispatcher to render.
    pub fn answer(
        &self,
        name: &str,
        args: &[&str],
        ctx: &Context<'_>,
    ) -> Result<ExecutionResult> {
        let cmd = self
            .commands
            .get(name)
            .ok_or_else(|| SutermError::CommandNotFound(name.to_string()))?;
        let start = Instant::now();
        match cmd.execute(args, ctx) {
            Ok(text) => Ok(ExecutionResult::success(text).with_duration(start.elapsed())),
            Err(SutermError::Filesystem(msg)) => {
                Ok(ExecutionResult::failure(msg, 1).with_duration(start.elapsed()))
            },
            Err(e) => Err(e),
        }
    }

    /// Registered builtins sorted by name.
    pub fn list_commands(&self) -> Vec<&dyn Builtin> {
        let mut cmds: Vec<&dyn Builtin> = self.commands.values().map(|c| c.as_ref()).collect();
        cmds.sort_by(|a, b| a.name().cmp(b.name()));
        cmds
    }
}

impl Default for BuiltinRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Join `name` onto `cwd` with exactly one separator. Absolute names are
/// returned verbatim; nothing is normalized.
pub fn resolve_path(cwd: &str, name: &str) -> String {
    if name.starts_with('/') {
        name.to_string()
    } else if cwd.ends_with('/') {
        format!("{cwd}{name}")
    } else {
        format!("{cwd}/{name}")
    }
}
