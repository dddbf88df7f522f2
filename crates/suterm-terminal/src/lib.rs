//! Command dispatch and execution engine.
//!
//! Input lines are classified once and routed to a builtin, to the
//! superuser helper script (run elevated), or to the plain shell. Every
//! route produces an `ExecutionResult`; the dispatcher records the session
//! transcript and owns the working directory and history.

mod commands;
mod dispatcher;
pub mod export;
pub mod file_commands;
mod interpreter;
pub mod root;
pub mod runner;
mod session;
pub mod system_commands;

/// Static command table offered by autocomplete.
pub use commands::COMMAND_TABLE;
/// Tier label for a benchmark duration.
pub use commands::performance_tier;
/// Register the builtins for a mode into a registry.
pub use commands::register_builtins;
/// The engine's UI boundary.
pub use dispatcher::CommandDispatcher;
/// Classifier entry point and its verdict.
pub use dispatcher::{CommandKind, classify};
/// Autocomplete answer.
pub use dispatcher::Completion;
/// What the UI should do after a submission.
pub use dispatcher::DispatchOutcome;
/// Services injected into the engine.
pub use dispatcher::Services;
/// Parse an exported transcript.
pub use export::parse_export;
/// A command answered in-process.
pub use interpreter::Builtin;
/// Registry of builtins with dispatch.
pub use interpreter::BuiltinRegistry;
/// Read-only view handed to builtins.
pub use interpreter::Context;
/// Uniform result of one dispatched command.
pub use interpreter::ExecutionResult;
/// Helper-script routing and root capability probing.
pub use root::{CachedRootStatus, HelperScriptLocation, RootCommandRouter, SuRootProbe};
/// Process execution.
pub use runner::{CancelToken, ProcessRunner, SystemRunner};
/// Session transcript and state.
pub use session::{CommandRecord, RecordKind, SessionState};

/// The engine as seen by a UI.
pub type TerminalEngine = CommandDispatcher;
