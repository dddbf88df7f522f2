//! Input classification and the engine's UI boundary.
//!
//! [`CommandDispatcher`] owns the session and the transcript. Every
//! submission flows through [`classify`] and comes back as a
//! [`DispatchOutcome`]; engine errors never escape `dispatch`.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use suterm_platform::{DesktopPlatform, RootService, SystemInfoService, TimeService, Timestamp};
use suterm_types::config::TerminalConfig;
use suterm_types::error::{Result, SutermError};

use crate::commands::{COMMAND_TABLE, FIXED_BUILTINS, LOCAL_BUILTINS, register_builtins};
use crate::export;
use crate::interpreter::{BuiltinRegistry, Context, ExecutionResult, resolve_path};
use crate::root::{CachedRootStatus, RootCommandRouter, SuRootProbe, subcommand_for};
use crate::runner::{CancelToken, ProcessRunner, SystemRunner};
use crate::session::{CommandRecord, RecordKind, SessionState};

/// Autocomplete never offers more than this many names.
pub const MAX_SUGGESTIONS: usize = 10;

const PROMPT_DIR_MAX: usize = 20;
const PROMPT_DIR_TAIL: usize = 17;

/// Probe line run by [`CommandDispatcher::initialize`].
const SELF_TEST: &str = "echo 'Terminal engine test'";

/// How a trimmed input line will be handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind<'a> {
    Blank,
    Clear,
    Exit,
    /// `cd` target; bare `cd` means `/`.
    ChangeDir(&'a str),
    /// A `su-` line, routed to the helper script.
    Root(&'a str),
    /// First word names a registered builtin.
    Builtin(&'a str),
    /// Anything else, run by the shell as-is.
    Shell(&'a str),
}

/// Classify one input line. First match wins.
pub fn classify(line: &str, local_shell: bool) -> CommandKind<'_> {
    let line = line.trim();
    if line.is_empty() {
        return CommandKind::Blank;
    }
    match line {
        "clear" => return CommandKind::Clear,
        "exit" => return CommandKind::Exit,
        "cd" => return CommandKind::ChangeDir("/"),
        _ => {},
    }
    if let Some(arg) = line.strip_prefix("cd ") {
        return CommandKind::ChangeDir(arg.trim());
    }
    let first = line.split_whitespace().next().unwrap_or(line);
    if first.starts_with("su-") {
        CommandKind::Root(line)
    } else if FIXED_BUILTINS.contains(&first) || (local_shell && LOCAL_BUILTINS.contains(&first))
    {
        CommandKind::Builtin(first)
    } else {
        CommandKind::Shell(line)
    }
}

/// What the UI should do with a submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Completed(ExecutionResult),
    /// Reset the screen.
    Clear,
    /// End the session.
    Exit,
}

/// Autocomplete answer for a prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    /// Replace the input with this name.
    Unique(String),
    /// Several candidates; input stays as typed.
    Suggestions(Vec<String>),
    NoMatch,
}

/// Everything the engine talks to outside its own state.
pub struct Services {
    pub runner: Box<dyn ProcessRunner>,
    pub time: Box<dyn TimeService>,
    pub system: Box<dyn SystemInfoService>,
    pub root: Box<dyn RootService>,
    /// Shared with `runner`; set it to interrupt the command in flight.
    pub cancel: CancelToken,
}

impl Services {
    /// OS-backed services for `config`.
    pub fn from_config(config: &TerminalConfig) -> Self {
        let cancel = CancelToken::new();
        let platform = DesktopPlatform::new();
        // The probe gets its own token so a stale Ctrl+C cannot skew it.
        let probe = SuRootProbe::new(
            platform.build_tags(),
            SystemRunner::from_config(config, CancelToken::new()),
        );
        Self {
            runner: Box::new(SystemRunner::from_config(config, cancel.clone())),
            time: Box::new(DesktopPlatform::new()),
            system: Box::new(platform),
            root: Box::new(CachedRootStatus::new(probe)),
            cancel,
        }
    }
}

/// The command engine: session, transcript, and routing.
pub struct CommandDispatcher {
    config: TerminalConfig,
    services: Services,
    registry: BuiltinRegistry,
    router: RootCommandRouter,
    session: SessionState,
    records: Vec<CommandRecord>,
    initialized: bool,
}

impl CommandDispatcher {
    pub fn new(config: TerminalConfig, services: Services) -> Self {
        let mut registry = BuiltinRegistry::new();
        register_builtins(&mut registry, config.local_shell);
        let router = RootCommandRouter::from_config(&config);
        let session = SessionState::new(config.initial_directory.clone());
        Self {
            config,
            services,
            registry,
            router,
            session,
            records: Vec::new(),
            initialized: false,
        }
    }

    /// Engine wired to the real OS.
    pub fn from_config(config: TerminalConfig) -> Self {
        let services = Services::from_config(&config);
        Self::new(config, services)
    }

    /// Install the helper script if needed and self-test the shell.
    ///
    /// Returns whether the self-test succeeded; `status` reports the same.
    pub fn initialize(&mut self) -> bool {
        if self.router.locate().path().is_none()
            && let Some(asset) = &self.config.helper_asset
        {
            match self.router.install(asset) {
                Ok(path) => log::info!("Helper script ready at {}", path.display()),
                Err(e) => log::warn!("Helper script install failed: {e}"),
            }
        }
        self.services.root.invalidate();

        self.initialized = match self.self_test() {
            Ok(()) => true,
            Err(e) => {
                log::warn!("Terminal engine self-test failed: {e}");
                false
            },
        };
        self.initialized
    }

    /// Run [`SELF_TEST`] in `/data`, or the session directory without one.
    fn self_test(&self) -> Result<()> {
        let dir = if Path::new("/data").is_dir() {
            "/data"
        } else {
            self.session.current_directory()
        };
        let r = self
            .services
            .runner
            .run(SELF_TEST, dir, false, self.shell_timeout());
        if !r.is_success() {
            return Err(SutermError::Process(format!(
                "exit {}: {}",
                r.exit_code, r.stderr
            )));
        }
        log::info!("Terminal engine initialized in {dir}");
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Run one submission.
    pub fn dispatch(&mut self, raw_input: &str) -> DispatchOutcome {
        let line = raw_input.trim();
        let kind = classify(line, self.config.local_shell);
        if kind == CommandKind::Blank {
            return DispatchOutcome::Completed(ExecutionResult::empty());
        }
        self.session.push_history(line);
        match kind {
            CommandKind::Clear => return DispatchOutcome::Clear,
            CommandKind::Exit => return DispatchOutcome::Exit,
            _ => {},
        }

        log::debug!("dispatch {kind:?}");
        self.record(line.to_string(), RecordKind::User);
        let result = self.execute(kind, line);

        if !result.stdout.is_empty() {
            self.record(result.stdout.clone(), RecordKind::Output);
        }
        if !result.stderr.is_empty() {
            self.record(result.stderr.clone(), RecordKind::Error);
        }
        self.record(
            format!(
                "Command completed in {}ms (Exit code: {})",
                result.duration_millis, result.exit_code
            ),
            RecordKind::System,
        );
        DispatchOutcome::Completed(result)
    }

    fn execute(&mut self, kind: CommandKind<'_>, line: &str) -> ExecutionResult {
        match kind {
            CommandKind::ChangeDir(arg) => self.change_directory(arg),
            CommandKind::Root(line) => {
                let r = self.router.route(
                    line,
                    self.session.current_directory(),
                    self.services.runner.as_ref(),
                );
                // Setup and fix can change whether su works.
                let token = line.split_whitespace().next().unwrap_or(line);
                if matches!(subcommand_for(token), "setup" | "fix") {
                    self.services.root.invalidate();
                }
                r
            },
            CommandKind::Builtin(name) => {
                let args: Vec<&str> = line.split_whitespace().skip(1).collect();
                match self.answer_builtin(name, &args) {
                    Ok(r) => r,
                    Err(SutermError::CommandNotFound(name)) => {
                        ExecutionResult::failure(format!("Unknown builtin command: {name}"), 1)
                    },
                    Err(e) => internal_failure(&e),
                }
            },
            CommandKind::Shell(line) => self.services.runner.run(
                line,
                self.session.current_directory(),
                false,
                self.shell_timeout(),
            ),
            CommandKind::Blank | CommandKind::Clear | CommandKind::Exit => {
                ExecutionResult::empty()
            },
        }
    }

    fn answer_builtin(&self, name: &str, args: &[&str]) -> Result<ExecutionResult> {
        let ctx = Context {
            cwd: self.session.current_directory(),
            history: self.session.history(),
            config: &self.config,
            time: self.services.time.as_ref(),
            system: self.services.system.as_ref(),
            root: self.services.root.as_ref(),
            runner: self.services.runner.as_ref(),
            initialized: self.initialized,
        };
        self.registry.answer(name, args, &ctx)
    }

    fn change_directory(&mut self, arg: &str) -> ExecutionResult {
        let start = Instant::now();
        let target = resolve_path(self.session.current_directory(), arg);
        let result = if Path::new(&target).is_dir() {
            self.session.set_current_directory(target);
            ExecutionResult::empty()
        } else {
            ExecutionResult::failure(format!("cd: {arg}: No such file or directory"), 1)
        };
        result.with_duration(start.elapsed())
    }

    /// `None` when `shell_timeout_secs` is 0.
    fn shell_timeout(&self) -> Option<Duration> {
        let secs = self.config.shell_timeout_secs;
        (secs > 0).then(|| Duration::from_secs(secs))
    }

    fn now(&self) -> Timestamp {
        self.services
            .time
            .now()
            .unwrap_or_else(|_| Timestamp::from_unix_secs(0))
    }

    fn record(&mut self, text: String, kind: RecordKind) {
        let record = CommandRecord {
            text,
            timestamp: self.now(),
            directory: self.session.current_directory().to_string(),
            kind,
        };
        self.records.push(record);
    }

    /// Step through history; see [`SessionState`] for the cursor rules.
    pub fn history_navigate(&mut self, direction: i32) -> String {
        self.session.navigate(direction)
    }

    /// Complete `prefix` against the command table.
    ///
    /// Several matches are also echoed to the transcript as a system line.
    pub fn autocomplete(&mut self, prefix: &str) -> Completion {
        let matches: Vec<String> = COMMAND_TABLE
            .iter()
            .filter(|c| c.starts_with(prefix))
            .take(MAX_SUGGESTIONS)
            .map(|c| (*c).to_string())
            .collect();
        match matches.len() {
            0 => Completion::NoMatch,
            1 => Completion::Unique(matches.into_iter().next().unwrap_or_default()),
            _ => {
                self.record(
                    format!("Suggestions: {}", matches.join(", ")),
                    RecordKind::System,
                );
                Completion::Suggestions(matches)
            },
        }
    }

    /// `[root@android:/data]# `, with long directories shortened.
    pub fn prompt(&self) -> String {
        let user = if self.services.root.is_rooted() {
            "root"
        } else {
            "user"
        };
        let dir = self.session.current_directory();
        let len = dir.chars().count();
        let shown = if len > PROMPT_DIR_MAX {
            let tail: String = dir.chars().skip(len - PROMPT_DIR_TAIL).collect();
            format!("...{tail}")
        } else {
            dir.to_string()
        };
        format!("[{user}@android:{shown}]# ")
    }

    /// The transcript, oldest first.
    pub fn records(&self) -> &[CommandRecord] {
        &self.records
    }

    pub fn session(&self) -> &SessionState {
        &self.session
    }

    pub fn config(&self) -> &TerminalConfig {
        &self.config
    }

    /// `(usage, description)` for each registered builtin, sorted by name.
    pub fn builtins(&self) -> Vec<(&str, &str)> {
        self.registry
            .list_commands()
            .into_iter()
            .map(|c| (c.usage(), c.description()))
            .collect()
    }

    /// Write the transcript under `dir`; returns the new file's path.
    pub fn export_history(&self, dir: &Path) -> Result<PathBuf> {
        export::export_history(&self.records, dir, self.services.time.as_ref())
    }

    /// Token that interrupts the command currently running.
    pub fn cancel_token(&self) -> CancelToken {
        self.services.cancel.clone()
    }
}

fn internal_failure(e: &SutermError) -> ExecutionResult {
    log::warn!("builtin failed: {e}");
    ExecutionResult::failure(format!("Error executing command: {e}"), -1)
}
