//! Superuser helper-script routing and root capability probing.

use std::cell::Cell;
use std::path::{Path, PathBuf};
use std::time::Duration;

use suterm_platform::RootService;
use suterm_types::config::TerminalConfig;
use suterm_types::error::{Result, SutermError};

use crate::interpreter::ExecutionResult;
use crate::runner::ProcessRunner;

/// Message returned when neither helper-script location exists.
pub const SCRIPT_NOT_FOUND: &str = "Superuser script not found. Please run setup first.";

/// Fixed `su-` token table. Tokens not listed map by stripping `su-`.
const SUBCOMMANDS: &[(&str, &str)] = &[
    ("su-check", "check"),
    ("su-fix", "fix"),
    ("su-backup", "backup"),
    ("su-setup", "setup"),
    ("su-health", "health"),
    ("su-network", "network"),
    ("su-security", "security"),
    ("su-optimize", "optimize"),
    ("su-full", "full"),
    ("su-benchmark", "benchmark"),
];

/// Where the helper script was found for this invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HelperScriptLocation {
    Primary(PathBuf),
    Fallback(PathBuf),
    Absent,
}

impl HelperScriptLocation {
    /// Check `primary`, then `fallback`.
    pub fn resolve(primary: &Path, fallback: &Path) -> Self {
        if primary.exists() {
            Self::Primary(primary.to_path_buf())
        } else if fallback.exists() {
            Self::Fallback(fallback.to_path_buf())
        } else {
            Self::Absent
        }
    }

    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Primary(p) | Self::Fallback(p) => Some(p),
            Self::Absent => None,
        }
    }
}

/// Map a `su-` token onto the helper script's subcommand.
pub fn subcommand_for(token: &str) -> &str {
    SUBCOMMANDS
        .iter()
        .find(|(t, _)| *t == token)
        .map(|(_, sub)| *sub)
        .unwrap_or_else(|| token.strip_prefix("su-").unwrap_or(token))
}

/// Subcommand plus trailing arguments, each as one shell word.
///
/// Words that are not plain identifiers or paths are single-quoted, so
/// `su-check; reboot` reaches the script as the literal `'check;' reboot`
/// instead of running a second command as root.
pub fn script_arguments(line: &str) -> String {
    let mut words = line.split_whitespace();
    let sub = words.next().map(subcommand_for).unwrap_or_default();
    std::iter::once(sub)
        .chain(words)
        .map(shell_word)
        .collect::<Vec<_>>()
        .join(" ")
}

fn shell_word(s: &str) -> String {
    let plain = !s.is_empty()
        && s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./=:,+@%".contains(c));
    if plain { s.to_string() } else { shell_quote(s) }
}

/// Single-quote `s` for `sh`.
fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}

/// Routes `su-` commands to the helper script under elevated privilege.
#[derive(Debug, Clone)]
pub struct RootCommandRouter {
    primary: PathBuf,
    fallback: PathBuf,
}

impl RootCommandRouter {
    pub fn new(primary: impl Into<PathBuf>, fallback: impl Into<PathBuf>) -> Self {
        Self {
            primary: primary.into(),
            fallback: fallback.into(),
        }
    }

    pub fn from_config(config: &TerminalConfig) -> Self {
        Self::new(&config.primary_script, &config.fallback_script)
    }

    /// Resolved fresh on every call so reinstalls are picked up.
    pub fn locate(&self) -> HelperScriptLocation {
        HelperScriptLocation::resolve(&self.primary, &self.fallback)
    }

    /// Path of the helper script, or `ResourceMissing` when neither
    /// location exists.
    pub fn script(&self) -> Result<PathBuf> {
        self.locate()
            .path()
            .map(Path::to_path_buf)
            .ok_or_else(|| SutermError::ResourceMissing(SCRIPT_NOT_FOUND.into()))
    }

    /// Run the helper script for `line` in `working_dir`.
    ///
    /// Root commands have no timeout: diagnostic suites can legitimately
    /// run for minutes. Only cancellation stops them early.
    pub fn route(
        &self,
        line: &str,
        working_dir: &str,
        runner: &dyn ProcessRunner,
    ) -> ExecutionResult {
        let script = match self.script() {
            Ok(path) => path,
            Err(e) => {
                log::warn!("{line}: helper script not found");
                return ExecutionResult::failure(e.to_string(), 1);
            },
        };
        let args = script_arguments(line);
        let command = format!(
            "cd {} && {} {args}",
            shell_quote(working_dir),
            shell_quote(&script.to_string_lossy()),
        );
        log::debug!("routing {line:?} via {}", script.display());
        runner.run(&command, working_dir, true, None)
    }

    /// Copy `asset` to the fallback location and mark it executable.
    pub fn install(&self, asset: &Path) -> Result<PathBuf> {
        if !asset.is_file() {
            return Err(SutermError::ResourceMissing(format!(
                "helper asset {} not found",
                asset.display()
            )));
        }
        if let Some(parent) = self.fallback.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::copy(asset, &self.fallback)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&self.fallback, std::fs::Permissions::from_mode(0o755))?;
        }
        log::info!(
            "Installed helper script {} -> {}",
            asset.display(),
            self.fallback.display()
        );
        Ok(self.fallback.clone())
    }
}

// ---------------------------------------------------------------------------
// Root capability
// ---------------------------------------------------------------------------

/// Well-known su binary locations.
pub const SU_PATHS: &[&str] = &[
    "/system/app/Superuser.apk",
    "/sbin/su",
    "/system/bin/su",
    "/system/xbin/su",
    "/data/local/xbin/su",
    "/data/local/bin/su",
    "/system/sd/xbin/su",
    "/system/bin/failsafe/su",
    "/data/local/su",
    "/su/bin/su",
];

/// Bound on the `su -c id` probe; a su prompt nobody answers must not hang
/// the session.
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Probes for root: test-keys build tag, known su paths, then `su -c id`.
pub struct SuRootProbe<R: ProcessRunner> {
    build_tags: Option<String>,
    su_paths: Vec<PathBuf>,
    runner: R,
}

impl<R: ProcessRunner> SuRootProbe<R> {
    pub fn new(build_tags: Option<String>, runner: R) -> Self {
        Self {
            build_tags,
            su_paths: SU_PATHS.iter().map(PathBuf::from).collect(),
            runner,
        }
    }

    /// Replace the su path list (tests, unusual ROMs).
    pub fn with_su_paths(mut self, paths: Vec<PathBuf>) -> Self {
        self.su_paths = paths;
        self
    }
}

impl<R: ProcessRunner> RootService for SuRootProbe<R> {
    fn is_rooted(&self) -> bool {
        if self
            .build_tags
            .as_deref()
            .is_some_and(|tags| tags.contains("test-keys"))
        {
            return true;
        }
        if self.su_paths.iter().any(|p| p.exists()) {
            return true;
        }
        let r = self.runner.run("id", "/", true, Some(PROBE_TIMEOUT));
        r.exit_code == 0 && r.stdout.to_lowercase().contains("uid=0")
    }
}

/// Memoizes another `RootService` until `invalidate` is called.
pub struct CachedRootStatus<S: RootService> {
    inner: S,
    cached: Cell<Option<bool>>,
}

impl<S: RootService> CachedRootStatus<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            cached: Cell::new(None),
        }
    }
}

impl<S: RootService> RootService for CachedRootStatus<S> {
    fn is_rooted(&self) -> bool {
        if let Some(v) = self.cached.get() {
            return v;
        }
        let v = self.inner.is_rooted();
        log::debug!("root probe: {v}");
        self.cached.set(Some(v));
        v
    }

    fn invalidate(&self) {
        self.cached.set(None);
        self.inner.invalidate();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::test_support::{FakeRoot, RecordingRunner};

    #[test]
    fn fixed_table_maps_tokens() {
        assert_eq!(subcommand_for("su-check"), "check");
        assert_eq!(subcommand_for("su-optimize"), "optimize");
        assert_eq!(subcommand_for("su-benchmark"), "benchmark");
    }

    #[test]
    fn unknown_token_strips_prefix_verbatim() {
        assert_eq!(subcommand_for("su-frobnicate"), "frobnicate");
    }

    #[test]
    fn trailing_arguments_pass_through() {
        assert_eq!(script_arguments("su-check --verbose"), "check --verbose");
        assert_eq!(script_arguments("su-backup /sdcard/out"), "backup /sdcard/out");
    }

    #[test]
    fn shell_metacharacters_are_quoted() {
        assert_eq!(script_arguments("su-check; reboot"), "'check;' reboot");
        assert_eq!(
            script_arguments("su-health $(id) `id` |cat"),
            "health '$(id)' '`id`' '|cat'"
        );
    }

    #[test]
    fn injected_command_reaches_script_as_data() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("Superuser_main");
        std::fs::write(&script, "").unwrap();
        let router = RootCommandRouter::new(&script, dir.path().join("fallback"));
        let runner = RecordingRunner::default();
        router.route("su-check && rm -rf /", "/", &runner);
        let calls = runner.calls.borrow();
        assert_eq!(
            calls[0].0,
            format!("cd '/' && '{}' check '&&' rm -rf /", script.display())
        );
    }

    #[test]
    fn absent_script_spawns_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let router = RootCommandRouter::new(dir.path().join("a"), dir.path().join("b"));
        let runner = RecordingRunner::default();
        let r = router.route("su-check", "/data", &runner);
        assert_eq!(r.stdout, "");
        assert_eq!(r.stderr, SCRIPT_NOT_FOUND);
        assert_eq!(r.exit_code, 1);
        assert_eq!(r.duration_millis, 0);
        assert_eq!(runner.spawns(), 0);
        assert!(matches!(router.script(), Err(SutermError::ResourceMissing(_))));
    }

    #[test]
    fn primary_preferred_over_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let primary = dir.path().join("primary");
        let fallback = dir.path().join("fallback");
        std::fs::write(&primary, "").unwrap();
        std::fs::write(&fallback, "").unwrap();
        assert_eq!(
            HelperScriptLocation::resolve(&primary, &fallback),
            HelperScriptLocation::Primary(primary.clone())
        );
        std::fs::remove_file(&primary).unwrap();
        assert_eq!(
            HelperScriptLocation::resolve(&primary, &fallback),
            HelperScriptLocation::Fallback(fallback)
        );
    }

    #[test]
    fn route_invokes_script_elevated_without_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let fallback = dir.path().join("Superuser_main");
        std::fs::write(&fallback, "").unwrap();
        let router = RootCommandRouter::new(dir.path().join("missing"), &fallback);
        let runner = RecordingRunner::replying(ExecutionResult::success("ok"));

        let r = router.route("su-health", "/data/local", &runner);
        assert_eq!(r.stdout, "ok");

        let calls = runner.calls.borrow();
        assert_eq!(calls.len(), 1);
        let (line, wd, elevate, timeout) = &calls[0];
        assert_eq!(
            line,
            &format!("cd '/data/local' && '{}' health", fallback.display())
        );
        assert_eq!(wd, "/data/local");
        assert!(*elevate);
        assert!(timeout.is_none());
    }

    #[test]
    fn quotes_are_escaped() {
        assert_eq!(shell_quote("it's"), r"'it'\''s'");
    }

    #[test]
    fn reinstall_is_observed_immediately() {
        let dir = tempfile::tempdir().unwrap();
        let fallback = dir.path().join("bin").join("Superuser_main");
        let router = RootCommandRouter::new(dir.path().join("missing"), &fallback);
        assert_eq!(router.locate(), HelperScriptLocation::Absent);

        let asset = dir.path().join("asset");
        std::fs::write(&asset, "#!/bin/sh\necho hi\n").unwrap();
        let installed = router.install(&asset).unwrap();
        assert_eq!(installed, fallback);
        assert_eq!(router.locate(), HelperScriptLocation::Fallback(fallback.clone()));

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&fallback).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o755);
        }
    }

    #[test]
    fn install_missing_asset_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let router = RootCommandRouter::new(dir.path().join("p"), dir.path().join("f"));
        assert!(matches!(
            router.install(&dir.path().join("no-asset")),
            Err(SutermError::ResourceMissing(_))
        ));
        assert!(!dir.path().join("f").exists());
    }

    #[test]
    fn probe_accepts_test_keys() {
        let runner = RecordingRunner::default();
        let probe = SuRootProbe::new(Some("release-keys,test-keys".into()), runner)
            .with_su_paths(Vec::new());
        assert!(probe.is_rooted());
        assert_eq!(probe.runner.spawns(), 0);
    }

    #[test]
    fn probe_accepts_su_path() {
        let dir = tempfile::tempdir().unwrap();
        let su = dir.path().join("su");
        std::fs::write(&su, "").unwrap();
        let probe = SuRootProbe::new(None, RecordingRunner::default()).with_su_paths(vec![su]);
        assert!(probe.is_rooted());
    }

    #[test]
    fn probe_falls_back_to_su_id() {
        let runner = RecordingRunner::replying(ExecutionResult::success(
            "uid=0(root) gid=0(root) groups=0(root)",
        ));
        let probe = SuRootProbe::new(None, runner).with_su_paths(Vec::new());
        assert!(probe.is_rooted());
        let calls = probe.runner.calls.borrow();
        assert_eq!(calls[0].0, "id");
        assert!(calls[0].2);
        assert_eq!(calls[0].3, Some(PROBE_TIMEOUT));
    }

    #[test]
    fn failed_su_means_not_rooted() {
        let runner = RecordingRunner::replying(ExecutionResult::failure(
            "Root command execution failed: not found",
            -1,
        ));
        let probe = SuRootProbe::new(None, runner).with_su_paths(Vec::new());
        assert!(!probe.is_rooted());
    }

    #[test]
    fn cache_probes_once_until_invalidated() {
        let cached = CachedRootStatus::new(FakeRoot::new(true));
        assert!(cached.is_rooted());
        assert!(cached.is_rooted());
        assert_eq!(cached.inner.probes.get(), 1);
        cached.invalidate();
        assert!(cached.is_rooted());
        assert_eq!(cached.inner.probes.get(), 2);
    }
}
