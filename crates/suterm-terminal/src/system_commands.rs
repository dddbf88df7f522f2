//! Local-shell system builtins: date, whoami, uname, history, ps.

use std::time::Duration;

use suterm_types::error::Result;

use crate::interpreter::{Builtin, BuiltinRegistry, Context};

/// Register system builtins into a registry.
pub fn register_system_commands(reg: &mut BuiltinRegistry) {
    reg.register(Box::new(DateCmd));
    reg.register(Box::new(WhoamiCmd));
    reg.register(Box::new(UnameCmd));
    reg.register(Box::new(HistoryCmd));
    reg.register(Box::new(PsCmd));
}

// ---------------------------------------------------------------------------
// date
// ---------------------------------------------------------------------------

struct DateCmd;
impl Builtin for DateCmd {
    fn name(&self) -> &str {
        "date"
    }
    fn description(&self) -> &str {
        "Show current date and time"
    }
    fn usage(&self) -> &str {
        "date"
    }
    fn execute(&self, _args: &[&str], ctx: &Context<'_>) -> Result<String> {
        Ok(ctx.time.now()?.to_string())
    }
}

// ---------------------------------------------------------------------------
// whoami
// ---------------------------------------------------------------------------

struct WhoamiCmd;
impl Builtin for WhoamiCmd {
    fn name(&self) -> &str {
        "whoami"
    }
    fn description(&self) -> &str {
        "Print current user"
    }
    fn usage(&self) -> &str {
        "whoami"
    }
    fn execute(&self, _args: &[&str], _ctx: &Context<'_>) -> Result<String> {
        Ok(user_name(std::env::var("USER").ok()))
    }
}

fn user_name(env_user: Option<String>) -> String {
    env_user
        .filter(|u| !u.is_empty())
        .unwrap_or_else(|| "android".to_string())
}

// ---------------------------------------------------------------------------
// uname
// ---------------------------------------------------------------------------

struct UnameCmd;
impl Builtin for UnameCmd {
    fn name(&self) -> &str {
        "uname"
    }
    fn description(&self) -> &str {
        "Print system information"
    }
    fn usage(&self) -> &str {
        "uname"
    }
    fn execute(&self, _args: &[&str], ctx: &Context<'_>) -> Result<String> {
        let release = ctx.system.device().os_release;
        if release.starts_with("Android") || release.starts_with("Linux") {
            Ok(release)
        } else {
            Ok(format!("Linux {release}"))
        }
    }
}

// ---------------------------------------------------------------------------
// history
// ---------------------------------------------------------------------------

struct HistoryCmd;
impl Builtin for HistoryCmd {
    fn name(&self) -> &str {
        "history"
    }
    fn description(&self) -> &str {
        "Show command history"
    }
    fn usage(&self) -> &str {
        "history"
    }
    fn execute(&self, _args: &[&str], ctx: &Context<'_>) -> Result<String> {
        Ok(ctx
            .history
            .iter()
            .enumerate()
            .map(|(i, cmd)| format!("{}: {cmd}", i + 1))
            .collect::<Vec<_>>()
            .join("\n"))
    }
}

// ---------------------------------------------------------------------------
// ps
// ---------------------------------------------------------------------------

const PS_TIMEOUT: Duration = Duration::from_secs(5);

struct PsCmd;
impl Builtin for PsCmd {
    fn name(&self) -> &str {
        "ps"
    }
    fn description(&self) -> &str {
        "List processes"
    }
    fn usage(&self) -> &str {
        "ps"
    }
    fn execute(&self, _args: &[&str], ctx: &Context<'_>) -> Result<String> {
        let r = ctx.runner.run("ps", ctx.cwd, false, Some(PS_TIMEOUT));
        if r.is_success() && !r.stdout.is_empty() {
            return Ok(r.stdout);
        }
        log::debug!("ps unavailable (exit {}), using synthesized table", r.exit_code);
        Ok(format!(
            "PID COMMAND\n1 init\n{} terminal",
            std::process::id()
        ))
    }
}
