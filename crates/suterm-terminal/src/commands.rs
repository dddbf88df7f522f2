//! Informational builtins: help, status, monitor, benchmark.

use std::time::Instant;

use suterm_types::error::Result;

use crate::interpreter::{Builtin, BuiltinRegistry, Context};

/// Builtins answered in every mode.
pub const FIXED_BUILTINS: &[&str] = &["help", "status", "monitor", "benchmark"];

/// Builtins answered in-process only when `local_shell` is enabled.
pub const LOCAL_BUILTINS: &[&str] = &[
    "pwd", "ls", "cat", "mkdir", "echo", "date", "whoami", "uname", "history", "ps",
];

/// Names offered by autocomplete, in display order.
pub const COMMAND_TABLE: &[&str] = &[
    "help",
    "clear",
    "exit",
    "status",
    "monitor",
    "benchmark",
    "ls",
    "cd",
    "pwd",
    "mkdir",
    "cat",
    "rm",
    "su-check",
    "su-fix",
    "su-backup",
    "su-setup",
    "su-health",
    "su-network",
    "su-security",
    "su-optimize",
    "su-full",
    "su-benchmark",
    "df",
    "free",
    "ps",
    "top",
    "uname",
    "date",
    "whoami",
    "id",
    "ping",
    "netstat",
    "ifconfig",
    "mount",
    "chmod",
    "chown",
    "cp",
    "mv",
    "grep",
    "find",
    "which",
    "echo",
    "env",
    "history",
];

/// Register the builtins for the configured mode.
pub fn register_builtins(reg: &mut BuiltinRegistry, local_shell: bool) {
    reg.register(Box::new(HelpCmd));
    reg.register(Box::new(StatusCmd));
    reg.register(Box::new(MonitorCmd));
    reg.register(Box::new(BenchmarkCmd));
    if local_shell {
        crate::file_commands::register_file_commands(reg);
        crate::system_commands::register_system_commands(reg);
    }
}

// ---------------------------------------------------------------------------
// help
// ---------------------------------------------------------------------------

const HELP_TEXT: &str = "\
Enhanced Superuser Terminal Commands:

BASIC COMMANDS:
  help            - Show this help
  clear           - Clear screen
  exit            - Exit terminal
  status          - System status
  monitor         - System monitor
  benchmark       - Quick CPU benchmark

SUPERUSER COMMANDS:
  su-check        - Run system check
  su-fix          - Fix su permissions
  su-backup       - Create backup
  su-setup        - Run setup
  su-health       - Health monitor
  su-network      - Network diagnostics
  su-security     - Security audit
  su-optimize     - Optimization suggestions
  su-full         - Full diagnostic suite
  su-benchmark    - Performance benchmark

FILE SYSTEM:
  ls [path]       - List directory
  cd <path>       - Change directory
  pwd             - Current directory
  mkdir <dir>     - Create directory
  rm <file>       - Remove file
  cat <file>      - Read file
  cp <src> <dst>  - Copy file
  mv <src> <dst>  - Move file
  find <pattern>  - Find files
  grep <pattern>  - Search text
  chmod <m> <f>   - Change permissions
  chown <o> <f>   - Change owner

SYSTEM INFO:
  ps              - Process list
  top             - System resources
  df              - Disk usage
  free            - Memory usage
  mount           - Mount points
  uname           - System information
  date            - Current date/time
  whoami          - Current user
  id              - User ID info
  env             - Environment variables
  which <cmd>     - Locate a command
  echo [text...]  - Print text
  history         - Command history

NETWORK:
  ping <host>     - Ping host
  netstat         - Network connections
  ifconfig        - Network interfaces

TERMINAL FEATURES:
  • Use arrow keys for command history
  • Tab for auto-completion
  • Ctrl+C to interrupt commands

Type any command to execute it.";

struct HelpCmd;
impl Builtin for HelpCmd {
    fn name(&self) -> &str {
        "help"
    }
    fn description(&self) -> &str {
        "Show this help"
    }
    fn usage(&self) -> &str {
        "help"
    }
    fn execute(&self, _args: &[&str], _ctx: &Context<'_>) -> Result<String> {
        Ok(HELP_TEXT.to_string())
    }
}

// ---------------------------------------------------------------------------
// status
// ---------------------------------------------------------------------------

fn mark(ok: bool, yes: &str, no: &str) -> String {
    if ok {
        format!("✓ {yes}")
    } else {
        format!("✗ {no}")
    }
}

struct StatusCmd;
impl Builtin for StatusCmd {
    fn name(&self) -> &str {
        "status"
    }
    fn description(&self) -> &str {
        "System status"
    }
    fn usage(&self) -> &str {
        "status"
    }
    fn execute(&self, _args: &[&str], ctx: &Context<'_>) -> Result<String> {
        let device = ctx.system.device();
        let now = ctx.time.now()?;
        let lines = [
            "System Status Report:".to_string(),
            "==================".to_string(),
            format!(
                "Root Access: {}",
                mark(ctx.root.is_rooted(), "Available", "Not available")
            ),
            format!(
                "Superuser Directory: {}",
                mark(ctx.config.superuser_dir.exists(), "Present", "Missing")
            ),
            format!("OS Version: {}", device.os_release),
            format!("Device Model: {}", device.model),
            format!("Device Brand: {}", device.brand),
            format!("Architecture: {}", device.arch),
            format!(
                "Terminal Engine: {}",
                mark(ctx.initialized, "Initialized", "Not initialized")
            ),
            format!("Timestamp: {now}"),
            String::new(),
            "Use 'su-check' for detailed system analysis.".to_string(),
        ];
        Ok(lines.join("\n"))
    }
}

// ---------------------------------------------------------------------------
// monitor
// ---------------------------------------------------------------------------

const MIB: u64 = 1024 * 1024;

struct MonitorCmd;
impl Builtin for MonitorCmd {
    fn name(&self) -> &str {
        "monitor"
    }
    fn description(&self) -> &str {
        "System monitor"
    }
    fn usage(&self) -> &str {
        "monitor"
    }
    fn execute(&self, _args: &[&str], ctx: &Context<'_>) -> Result<String> {
        let memory = match ctx.system.memory() {
            Ok(m) => format!(
                "{}MB / {}MB ({}%)",
                m.used_bytes() / MIB,
                m.total_bytes / MIB,
                m.used_percent()
            ),
            Err(e) => format!("unavailable ({e})"),
        };
        let lines = [
            "System Monitor:".to_string(),
            "==============".to_string(),
            format!("Memory Usage: {memory}"),
            format!("Available Processors: {}", ctx.system.processors()),
            format!("Current Time: {}", ctx.time.now()?),
            String::new(),
            "For comprehensive monitoring, use 'su-health' command.".to_string(),
        ];
        Ok(lines.join("\n"))
    }
}

// ---------------------------------------------------------------------------
// benchmark
// ---------------------------------------------------------------------------

const BENCHMARK_ITERATIONS: u64 = 100_000;

/// Tier label for a benchmark duration.
pub fn performance_tier(duration_ms: u128) -> &'static str {
    if duration_ms < 100 {
        "Good"
    } else if duration_ms < 500 {
        "Average"
    } else {
        "Slow"
    }
}

/// Sum `1..=BENCHMARK_ITERATIONS`, returning the sum and elapsed millis.
pub fn run_benchmark() -> (u64, u128) {
    let start = Instant::now();
    let mut sum = 0u64;
    for i in 1..=BENCHMARK_ITERATIONS {
        sum = std::hint::black_box(sum + i);
    }
    (sum, start.elapsed().as_millis())
}

pub fn format_benchmark(sum: u64, duration_ms: u128) -> String {
    format!(
        "Quick Benchmark Results:\n\
         CPU Test Duration: {duration_ms}ms\n\
         Calculation Result: {sum}\n\
         Performance: {}\n\
         \n\
         For comprehensive benchmarking, use 'su-benchmark' command.",
        performance_tier(duration_ms)
    )
}

struct BenchmarkCmd;
impl Builtin for BenchmarkCmd {
    fn name(&self) -> &str {
        "benchmark"
    }
    fn description(&self) -> &str {
        "Quick CPU benchmark"
    }
    fn usage(&self) -> &str {
        "benchmark"
    }
    fn execute(&self, _args: &[&str], _ctx: &Context<'_>) -> Result<String> {
        let (sum, ms) = run_benchmark();
        Ok(format_benchmark(sum, ms))
    }
}
