//! Local-shell filesystem builtins: pwd, ls, cat, mkdir, echo.
//!
//! Failures come back as `SutermError::Filesystem` carrying the text a
//! shell would print; the session directory is never touched here.

use std::fs;
use std::path::Path;

use suterm_types::error::{Result, SutermError};

use crate::interpreter::{Builtin, BuiltinRegistry, Context, resolve_path};

/// Register filesystem builtins into a registry.
pub fn register_file_commands(reg: &mut BuiltinRegistry) {
    reg.register(Box::new(PwdCmd));
    reg.register(Box::new(LsCmd));
    reg.register(Box::new(CatCmd));
    reg.register(Box::new(MkdirCmd));
    reg.register(Box::new(EchoCmd));
}

fn fs_err(msg: String) -> SutermError {
    SutermError::Filesystem(msg)
}

// ---------------------------------------------------------------------------
// pwd
// ---------------------------------------------------------------------------

struct PwdCmd;
impl Builtin for PwdCmd {
    fn name(&self) -> &str {
        "pwd"
    }
    fn description(&self) -> &str {
        "Print working directory"
    }
    fn usage(&self) -> &str {
        "pwd"
    }
    fn execute(&self, _args: &[&str], ctx: &Context<'_>) -> Result<String> {
        Ok(ctx.cwd.to_string())
    }
}

// ---------------------------------------------------------------------------
// ls
// ---------------------------------------------------------------------------

/// `rwxr-xr-x`-style rendering of the low nine mode bits.
#[cfg(unix)]
fn mode_string(meta: &fs::Metadata) -> String {
    use std::os::unix::fs::PermissionsExt;
    let mode = meta.permissions().mode();
    let mut s = String::with_capacity(9);
    for shift in [6, 3, 0] {
        let bits = (mode >> shift) & 0o7;
        s.push(if bits & 0o4 != 0 { 'r' } else { '-' });
        s.push(if bits & 0o2 != 0 { 'w' } else { '-' });
        s.push(if bits & 0o1 != 0 { 'x' } else { '-' });
    }
    s
}

#[cfg(not(unix))]
fn mode_string(meta: &fs::Metadata) -> String {
    if meta.permissions().readonly() {
        "r--r--r--".to_string()
    } else {
        "rw-rw-rw-".to_string()
    }
}

struct LsCmd;
impl Builtin for LsCmd {
    fn name(&self) -> &str {
        "ls"
    }
    fn description(&self) -> &str {
        "List directory contents"
    }
    fn usage(&self) -> &str {
        "ls [path]"
    }
    fn execute(&self, args: &[&str], ctx: &Context<'_>) -> Result<String> {
        let path = match args.first() {
            Some(name) => resolve_path(ctx.cwd, name),
            None => ctx.cwd.to_string(),
        };
        let dir = Path::new(&path);
        // Errors name the final component, not the argument as typed.
        let shown = dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        if !dir.exists() {
            return Err(fs_err(format!("ls: {shown}: No such file or directory")));
        }
        if !dir.is_dir() {
            return Err(fs_err(format!("ls: {shown}: Not a directory")));
        }
        let entries = fs::read_dir(dir).map_err(|_| fs_err("Permission denied".to_string()))?;

        let mut lines: Vec<(String, String)> = Vec::new();
        for entry in entries.flatten() {
            let name = entry.file_name().to_string_lossy().into_owned();
            let line = match entry.metadata() {
                Ok(meta) => {
                    let kind = if meta.is_dir() { 'd' } else { '-' };
                    format!("{kind}{} {name}", mode_string(&meta))
                },
                Err(_) => format!("?????????? {name}"),
            };
            lines.push((name, line));
        }
        lines.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(lines
            .into_iter()
            .map(|(_, line)| line)
            .collect::<Vec<_>>()
            .join("\n"))
    }
}

// ---------------------------------------------------------------------------
// cat
// ---------------------------------------------------------------------------

struct CatCmd;
impl Builtin for CatCmd {
    fn name(&self) -> &str {
        "cat"
    }
    fn description(&self) -> &str {
        "Display file contents"
    }
    fn usage(&self) -> &str {
        "cat <file>"
    }
    fn execute(&self, args: &[&str], ctx: &Context<'_>) -> Result<String> {
        let name = args
            .first()
            .ok_or_else(|| fs_err("cat: missing operand".to_string()))?;
        let path = resolve_path(ctx.cwd, name);
        let file = Path::new(&path);
        if !file.is_file() {
            return Err(fs_err(format!("cat: {name}: No such file or directory")));
        }
        let data = fs::read(file).map_err(|_| fs_err(format!("cat: {name}: Permission denied")))?;
        Ok(String::from_utf8_lossy(&data).into_owned())
    }
}

// ---------------------------------------------------------------------------
// mkdir
// ---------------------------------------------------------------------------

struct MkdirCmd;
impl Builtin for MkdirCmd {
    fn name(&self) -> &str {
        "mkdir"
    }
    fn description(&self) -> &str {
        "Create directory"
    }
    fn usage(&self) -> &str {
        "mkdir <dir>"
    }
    fn execute(&self, args: &[&str], ctx: &Context<'_>) -> Result<String> {
        let name = args
            .first()
            .ok_or_else(|| fs_err("mkdir: missing operand".to_string()))?;
        let path = resolve_path(ctx.cwd, name);
        let denied = || {
            fs_err(format!(
                "mkdir: cannot create directory '{name}': Permission denied"
            ))
        };
        // An existing target counts as a failed create.
        if Path::new(&path).exists() {
            return Err(denied());
        }
        fs::create_dir_all(&path).map_err(|_| denied())?;
        Ok(String::new())
    }
}

// ---------------------------------------------------------------------------
// echo
// ---------------------------------------------------------------------------

struct EchoCmd;
impl Builtin for EchoCmd {
    fn name(&self) -> &str {
        "echo"
    }
    fn description(&self) -> &str {
        "Display text"
    }
    fn usage(&self) -> &str {
        "echo [text...]"
    }
    fn execute(&self, args: &[&str], _ctx: &Context<'_>) -> Result<String> {
        Ok(args.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::ExecutionResult;
    use crate::interpreter::test_support::Fixture;

    fn run(args: &[&str], name: &str, cwd: &str) -> ExecutionResult {
        let mut reg = BuiltinRegistry::new();
        register_file_commands(&mut reg);
        let fx = Fixture::new();
        reg.answer(name, args, &fx.ctx(cwd)).unwrap()
    }

    #[test]
    fn pwd_prints_cwd() {
        assert_eq!(run(&[], "pwd", "/data/local").stdout, "/data/local");
    }

    #[test]
    fn echo_joins_args() {
        assert_eq!(run(&["a", "b", "c"], "echo", "/").stdout, "a b c");
    }

    #[test]
    fn ls_lists_sorted_with_type_flag() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("a.txt"), "x").unwrap();
        let cwd = dir.path().to_str().unwrap();

        let out = run(&[], "ls", cwd).stdout;
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with('-') && lines[0].ends_with(" a.txt"));
        assert!(lines[1].starts_with('d') && lines[1].ends_with(" sub"));
    }

    #[test]
    fn ls_relative_argument() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("sub").join("inner"), "").unwrap();
        let out = run(&["sub"], "ls", dir.path().to_str().unwrap()).stdout;
        assert!(out.ends_with(" inner"));
    }

    #[test]
    fn ls_missing_is_shell_error() {
        let dir = tempfile::tempdir().unwrap();
        let r = run(&["ghost"], "ls", dir.path().to_str().unwrap());
        assert_eq!(r.stderr, "ls: ghost: No such file or directory");
        assert_eq!(r.exit_code, 1);
    }

    #[test]
    fn ls_errors_name_the_basename() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        let r = run(&["sub/ghost"], "ls", dir.path().to_str().unwrap());
        assert_eq!(r.stderr, "ls: ghost: No such file or directory");
    }

    #[test]
    fn ls_file_is_not_a_directory() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("f"), "").unwrap();
        let r = run(&["f"], "ls", dir.path().to_str().unwrap());
        assert_eq!(r.stderr, "ls: f: Not a directory");
    }

    #[cfg(unix)]
    #[test]
    fn mode_string_renders_bits() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        let f = dir.path().join("f");
        fs::write(&f, "").unwrap();
        fs::set_permissions(&f, fs::Permissions::from_mode(0o754)).unwrap();
        assert_eq!(mode_string(&fs::metadata(&f).unwrap()), "rwxr-xr--");
    }

    #[test]
    fn cat_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("notes"), "hello\nworld").unwrap();
        let r = run(&["notes"], "cat", dir.path().to_str().unwrap());
        assert_eq!(r.stdout, "hello\nworld");
        assert_eq!(r.exit_code, 0);
    }

    #[test]
    fn cat_errors() {
        let dir = tempfile::tempdir().unwrap();
        let cwd = dir.path().to_str().unwrap();
        assert_eq!(run(&[], "cat", cwd).stderr, "cat: missing operand");
        assert_eq!(
            run(&["nope"], "cat", cwd).stderr,
            "cat: nope: No such file or directory"
        );
        fs::create_dir(dir.path().join("d")).unwrap();
        assert_eq!(
            run(&["d"], "cat", cwd).stderr,
            "cat: d: No such file or directory"
        );
    }

    #[test]
    fn mkdir_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let r = run(&["x/y"], "mkdir", dir.path().to_str().unwrap());
        assert_eq!(r.exit_code, 0);
        assert!(dir.path().join("x").join("y").is_dir());
    }

    #[test]
    fn mkdir_errors() {
        let dir = tempfile::tempdir().unwrap();
        let cwd = dir.path().to_str().unwrap();
        assert_eq!(run(&[], "mkdir", cwd).stderr, "mkdir: missing operand");
        fs::create_dir(dir.path().join("taken")).unwrap();
        assert_eq!(
            run(&["taken"], "mkdir", cwd).stderr,
            "mkdir: cannot create directory 'taken': Permission denied"
        );
    }

    #[test]
    fn mkdir_under_a_file_is_permission_denied() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("file"), "").unwrap();
        let r = run(&["file/child"], "mkdir", dir.path().to_str().unwrap());
        assert_eq!(
            r.stderr,
            "mkdir: cannot create directory 'file/child': Permission denied"
        );
        assert_eq!(r.exit_code, 1);
    }
}
