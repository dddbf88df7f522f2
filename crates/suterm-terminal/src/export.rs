//! Plain-text transcript export and its parser.
//!
//! Layout:
//!
//! ```text
//! Enhanced Superuser Terminal History Export
//! Generated: 2024-06-01 12:00:00
//! ==================================================
//!
//! [2024-06-01 12:00:00] [USER] /data
//! ls
//! ------------------------------
//! ```

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use suterm_platform::{TimeService, Timestamp};
use suterm_types::error::{Result, SutermError};

use crate::session::{CommandRecord, RecordKind};

const TITLE: &str = "Enhanced Superuser Terminal History Export";
const HEADER_RULE_LEN: usize = 50;
const ENTRY_RULE_LEN: usize = 30;

/// File name for an export generated at `at`.
pub fn export_file_name(at: &Timestamp) -> String {
    format!("terminal_history_{}.txt", at.compact())
}

/// Render `records` in export format.
pub fn render_export(records: &[CommandRecord], generated: &Timestamp) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{TITLE}");
    let _ = writeln!(out, "Generated: {generated}");
    let _ = writeln!(out, "{}", "=".repeat(HEADER_RULE_LEN));
    out.push('\n');
    let rule = "-".repeat(ENTRY_RULE_LEN);
    for r in records {
        let _ = writeln!(out, "[{}] [{}] {}", r.timestamp, r.kind, r.directory);
        let _ = writeln!(out, "{}", r.text);
        let _ = writeln!(out, "{rule}");
    }
    out
}

/// Write `records` to a new timestamped file under `dir`.
pub fn export_history(
    records: &[CommandRecord],
    dir: &Path,
    time: &dyn TimeService,
) -> Result<PathBuf> {
    let now = time.now()?;
    let path = dir.join(export_file_name(&now));
    std::fs::write(&path, render_export(records, &now))
        .map_err(|e| SutermError::Export(format!("{}: {e}", path.display())))?;
    log::info!("Exported {} records to {}", records.len(), path.display());
    Ok(path)
}

fn parse_entry_header(line: &str) -> Option<(Timestamp, RecordKind, String)> {
    let rest = line.strip_prefix('[')?;
    let (ts, rest) = rest.split_once("] [")?;
    let (kind, dir) = rest.split_once("] ").or_else(|| {
        // Empty directory leaves no trailing space.
        rest.strip_suffix(']').map(|k| (k, ""))
    })?;
    Some((Timestamp::parse(ts)?, kind.parse().ok()?, dir.to_string()))
}

/// A rule closes an entry only when what follows is the end of the file
/// or another entry header; rules inside command output stay in the text.
fn closes_entry(rest: &[&str]) -> bool {
    match rest.iter().find(|l| !l.is_empty()) {
        None => true,
        Some(next) => parse_entry_header(next).is_some(),
    }
}

/// Parse text produced by [`render_export`] back into records.
pub fn parse_export(text: &str) -> Result<Vec<CommandRecord>> {
    let lines: Vec<&str> = text.lines().collect();
    if lines.first() != Some(&TITLE) {
        return Err(SutermError::Export("missing export title".into()));
    }
    let header_rule = "=".repeat(HEADER_RULE_LEN);
    let mut i = lines
        .iter()
        .position(|l| *l == header_rule)
        .ok_or_else(|| SutermError::Export("missing header rule".into()))?
        + 1;

    let rule = "-".repeat(ENTRY_RULE_LEN);
    let mut records = Vec::new();
    while i < lines.len() {
        if lines[i].is_empty() {
            i += 1;
            continue;
        }
        let header_line = i + 1;
        let (timestamp, kind, directory) = parse_entry_header(lines[i]).ok_or_else(|| {
            SutermError::Export(format!("line {header_line}: malformed entry header"))
        })?;
        i += 1;
        let body_start = i;
        while i < lines.len() && !(lines[i] == rule && closes_entry(&lines[i + 1..])) {
            i += 1;
        }
        if i == lines.len() {
            return Err(SutermError::Export(format!(
                "line {header_line}: entry not terminated"
            )));
        }
        records.push(CommandRecord {
            text: lines[body_start..i].join("\n"),
            timestamp,
            directory,
            kind,
        });
        i += 1;
    }
    Ok(records)
}
