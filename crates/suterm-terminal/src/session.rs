//! Session state and the transcript record types.

use std::fmt;
use std::str::FromStr;

use suterm_platform::Timestamp;

/// What produced a transcript line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    /// Input typed by the user.
    User,
    /// Command stdout.
    Output,
    /// Command stderr.
    Error,
    /// Engine messages (timing, suggestions).
    System,
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::User => "USER",
            Self::Output => "OUTPUT",
            Self::Error => "ERROR",
            Self::System => "SYSTEM",
        };
        f.write_str(s)
    }
}

impl FromStr for RecordKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "USER" => Ok(Self::User),
            "OUTPUT" => Ok(Self::Output),
            "ERROR" => Ok(Self::Error),
            "SYSTEM" => Ok(Self::System),
            _ => Err(()),
        }
    }
}

/// One immutable line of the session transcript.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandRecord {
    pub text: String,
    pub timestamp: Timestamp,
    /// Working directory when the record was made.
    pub directory: String,
    pub kind: RecordKind,
}

/// Working directory plus replayable input history.
///
/// `history_cursor` stays in `[0, history.len()]`; `history.len()` means
/// a fresh line with nothing selected.
#[derive(Debug, Clone)]
pub struct SessionState {
    current_directory: String,
    history: Vec<String>,
    history_cursor: usize,
}

impl SessionState {
    pub fn new(directory: impl Into<String>) -> Self {
        Self {
            current_directory: directory.into(),
            history: Vec::new(),
            history_cursor: 0,
        }
    }

    pub fn current_directory(&self) -> &str {
        &self.current_directory
    }

    pub(crate) fn set_current_directory(&mut self, dir: String) {
        self.current_directory = dir;
    }

    pub fn history(&self) -> &[String] {
        &self.history
    }

    pub fn history_cursor(&self) -> usize {
        self.history_cursor
    }

    /// Append raw input and park the cursor on a fresh line.
    pub(crate) fn push_history(&mut self, line: &str) {
        self.history.push(line.to_string());
        self.history_cursor = self.history.len();
    }

    /// Move the cursor by `direction` (clamped) and return the entry under
    /// it, or `""` on the fresh line.
    pub(crate) fn navigate(&mut self, direction: i32) -> String {
        if self.history.is_empty() {
            return String::new();
        }
        let len = self.history.len() as i64;
        let next = (self.history_cursor as i64 + i64::from(direction)).clamp(0, len);
        self.history_cursor = next as usize;
        self.history
            .get(self.history_cursor)
            .cloned()
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session_with(entries: &[&str]) -> SessionState {
        let mut s = SessionState::new("/data");
        for e in entries {
            s.push_history(e);
        }
        s
    }

    #[test]
    fn push_parks_cursor_at_end() {
        let s = session_with(&["ls", "pwd"]);
        assert_eq!(s.history_cursor(), 2);
        assert_eq!(s.history(), &["ls".to_string(), "pwd".to_string()]);
    }

    #[test]
    fn navigate_up_then_down() {
        let mut s = session_with(&["one", "two", "three"]);
        assert_eq!(s.navigate(-1), "three");
        assert_eq!(s.navigate(-1), "two");
        assert_eq!(s.navigate(1), "three");
        assert_eq!(s.navigate(1), "");
        assert_eq!(s.history_cursor(), 3);
    }

    #[test]
    fn navigate_clamps_at_oldest() {
        let mut s = session_with(&["first", "second"]);
        for _ in 0..5 {
            assert!(!s.navigate(-1).is_empty());
        }
        assert_eq!(s.history_cursor(), 0);
        assert_eq!(s.navigate(-1), "first");
    }

    #[test]
    fn navigate_clamps_at_fresh_line() {
        let mut s = session_with(&["only"]);
        assert_eq!(s.navigate(1), "");
        assert_eq!(s.navigate(1), "");
        assert_eq!(s.history_cursor(), 1);
    }

    #[test]
    fn navigate_empty_is_noop() {
        let mut s = SessionState::new("/");
        assert_eq!(s.navigate(-1), "");
        assert_eq!(s.history_cursor(), 0);
    }

    #[test]
    fn record_kind_text_roundtrip() {
        for kind in [
            RecordKind::User,
            RecordKind::Output,
            RecordKind::Error,
            RecordKind::System,
        ] {
            assert_eq!(kind.to_string().parse::<RecordKind>(), Ok(kind));
        }
        assert!("user".parse::<RecordKind>().is_err());
    }

    mod prop {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn cursor_stays_in_bounds(
                len in 0usize..20,
                moves in proptest::collection::vec(prop_oneof![Just(-1i32), Just(1i32)], 0..60),
            ) {
                let mut s = SessionState::new("/");
                for i in 0..len {
                    s.push_history(&format!("cmd{i}"));
                }
                for m in moves {
                    let shown = s.navigate(m);
                    prop_assert!(s.history_cursor() <= s.history().len());
                    if s.history_cursor() < s.history().len() {
                        prop_assert_eq!(&shown, &s.history()[s.history_cursor()]);
                    } else {
                        prop_assert!(shown.is_empty());
                    }
                }
            }
        }
    }
}
