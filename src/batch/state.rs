// Per-file state machine

use std::fmt;

use thiserror::Error;

/// Where one input file is in the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileState {
    Pending,
    Parsing,
    ParseFailed,
    Parsed,
    Dumping,
    Skipped,
    Done,
}

impl FileState {
    pub fn as_str(self) -> &'static str {
        match self {
            FileState::Pending => "pending",
            FileState::Parsing => "parsing",
            FileState::ParseFailed => "parse_failed",
            FileState::Parsed => "parsed",
            FileState::Dumping => "dumping",
            FileState::Skipped => "skipped",
            FileState::Done => "done",
        }
    }

    /// Legal successors.
    ///
    /// `Dumping -> Skipped` is taken when another worker created the
    /// artifact first.
    pub fn can_transition_to(self, next: FileState) -> bool {
        use FileState::*;
        matches!(
            (self, next),
            (Pending, Parsing)
                | (Pending, Skipped)
                | (Parsing, ParseFailed)
                | (Parsing, Parsed)
                | (ParseFailed, Done)
                | (Parsed, Dumping)
                | (Dumping, Done)
                | (Dumping, Skipped)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, FileState::Done | FileState::Skipped)
    }
}

impl fmt::Display for FileState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("illegal state transition {from} -> {to}")]
pub struct TransitionError {
    pub from: FileState,
    pub to: FileState,
}

/// Every state a file went through, starting at `Pending`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateTrace {
    states: Vec<FileState>,
}

impl StateTrace {
    pub fn new() -> Self {
        StateTrace {
            states: vec![FileState::Pending],
        }
    }

    pub fn current(&self) -> FileState {
        self.states.last().copied().unwrap_or(FileState::Pending)
    }

    pub fn advance(&mut self, next: FileState) -> Result<(), TransitionError> {
        let from = self.current();
        if !from.can_transition_to(next) {
            return Err(TransitionError { from, to: next });
        }
        self.states.push(next);
        Ok(())
    }

    pub fn states(&self) -> &[FileState] {
        &self.states
    }
}

impl Default for StateTrace {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for StateTrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, state) in self.states.iter().enumerate() {
            if i > 0 {
                f.write_str(" -> ")?;
            }
            write!(f, "{}", state)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_successful_path() {
        let mut trace = StateTrace::new();
        for next in [
            FileState::Parsing,
            FileState::Parsed,
            FileState::Dumping,
            FileState::Done,
        ] {
            trace.advance(next).unwrap();
        }
        assert!(trace.current().is_terminal());
        assert_eq!(trace.to_string(), "pending -> parsing -> parsed -> dumping -> done");
    }

    #[test]
    fn test_parse_failure_skips_dumping() {
        let mut trace = StateTrace::new();
        trace.advance(FileState::Parsing).unwrap();
        trace.advance(FileState::ParseFailed).unwrap();

        let err = trace.advance(FileState::Dumping).unwrap_err();
        assert_eq!(
            err,
            TransitionError {
                from: FileState::ParseFailed,
                to: FileState::Dumping
            }
        );
        trace.advance(FileState::Done).unwrap();
        assert_eq!(
            trace.states(),
            &[
                FileState::Pending,
                FileState::Parsing,
                FileState::ParseFailed,
                FileState::Done
            ]
        );
    }

    #[test]
    fn test_skip_only_from_pending_or_dumping() {
        let mut trace = StateTrace::new();
        trace.advance(FileState::Skipped).unwrap();
        assert!(trace.current().is_terminal());

        let mut trace = StateTrace::new();
        trace.advance(FileState::Parsing).unwrap();
        assert!(trace.advance(FileState::Skipped).is_err());
        assert_eq!(trace.current(), FileState::Parsing);
    }

    #[test]
    fn test_terminal_states_have_no_successors() {
        let all = [
            FileState::Pending,
            FileState::Parsing,
            FileState::ParseFailed,
            FileState::Parsed,
            FileState::Dumping,
            FileState::Skipped,
            FileState::Done,
        ];
        for next in all {
            assert!(!FileState::Done.can_transition_to(next));
            assert!(!FileState::Skipped.can_transition_to(next));
        }
    }
}
