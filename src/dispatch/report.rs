//! Dispatch report
//!
//! Aggregated outcome of one dispatch pass: how far each context got and
//! every failure observed, in the order it was observed.

use std::fmt;

use serde::Serialize;

use crate::error::{DispatchError, ErrorKind};
use crate::unit::UnitReport;

/// How a context's run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextStatus {
    /// Created but never run (load or spawn failed)
    NotRun,
    Completed,
    Failed,
}

/// Per-context outcome
#[derive(Debug, Clone, Serialize)]
pub struct ContextOutcome {
    pub index: usize,
    pub status: ContextStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identity: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speid: Option<u64>,
    pub lines: usize,
    pub elapsed_ms: u64,
    pub destroyed: bool,
}

impl ContextOutcome {
    pub fn new(index: usize) -> Self {
        Self {
            index,
            status: ContextStatus::NotRun,
            identity: None,
            speid: None,
            lines: 0,
            elapsed_ms: 0,
            destroyed: false,
        }
    }

    pub(crate) fn complete(&mut self, report: &UnitReport) {
        self.status = ContextStatus::Completed;
        self.identity = Some(report.identity);
        self.speid = Some(report.speid);
        self.lines = report.lines;
        self.elapsed_ms = report.elapsed.as_millis() as u64;
    }
}

/// Serializable view of a failure
#[derive(Debug, Clone, Serialize)]
pub struct ErrorSummary {
    pub kind: ErrorKind,
    /// 0-based context index; index 2 is the third context created
    pub index: usize,
    pub message: String,
}

impl From<&DispatchError> for ErrorSummary {
    fn from(err: &DispatchError) -> Self {
        Self {
            kind: err.kind(),
            index: err.index(),
            message: err.to_string(),
        }
    }
}

/// Outcome of a full dispatch pass
#[derive(Debug, Clone, Default, Serialize)]
pub struct DispatchReport {
    /// Platform backend name
    pub backend: String,
    /// Usable units after clamping
    pub discovered: usize,
    pub created: usize,
    pub spawned: usize,
    pub completed: usize,
    pub destroyed: usize,
    pub contexts: Vec<ContextOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_error: Option<ErrorSummary>,
    #[serde(skip)]
    errors: Vec<DispatchError>,
}

impl DispatchReport {
    pub fn new(backend: &str, discovered: usize) -> Self {
        Self {
            backend: backend.to_string(),
            discovered,
            ..Default::default()
        }
    }

    pub(crate) fn record_error(&mut self, err: DispatchError) {
        if self.first_error.is_none() {
            self.first_error = Some(ErrorSummary::from(&err));
        }
        self.errors.push(err);
    }

    pub(crate) fn context_mut(&mut self, index: usize) -> Option<&mut ContextOutcome> {
        self.contexts.iter_mut().find(|c| c.index == index)
    }

    /// First failure observed, if any
    pub fn first_error(&self) -> Option<&DispatchError> {
        self.errors.first()
    }

    /// Every failure observed, in order
    pub fn errors(&self) -> &[DispatchError] {
        &self.errors
    }

    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }

    /// Process exit code for this outcome
    pub fn exit_code(&self) -> u8 {
        if self.is_success() {
            0
        } else {
            1
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl fmt::Display for DispatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} units, {} contexts created, {} spawned, {} completed, {} destroyed",
            self.backend,
            self.discovered,
            self.created,
            self.spawned,
            self.completed,
            self.destroyed
        )?;
        if let Some(err) = self.first_error() {
            write!(
                f,
                "; first error: {} ({} context)",
                err,
                ordinal(err.index() + 1)
            )?;
            if self.errors.len() > 1 {
                write!(f, " (+{} more)", self.errors.len() - 1)?;
            }
        }
        Ok(())
    }
}

/// `1` → `1st`, `2` → `2nd`, `11` → `11th`
fn ordinal(n: usize) -> String {
    let suffix = match (n % 10, n % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    };
    format!("{}{}", n, suffix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_first_error_is_kept() {
        let mut report = DispatchReport::new("mock", 2);
        assert!(report.is_success());
        assert_eq!(report.exit_code(), 0);

        report.record_error(DispatchError::ContextRunFailed {
            index: 1,
            reason: "boom".into(),
        });
        report.record_error(DispatchError::ContextDestroyFailed {
            index: 0,
            reason: "stuck".into(),
        });

        assert!(!report.is_success());
        assert_eq!(report.exit_code(), 1);
        assert_eq!(report.errors().len(), 2);
        assert_eq!(report.first_error().unwrap().index(), 1);
        assert_eq!(
            report.first_error.as_ref().unwrap().kind,
            ErrorKind::ContextRunFailed
        );
    }

    #[test]
    fn test_complete_copies_unit_report() {
        let mut outcome = ContextOutcome::new(0);
        outcome.complete(&UnitReport {
            identity: 0,
            speid: 0x1000,
            lines: 12,
            elapsed: Duration::from_millis(1500),
        });
        assert_eq!(outcome.status, ContextStatus::Completed);
        assert_eq!(outcome.lines, 12);
        assert_eq!(outcome.elapsed_ms, 1500);
    }

    #[test]
    fn test_json_and_display() {
        let mut report = DispatchReport::new("sim", 1);
        report.created = 1;
        report.contexts.push(ContextOutcome::new(0));
        report.record_error(DispatchError::Timeout {
            index: 0,
            after: Duration::from_secs(2),
        });

        let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
        assert_eq!(json["backend"], "sim");
        assert_eq!(json["contexts"][0]["status"], "not_run");
        assert_eq!(json["first_error"]["kind"], "timeout");

        let text = report.to_string();
        assert!(text.starts_with("sim: 1 units, 1 contexts created"));
        assert!(text.contains("first error: Context 0 timed out after 2s (1st context)"));
    }

    #[test]
    fn test_summary_names_context_position() {
        let mut report = DispatchReport::new("mock", 6);
        report.record_error(DispatchError::ProgramLoadFailed {
            index: 2,
            reason: "bad image".into(),
        });
        assert!(report
            .to_string()
            .ends_with("Failed loading program into context 2: bad image (3rd context)"));

        assert_eq!(ordinal(1), "1st");
        assert_eq!(ordinal(2), "2nd");
        assert_eq!(ordinal(4), "4th");
        assert_eq!(ordinal(12), "12th");
        assert_eq!(ordinal(22), "22nd");
    }
}
