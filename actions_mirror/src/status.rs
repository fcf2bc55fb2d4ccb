//! Translation between GitHub's run vocabulary and what GitLab and humans understand.
//!
//! Both functions here are total: anything we don't recognise falls through to a safe default
//! rather than failing, so the mapper can never stall the poll loop.

use crate::models::{Conclusion, RunStatus};
use serde::Serialize;
use std::fmt;
use strum::Display;

/// The closed set of states GitLab accepts for an external commit status.
#[derive(Debug, Clone, Copy, Display, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TargetState {
    Pending,
    Running,
    Success,
    Failed,
    Canceled,
}

/// A glyph shown next to status lines in the job log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Symbol {
    Queued,
    Running,
    Success,
    Failure,
    Cancelled,
    Unknown,
}

impl Symbol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Symbol::Queued => "⏳",
            Symbol::Running => "🔄",
            Symbol::Success => "✅",
            Symbol::Failure => "❌",
            Symbol::Cancelled => "⚠️",
            Symbol::Unknown => "❓",
        }
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn symbol(status: RunStatus, conclusion: Option<Conclusion>) -> Symbol {
    match status {
        RunStatus::Queued => Symbol::Queued,
        RunStatus::InProgress => Symbol::Running,
        RunStatus::Completed => match conclusion {
            Some(Conclusion::Success) => Symbol::Success,
            Some(Conclusion::Failure) => Symbol::Failure,
            Some(Conclusion::Cancelled) => Symbol::Cancelled,
            Some(Conclusion::Other) | None => Symbol::Unknown,
        },
        RunStatus::Unknown => Symbol::Unknown,
    }
}

pub fn target_state(status: RunStatus, conclusion: Option<Conclusion>) -> TargetState {
    match status {
        RunStatus::Queued => TargetState::Pending,
        RunStatus::InProgress => TargetState::Running,
        RunStatus::Completed => match conclusion {
            Some(Conclusion::Success) => TargetState::Success,
            Some(Conclusion::Cancelled) => TargetState::Canceled,
            // A completed run that didn't clearly succeed is reported as failed.
            Some(Conclusion::Failure) | Some(Conclusion::Other) | None => TargetState::Failed,
        },
        RunStatus::Unknown => TargetState::Pending,
    }
}

/// The human readable description sent along with the commit status.
///
/// `GitHub Actions: in_progress`, `GitHub Actions: completed (failure)`.
pub fn describe(status: RunStatus, conclusion: Option<Conclusion>) -> String {
    match conclusion {
        Some(conclusion) => format!("GitHub Actions: {status} ({conclusion})"),
        None => format!("GitHub Actions: {status}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(RunStatus::Queued, None, TargetState::Pending)]
    #[case(RunStatus::InProgress, None, TargetState::Running)]
    #[case(RunStatus::Completed, Some(Conclusion::Success), TargetState::Success)]
    #[case(RunStatus::Completed, Some(Conclusion::Failure), TargetState::Failed)]
    #[case(RunStatus::Completed, Some(Conclusion::Cancelled), TargetState::Canceled)]
    #[case(RunStatus::Completed, Some(Conclusion::Other), TargetState::Failed)]
    #[case(RunStatus::Completed, None, TargetState::Failed)]
    #[case(RunStatus::Unknown, None, TargetState::Pending)]
    #[case(RunStatus::Unknown, Some(Conclusion::Success), TargetState::Pending)]
    fn maps_to_gitlab_state(
        #[case] status: RunStatus,
        #[case] conclusion: Option<Conclusion>,
        #[case] expected: TargetState,
    ) {
        assert_eq!(target_state(status, conclusion), expected);
    }

    #[rstest]
    #[case(RunStatus::Queued, None, "⏳")]
    #[case(RunStatus::InProgress, None, "🔄")]
    #[case(RunStatus::Completed, Some(Conclusion::Success), "✅")]
    #[case(RunStatus::Completed, Some(Conclusion::Failure), "❌")]
    #[case(RunStatus::Completed, Some(Conclusion::Cancelled), "⚠️")]
    #[case(RunStatus::Completed, Some(Conclusion::Other), "❓")]
    #[case(RunStatus::Unknown, None, "❓")]
    fn maps_to_symbol(
        #[case] status: RunStatus,
        #[case] conclusion: Option<Conclusion>,
        #[case] expected: &str,
    ) {
        assert_eq!(symbol(status, conclusion).to_string(), expected);
    }

    #[test]
    fn target_state_wire_form() {
        assert_eq!(TargetState::Canceled.to_string(), "canceled");
        assert_eq!(
            serde_json::to_string(&TargetState::Running).unwrap(),
            "\"running\""
        );
    }

    #[test]
    fn describe_appends_conclusion_when_present() {
        assert_eq!(
            describe(RunStatus::InProgress, None),
            "GitHub Actions: in_progress"
        );
        assert_eq!(
            describe(RunStatus::Completed, Some(Conclusion::Failure)),
            "GitHub Actions: completed (failure)"
        );
    }
}
