use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::time::Duration;
use strum::Display;

/// Where a workflow run (or one of its jobs or steps) is in its lifecycle.
#[derive(Debug, Clone, Copy, Display, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RunStatus {
    Queued,

    InProgress,

    /// Terminal. Once a run reaches this status it never transitions again.
    Completed,

    /// Any status GitHub reports that we have no mapping for (waiting, requested, pending...).
    #[default]
    #[serde(other)]
    Unknown,
}

/// The terminal outcome of a completed run, job or step.
#[derive(Debug, Clone, Copy, Display, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Conclusion {
    Success,

    Failure,

    Cancelled,

    /// neutral, skipped, timed_out, action_required, stale and anything newer.
    #[serde(other)]
    Other,
}

/// The raw shape of a workflow run as GitHub returns it. Only used to build a [`Run`].
#[derive(Debug, Clone, Deserialize)]
struct RunRecord {
    id: u64,
    #[serde(default)]
    name: String,
    #[serde(default)]
    status: RunStatus,
    #[serde(default)]
    conclusion: Option<Conclusion>,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    run_started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    head_branch: Option<String>,
    #[serde(default)]
    head_sha: String,
    #[serde(default)]
    html_url: String,
    #[serde(default)]
    event: String,
    #[serde(default)]
    run_number: u64,
    #[serde(default)]
    run_attempt: u64,
}

/// A single execution of a GitHub Actions workflow.
///
/// Runs are snapshots fetched fresh every tick; nothing in the monitor mutates them.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "RunRecord")]
pub struct Run {
    pub id: u64,
    pub name: String,
    pub status: RunStatus,

    /// Always `None` unless `status` is [`RunStatus::Completed`].
    pub conclusion: Option<Conclusion>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub run_started_at: Option<DateTime<Utc>>,
    pub head_branch: Option<String>,
    pub head_sha: String,
    pub html_url: String,
    pub event: String,
    pub run_number: u64,
    pub run_attempt: u64,
}

impl From<RunRecord> for Run {
    fn from(record: RunRecord) -> Self {
        let conclusion = match record.status {
            RunStatus::Completed => record.conclusion,
            _ => None,
        };

        Self {
            id: record.id,
            name: record.name,
            status: record.status,
            conclusion,
            created_at: record.created_at,
            updated_at: record.updated_at,
            run_started_at: record.run_started_at,
            head_branch: record.head_branch,
            head_sha: record.head_sha,
            html_url: record.html_url,
            event: record.event,
            run_number: record.run_number,
            run_attempt: record.run_attempt,
        }
    }
}

impl Run {
    pub fn is_completed(&self) -> bool {
        self.status == RunStatus::Completed
    }

    /// How long the run has been going according to GitHub, if it has started.
    pub fn duration(&self) -> Option<Duration> {
        elapsed_whole_seconds(self.run_started_at, self.updated_at)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Job {
    pub id: u64,
    pub run_id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub status: RunStatus,
    #[serde(default)]
    pub conclusion: Option<Conclusion>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub html_url: String,
    #[serde(default)]
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Step {
    pub name: String,

    /// 1-based and unique within a job; steps are ordered by it.
    pub number: u32,
    #[serde(default)]
    pub status: RunStatus,
    #[serde(default)]
    pub conclusion: Option<Conclusion>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Step {
    pub fn duration(&self) -> Option<Duration> {
        elapsed_whole_seconds(self.started_at, self.completed_at)
    }
}

/// The response to the "list runs" call.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RunList {
    #[serde(default)]
    pub total_count: u64,
    #[serde(default)]
    pub workflow_runs: Vec<Run>,
}

/// The response to the "list jobs for a run" call.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct JobList {
    #[serde(default)]
    pub total_count: u64,
    #[serde(default)]
    pub jobs: Vec<Job>,
}

/// Returns `end - start` rounded to the nearest whole second. `None` if either end is missing
/// or if the range runs backwards.
pub fn elapsed_whole_seconds(
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
) -> Option<Duration> {
    let (start, end) = (start?, end?);
    let millis = u64::try_from((end - start).num_milliseconds()).ok()?;

    Some(Duration::from_secs((millis + 500) / 1000))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn decode_run_normalizes_conclusion() {
        let raw = r#"{
            "id": 42,
            "name": "Deploy",
            "status": "in_progress",
            "conclusion": "failure",
            "head_branch": "main",
            "head_sha": "abc123",
            "html_url": "https://github.com/acme/app/actions/runs/42",
            "event": "push",
            "run_number": 7,
            "run_attempt": 1
        }"#;

        let run: Run = serde_json::from_str(raw).unwrap();
        assert_eq!(run.status, RunStatus::InProgress);
        assert_eq!(run.conclusion, None);
        assert_eq!(run.head_branch.as_deref(), Some("main"));
    }

    #[test]
    fn decode_unknown_wire_values() {
        let raw = r#"{
            "id": 1,
            "status": "waiting",
            "conclusion": null
        }"#;
        let run: Run = serde_json::from_str(raw).unwrap();
        assert_eq!(run.status, RunStatus::Unknown);

        let raw = r#"{
            "id": 1,
            "status": "completed",
            "conclusion": "timed_out"
        }"#;
        let run: Run = serde_json::from_str(raw).unwrap();
        assert_eq!(run.status, RunStatus::Completed);
        assert_eq!(run.conclusion, Some(Conclusion::Other));
    }

    #[test]
    fn decode_jobs_with_steps() {
        let raw = r#"{
            "total_count": 1,
            "jobs": [{
                "id": 10,
                "run_id": 42,
                "name": "build",
                "status": "completed",
                "conclusion": "failure",
                "html_url": "https://github.com/acme/app/actions/runs/42/job/10",
                "steps": [{
                    "name": "Run tests",
                    "number": 3,
                    "status": "completed",
                    "conclusion": "failure",
                    "started_at": "2024-05-01T10:00:00Z",
                    "completed_at": "2024-05-01T10:00:07Z"
                }]
            }]
        }"#;

        let jobs: JobList = serde_json::from_str(raw).unwrap();
        assert_eq!(jobs.total_count, 1);

        let step = &jobs.jobs[0].steps[0];
        assert_eq!(step.conclusion, Some(Conclusion::Failure));
        assert_eq!(step.duration(), Some(Duration::from_secs(7)));
    }

    #[test]
    fn elapsed_rounds_and_rejects_backwards_ranges() {
        let start: DateTime<Utc> = "2024-05-01T10:00:00Z".parse().unwrap();
        let end: DateTime<Utc> = "2024-05-01T10:01:29.600Z".parse().unwrap();

        assert_eq!(
            elapsed_whole_seconds(Some(start), Some(end)),
            Some(Duration::from_secs(90))
        );
        assert_eq!(elapsed_whole_seconds(Some(end), Some(start)), None);
        assert_eq!(elapsed_whole_seconds(None, Some(end)), None);
    }
}
