//! Human-facing log output: status lines, job tallies and the closing summary.

use crate::github::RunSource;
use crate::models::{Conclusion, JobList, Run, RunStatus};
use crate::status::symbol;
use chrono_humanize::{Accuracy, HumanTime, Tense};
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

/// Job counts for a single run at one point in time.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct JobTally {
    pub total: u64,
    pub queued: u64,
    pub running: u64,
    pub completed: u64,
    pub failed: u64,

    /// Names of the jobs currently in progress, in API order.
    pub running_names: Vec<String>,
}

impl From<&JobList> for JobTally {
    fn from(list: &JobList) -> Self {
        let mut tally = JobTally {
            total: list.total_count.max(list.jobs.len() as u64),
            ..Default::default()
        };

        for job in &list.jobs {
            match job.status {
                RunStatus::Queued => tally.queued += 1,
                RunStatus::InProgress => {
                    tally.running += 1;
                    tally.running_names.push(job.name.clone());
                }
                RunStatus::Completed => tally.completed += 1,
                RunStatus::Unknown => {}
            }

            if job.conclusion == Some(Conclusion::Failure) {
                tally.failed += 1;
            }
        }

        tally
    }
}

/// `failure`, or `none` when GitHub hasn't decided yet.
pub fn conclusion_label(conclusion: Option<Conclusion>) -> String {
    match conclusion {
        Some(conclusion) => conclusion.to_string(),
        None => "none".into(),
    }
}

/// `🔄 GitHub Actions: IN_PROGRESS | Run ID: 42`
pub fn status_line(run: &Run) -> String {
    let status = run.status.to_string().to_uppercase();
    let symbol = symbol(run.status, run.conclusion);

    match run.conclusion {
        Some(conclusion) => format!(
            "{symbol} GitHub Actions: {status} ({}) | Run ID: {}",
            conclusion.to_string().to_uppercase(),
            run.id
        ),
        None => format!("{symbol} GitHub Actions: {status} | Run ID: {}", run.id),
    }
}

/// Compact duration for log lines; `7s`, `1m30s`, `2h0m5s`.
pub fn short_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    let (hours, minutes, seconds) = (secs / 3600, (secs % 3600) / 60, secs % 60);

    if hours > 0 {
        format!("{hours}h{minutes}m{seconds}s")
    } else if minutes > 0 {
        format!("{minutes}m{seconds}s")
    } else {
        format!("{seconds}s")
    }
}

/// Transforms the given duration into a humanized string. (i.e. '3 minutes and 12 seconds')
pub fn humanize(duration: Duration) -> String {
    let duration = chrono::Duration::from_std(duration).unwrap_or_else(|_| chrono::Duration::zero());
    HumanTime::from(duration).to_text_en(Accuracy::Precise, Tense::Present)
}

/// Fetches the run's jobs and logs where the run is at. Failing to get the jobs only costs us
/// the tallies.
pub async fn log_detailed_status(source: &dyn RunSource, run: &Run) {
    info!(
        run_id = run.id,
        "📋 Workflow: {} (#{}, attempt {})",
        run.name,
        run.run_number,
        run.run_attempt
    );

    if let Some(duration) = run.duration() {
        info!(run_id = run.id, "⏱️ Duration: {} | Event: {}", short_duration(duration), run.event);
    } else {
        info!(run_id = run.id, "Event: {}", run.event);
    }

    let jobs = match source.list_jobs(run.id).await {
        Ok(jobs) => jobs,
        Err(e) => {
            warn!(error = %e, run_id = run.id, "Could not fetch jobs for workflow run");
            return;
        }
    };

    let tally = JobTally::from(&jobs);
    info!(
        run_id = run.id,
        total = tally.total,
        queued = tally.queued,
        running = tally.running,
        completed = tally.completed,
        failed = tally.failed,
        "📊 Jobs: {} total | {} queued | {} running | {} completed | {} failed",
        tally.total,
        tally.queued,
        tally.running,
        tally.completed,
        tally.failed
    );

    if !tally.running_names.is_empty() {
        info!(run_id = run.id, "🔄 Running: {}", tally.running_names.join(", "));
    }
}

/// The closing lines once a run reaches a terminal state.
pub fn log_summary(run: &Run, elapsed: Duration, journal: Option<&Path>) {
    info!(run_id = run.id, "{}", "=".repeat(60));
    info!(
        run_id = run.id,
        conclusion = %conclusion_label(run.conclusion),
        "🏁 Workflow completed with conclusion: {}",
        conclusion_label(run.conclusion)
    );

    match run.conclusion {
        Some(Conclusion::Success) => info!("✅ Deployment completed successfully"),
        Some(Conclusion::Failure) => info!("❌ Deployment failed"),
        Some(Conclusion::Cancelled) => info!("⚠️ Deployment was cancelled"),
        _ => info!("❓ Deployment finished with an unexpected conclusion"),
    }

    info!("Total monitoring time: {}", humanize(elapsed));
    info!("🔗 {}", run.html_url);

    if let Some(path) = journal {
        info!("API responses written to {}", path.display());
    }
}
