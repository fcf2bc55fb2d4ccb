//! The poll loop: find the run, follow it, mirror every change to GitLab, stop when it's done.
//!
//! Everything happens on one task and one request is in flight at a time. The loop only
//! suspends while waiting on an HTTP call or sleeping between ticks.

use crate::analyzer::{self, FailureReport};
use crate::github::RunSource;
use crate::gitlab::{CommitStatus, StatusPublisher};
use crate::locator::{self, Selector};
use crate::models::{Conclusion, Run, RunStatus};
use crate::report::{self, short_duration, status_line};
use crate::status::{describe, target_state};
use crate::tracker::{Observation, TrackedState};
use std::path::PathBuf;
use std::time::Duration;
use strum::Display;
use tokio::time::{sleep, Instant};
use tracing::{error, info, warn};

/// Everything the loop needs from configuration.
#[derive(Debug, Clone)]
pub struct Settings {
    pub poll_interval: Duration,

    /// Ceiling on the whole session.
    pub timeout: Duration,

    /// Ceiling on how long we keep looking before a run first shows up.
    pub search_timeout: Duration,

    /// The commit status context; statuses we publish replace each other under it.
    pub context: String,
    pub environment: String,

    /// Where the API journal is written, for the closing summary.
    pub journal: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, Display, PartialEq, Eq)]
#[strum(serialize_all = "snake_case")]
pub enum Phase {
    /// No run has been located yet.
    Searching,

    /// A run has been located and reported at least once.
    Tracking,
}

impl From<&TrackedState> for Phase {
    fn from(tracked: &TrackedState) -> Self {
        if tracked.is_tracking() {
            Phase::Tracking
        } else {
            Phase::Searching
        }
    }
}

/// What a single pass through the loop saw.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Tick {
    /// GitHub couldn't be read this time around.
    Unavailable,

    /// No run matches the selector yet.
    NotFound,

    /// The run exists and hasn't finished.
    Tracking(Run),

    /// The run has finished; the loop should stop.
    Terminal(Run),
}

/// How a monitoring session ended.
#[derive(Debug)]
pub enum Outcome {
    /// The run finished; its conclusion can be anything.
    Completed {
        run: Run,
        failure: Option<FailureReport>,
    },

    /// We gave up waiting.
    TimedOut { phase: Phase, elapsed: Duration },
}

impl Outcome {
    /// The process exit code for this outcome.
    pub fn exit_code(&self) -> i32 {
        match self {
            Outcome::Completed { .. } => 0,
            Outcome::TimedOut {
                phase: Phase::Searching,
                ..
            } => 2,
            Outcome::TimedOut {
                phase: Phase::Tracking,
                ..
            } => 3,
        }
    }
}

pub struct Monitor {
    source: Box<dyn RunSource>,
    publisher: Box<dyn StatusPublisher>,
    selector: Selector,
    settings: Settings,
}

impl Monitor {
    pub fn new(
        source: Box<dyn RunSource>,
        publisher: Box<dyn StatusPublisher>,
        selector: Selector,
        settings: Settings,
    ) -> Self {
        Self {
            source,
            publisher,
            selector,
            settings,
        }
    }

    /// Polls until the run reaches a terminal state or a ceiling is hit.
    pub async fn run(&self) -> Outcome {
        let started = Instant::now();
        let mut tracked = TrackedState::new();

        info!(
            selector = %self.selector,
            environment = %self.settings.environment,
            poll_interval = %short_duration(self.settings.poll_interval),
            timeout = %short_duration(self.settings.timeout),
            "Monitoring GitHub Actions for {}",
            self.selector
        );

        loop {
            if let Tick::Terminal(run) = self.tick(&mut tracked, started.elapsed()).await {
                return self.finish(run, started.elapsed()).await;
            }

            let phase = Phase::from(&tracked);
            let elapsed = started.elapsed();
            if elapsed >= self.ceiling(phase) {
                warn!(
                    phase = %phase,
                    elapsed = %short_duration(elapsed),
                    "⏰ Monitoring timed out"
                );
                return Outcome::TimedOut { phase, elapsed };
            }

            sleep(self.settings.poll_interval).await;
        }
    }

    fn ceiling(&self, phase: Phase) -> Duration {
        match phase {
            Phase::Searching => self.settings.search_timeout.min(self.settings.timeout),
            Phase::Tracking => self.settings.timeout,
        }
    }

    /// One fetch-compare-report cycle. Never fails; anything that goes wrong is logged and the
    /// next tick tries again.
    pub async fn tick(&self, tracked: &mut TrackedState, elapsed: Duration) -> Tick {
        let runs = match self.source.list_runs().await {
            Ok(list) => list.workflow_runs,
            Err(e) => {
                warn!(error = %e, "Could not list workflow runs; will retry");
                return Tick::Unavailable;
            }
        };

        let Some(run) = locator::locate(self.source.as_ref(), &self.selector, &runs).await else {
            info!(
                selector = %self.selector,
                elapsed = %short_duration(elapsed),
                "🔍 No workflow run found for {} yet",
                self.selector
            );
            return Tick::NotFound;
        };

        let observed = Observation::from(&run);

        if tracked.has_changed(&observed) {
            match tracked.baseline() {
                None => info!(run_id = run.id, "✅ Found workflow run {}", run.id),
                Some(previous) if previous.run_id != run.id => info!(
                    run_id = run.id,
                    previous_run_id = previous.run_id,
                    "Newer workflow run {} replaces {}",
                    run.id,
                    previous.run_id
                ),
                Some(_) => {}
            }

            self.report_change(&run).await;
            tracked.commit(observed);
        } else if run.status == RunStatus::InProgress {
            info!(
                run_id = run.id,
                "⏳ Still running... ({} elapsed)",
                short_duration(elapsed)
            );
            report::log_detailed_status(self.source.as_ref(), &run).await;
        }

        if run.is_completed() {
            Tick::Terminal(run)
        } else {
            Tick::Tracking(run)
        }
    }

    async fn report_change(&self, run: &Run) {
        info!(run_id = run.id, "{}", status_line(run));
        info!(run_id = run.id, "🔗 {}", run.html_url);

        report::log_detailed_status(self.source.as_ref(), run).await;

        let status = CommitStatus {
            sha: run.head_sha.clone(),
            state: target_state(run.status, run.conclusion),
            context: self.settings.context.clone(),
            description: describe(run.status, run.conclusion),
            target_url: run.html_url.clone(),
        };

        match self.publisher.publish(&status).await {
            Ok(()) => info!(
                run_id = run.id,
                state = %status.state,
                sha = %status.sha,
                "Updated GitLab commit status"
            ),
            Err(e) => warn!(
                error = %e,
                run_id = run.id,
                state = %status.state,
                "Could not update GitLab commit status"
            ),
        }
    }

    async fn finish(&self, run: Run, elapsed: Duration) -> Outcome {
        let mut failure = None;

        if run.conclusion == Some(Conclusion::Failure) {
            info!(run_id = run.id, "🔍 FAILURE ANALYSIS");
            match analyzer::analyze(self.source.as_ref(), &run).await {
                Ok(analysis) => {
                    analysis.narrate();
                    failure = Some(analysis);
                }
                Err(e) => error!(error = %e, run_id = run.id, "Could not analyze failed workflow run"),
            }
        }

        report::log_summary(&run, elapsed, self.settings.journal.as_deref());

        Outcome::Completed { run, failure }
    }
}
