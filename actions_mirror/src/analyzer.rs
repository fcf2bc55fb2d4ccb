use crate::github::{RunSource, SourceError};
use crate::models::{Conclusion, Job, Run};
use crate::report::{conclusion_label, short_duration};
use crate::status::symbol;
use std::time::Duration;
use tracing::info;

/// A single step that failed, and where to go look at it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailurePoint {
    pub job_name: String,
    pub job_url: String,
    pub step_number: u32,
    pub step_name: String,

    /// How long the step ran before failing; `None` if GitHub didn't give us both timestamps.
    pub duration: Option<Duration>,
}

/// The diagnostic result of digging through a failed run's jobs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureReport {
    pub run_id: u64,
    pub total_jobs: u64,

    /// Jobs in the order GitHub returned them.
    pub jobs: Vec<Job>,

    /// Failed steps of failed jobs, in job order and then step order.
    pub points: Vec<FailurePoint>,
}

/// Walks the failed jobs' steps in step order and collects every step that failed.
pub fn failure_points(jobs: &[Job]) -> Vec<FailurePoint> {
    let mut points = vec![];

    for job in jobs
        .iter()
        .filter(|job| job.conclusion == Some(Conclusion::Failure))
    {
        let mut steps: Vec<_> = job.steps.iter().collect();
        steps.sort_by_key(|step| step.number);

        for step in steps
            .into_iter()
            .filter(|step| step.conclusion == Some(Conclusion::Failure))
        {
            points.push(FailurePoint {
                job_name: job.name.clone(),
                job_url: job.html_url.clone(),
                step_number: step.number,
                step_name: step.name.clone(),
                duration: step.duration(),
            });
        }
    }

    points
}

/// Fetches `run`'s jobs and works out where it failed.
///
/// This is diagnostics only; callers should log an error and move on rather than stop.
pub async fn analyze(source: &dyn RunSource, run: &Run) -> Result<FailureReport, SourceError> {
    let jobs = source.list_jobs(run.id).await?;
    let points = failure_points(&jobs.jobs);

    Ok(FailureReport {
        run_id: run.id,
        total_jobs: jobs.total_count.max(jobs.jobs.len() as u64),
        jobs: jobs.jobs,
        points,
    })
}

impl FailureReport {
    /// Writes the step-by-step failure narrative to the log.
    pub fn narrate(&self) {
        info!(run_id = self.run_id, "📊 Total jobs in workflow: {}", self.total_jobs);

        for job in &self.jobs {
            info!("📋 Job: {}", job.name);
            info!(
                "   Status: {} | Conclusion: {}",
                job.status,
                conclusion_label(job.conclusion)
            );

            if job.conclusion == Some(Conclusion::Failure) {
                info!("   ❌ FAILED JOB - Step-by-step analysis:");

                let mut steps: Vec<_> = job.steps.iter().collect();
                steps.sort_by_key(|step| step.number);

                for step in steps {
                    info!(
                        "      {} Step {}: {} ({})",
                        symbol(step.status, step.conclusion),
                        step.number,
                        step.name,
                        step.status
                    );

                    if step.conclusion == Some(Conclusion::Failure) {
                        info!("         ❌ FAILURE POINT: {}", step.name);
                        if let Some(duration) = step.duration() {
                            info!("         ⏱️ Failed after: {}", short_duration(duration));
                        }
                    }
                }
            }

            info!("   🔗 Job URL: {}", job.html_url);
            info!("   {}", "-".repeat(50));
        }

        if self.points.is_empty() {
            info!(run_id = self.run_id, "No failed steps found in failed jobs");
        }
    }
}
