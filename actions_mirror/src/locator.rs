use crate::github::RunSource;
use crate::models::Run;
use std::fmt;
use tracing::warn;

/// Picks the one workflow run we care about out of everything in the repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    /// The most recent run triggered from this branch.
    Branch(String),

    /// The most recent run for this exact head commit.
    Commit(String),
}

impl Selector {
    pub fn matches(&self, run: &Run) -> bool {
        match self {
            Selector::Branch(branch) => run.head_branch.as_deref() == Some(branch.as_str()),
            Selector::Commit(sha) => run.head_sha == *sha,
        }
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::Branch(branch) => write!(f, "branch {branch}"),
            Selector::Commit(sha) => write!(f, "commit {sha}"),
        }
    }
}

/// Finds the run `selector` points at among `runs`, which are expected most recent first.
///
/// The list endpoint only returns summaries so the first match is re-fetched by id to get the full
/// record. If that fetch fails we move on to the next matching candidate instead of giving up on
/// the tick. `None` just means "not yet"; the caller tries again next tick.
pub async fn locate(source: &dyn RunSource, selector: &Selector, runs: &[Run]) -> Option<Run> {
    for candidate in runs.iter().filter(|run| selector.matches(run)) {
        match source.get_run(candidate.id).await {
            Ok(run) => return Some(run),
            Err(err) => {
                warn!(error = %err, run_id = candidate.id, "Could not fetch workflow run details; trying next candidate");
            }
        }
    }

    None
}
