use crate::models::{Conclusion, Run, RunStatus};

/// The parts of a run that decide whether anything worth reporting happened.
/// Timestamps and every other field are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Observation {
    pub run_id: u64,
    pub status: RunStatus,
    pub conclusion: Option<Conclusion>,
}

impl From<&Run> for Observation {
    fn from(run: &Run) -> Self {
        Self {
            run_id: run.id,
            status: run.status,
            conclusion: run.conclusion,
        }
    }
}

/// The last observation we reported. Lives only as long as the poll loop that owns it.
#[derive(Debug, Default)]
pub struct TrackedState {
    baseline: Option<Observation>,
}

impl TrackedState {
    pub fn new() -> Self {
        Self::default()
    }

    /// True if `observed` differs from the last committed observation in run id, status or
    /// conclusion. Always true before the first commit.
    pub fn has_changed(&self, observed: &Observation) -> bool {
        self.baseline.as_ref() != Some(observed)
    }

    /// Makes `observed` the baseline future observations are compared against.
    pub fn commit(&mut self, observed: Observation) {
        self.baseline = Some(observed);
    }

    pub fn baseline(&self) -> Option<&Observation> {
        self.baseline.as_ref()
    }

    /// Whether a run has been located and reported at least once.
    pub fn is_tracking(&self) -> bool {
        self.baseline.is_some()
    }
}
