//! RunReport: what one runner invocation did.
//!
//! Not sent on the bus; the entry point logs it on exit.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::RunId;

/// Result of one processed (or timed-out) task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunOutcome {
    Completed,
    Failed,
    TimedOut,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: RunId,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    /// One entry per published envelope, in publish order.
    pub outcomes: Vec<RunOutcome>,
}

impl RunReport {
    pub fn new(run_id: RunId, started_at: DateTime<Utc>) -> Self {
        Self {
            run_id,
            started_at,
            finished_at: None,
            outcomes: Vec::new(),
        }
    }

    pub fn record(&mut self, outcome: RunOutcome) {
        self.outcomes.push(outcome);
    }

    pub fn finish(&mut self, at: DateTime<Utc>) {
        self.finished_at = Some(at);
    }

    pub fn envelopes_published(&self) -> usize {
        self.outcomes.len()
    }

    pub fn last_outcome(&self) -> Option<RunOutcome> {
        self.outcomes.last().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use ulid::Ulid;

    #[test]
    fn records_outcomes_in_order() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let mut report = RunReport::new(RunId::from_ulid(Ulid::new()), start);
        assert_eq!(report.envelopes_published(), 0);
        assert_eq!(report.last_outcome(), None);

        report.record(RunOutcome::Completed);
        report.record(RunOutcome::Failed);
        report.finish(start);

        assert_eq!(report.envelopes_published(), 2);
        assert_eq!(report.last_outcome(), Some(RunOutcome::Failed));
        assert_eq!(report.finished_at, Some(start));
    }
}
