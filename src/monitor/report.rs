//! Aggregated results of one health-check cycle.

use chrono::{DateTime, Utc};

use crate::probe::CheckOutcome;

/// All outcomes of one cycle, in target-list order, plus the unhealthy subset.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    pub all_outcomes: Vec<CheckOutcome>,
    pub unhealthy_outcomes: Vec<CheckOutcome>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl CycleReport {
    /// Partition outcomes, keeping their order in both lists.
    pub fn new(all_outcomes: Vec<CheckOutcome>, started_at: DateTime<Utc>, finished_at: DateTime<Utc>) -> Self {
        let unhealthy_outcomes = all_outcomes
            .iter()
            .filter(|o| !o.is_healthy)
            .cloned()
            .collect();

        Self {
            all_outcomes,
            unhealthy_outcomes,
            started_at,
            finished_at,
        }
    }

    pub fn has_unhealthy(&self) -> bool {
        !self.unhealthy_outcomes.is_empty()
    }

    pub fn unhealthy_count(&self) -> usize {
        self.unhealthy_outcomes.len()
    }

    /// Subject line for the alert sent about this report.
    pub fn alert_subject(&self) -> String {
        format!(
            "⚠️ Application Health Alert - {} Application(s) Down",
            self.unhealthy_count()
        )
    }
}
