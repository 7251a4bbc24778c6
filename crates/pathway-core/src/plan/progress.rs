use serde::Serialize;

use pathway_db::models::{Milestone, MilestoneStatus};

/// Read-time aggregation of milestone statuses. Never written back.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PlanProgress {
    pub total: usize,
    pub not_started: usize,
    pub in_progress: usize,
    pub completed: usize,
}

impl PlanProgress {
    pub fn from_milestones(milestones: &[Milestone]) -> Self {
        milestones
            .iter()
            .fold(Self::default(), |mut progress, milestone| {
                progress.total += 1;
                match milestone.status {
                    MilestoneStatus::NotStarted => progress.not_started += 1,
                    MilestoneStatus::InProgress => progress.in_progress += 1,
                    MilestoneStatus::Completed => progress.completed += 1,
                }
                progress
            })
    }

    /// Completed share, rounded to the nearest whole percent.
    pub fn percent_complete(&self) -> u8 {
        if self.total == 0 {
            return 0;
        }
        ((self.completed as f64 * 100.0) / self.total as f64).round() as u8
    }
}
