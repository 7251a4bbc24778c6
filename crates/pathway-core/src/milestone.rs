//! Milestone edits: local validation, the status cycling policy, and the
//! validated update path into a [`MilestoneStore`].

use tracing::debug;
use uuid::Uuid;

use pathway_db::models::{
    MAX_GOAL_CHARS, MILESTONES_PER_PLAN, Milestone, MilestonePatch, MilestoneStatus,
};

use crate::error::{SyncResult, ValidationError};
use crate::store::MilestoneStore;

/// Check a goal against the character cap. Exactly [`MAX_GOAL_CHARS`]
/// characters is accepted.
pub fn validate_goal(goal: &str) -> Result<(), ValidationError> {
    let len = goal.chars().count();
    if len > MAX_GOAL_CHARS {
        return Err(ValidationError::GoalTooLong {
            len,
            max: MAX_GOAL_CHARS,
        });
    }
    Ok(())
}

/// Validate every field of a patch that has a local rule.
pub fn validate_patch(patch: &MilestonePatch) -> Result<(), ValidationError> {
    if let Some(goal) = &patch.goal {
        validate_goal(goal)?;
    }
    if let Some(order_index) = patch.order_index {
        if !(0..MILESTONES_PER_PLAN as i32).contains(&order_index) {
            return Err(ValidationError::InvalidOrdering(format!(
                "order index {order_index} is outside 0..{MILESTONES_PER_PLAN}"
            )));
        }
    }
    Ok(())
}

/// The status a click on a milestone's status control moves to.
///
/// ```text
/// not_started -> in_progress -> completed -> not_started
/// ```
///
/// This is UI policy only; stores accept any status after any other.
pub fn next_status(status: MilestoneStatus) -> MilestoneStatus {
    match status {
        MilestoneStatus::NotStarted => MilestoneStatus::InProgress,
        MilestoneStatus::InProgress => MilestoneStatus::Completed,
        MilestoneStatus::Completed => MilestoneStatus::NotStarted,
    }
}

/// Validate a patch, then persist it.
///
/// Invalid input returns [`ValidationError`] without touching the store.
pub async fn update_milestone(
    store: &dyn MilestoneStore,
    milestone_id: Uuid,
    patch: &MilestonePatch,
) -> SyncResult<Milestone> {
    validate_patch(patch)?;
    let milestone = store.update_milestone(milestone_id, patch).await?;
    debug!(%milestone_id, plan_id = %milestone.plan_id, "milestone updated");
    Ok(milestone)
}
