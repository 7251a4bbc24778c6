//! Plan service layer.
//!
//! Computes plan dates, validates plan metadata and delegates persistence
//! to a [`PlanStore`]. The store creates a plan and its twelve milestones
//! as one unit.

use chrono::{Days, NaiveDate};
use tracing::info;
use uuid::Uuid;

use pathway_db::models::{
    NewPlan, PLAN_LENGTH_DAYS, Plan, PlanDetailsPatch, PlanWithMilestones, SubmissionStatus,
};

use crate::error::{SyncResult, ValidationError};
use crate::store::PlanStore;

/// `start_date + 84 days`.
pub fn end_date_for(start_date: NaiveDate) -> NaiveDate {
    start_date + Days::new(PLAN_LENGTH_DAYS)
}

/// Start date of a plan that continues `parent`: the day after the
/// parent's twelfth week, which is the parent's `end_date`.
pub fn continuation_start(parent: &Plan) -> NaiveDate {
    parent.end_date
}

fn validate_title(title: &str) -> Result<String, ValidationError> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::TitleEmpty);
    }
    Ok(trimmed.to_owned())
}

/// Create a plan with twelve empty `not_started` milestones.
pub async fn create_plan(
    store: &dyn PlanStore,
    owner_id: &str,
    title: &str,
    start_date: NaiveDate,
) -> SyncResult<PlanWithMilestones> {
    let new_plan = NewPlan {
        owner_id: owner_id.to_owned(),
        title: validate_title(title)?,
        start_date,
        end_date: end_date_for(start_date),
        parent_plan_id: None,
    };
    let created = store.create_plan(&new_plan).await?;
    info!(
        plan_id = %created.plan.id,
        owner_id,
        start = %created.plan.start_date,
        "plan created"
    );
    Ok(created)
}

/// Create a plan whose first week immediately follows the parent's last
/// week, recording the parent reference.
pub async fn create_continuation(
    store: &dyn PlanStore,
    owner_id: &str,
    parent_plan_id: Uuid,
    title: &str,
) -> SyncResult<PlanWithMilestones> {
    let title = validate_title(title)?;
    let parent = store.get_plan(parent_plan_id).await?.plan;
    let start_date = continuation_start(&parent);

    let new_plan = NewPlan {
        owner_id: owner_id.to_owned(),
        title,
        start_date,
        end_date: end_date_for(start_date),
        parent_plan_id: Some(parent.id),
    };
    let created = store.create_plan(&new_plan).await?;
    info!(
        plan_id = %created.plan.id,
        %parent_plan_id,
        start = %created.plan.start_date,
        "continuation plan created"
    );
    Ok(created)
}

/// Fetch a plan with milestones in `order_index` order.
pub async fn get_plan(store: &dyn PlanStore, plan_id: Uuid) -> SyncResult<PlanWithMilestones> {
    Ok(store.get_plan(plan_id).await?)
}

/// List an owner's plans, newest first.
pub async fn list_plans(store: &dyn PlanStore, owner_id: &str) -> SyncResult<Vec<Plan>> {
    Ok(store.list_plans(owner_id).await?)
}

/// Change a plan's title and/or start date. A new start date moves the end
/// date with it.
pub async fn update_plan_details(
    store: &dyn PlanStore,
    plan_id: Uuid,
    title: Option<&str>,
    start_date: Option<NaiveDate>,
) -> SyncResult<Plan> {
    let patch = PlanDetailsPatch {
        title: title.map(validate_title).transpose()?,
        dates: start_date.map(|start| (start, end_date_for(start))),
    };
    Ok(store.update_plan_details(plan_id, &patch).await?)
}

/// Record a new submission status. Any status may follow any other.
pub async fn set_submission_status(
    store: &dyn PlanStore,
    plan_id: Uuid,
    status: SubmissionStatus,
) -> SyncResult<Plan> {
    let plan = store.set_submission_status(plan_id, status).await?;
    info!(%plan_id, %status, "plan submission status changed");
    Ok(plan)
}

/// Delete a plan and its milestones. Deleting a missing plan succeeds.
pub async fn delete_plan(store: &dyn PlanStore, plan_id: Uuid) -> SyncResult<()> {
    store.delete_plan(plan_id).await?;
    info!(%plan_id, "plan deleted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn end_date_is_eighty_four_days_later() {
        assert_eq!(end_date_for(date(2025, 1, 6)), date(2025, 3, 31));
    }

    #[test]
    fn end_date_crosses_leap_day() {
        assert_eq!(end_date_for(date(2024, 2, 1)), date(2024, 4, 25));
    }

    #[test]
    fn continuation_starts_on_parent_end_date() {
        let parent = Plan {
            id: Uuid::new_v4(),
            owner_id: "u1".to_string(),
            title: "Q1".to_string(),
            start_date: date(2025, 1, 6),
            end_date: date(2025, 3, 31),
            submission_status: SubmissionStatus::Draft,
            parent_plan_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let start = continuation_start(&parent);
        assert_eq!(start, date(2025, 3, 31));
        // Parent week 12 runs Mar 24..=Mar 30.
        assert_eq!(parent.start_date + Days::new(77), date(2025, 3, 24));
    }

    #[test]
    fn titles_are_trimmed_and_must_not_be_blank() {
        assert_eq!(validate_title("  Growth plan "), Ok("Growth plan".to_string()));
        assert_eq!(validate_title("   "), Err(ValidationError::TitleEmpty));
    }
}
