//! Database query functions for the `plans` table.

use anyhow::{Context, Result};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{
    Milestone, NewPlan, Plan, PlanDetailsPatch, PlanWithMilestones, SubmissionStatus,
    milestone_seeds,
};
use crate::queries::milestones;

/// Insert a plan row and its twelve milestones in one transaction.
///
/// Milestones get `week_number = 1..=12`, `order_index = week_number - 1`,
/// an empty goal and status `not_started`. If any milestone insert fails
/// the transaction rolls back and no plan row survives.
pub async fn create_plan_with_milestones(
    pool: &PgPool,
    new_plan: &NewPlan,
) -> Result<PlanWithMilestones> {
    let mut tx = pool.begin().await.context("failed to begin transaction")?;

    let plan = sqlx::query_as::<_, Plan>(
        "INSERT INTO plans (owner_id, title, start_date, end_date, parent_plan_id) \
         VALUES ($1, $2, $3, $4, $5) \
         RETURNING *",
    )
    .bind(&new_plan.owner_id)
    .bind(&new_plan.title)
    .bind(new_plan.start_date)
    .bind(new_plan.end_date)
    .bind(new_plan.parent_plan_id)
    .fetch_one(&mut *tx)
    .await
    .context("failed to insert plan")?;

    let (weeks, orders): (Vec<i32>, Vec<i32>) = milestone_seeds().unzip();
    let mut milestones = sqlx::query_as::<_, Milestone>(
        "INSERT INTO milestones (plan_id, week_number, order_index) \
         SELECT $1, seed.week_number, seed.order_index \
         FROM unnest($2::int4[], $3::int4[]) AS seed(week_number, order_index) \
         RETURNING *",
    )
    .bind(plan.id)
    .bind(&weeks)
    .bind(&orders)
    .fetch_all(&mut *tx)
    .await
    .with_context(|| format!("failed to insert milestones for plan {}", plan.id))?;

    tx.commit().await.context("failed to commit transaction")?;

    milestones.sort_by_key(|m| m.order_index);
    Ok(PlanWithMilestones { plan, milestones })
}

/// Fetch a plan by its ID.
pub async fn get_plan(pool: &PgPool, id: Uuid) -> Result<Option<Plan>> {
    let plan = sqlx::query_as::<_, Plan>("SELECT * FROM plans WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("failed to fetch plan")?;

    Ok(plan)
}

/// Fetch a plan joined with its milestones in display order.
pub async fn get_plan_with_milestones(
    pool: &PgPool,
    id: Uuid,
) -> Result<Option<PlanWithMilestones>> {
    let Some(plan) = get_plan(pool, id).await? else {
        return Ok(None);
    };
    let milestones = milestones::list_milestones_for_plan(pool, id).await?;
    Ok(Some(PlanWithMilestones { plan, milestones }))
}

/// List an owner's plans, newest first.
pub async fn list_plans_for_owner(pool: &PgPool, owner_id: &str) -> Result<Vec<Plan>> {
    let plans = sqlx::query_as::<_, Plan>(
        "SELECT * FROM plans WHERE owner_id = $1 ORDER BY created_at DESC, id",
    )
    .bind(owner_id)
    .fetch_all(pool)
    .await
    .context("failed to list plans")?;

    Ok(plans)
}

/// Apply a title and/or date change. Returns `None` if the plan is gone.
pub async fn update_plan_details(
    pool: &PgPool,
    id: Uuid,
    patch: &PlanDetailsPatch,
) -> Result<Option<Plan>> {
    let (start_date, end_date) = patch.dates.unzip();
    let plan = sqlx::query_as::<_, Plan>(
        "UPDATE plans \
         SET title = COALESCE($2, title), \
             start_date = COALESCE($3, start_date), \
             end_date = COALESCE($4, end_date), \
             updated_at = now() \
         WHERE id = $1 \
         RETURNING *",
    )
    .bind(id)
    .bind(patch.title.as_deref())
    .bind(start_date)
    .bind(end_date)
    .fetch_optional(pool)
    .await
    .context("failed to update plan details")?;

    Ok(plan)
}

/// Set the submission status. No transition rules are enforced here.
pub async fn set_submission_status(
    pool: &PgPool,
    id: Uuid,
    status: SubmissionStatus,
) -> Result<Option<Plan>> {
    let plan = sqlx::query_as::<_, Plan>(
        "UPDATE plans SET submission_status = $2, updated_at = now() \
         WHERE id = $1 \
         RETURNING *",
    )
    .bind(id)
    .bind(status)
    .fetch_optional(pool)
    .await
    .context("failed to update submission status")?;

    Ok(plan)
}

/// Delete a plan's milestones, then the plan row, in one transaction.
///
/// Both phases tolerate missing rows, so deleting an already-deleted plan
/// succeeds. Returns whether a plan row was removed.
pub async fn delete_plan(pool: &PgPool, id: Uuid) -> Result<bool> {
    let mut tx = pool.begin().await.context("failed to begin transaction")?;

    sqlx::query("DELETE FROM milestones WHERE plan_id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await
        .context("failed to delete milestones")?;

    let result = sqlx::query("DELETE FROM plans WHERE id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await
        .context("failed to delete plan")?;

    tx.commit().await.context("failed to commit transaction")?;

    Ok(result.rows_affected() > 0)
}
