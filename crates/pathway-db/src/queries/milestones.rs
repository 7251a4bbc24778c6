//! Database query functions for the `milestones` table.

use anyhow::{Context, Result};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{Milestone, MilestonePatch};

/// SQLSTATE raised when `reorder_milestones` is not installed.
pub const UNDEFINED_FUNCTION: &str = "42883";
/// SQLSTATE raised by `reorder_milestones` for an unknown plan.
pub const PLAN_NOT_FOUND: &str = "P0002";
/// SQLSTATE raised by `reorder_milestones` for a malformed ordering.
pub const INVALID_ORDERING: &str = "22023";

/// List the milestones of a plan sorted by `order_index` (not week number).
pub async fn list_milestones_for_plan(pool: &PgPool, plan_id: Uuid) -> Result<Vec<Milestone>> {
    let milestones = sqlx::query_as::<_, Milestone>(
        "SELECT * FROM milestones WHERE plan_id = $1 ORDER BY order_index ASC, week_number ASC",
    )
    .bind(plan_id)
    .fetch_all(pool)
    .await
    .context("failed to list milestones")?;

    Ok(milestones)
}

/// Apply a partial update. Returns `None` if the milestone does not exist.
pub async fn update_milestone(
    pool: &PgPool,
    id: Uuid,
    patch: &MilestonePatch,
) -> Result<Option<Milestone>> {
    let milestone = sqlx::query_as::<_, Milestone>(
        "UPDATE milestones \
         SET goal = COALESCE($2, goal), \
             notes = COALESCE($3, notes), \
             status = COALESCE($4, status), \
             order_index = COALESCE($5, order_index), \
             updated_at = now() \
         WHERE id = $1 \
         RETURNING *",
    )
    .bind(id)
    .bind(patch.goal.as_deref())
    .bind(patch.notes.as_deref())
    .bind(patch.status)
    .bind(patch.order_index)
    .fetch_optional(pool)
    .await
    .context("failed to update milestone")?;

    Ok(milestone)
}

/// Rewrite every `order_index` of a plan in one server-side statement via
/// the `reorder_milestones` SQL function.
///
/// Errors carry the SQLSTATE of the failure; see [`sqlstate`].
pub async fn reorder_milestones(
    pool: &PgPool,
    plan_id: Uuid,
    ordered_ids: &[Uuid],
) -> Result<()> {
    sqlx::query("SELECT reorder_milestones($1, $2)")
        .bind(plan_id)
        .bind(ordered_ids)
        .execute(pool)
        .await
        .with_context(|| format!("failed to reorder milestones of plan {plan_id}"))?;

    Ok(())
}

/// Write one milestone's `order_index`, scoped to its plan. Returns whether
/// a row was updated.
pub async fn set_order_index(
    pool: &PgPool,
    plan_id: Uuid,
    milestone_id: Uuid,
    order_index: i32,
) -> Result<bool> {
    let result = sqlx::query(
        "UPDATE milestones SET order_index = $3, updated_at = now() \
         WHERE id = $2 AND plan_id = $1",
    )
    .bind(plan_id)
    .bind(milestone_id)
    .bind(order_index)
    .execute(pool)
    .await
    .with_context(|| format!("failed to set order index of milestone {milestone_id}"))?;

    Ok(result.rows_affected() > 0)
}

/// Find the SQLSTATE of the first database error in an error chain.
pub fn sqlstate(err: &anyhow::Error) -> Option<String> {
    err.chain()
        .filter_map(|cause| cause.downcast_ref::<sqlx::Error>())
        .find_map(|e| match e {
            sqlx::Error::Database(db) => db.code().map(|code| code.into_owned()),
            _ => None,
        })
}
