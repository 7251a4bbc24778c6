//! Database query functions for the `canvases` table.

use anyhow::{Context, Result};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{Canvas, CanvasSections};

/// Insert a canvas unless the owner already holds `max_per_owner` of them.
///
/// The count and the insert run as one statement. Returns `None` when the
/// limit is reached. New canvases are placed after the owner's last one.
pub async fn insert_canvas(
    pool: &PgPool,
    owner_id: &str,
    name: &str,
    max_per_owner: i64,
) -> Result<Option<Canvas>> {
    let canvas = sqlx::query_as::<_, Canvas>(
        "INSERT INTO canvases (owner_id, name, position) \
         SELECT $1, $2, COALESCE(MAX(position) + 1, 0) \
         FROM canvases WHERE owner_id = $1 \
         HAVING COUNT(*) < $3 \
         RETURNING *",
    )
    .bind(owner_id)
    .bind(name)
    .bind(max_per_owner)
    .fetch_optional(pool)
    .await
    .context("failed to insert canvas")?;

    Ok(canvas)
}

/// Fetch a canvas by ID.
pub async fn get_canvas(pool: &PgPool, id: Uuid) -> Result<Option<Canvas>> {
    let canvas = sqlx::query_as::<_, Canvas>("SELECT * FROM canvases WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("failed to fetch canvas")?;

    Ok(canvas)
}

/// List an owner's canvases in their chosen order.
pub async fn list_canvases_for_owner(pool: &PgPool, owner_id: &str) -> Result<Vec<Canvas>> {
    let canvases = sqlx::query_as::<_, Canvas>(
        "SELECT * FROM canvases WHERE owner_id = $1 ORDER BY position ASC, created_at ASC",
    )
    .bind(owner_id)
    .fetch_all(pool)
    .await
    .context("failed to list canvases")?;

    Ok(canvases)
}

/// Overwrite all nine sections and the derived completion percentage.
pub async fn update_canvas_sections(
    pool: &PgPool,
    id: Uuid,
    sections: &CanvasSections,
    completion_percentage: i32,
) -> Result<Option<Canvas>> {
    let canvas = sqlx::query_as::<_, Canvas>(
        "UPDATE canvases \
         SET present_role = $2, target_role = $3, motivation = $4, strengths = $5, \
             skill_gaps = $6, experience_gaps = $7, resources = $8, obstacles = $9, \
             success_metrics = $10, completion_percentage = $11, updated_at = now() \
         WHERE id = $1 \
         RETURNING *",
    )
    .bind(id)
    .bind(&sections.present_role)
    .bind(&sections.target_role)
    .bind(&sections.motivation)
    .bind(&sections.strengths)
    .bind(&sections.skill_gaps)
    .bind(&sections.experience_gaps)
    .bind(&sections.resources)
    .bind(&sections.obstacles)
    .bind(&sections.success_metrics)
    .bind(completion_percentage)
    .fetch_optional(pool)
    .await
    .context("failed to update canvas sections")?;

    Ok(canvas)
}

/// Rename a canvas.
pub async fn rename_canvas(pool: &PgPool, id: Uuid, name: &str) -> Result<Option<Canvas>> {
    let canvas = sqlx::query_as::<_, Canvas>(
        "UPDATE canvases SET name = $2, updated_at = now() WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(name)
    .fetch_optional(pool)
    .await
    .context("failed to rename canvas")?;

    Ok(canvas)
}

/// Set `position = index` for each id of the owner in one statement.
/// Returns the number of canvases updated.
pub async fn set_canvas_positions(
    pool: &PgPool,
    owner_id: &str,
    ordered_ids: &[Uuid],
) -> Result<u64> {
    let result = sqlx::query(
        "UPDATE canvases c \
         SET position = wanted.position - 1, updated_at = now() \
         FROM unnest($2::uuid[]) WITH ORDINALITY AS wanted(id, position) \
         WHERE c.id = wanted.id AND c.owner_id = $1",
    )
    .bind(owner_id)
    .bind(ordered_ids)
    .execute(pool)
    .await
    .context("failed to reorder canvases")?;

    Ok(result.rows_affected())
}

/// Set or clear the linked plan unconditionally.
pub async fn set_canvas_plan(
    pool: &PgPool,
    id: Uuid,
    plan_id: Option<Uuid>,
) -> Result<Option<Canvas>> {
    let canvas = sqlx::query_as::<_, Canvas>(
        "UPDATE canvases SET plan_id = $2, updated_at = now() WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(plan_id)
    .fetch_optional(pool)
    .await
    .context("failed to set canvas plan")?;

    Ok(canvas)
}

/// Link a plan only if the canvas currently has none.
///
/// Returns `None` when the canvas is missing or already linked; callers
/// re-read the canvas to tell the two apart.
pub async fn link_canvas_plan_if_unlinked(
    pool: &PgPool,
    id: Uuid,
    plan_id: Uuid,
) -> Result<Option<Canvas>> {
    let canvas = sqlx::query_as::<_, Canvas>(
        "UPDATE canvases SET plan_id = $2, updated_at = now() \
         WHERE id = $1 AND plan_id IS NULL \
         RETURNING *",
    )
    .bind(id)
    .bind(plan_id)
    .fetch_optional(pool)
    .await
    .context("failed to link canvas plan")?;

    Ok(canvas)
}

/// Delete a canvas. The linked plan, if any, is left untouched.
pub async fn delete_canvas(pool: &PgPool, id: Uuid) -> Result<bool> {
    let result = sqlx::query("DELETE FROM canvases WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await
        .context("failed to delete canvas")?;

    Ok(result.rows_affected() > 0)
}
