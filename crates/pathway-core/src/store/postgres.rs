//! PostgreSQL-backed stores built on `pathway_db::queries`.

use anyhow::anyhow;
use async_trait::async_trait;
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

use pathway_db::models::{
    Canvas, CanvasSections, Milestone, MilestonePatch, NewPlan, Plan, PlanDetailsPatch,
    PlanWithMilestones, SubmissionStatus,
};
use pathway_db::queries::milestones::{self as milestone_db, sqlstate};
use pathway_db::queries::{canvases as canvas_db, plans as plan_db};

use super::{CanvasStore, MilestoneStore, PlanStore};
use crate::error::{Entity, StoreError, StoreResult};

/// All three stores over one connection pool.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn found<T>(row: Option<T>, entity: Entity, id: Uuid) -> StoreResult<T> {
    row.ok_or(StoreError::NotFound { entity, id })
}

#[async_trait]
impl MilestoneStore for PgStore {
    async fn update_milestone(&self, id: Uuid, patch: &MilestonePatch) -> StoreResult<Milestone> {
        let row = milestone_db::update_milestone(&self.pool, id, patch).await?;
        found(row, Entity::Milestone, id)
    }

    async fn reorder_atomic(&self, plan_id: Uuid, ordered_ids: &[Uuid]) -> StoreResult<()> {
        match milestone_db::reorder_milestones(&self.pool, plan_id, ordered_ids).await {
            Ok(()) => Ok(()),
            Err(err) => match sqlstate(&err).as_deref() {
                Some(milestone_db::UNDEFINED_FUNCTION) => {
                    debug!(%plan_id, "reorder_milestones function is not installed");
                    Err(StoreError::Unsupported("reorder_milestones"))
                }
                Some(milestone_db::PLAN_NOT_FOUND) => {
                    Err(StoreError::not_found(Entity::Plan, plan_id))
                }
                Some(milestone_db::INVALID_ORDERING) => Err(StoreError::InvalidOrdering(
                    format!("ordering does not list each milestone of plan {plan_id} exactly once"),
                )),
                _ => Err(StoreError::Transport(err)),
            },
        }
    }

    async fn set_order_index(
        &self,
        plan_id: Uuid,
        milestone_id: Uuid,
        order_index: i32,
    ) -> StoreResult<()> {
        let updated =
            milestone_db::set_order_index(&self.pool, plan_id, milestone_id, order_index).await?;
        if updated {
            Ok(())
        } else {
            Err(StoreError::not_found(Entity::Milestone, milestone_id))
        }
    }
}

#[async_trait]
impl PlanStore for PgStore {
    async fn create_plan(&self, new_plan: &NewPlan) -> StoreResult<PlanWithMilestones> {
        Ok(plan_db::create_plan_with_milestones(&self.pool, new_plan).await?)
    }

    async fn get_plan(&self, id: Uuid) -> StoreResult<PlanWithMilestones> {
        let row = plan_db::get_plan_with_milestones(&self.pool, id).await?;
        found(row, Entity::Plan, id)
    }

    async fn list_plans(&self, owner_id: &str) -> StoreResult<Vec<Plan>> {
        Ok(plan_db::list_plans_for_owner(&self.pool, owner_id).await?)
    }

    async fn update_plan_details(&self, id: Uuid, patch: &PlanDetailsPatch) -> StoreResult<Plan> {
        let row = plan_db::update_plan_details(&self.pool, id, patch).await?;
        found(row, Entity::Plan, id)
    }

    async fn set_submission_status(
        &self,
        id: Uuid,
        status: SubmissionStatus,
    ) -> StoreResult<Plan> {
        let row = plan_db::set_submission_status(&self.pool, id, status).await?;
        found(row, Entity::Plan, id)
    }

    async fn delete_plan(&self, id: Uuid) -> StoreResult<()> {
        let removed = plan_db::delete_plan(&self.pool, id).await?;
        if !removed {
            debug!(plan_id = %id, "delete_plan: no plan row to remove");
        }
        Ok(())
    }
}

#[async_trait]
impl CanvasStore for PgStore {
    async fn create_canvas(
        &self,
        owner_id: &str,
        name: &str,
        max_per_owner: usize,
    ) -> StoreResult<Canvas> {
        let max = i64::try_from(max_per_owner).map_err(|e| anyhow!(e))?;
        canvas_db::insert_canvas(&self.pool, owner_id, name, max)
            .await?
            .ok_or_else(|| {
                StoreError::Conflict(format!("owner {owner_id} has {max_per_owner} canvases"))
            })
    }

    async fn get_canvas(&self, id: Uuid) -> StoreResult<Canvas> {
        let row = canvas_db::get_canvas(&self.pool, id).await?;
        found(row, Entity::Canvas, id)
    }

    async fn list_canvases(&self, owner_id: &str) -> StoreResult<Vec<Canvas>> {
        Ok(canvas_db::list_canvases_for_owner(&self.pool, owner_id).await?)
    }

    async fn update_sections(
        &self,
        id: Uuid,
        sections: &CanvasSections,
        completion_percentage: i32,
    ) -> StoreResult<Canvas> {
        let row =
            canvas_db::update_canvas_sections(&self.pool, id, sections, completion_percentage)
                .await?;
        found(row, Entity::Canvas, id)
    }

    async fn rename_canvas(&self, id: Uuid, name: &str) -> StoreResult<Canvas> {
        let row = canvas_db::rename_canvas(&self.pool, id, name).await?;
        found(row, Entity::Canvas, id)
    }

    async fn set_positions(&self, owner_id: &str, ordered_ids: &[Uuid]) -> StoreResult<()> {
        canvas_db::set_canvas_positions(&self.pool, owner_id, ordered_ids).await?;
        Ok(())
    }

    async fn set_plan(&self, id: Uuid, plan_id: Option<Uuid>) -> StoreResult<Canvas> {
        let row = canvas_db::set_canvas_plan(&self.pool, id, plan_id).await?;
        found(row, Entity::Canvas, id)
    }

    async fn link_plan_if_unlinked(&self, id: Uuid, plan_id: Uuid) -> StoreResult<Canvas> {
        if let Some(canvas) =
            canvas_db::link_canvas_plan_if_unlinked(&self.pool, id, plan_id).await?
        {
            return Ok(canvas);
        }
        // Either the canvas is gone or another plan got there first.
        let existing = canvas_db::get_canvas(&self.pool, id).await?;
        match existing {
            None => Err(StoreError::not_found(Entity::Canvas, id)),
            Some(canvas) => Err(StoreError::Conflict(format!(
                "canvas {id} is already linked to plan {}",
                canvas.plan_id.map(|p| p.to_string()).unwrap_or_default()
            ))),
        }
    }

    async fn delete_canvas(&self, id: Uuid) -> StoreResult<()> {
        canvas_db::delete_canvas(&self.pool, id).await?;
        Ok(())
    }
}
