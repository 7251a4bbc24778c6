//! Persistence seams.
//!
//! Services and the plan hook talk to storage only through these traits.
//! [`PgStore`] is the PostgreSQL implementation; tests substitute an
//! in-memory store with failure injection.
//!
//! The traits are object-safe so they can be shared as `Arc<dyn ...>`.

pub mod postgres;

use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use pathway_db::models::{
    Canvas, CanvasSections, Milestone, MilestonePatch, NewPlan, Plan, PlanDetailsPatch,
    PlanWithMilestones, SubmissionStatus,
};

pub use crate::error::{StoreError, StoreResult};
pub use postgres::PgStore;

/// Field-level milestone persistence. Performs no validation and no
/// cascading recomputation.
#[async_trait]
pub trait MilestoneStore: Send + Sync {
    /// Apply a partial update and return the stored record.
    async fn update_milestone(&self, id: Uuid, patch: &MilestonePatch) -> StoreResult<Milestone>;

    /// Write every `order_index` of the plan in one atomic operation,
    /// `order_index = position in ordered_ids`.
    ///
    /// Returns [`StoreError::Unsupported`] when the backend has no atomic
    /// primitive, and [`StoreError::InvalidOrdering`] when `ordered_ids` is
    /// not exactly the plan's milestones.
    async fn reorder_atomic(&self, plan_id: Uuid, ordered_ids: &[Uuid]) -> StoreResult<()>;

    /// Write one milestone's `order_index`.
    async fn set_order_index(
        &self,
        plan_id: Uuid,
        milestone_id: Uuid,
        order_index: i32,
    ) -> StoreResult<()>;
}

/// Plan metadata persistence plus bulk milestone creation.
#[async_trait]
pub trait PlanStore: Send + Sync {
    /// Insert the plan and its twelve seeded milestones as one unit. On
    /// failure no plan without milestones may remain listable.
    async fn create_plan(&self, new_plan: &NewPlan) -> StoreResult<PlanWithMilestones>;

    /// Plan with milestones sorted by `order_index`.
    async fn get_plan(&self, id: Uuid) -> StoreResult<PlanWithMilestones>;

    /// Owner's plans, newest first.
    async fn list_plans(&self, owner_id: &str) -> StoreResult<Vec<Plan>>;

    async fn update_plan_details(&self, id: Uuid, patch: &PlanDetailsPatch) -> StoreResult<Plan>;

    async fn set_submission_status(&self, id: Uuid, status: SubmissionStatus)
    -> StoreResult<Plan>;

    /// Delete milestones then the plan. Succeeds when nothing is left to
    /// delete.
    async fn delete_plan(&self, id: Uuid) -> StoreResult<()>;
}

/// Canvas persistence.
#[async_trait]
pub trait CanvasStore: Send + Sync {
    /// Insert a canvas; [`StoreError::Conflict`] when the owner already has
    /// `max_per_owner` canvases.
    async fn create_canvas(
        &self,
        owner_id: &str,
        name: &str,
        max_per_owner: usize,
    ) -> StoreResult<Canvas>;

    async fn get_canvas(&self, id: Uuid) -> StoreResult<Canvas>;

    /// Owner's canvases by position.
    async fn list_canvases(&self, owner_id: &str) -> StoreResult<Vec<Canvas>>;

    async fn update_sections(
        &self,
        id: Uuid,
        sections: &CanvasSections,
        completion_percentage: i32,
    ) -> StoreResult<Canvas>;

    async fn rename_canvas(&self, id: Uuid, name: &str) -> StoreResult<Canvas>;

    async fn set_positions(&self, owner_id: &str, ordered_ids: &[Uuid]) -> StoreResult<()>;

    /// Overwrite (or clear) the plan reference.
    async fn set_plan(&self, id: Uuid, plan_id: Option<Uuid>) -> StoreResult<Canvas>;

    /// Set the plan reference only if it is currently empty;
    /// [`StoreError::Conflict`] otherwise.
    async fn link_plan_if_unlinked(&self, id: Uuid, plan_id: Uuid) -> StoreResult<Canvas>;

    async fn delete_canvas(&self, id: Uuid) -> StoreResult<()>;
}

/// The three stores a session works against, usually backed by one
/// connection pool.
#[derive(Clone)]
pub struct Stores {
    pub plans: Arc<dyn PlanStore>,
    pub milestones: Arc<dyn MilestoneStore>,
    pub canvases: Arc<dyn CanvasStore>,
}

impl Stores {
    /// Use one backend for all three stores.
    pub fn from_backend<S>(backend: Arc<S>) -> Self
    where
        S: PlanStore + MilestoneStore + CanvasStore + 'static,
    {
        Self {
            plans: backend.clone(),
            milestones: backend.clone(),
            canvases: backend,
        }
    }
}

// Compile-time assertion: the store traits must be object-safe.
const _: () = {
    fn _assert_object_safe(_: &dyn MilestoneStore, _: &dyn PlanStore, _: &dyn CanvasStore) {}
};
