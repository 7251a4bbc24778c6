//! Canvas to plan linkage.
//!
//! A canvas references at most one plan. The guard
//! ([`CanvasPlanLinker::can_create_plan_for_canvas`]) is advisory for the
//! raw link operation, which overwrites. Creating a plan from a canvas uses
//! a conditional link instead, so two concurrent creations cannot both
//! leave a plan linked.

use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{info, warn};
use uuid::Uuid;

use pathway_db::models::{Canvas, PlanWithMilestones};

use crate::error::{StoreError, SyncError, SyncResult};
use crate::plan;
use crate::store::{CanvasStore, PlanStore, Stores};

/// Linkage state of one canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Linkage {
    Unlinked,
    Linked(Uuid),
}

impl Linkage {
    pub fn of(canvas: &Canvas) -> Self {
        canvas.plan_id.map_or(Self::Unlinked, Self::Linked)
    }
}

pub struct CanvasPlanLinker {
    canvases: Arc<dyn CanvasStore>,
    plans: Arc<dyn PlanStore>,
}

impl CanvasPlanLinker {
    pub fn new(stores: &Stores) -> Self {
        Self {
            canvases: stores.canvases.clone(),
            plans: stores.plans.clone(),
        }
    }

    pub async fn linkage(&self, canvas_id: Uuid) -> SyncResult<Linkage> {
        let canvas = self.canvases.get_canvas(canvas_id).await?;
        Ok(Linkage::of(&canvas))
    }

    /// False when the canvas already references a plan.
    pub async fn can_create_plan_for_canvas(&self, canvas_id: Uuid) -> SyncResult<bool> {
        Ok(self.linkage(canvas_id).await? == Linkage::Unlinked)
    }

    /// Set the canvas's plan reference. An existing reference is
    /// overwritten; callers check [`Self::can_create_plan_for_canvas`]
    /// first.
    pub async fn link_canvas_to_plan(&self, canvas_id: Uuid, plan_id: Uuid) -> SyncResult<Canvas> {
        let previous = self.canvases.get_canvas(canvas_id).await?.plan_id;
        let canvas = self.canvases.set_plan(canvas_id, Some(plan_id)).await?;
        match previous {
            Some(old) if old != plan_id => {
                warn!(%canvas_id, old_plan_id = %old, %plan_id, "canvas link overwritten");
            }
            _ => info!(%canvas_id, %plan_id, "canvas linked to plan"),
        }
        Ok(canvas)
    }

    /// Clear the canvas's plan reference. The plan itself is untouched.
    pub async fn unlink_canvas_from_plan(&self, canvas_id: Uuid) -> SyncResult<Canvas> {
        let canvas = self.canvases.set_plan(canvas_id, None).await?;
        info!(%canvas_id, "canvas unlinked");
        Ok(canvas)
    }

    /// Create a plan titled after the canvas and link it.
    ///
    /// Fails with [`SyncError::AlreadyLinked`] when the canvas already has
    /// a plan, whether seen by the guard or by the conditional link. In the
    /// second case the plan created here is deleted again.
    pub async fn create_plan_for_canvas(
        &self,
        owner_id: &str,
        canvas_id: Uuid,
        start_date: NaiveDate,
    ) -> SyncResult<PlanWithMilestones> {
        let canvas = self.canvases.get_canvas(canvas_id).await?;
        if let Some(plan_id) = canvas.plan_id {
            return Err(SyncError::AlreadyLinked { canvas_id, plan_id });
        }

        let created =
            plan::create_plan(self.plans.as_ref(), owner_id, &canvas.name, start_date).await?;
        let plan_id = created.plan.id;

        match self.canvases.link_plan_if_unlinked(canvas_id, plan_id).await {
            Ok(_) => {
                info!(%canvas_id, %plan_id, "plan created from canvas");
                Ok(created)
            }
            Err(StoreError::Conflict(_)) => {
                warn!(%canvas_id, %plan_id, "canvas linked concurrently; deleting new plan");
                self.plans.delete_plan(plan_id).await?;
                let winner = self.canvases.get_canvas(canvas_id).await?.plan_id;
                Err(SyncError::AlreadyLinked {
                    canvas_id,
                    plan_id: winner.unwrap_or(plan_id),
                })
            }
            Err(err) => {
                // The canvas vanished or the link failed; do not leave an
                // unreferenced plan behind.
                warn!(%canvas_id, %plan_id, error = %err, "link failed; deleting new plan");
                if let Err(cleanup) = self.plans.delete_plan(plan_id).await {
                    warn!(%plan_id, error = %cleanup, "compensating plan delete failed");
                }
                Err(err.into())
            }
        }
    }
}
