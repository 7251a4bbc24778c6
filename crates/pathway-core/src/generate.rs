//! Seam for the external AI milestone generation service.

use async_trait::async_trait;
use uuid::Uuid;

use pathway_db::models::CanvasSections;

/// Writes goal text into the twelve existing milestones of a plan.
///
/// Contract: once `generate` returns `Ok`, re-reading the plan yields the
/// generated goals. Failures are surfaced to the user unchanged; the core
/// never retries.
#[async_trait]
pub trait MilestoneGenerator: Send + Sync {
    async fn generate(&self, plan_id: Uuid, sections: &CanvasSections) -> anyhow::Result<()>;
}

const _: () = {
    fn _assert_object_safe(_: &dyn MilestoneGenerator) {}
};
