//! Reorder coordinator.
//!
//! Persists a full new ordering of a plan's milestones. The primary path is
//! the store's atomic primitive, so readers never see a half-applied order.
//! When the store lacks that primitive, the ordering is checked against the
//! plan's stored milestones and then every `order_index` is written with
//! an independent concurrent update; failures are collected into a
//! [`PartialReorderFailure`] and successful writes are kept. Callers must
//! re-read the plan after a fallback failure.
//!
//! Only `order_index` is touched. Week numbers, goals and statuses are not.

use std::collections::HashSet;
use std::sync::Arc;

use futures::future::join_all;
use tracing::{info, warn};
use uuid::Uuid;

use pathway_db::models::MILESTONES_PER_PLAN;

use crate::error::{PartialReorderFailure, StoreError, SyncResult, ValidationError};
use crate::store::{MilestoneStore, PlanStore, Stores};

/// Which path applied a reorder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReorderPath {
    Atomic,
    Fallback,
}

/// Check that an ordering names exactly [`MILESTONES_PER_PLAN`] distinct
/// milestones. Membership in the plan needs a read and is checked by
/// [`ReorderCoordinator`].
pub fn validate_ordering(ordered_ids: &[Uuid]) -> Result<(), ValidationError> {
    if ordered_ids.len() != MILESTONES_PER_PLAN {
        return Err(ValidationError::InvalidOrdering(format!(
            "expected {MILESTONES_PER_PLAN} milestones, got {}",
            ordered_ids.len()
        )));
    }
    let mut seen = HashSet::with_capacity(ordered_ids.len());
    if let Some(dup) = ordered_ids.iter().find(|id| !seen.insert(**id)) {
        return Err(ValidationError::InvalidOrdering(format!(
            "milestone {dup} appears more than once"
        )));
    }
    Ok(())
}

/// Applies full orderings through a [`MilestoneStore`].
#[derive(Clone)]
pub struct ReorderCoordinator {
    milestones: Arc<dyn MilestoneStore>,
    plans: Arc<dyn PlanStore>,
}

impl ReorderCoordinator {
    pub fn new(stores: &Stores) -> Self {
        Self {
            milestones: stores.milestones.clone(),
            plans: stores.plans.clone(),
        }
    }

    /// Assign `order_index = position` for every id in `ordered_ids`.
    ///
    /// Malformed orderings are rejected before any store call. An ordering
    /// naming a milestone of another plan is a validation error on both
    /// paths and writes nothing.
    pub async fn reorder(&self, plan_id: Uuid, ordered_ids: &[Uuid]) -> SyncResult<ReorderPath> {
        validate_ordering(ordered_ids)?;

        match self.milestones.reorder_atomic(plan_id, ordered_ids).await {
            Ok(()) => {
                info!(%plan_id, "milestones reordered atomically");
                Ok(ReorderPath::Atomic)
            }
            Err(StoreError::Unsupported(primitive)) => {
                warn!(
                    %plan_id,
                    primitive,
                    "atomic reorder unavailable; writing positions individually"
                );
                self.check_membership(plan_id, ordered_ids).await?;
                self.reorder_individually(plan_id, ordered_ids).await?;
                Ok(ReorderPath::Fallback)
            }
            Err(err) => Err(err.into()),
        }
    }

    /// The individual writes cannot reject a foreign id as a whole, so the
    /// plan is read first.
    async fn check_membership(&self, plan_id: Uuid, ordered_ids: &[Uuid]) -> SyncResult<()> {
        let plan = self.plans.get_plan(plan_id).await?;
        let owned: HashSet<Uuid> = plan.milestones.iter().map(|m| m.id).collect();
        if owned.len() != ordered_ids.len() {
            return Err(ValidationError::InvalidOrdering(format!(
                "plan {plan_id} has {} milestones, ordering lists {}",
                owned.len(),
                ordered_ids.len()
            ))
            .into());
        }
        if let Some(foreign) = ordered_ids.iter().find(|id| !owned.contains(*id)) {
            return Err(ValidationError::InvalidOrdering(format!(
                "milestone {foreign} does not belong to plan {plan_id}"
            ))
            .into());
        }
        Ok(())
    }

    async fn reorder_individually(
        &self,
        plan_id: Uuid,
        ordered_ids: &[Uuid],
    ) -> Result<(), PartialReorderFailure> {
        let writes = ordered_ids.iter().enumerate().map(|(position, id)| {
            let store = self.milestones.clone();
            async move {
                let result = store.set_order_index(plan_id, *id, position as i32).await;
                (*id, result)
            }
        });

        let mut failed = Vec::new();
        let mut first_error = None;
        for (id, result) in join_all(writes).await {
            if let Err(err) = result {
                first_error.get_or_insert_with(|| err.to_string());
                failed.push(id);
            }
        }

        match first_error {
            None => {
                info!(%plan_id, "milestones reordered via individual writes");
                Ok(())
            }
            Some(first_error) => {
                warn!(
                    %plan_id,
                    failed = failed.len(),
                    attempted = ordered_ids.len(),
                    first_error = %first_error,
                    "partial reorder failure; successful writes kept"
                );
                Err(PartialReorderFailure {
                    plan_id,
                    attempted: ordered_ids.len(),
                    failed,
                    first_error,
                })
            }
        }
    }
}
