//! Plan synchronization hook.
//!
//! [`PlanSync`] is the single read/write entry point for one plan's
//! milestones. It holds two views:
//!
//! - the **confirmed** view: the last successful read from the store;
//! - the **working** copy: an optimistic milestone order set by `reorder`
//!   before the store confirms it.
//!
//! The two are reconciled only by refetching. Every mutation, successful
//! or not, ends with an invalidate-and-refetch, so a failed write can never
//! leave the working copy diverged from the store.
//!
//! Overlapping reorders: the newest one wins for local display. The working
//! copy is dropped once no reorder is in flight and a refetch lands. Each
//! refetch replaces the confirmed view as it arrives, so the last response
//! to arrive wins.

pub mod plan_list;

use std::collections::HashMap;
use std::sync::Arc;

use chrono::NaiveDate;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use pathway_db::models::{
    CanvasSections, Milestone, MilestonePatch, Plan, PlanWithMilestones, SubmissionStatus,
};

use crate::error::{Entity, Failure, SyncError, SyncResult, ValidationError};
use crate::generate::MilestoneGenerator;
use crate::milestone::{next_status, validate_patch};
use crate::plan::{self, PlanProgress};
use crate::reorder::{ReorderCoordinator, ReorderPath, validate_ordering};
use crate::store::{MilestoneStore, PlanStore, Stores};

pub use plan_list::PlanList;

/// What the UI renders: the plan, milestones in display order, and
/// loading / error flags.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncSnapshot {
    pub plan: Option<Plan>,
    pub milestones: Vec<Milestone>,
    pub loading: bool,
    pub stale: bool,
    pub reorder_pending: bool,
    pub error: Option<Failure>,
}

impl SyncSnapshot {
    pub fn progress(&self) -> PlanProgress {
        PlanProgress::from_milestones(&self.milestones)
    }
}

#[derive(Default)]
struct SyncState {
    confirmed: Option<PlanWithMilestones>,
    working: Option<Vec<Milestone>>,
    fetches_in_flight: usize,
    reorders_in_flight: usize,
    stale: bool,
    last_error: Option<Failure>,
}

impl SyncState {
    fn view(&self) -> Option<&[Milestone]> {
        self.working
            .as_deref()
            .or_else(|| self.confirmed.as_ref().map(|c| c.milestones.as_slice()))
    }

    fn find(&self, milestone_id: Uuid) -> Option<&Milestone> {
        self.view()?.iter().find(|m| m.id == milestone_id)
    }
}

/// Rearrange `view` into `ordered_ids` order with `order_index` set to the
/// new positions. Every id must belong to the plan.
fn arrange(view: &[Milestone], ordered_ids: &[Uuid], plan_id: Uuid) -> SyncResult<Vec<Milestone>> {
    let by_id: HashMap<Uuid, &Milestone> = view.iter().map(|m| (m.id, m)).collect();
    ordered_ids
        .iter()
        .enumerate()
        .map(|(position, id)| {
            let milestone = by_id.get(id).ok_or_else(|| {
                ValidationError::InvalidOrdering(format!(
                    "milestone {id} does not belong to plan {plan_id}"
                ))
            })?;
            Ok(Milestone {
                order_index: position as i32,
                ..(*milestone).clone()
            })
        })
        .collect()
}

/// Optimistic, refetch-reconciled access to one plan.
pub struct PlanSync {
    plan_id: Uuid,
    plans: Arc<dyn PlanStore>,
    milestones: Arc<dyn MilestoneStore>,
    reorderer: ReorderCoordinator,
    plan_list: Option<Arc<PlanList>>,
    state: Mutex<SyncState>,
}

impl PlanSync {
    pub fn new(plan_id: Uuid, stores: &Stores) -> Self {
        Self {
            plan_id,
            plans: stores.plans.clone(),
            milestones: stores.milestones.clone(),
            reorderer: ReorderCoordinator::new(stores),
            plan_list: None,
            state: Mutex::new(SyncState::default()),
        }
    }

    /// Attach the owner's plan list so plan-level mutations invalidate it.
    pub fn with_plan_list(mut self, plan_list: Arc<PlanList>) -> Self {
        self.plan_list = Some(plan_list);
        self
    }

    pub fn plan_id(&self) -> Uuid {
        self.plan_id
    }

    // -------------------------------------------------------------------
    // Reads
    // -------------------------------------------------------------------

    pub async fn snapshot(&self) -> SyncSnapshot {
        let state = self.state.lock().await;
        SyncSnapshot {
            plan: state.confirmed.as_ref().map(|c| c.plan.clone()),
            milestones: state.view().map(<[Milestone]>::to_vec).unwrap_or_default(),
            loading: state.fetches_in_flight > 0,
            stale: state.stale,
            reorder_pending: state.reorders_in_flight > 0,
            error: state.last_error.clone(),
        }
    }

    /// Milestones in display order (working copy if a reorder is pending).
    pub async fn milestones(&self) -> Vec<Milestone> {
        self.snapshot().await.milestones
    }

    /// Snapshot, refetching first if never loaded or invalidated.
    pub async fn read(&self) -> SyncResult<SyncSnapshot> {
        let needs_fetch = {
            let state = self.state.lock().await;
            state.stale || state.confirmed.is_none()
        };
        if needs_fetch {
            self.refetch().await?;
        }
        Ok(self.snapshot().await)
    }

    /// Mark the confirmed view stale.
    pub async fn invalidate(&self) {
        self.state.lock().await.stale = true;
    }

    /// Read the plan from the store and replace the confirmed view.
    pub async fn refetch(&self) -> SyncResult<PlanWithMilestones> {
        self.state.lock().await.fetches_in_flight += 1;
        let result = self.plans.get_plan(self.plan_id).await;

        let mut state = self.state.lock().await;
        state.fetches_in_flight -= 1;
        match result {
            Ok(fresh) => {
                debug!(plan_id = %self.plan_id, "plan refetched");
                state.confirmed = Some(fresh.clone());
                state.stale = false;
                if state.reorders_in_flight == 0 {
                    state.working = None;
                }
                Ok(fresh)
            }
            Err(err) => {
                let err = SyncError::from(err);
                if matches!(err, SyncError::NotFound { .. }) {
                    state.confirmed = None;
                    state.working = None;
                    state.stale = false;
                }
                state.last_error = Some(Failure::from(&err));
                Err(err)
            }
        }
    }

    // -------------------------------------------------------------------
    // Milestone mutations
    // -------------------------------------------------------------------

    /// Persist a partial milestone update, then refetch.
    ///
    /// Nothing in the local view changes before the store answers. Invalid
    /// input is rejected without any store call.
    pub async fn update_field(
        &self,
        milestone_id: Uuid,
        patch: MilestonePatch,
    ) -> SyncResult<Milestone> {
        self.begin_mutation(|state| {
            validate_patch(&patch)?;
            if state.view().is_some() && state.find(milestone_id).is_none() {
                return Err(SyncError::not_found(Entity::Milestone, milestone_id));
            }
            Ok(())
        })
        .await?;

        let result = self
            .milestones
            .update_milestone(milestone_id, &patch)
            .await
            .map_err(SyncError::from);
        self.settle(result).await
    }

    /// Cycle a milestone's status (`not_started -> in_progress ->
    /// completed -> not_started`) from its locally known value.
    pub async fn toggle_status(&self, milestone_id: Uuid) -> SyncResult<Milestone> {
        let current = {
            let state = self.state.lock().await;
            state.find(milestone_id).map(|m| m.status)
        };
        let Some(current) = current else {
            let err = SyncError::not_found(Entity::Milestone, milestone_id);
            self.record(&err).await;
            return Err(err);
        };
        self.update_field(milestone_id, MilestonePatch::status(next_status(current)))
            .await
    }

    /// Show `ordered_ids` immediately, persist it through the reorder
    /// coordinator, then refetch.
    ///
    /// On failure the working copy is dropped and the canonical order is
    /// refetched rather than restored from memory, since a fallback reorder
    /// may have partly applied.
    pub async fn reorder(&self, ordered_ids: Vec<Uuid>) -> SyncResult<ReorderPath> {
        self.begin_mutation(|state| {
            validate_ordering(&ordered_ids)?;
            if let Some(view) = state.view() {
                let working = arrange(view, &ordered_ids, self.plan_id)?;
                state.working = Some(working);
            }
            state.reorders_in_flight += 1;
            Ok(())
        })
        .await?;

        let result = self.reorderer.reorder(self.plan_id, &ordered_ids).await;
        {
            let mut state = self.state.lock().await;
            state.reorders_in_flight = state.reorders_in_flight.saturating_sub(1);
            // A rejected order must not outlive a refetch that also fails.
            if result.is_err() && state.reorders_in_flight == 0 {
                state.working = None;
            }
        }
        if let Err(SyncError::PartialReorder(failure)) = &result {
            warn!(
                plan_id = %self.plan_id,
                failed = failure.failed.len(),
                "resynchronizing after partial reorder"
            );
        }
        self.settle(result).await
    }

    /// Run the external generator for this plan, then refetch so the
    /// generated goals appear. Generator failures are returned unchanged.
    pub async fn generate_milestones(
        &self,
        generator: &dyn MilestoneGenerator,
        sections: &CanvasSections,
    ) -> SyncResult<PlanWithMilestones> {
        self.begin_mutation(|_| Ok(())).await?;
        let result = generator
            .generate(self.plan_id, sections)
            .await
            .map_err(SyncError::Transport);
        self.settle(result).await?;
        info!(plan_id = %self.plan_id, "milestones generated");

        let state = self.state.lock().await;
        state
            .confirmed
            .clone()
            .ok_or_else(|| SyncError::not_found(Entity::Plan, self.plan_id))
    }

    // -------------------------------------------------------------------
    // Plan mutations
    // -------------------------------------------------------------------

    /// Create a plan that follows this one. Invalidates the owner's plan
    /// list on success.
    pub async fn create_continuation(&self, title: &str) -> SyncResult<PlanWithMilestones> {
        self.begin_mutation(|_| Ok(())).await?;
        let owner_id = match self.owner_id().await {
            Some(owner) => owner,
            None => self.refetch().await?.plan.owner_id,
        };
        let result =
            plan::create_continuation(self.plans.as_ref(), &owner_id, self.plan_id, title).await;
        match result {
            Ok(created) => {
                self.invalidate_plan_list().await;
                Ok(created)
            }
            Err(err) => {
                self.record(&err).await;
                Err(err)
            }
        }
    }

    /// Change the title and/or start date (end date follows).
    pub async fn update_details(
        &self,
        title: Option<&str>,
        start_date: Option<NaiveDate>,
    ) -> SyncResult<Plan> {
        self.begin_mutation(|_| Ok(())).await?;
        let result =
            plan::update_plan_details(self.plans.as_ref(), self.plan_id, title, start_date).await;
        let plan = self.settle(result).await?;
        self.invalidate_plan_list().await;
        Ok(plan)
    }

    pub async fn set_submission_status(&self, status: SubmissionStatus) -> SyncResult<Plan> {
        self.begin_mutation(|_| Ok(())).await?;
        let result =
            plan::set_submission_status(self.plans.as_ref(), self.plan_id, status).await;
        let plan = self.settle(result).await?;
        self.invalidate_plan_list().await;
        Ok(plan)
    }

    /// Delete the plan and its milestones and clear local state.
    pub async fn delete(&self) -> SyncResult<()> {
        self.begin_mutation(|_| Ok(())).await?;
        match plan::delete_plan(self.plans.as_ref(), self.plan_id).await {
            Ok(()) => {
                let mut state = self.state.lock().await;
                state.confirmed = None;
                state.working = None;
                state.stale = false;
                drop(state);
                self.invalidate_plan_list().await;
                Ok(())
            }
            Err(err) => {
                self.record(&err).await;
                Err(err)
            }
        }
    }

    // -------------------------------------------------------------------
    // Internals
    // -------------------------------------------------------------------

    /// Clear the previous error and run local checks under the state lock.
    /// A failed check is recorded and returned before any store call.
    async fn begin_mutation<F>(&self, check: F) -> SyncResult<()>
    where
        F: FnOnce(&mut SyncState) -> SyncResult<()>,
    {
        let mut state = self.state.lock().await;
        state.last_error = None;
        if let Err(err) = check(&mut state) {
            state.last_error = Some(Failure::from(&err));
            return Err(err);
        }
        Ok(())
    }

    /// Invalidate and refetch after a store call, whatever its outcome.
    /// The mutation's own error takes precedence over a refetch error.
    async fn settle<T>(&self, result: SyncResult<T>) -> SyncResult<T> {
        self.invalidate().await;
        let refetched = self.refetch().await;
        match result {
            Ok(value) => {
                if let Err(err) = refetched {
                    debug!(plan_id = %self.plan_id, error = %err, "refetch after mutation failed");
                }
                Ok(value)
            }
            Err(err) => {
                self.record(&err).await;
                Err(err)
            }
        }
    }

    async fn record(&self, err: &SyncError) {
        self.state.lock().await.last_error = Some(Failure::from(err));
    }

    async fn owner_id(&self) -> Option<String> {
        let state = self.state.lock().await;
        state.confirmed.as_ref().map(|c| c.plan.owner_id.clone())
    }

    async fn invalidate_plan_list(&self) {
        if let Some(list) = &self.plan_list {
            list.invalidate().await;
        }
    }
}
