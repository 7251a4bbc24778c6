use std::sync::Arc;

use chrono::NaiveDate;
use tokio::sync::Mutex;
use tracing::debug;

use pathway_db::models::{Plan, PlanWithMilestones};

use crate::error::SyncResult;
use crate::plan;
use crate::store::PlanStore;

/// Cached list of one owner's plans.
///
/// Mutations that add or remove plans call [`PlanList::invalidate`]; the
/// next [`PlanList::plans`] call refetches.
pub struct PlanList {
    owner_id: String,
    store: Arc<dyn PlanStore>,
    state: Mutex<ListState>,
}

#[derive(Default)]
struct ListState {
    plans: Option<Vec<Plan>>,
    stale: bool,
}

impl PlanList {
    pub fn new(owner_id: impl Into<String>, store: Arc<dyn PlanStore>) -> Self {
        Self {
            owner_id: owner_id.into(),
            store,
            state: Mutex::new(ListState::default()),
        }
    }

    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    /// The cached list, fetched first if never loaded or invalidated.
    pub async fn plans(&self) -> SyncResult<Vec<Plan>> {
        {
            let state = self.state.lock().await;
            if let (Some(plans), false) = (&state.plans, state.stale) {
                return Ok(plans.clone());
            }
        }
        self.refetch().await
    }

    /// Fetch the list unconditionally and cache it.
    pub async fn refetch(&self) -> SyncResult<Vec<Plan>> {
        let plans = plan::list_plans(self.store.as_ref(), &self.owner_id).await?;
        debug!(owner_id = %self.owner_id, count = plans.len(), "plan list refetched");
        let mut state = self.state.lock().await;
        state.plans = Some(plans.clone());
        state.stale = false;
        Ok(plans)
    }

    /// Mark the cached list stale.
    pub async fn invalidate(&self) {
        self.state.lock().await.stale = true;
    }

    /// Whether the next read will hit the store.
    pub async fn is_stale(&self) -> bool {
        let state = self.state.lock().await;
        state.stale || state.plans.is_none()
    }

    /// Create a fresh plan for this owner and invalidate the list.
    pub async fn create_plan(
        &self,
        title: &str,
        start_date: NaiveDate,
    ) -> SyncResult<PlanWithMilestones> {
        let created =
            plan::create_plan(self.store.as_ref(), &self.owner_id, title, start_date).await?;
        self.invalidate().await;
        Ok(created)
    }
}
