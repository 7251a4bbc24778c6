//! In-memory implementation of the store traits.
//!
//! Behaves like the PostgreSQL store for the cases the core relies on
//! (not-found, conditional link, canvas limit, dangling plan references
//! cleared on delete) and adds knobs for tests:
//!
//! - call counting per operation (`calls`, `total_calls`);
//! - failing the next call of a named operation (`fail_next`);
//! - failing the N-th per-milestone `order_index` write
//!   (`fail_order_update_at`);
//! - disabling the atomic reorder primitive (`set_atomic_reorder`);
//! - failing milestone insertion during plan creation
//!   (`fail_milestone_insert`), which triggers a compensating plan delete;
//! - holding calls of an operation until the test releases them (`gate`).

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::anyhow;
use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Semaphore;
use uuid::Uuid;

use pathway_core::error::{Entity, StoreError, StoreResult};
use pathway_core::store::{CanvasStore, MilestoneStore, PlanStore};
use pathway_db::models::{
    Canvas, CanvasSections, MAX_GOAL_CHARS, Milestone, MilestonePatch, MilestoneStatus, NewPlan,
    Plan, PlanDetailsPatch, PlanWithMilestones, SubmissionStatus, milestone_seeds,
};

#[derive(Default)]
struct Inner {
    plans: HashMap<Uuid, Plan>,
    /// Plan ids in insertion order.
    plan_order: Vec<Uuid>,
    milestones: HashMap<Uuid, Milestone>,
    canvases: HashMap<Uuid, Canvas>,

    calls: HashMap<&'static str, usize>,
    fail_next: HashSet<&'static str>,
    order_updates: usize,
    fail_order_update_at: Option<usize>,
    fail_milestone_insert: bool,
    gates: HashMap<&'static str, Arc<Semaphore>>,
}

impl Inner {
    fn milestones_of(&self, plan_id: Uuid) -> Vec<Milestone> {
        let mut rows: Vec<Milestone> = self
            .milestones
            .values()
            .filter(|m| m.plan_id == plan_id)
            .cloned()
            .collect();
        rows.sort_by_key(|m| (m.order_index, m.week_number));
        rows
    }

    fn remove_plan(&mut self, id: Uuid) -> bool {
        self.milestones.retain(|_, m| m.plan_id != id);
        let removed = self.plans.remove(&id).is_some();
        self.plan_order.retain(|p| *p != id);
        for plan in self.plans.values_mut() {
            if plan.parent_plan_id == Some(id) {
                plan.parent_plan_id = None;
            }
        }
        for canvas in self.canvases.values_mut() {
            if canvas.plan_id == Some(id) {
                canvas.plan_id = None;
            }
        }
        removed
    }

    fn canvas_mut(&mut self, id: Uuid) -> StoreResult<&mut Canvas> {
        self.canvases
            .get_mut(&id)
            .ok_or(StoreError::not_found(Entity::Canvas, id))
    }

    fn check_plan_ref(&self, plan_id: Option<Uuid>) -> StoreResult<()> {
        match plan_id {
            Some(id) if !self.plans.contains_key(&id) => Err(StoreError::Transport(anyhow!(
                "canvases.plan_id references missing plan {id}"
            ))),
            _ => Ok(()),
        }
    }
}

fn injected(op: &str) -> StoreError {
    StoreError::Transport(anyhow!("injected failure in {op}"))
}

/// In-memory plans, milestones and canvases with failure injection.
pub struct MemoryStore {
    inner: Mutex<Inner>,
    atomic_reorder: AtomicBool,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            atomic_reorder: AtomicBool::new(true),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().expect("memory store lock poisoned")
    }

    /// Count the call, apply `fail_next`, then wait on the operation's gate
    /// if one is installed. Everything before the gate runs on the first
    /// poll, so concurrent callers are counted in poll order.
    async fn enter(&self, op: &'static str) -> StoreResult<()> {
        let gate = {
            let mut inner = self.lock();
            *inner.calls.entry(op).or_default() += 1;
            if inner.fail_next.remove(op) {
                return Err(injected(op));
            }
            inner.gates.get(op).cloned()
        };
        if let Some(gate) = gate {
            gate.acquire()
                .await
                .map_err(|e| StoreError::Transport(anyhow!(e)))?
                .forget();
        }
        Ok(())
    }

    // -- knobs ------------------------------------------------------------

    /// Make the next call of `op` (a trait method name) fail with a
    /// transport error.
    pub fn fail_next(&self, op: &'static str) {
        self.lock().fail_next.insert(op);
    }

    /// Fail the `n`-th (1-based) `set_order_index` call from now on.
    pub fn fail_order_update_at(&self, n: usize) {
        let mut inner = self.lock();
        inner.order_updates = 0;
        inner.fail_order_update_at = Some(n);
    }

    /// Enable or disable the atomic reorder primitive.
    pub fn set_atomic_reorder(&self, enabled: bool) {
        self.atomic_reorder.store(enabled, Ordering::SeqCst);
    }

    /// Fail milestone insertion on the next `create_plan`.
    pub fn fail_milestone_insert(&self) {
        self.lock().fail_milestone_insert = true;
    }

    /// Hold every call of `op` until a permit is added to the returned
    /// semaphore. Each permit releases one call.
    pub fn gate(&self, op: &'static str) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        self.lock().gates.insert(op, gate.clone());
        gate
    }

    /// Remove the gate on `op`. Calls already waiting stay blocked until
    /// released through the semaphore.
    pub fn ungate(&self, op: &'static str) {
        self.lock().gates.remove(op);
    }

    // -- inspection -------------------------------------------------------

    pub fn calls(&self, op: &str) -> usize {
        self.lock().calls.get(op).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.lock().calls.values().sum()
    }

    pub fn reset_calls(&self) {
        self.lock().calls.clear();
    }

    pub fn plan_count(&self) -> usize {
        self.lock().plans.len()
    }

    pub fn milestone_count(&self) -> usize {
        self.lock().milestones.len()
    }

    /// Stored milestones of a plan, by `(order_index, week_number)`.
    pub fn stored_milestones(&self, plan_id: Uuid) -> Vec<Milestone> {
        self.lock().milestones_of(plan_id)
    }

    pub fn stored_canvas(&self, id: Uuid) -> Option<Canvas> {
        self.lock().canvases.get(&id).cloned()
    }

    /// Write a plan reference directly, bypassing counters and gates.
    pub fn force_canvas_plan(&self, canvas_id: Uuid, plan_id: Option<Uuid>) {
        if let Some(canvas) = self.lock().canvases.get_mut(&canvas_id) {
            canvas.plan_id = plan_id;
        }
    }
}

#[async_trait]
impl MilestoneStore for MemoryStore {
    async fn update_milestone(&self, id: Uuid, patch: &MilestonePatch) -> StoreResult<Milestone> {
        self.enter("update_milestone").await?;
        let mut inner = self.lock();
        let row = inner
            .milestones
            .get_mut(&id)
            .ok_or(StoreError::not_found(Entity::Milestone, id))?;
        if let Some(goal) = &patch.goal {
            if goal.chars().count() > MAX_GOAL_CHARS {
                return Err(StoreError::Transport(anyhow!(
                    "milestones_goal_check violated"
                )));
            }
            row.goal = goal.clone();
        }
        if let Some(notes) = &patch.notes {
            row.notes = notes.clone();
        }
        if let Some(status) = patch.status {
            row.status = status;
        }
        if let Some(order_index) = patch.order_index {
            row.order_index = order_index;
        }
        row.updated_at = Utc::now();
        Ok(row.clone())
    }

    async fn reorder_atomic(&self, plan_id: Uuid, ordered_ids: &[Uuid]) -> StoreResult<()> {
        self.enter("reorder_atomic").await?;
        if !self.atomic_reorder.load(Ordering::SeqCst) {
            return Err(StoreError::Unsupported("reorder_milestones"));
        }
        let mut inner = self.lock();
        if !inner.plans.contains_key(&plan_id) {
            return Err(StoreError::not_found(Entity::Plan, plan_id));
        }
        let current: HashSet<Uuid> = inner.milestones_of(plan_id).iter().map(|m| m.id).collect();
        let requested: HashSet<Uuid> = ordered_ids.iter().copied().collect();
        if current != requested || requested.len() != ordered_ids.len() {
            return Err(StoreError::InvalidOrdering(format!(
                "ordering does not list each milestone of plan {plan_id} exactly once"
            )));
        }
        let now = Utc::now();
        for (position, id) in ordered_ids.iter().enumerate() {
            if let Some(row) = inner.milestones.get_mut(id) {
                row.order_index = position as i32;
                row.updated_at = now;
            }
        }
        Ok(())
    }

    async fn set_order_index(
        &self,
        plan_id: Uuid,
        milestone_id: Uuid,
        order_index: i32,
    ) -> StoreResult<()> {
        {
            let mut inner = self.lock();
            inner.order_updates += 1;
            if inner.fail_order_update_at == Some(inner.order_updates) {
                *inner.calls.entry("set_order_index").or_default() += 1;
                return Err(injected("set_order_index"));
            }
        }
        self.enter("set_order_index").await?;
        let mut inner = self.lock();
        match inner.milestones.get_mut(&milestone_id) {
            Some(row) if row.plan_id == plan_id => {
                row.order_index = order_index;
                row.updated_at = Utc::now();
                Ok(())
            }
            _ => Err(StoreError::not_found(Entity::Milestone, milestone_id)),
        }
    }
}

#[async_trait]
impl PlanStore for MemoryStore {
    async fn create_plan(&self, new_plan: &NewPlan) -> StoreResult<PlanWithMilestones> {
        self.enter("create_plan").await?;
        let mut inner = self.lock();
        if let Some(parent) = new_plan.parent_plan_id {
            if !inner.plans.contains_key(&parent) {
                return Err(StoreError::Transport(anyhow!(
                    "plans.parent_plan_id references missing plan {parent}"
                )));
            }
        }

        let now = Utc::now();
        let plan = Plan {
            id: Uuid::new_v4(),
            owner_id: new_plan.owner_id.clone(),
            title: new_plan.title.clone(),
            start_date: new_plan.start_date,
            end_date: new_plan.end_date,
            submission_status: SubmissionStatus::Draft,
            parent_plan_id: new_plan.parent_plan_id,
            created_at: now,
            updated_at: now,
        };
        inner.plans.insert(plan.id, plan.clone());
        inner.plan_order.push(plan.id);

        // Milestones are a second step here; undo the plan if it fails.
        if std::mem::take(&mut inner.fail_milestone_insert) {
            inner.remove_plan(plan.id);
            return Err(StoreError::Transport(anyhow!(
                "injected failure inserting milestones"
            )));
        }

        let milestones: Vec<Milestone> = milestone_seeds()
            .map(|(week_number, order_index)| Milestone {
                id: Uuid::new_v4(),
                plan_id: plan.id,
                week_number,
                order_index,
                goal: String::new(),
                notes: String::new(),
                status: MilestoneStatus::NotStarted,
                updated_at: now,
            })
            .collect();
        for m in &milestones {
            inner.milestones.insert(m.id, m.clone());
        }
        Ok(PlanWithMilestones { plan, milestones })
    }

    async fn get_plan(&self, id: Uuid) -> StoreResult<PlanWithMilestones> {
        self.enter("get_plan").await?;
        let inner = self.lock();
        let plan = inner
            .plans
            .get(&id)
            .cloned()
            .ok_or(StoreError::not_found(Entity::Plan, id))?;
        Ok(PlanWithMilestones {
            plan,
            milestones: inner.milestones_of(id),
        })
    }

    async fn list_plans(&self, owner_id: &str) -> StoreResult<Vec<Plan>> {
        self.enter("list_plans").await?;
        let inner = self.lock();
        Ok(inner
            .plan_order
            .iter()
            .rev()
            .filter_map(|id| inner.plans.get(id))
            .filter(|p| p.owner_id == owner_id)
            .cloned()
            .collect())
    }

    async fn update_plan_details(&self, id: Uuid, patch: &PlanDetailsPatch) -> StoreResult<Plan> {
        self.enter("update_plan_details").await?;
        let mut inner = self.lock();
        let plan = inner
            .plans
            .get_mut(&id)
            .ok_or(StoreError::not_found(Entity::Plan, id))?;
        if let Some(title) = &patch.title {
            plan.title = title.clone();
        }
        if let Some((start, end)) = patch.dates {
            plan.start_date = start;
            plan.end_date = end;
        }
        plan.updated_at = Utc::now();
        Ok(plan.clone())
    }

    async fn set_submission_status(
        &self,
        id: Uuid,
        status: SubmissionStatus,
    ) -> StoreResult<Plan> {
        self.enter("set_submission_status").await?;
        let mut inner = self.lock();
        let plan = inner
            .plans
            .get_mut(&id)
            .ok_or(StoreError::not_found(Entity::Plan, id))?;
        plan.submission_status = status;
        plan.updated_at = Utc::now();
        Ok(plan.clone())
    }

    async fn delete_plan(&self, id: Uuid) -> StoreResult<()> {
        self.enter("delete_plan").await?;
        self.lock().remove_plan(id);
        Ok(())
    }
}

#[async_trait]
impl CanvasStore for MemoryStore {
    async fn create_canvas(
        &self,
        owner_id: &str,
        name: &str,
        max_per_owner: usize,
    ) -> StoreResult<Canvas> {
        self.enter("create_canvas").await?;
        let mut inner = self.lock();
        let owned: Vec<&Canvas> = inner
            .canvases
            .values()
            .filter(|c| c.owner_id == owner_id)
            .collect();
        if owned.len() >= max_per_owner {
            return Err(StoreError::Conflict(format!(
                "owner {owner_id} has {max_per_owner} canvases"
            )));
        }
        let position = owned.iter().map(|c| c.position + 1).max().unwrap_or(0);
        let now = Utc::now();
        let canvas = Canvas {
            id: Uuid::new_v4(),
            owner_id: owner_id.to_owned(),
            name: name.to_owned(),
            position,
            sections: CanvasSections::default(),
            completion_percentage: 0,
            plan_id: None,
            created_at: now,
            updated_at: now,
        };
        inner.canvases.insert(canvas.id, canvas.clone());
        Ok(canvas)
    }

    async fn get_canvas(&self, id: Uuid) -> StoreResult<Canvas> {
        self.enter("get_canvas").await?;
        self.lock()
            .canvases
            .get(&id)
            .cloned()
            .ok_or(StoreError::not_found(Entity::Canvas, id))
    }

    async fn list_canvases(&self, owner_id: &str) -> StoreResult<Vec<Canvas>> {
        self.enter("list_canvases").await?;
        let mut canvases: Vec<Canvas> = self
            .lock()
            .canvases
            .values()
            .filter(|c| c.owner_id == owner_id)
            .cloned()
            .collect();
        canvases.sort_by_key(|c| (c.position, c.created_at));
        Ok(canvases)
    }

    async fn update_sections(
        &self,
        id: Uuid,
        sections: &CanvasSections,
        completion_percentage: i32,
    ) -> StoreResult<Canvas> {
        self.enter("update_sections").await?;
        let mut inner = self.lock();
        let canvas = inner.canvas_mut(id)?;
        canvas.sections = sections.clone();
        canvas.completion_percentage = completion_percentage;
        canvas.updated_at = Utc::now();
        Ok(canvas.clone())
    }

    async fn rename_canvas(&self, id: Uuid, name: &str) -> StoreResult<Canvas> {
        self.enter("rename_canvas").await?;
        let mut inner = self.lock();
        let canvas = inner.canvas_mut(id)?;
        canvas.name = name.to_owned();
        canvas.updated_at = Utc::now();
        Ok(canvas.clone())
    }

    async fn set_positions(&self, owner_id: &str, ordered_ids: &[Uuid]) -> StoreResult<()> {
        self.enter("set_positions").await?;
        let mut inner = self.lock();
        for (position, id) in ordered_ids.iter().enumerate() {
            match inner.canvases.get_mut(id) {
                Some(canvas) if canvas.owner_id == owner_id => canvas.position = position as i32,
                _ => {}
            }
        }
        Ok(())
    }

    async fn set_plan(&self, id: Uuid, plan_id: Option<Uuid>) -> StoreResult<Canvas> {
        self.enter("set_plan").await?;
        let mut inner = self.lock();
        inner.check_plan_ref(plan_id)?;
        let canvas = inner.canvas_mut(id)?;
        canvas.plan_id = plan_id;
        canvas.updated_at = Utc::now();
        Ok(canvas.clone())
    }

    async fn link_plan_if_unlinked(&self, id: Uuid, plan_id: Uuid) -> StoreResult<Canvas> {
        self.enter("link_plan_if_unlinked").await?;
        let mut inner = self.lock();
        inner.check_plan_ref(Some(plan_id))?;
        let canvas = inner.canvas_mut(id)?;
        if let Some(existing) = canvas.plan_id {
            return Err(StoreError::Conflict(format!(
                "canvas {id} is already linked to plan {existing}"
            )));
        }
        canvas.plan_id = Some(plan_id);
        canvas.updated_at = Utc::now();
        Ok(canvas.clone())
    }

    async fn delete_canvas(&self, id: Uuid) -> StoreResult<()> {
        self.enter("delete_canvas").await?;
        self.lock().canvases.remove(&id);
        Ok(())
    }
}
