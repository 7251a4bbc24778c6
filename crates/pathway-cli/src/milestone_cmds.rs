//! CLI handlers for `pathway milestone` subcommands.
//!
//! Milestones are addressed within a plan by UUID or week number (`w5`).
//! Every handler loads the plan through [`PlanSync`], so edits are validated
//! locally before anything is written and the printed result comes from a
//! refetch.

use anyhow::{Result, bail};
use uuid::Uuid;

use pathway_core::error::SyncError;
use pathway_core::reorder::ReorderPath;
use pathway_core::store::Stores;
use pathway_core::sync::PlanSync;
use pathway_db::models::{Milestone, MilestonePatch, MilestoneStatus};

use crate::MilestoneCommands;
use crate::resolve::{parse_id, resolve_milestone, resolve_ordering};

/// Dispatch a `MilestoneCommands` variant to the appropriate handler.
pub async fn run_milestone_command(command: MilestoneCommands, stores: &Stores) -> Result<()> {
    match command {
        MilestoneCommands::Edit {
            plan_id,
            milestone,
            goal,
            notes,
            status,
        } => {
            let patch = MilestonePatch {
                goal,
                notes,
                status: status.as_deref().map(str::parse).transpose()?,
                order_index: None,
            };
            cmd_edit(stores, parse_id("plan", &plan_id)?, &milestone, patch).await?;
            Ok(())
        }
        MilestoneCommands::Toggle { plan_id, milestone } => {
            cmd_toggle(stores, parse_id("plan", &plan_id)?, &milestone).await?;
            Ok(())
        }
        MilestoneCommands::Reorder { plan_id, order } => {
            cmd_reorder(stores, parse_id("plan", &plan_id)?, &order).await?;
            Ok(())
        }
    }
}

async fn load(stores: &Stores, plan_id: Uuid) -> Result<(PlanSync, Vec<Milestone>)> {
    let sync = PlanSync::new(plan_id, stores);
    let snapshot = sync.read().await?;
    Ok((sync, snapshot.milestones))
}

pub(crate) async fn cmd_edit(
    stores: &Stores,
    plan_id: Uuid,
    milestone: &str,
    patch: MilestonePatch,
) -> Result<Milestone> {
    if patch.is_empty() {
        bail!("nothing to update; pass --goal, --notes or --status");
    }
    let (sync, milestones) = load(stores, plan_id).await?;
    let id = resolve_milestone(&milestones, milestone)?;

    let updated = sync.update_field(id, patch).await?;
    println!(
        "Week {} updated: [{}] {}",
        updated.week_number, updated.status, updated.goal
    );
    Ok(updated)
}

pub(crate) async fn cmd_toggle(
    stores: &Stores,
    plan_id: Uuid,
    milestone: &str,
) -> Result<MilestoneStatus> {
    let (sync, milestones) = load(stores, plan_id).await?;
    let id = resolve_milestone(&milestones, milestone)?;

    let updated = sync.toggle_status(id).await?;
    println!("Week {} is now {}.", updated.week_number, updated.status);
    Ok(updated.status)
}

pub(crate) async fn cmd_reorder(
    stores: &Stores,
    plan_id: Uuid,
    order: &[String],
) -> Result<ReorderPath> {
    let (sync, milestones) = load(stores, plan_id).await?;
    let ordered = resolve_ordering(&milestones, order)?;

    let result = sync.reorder(ordered).await;
    let current = sync.milestones().await;
    match result {
        Ok(path) => {
            let path_name = match path {
                ReorderPath::Atomic => "atomic",
                ReorderPath::Fallback => "per-milestone fallback",
            };
            println!("Milestones reordered ({path_name}).");
            print_order(&current);
            Ok(path)
        }
        Err(SyncError::PartialReorder(failure)) => {
            tracing::warn!(
                %plan_id,
                failed = failure.failed.len(),
                attempted = failure.attempted,
                "position writes failed; showing the stored order"
            );
            print_order(&current);
            Err(SyncError::PartialReorder(failure).into())
        }
        Err(err) => Err(err.into()),
    }
}

fn print_order(milestones: &[Milestone]) {
    let weeks: Vec<String> = milestones
        .iter()
        .map(|m| format!("w{}", m.week_number))
        .collect();
    println!("  Order: {}", weeks.join(" "));
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use pathway_core::plan;
    use pathway_db::models::PlanWithMilestones;
    use pathway_test_utils::{MemoryStore, memory_stores};
    use std::sync::Arc;

    async fn seeded() -> (Arc<MemoryStore>, Stores, PlanWithMilestones) {
        let (backend, stores) = memory_stores();
        let created = plan::create_plan(
            stores.plans.as_ref(),
            "owner-1",
            "CLI",
            NaiveDate::from_ymd_opt(2025, 1, 6).unwrap(),
        )
        .await
        .unwrap();
        (backend, stores, created)
    }

    fn weeks(order: &[&str]) -> Vec<String> {
        order.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn edit_by_week_number() {
        let (_backend, stores, created) = seeded().await;
        let updated = cmd_edit(
            &stores,
            created.plan.id,
            "w3",
            MilestonePatch::goal("Pair with the on-call lead"),
        )
        .await
        .unwrap();
        assert_eq!(updated.week_number, 3);
        assert_eq!(updated.goal, "Pair with the on-call lead");
    }

    #[tokio::test]
    async fn edit_without_fields_is_rejected_before_store() {
        let (backend, stores, created) = seeded().await;
        backend.reset_calls();
        let err = cmd_edit(&stores, created.plan.id, "w3", MilestonePatch::default())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("nothing to update"));
        assert_eq!(backend.total_calls(), 0);
    }

    #[tokio::test]
    async fn overlong_goal_never_reaches_store() {
        let (backend, stores, created) = seeded().await;
        backend.reset_calls();
        let err = cmd_edit(&stores, created.plan.id, "1", MilestonePatch::goal("g".repeat(250)))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("250 characters"), "{err}");
        assert_eq!(backend.calls("update_milestone"), 0);
    }

    #[tokio::test]
    async fn toggle_cycles_status() {
        let (_backend, stores, created) = seeded().await;
        let id = created.plan.id;
        assert_eq!(cmd_toggle(&stores, id, "w1").await.unwrap(), MilestoneStatus::InProgress);
        assert_eq!(cmd_toggle(&stores, id, "w1").await.unwrap(), MilestoneStatus::Completed);
        assert_eq!(cmd_toggle(&stores, id, "w1").await.unwrap(), MilestoneStatus::NotStarted);
    }

    #[tokio::test]
    async fn reorder_by_week_numbers() {
        let (backend, stores, created) = seeded().await;
        let order = weeks(&["w5", "w1", "w3", "w2", "w4", "6", "7", "8", "9", "10", "11", "12"]);
        let path = cmd_reorder(&stores, created.plan.id, &order).await.unwrap();
        assert_eq!(path, ReorderPath::Atomic);

        let stored: Vec<i32> = backend
            .stored_milestones(created.plan.id)
            .iter()
            .map(|m| m.week_number)
            .collect();
        assert_eq!(stored, vec![5, 1, 3, 2, 4, 6, 7, 8, 9, 10, 11, 12]);
    }

    #[tokio::test]
    async fn incomplete_reorder_is_rejected() {
        let (backend, stores, created) = seeded().await;
        backend.reset_calls();
        let err = cmd_reorder(&stores, created.plan.id, &weeks(&["w2", "w1"]))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("invalid milestone ordering"), "{err}");
        assert_eq!(backend.calls("reorder_atomic"), 0);
    }

    #[tokio::test]
    async fn partial_reorder_is_reported_as_error() {
        let (backend, stores, created) = seeded().await;
        backend.set_atomic_reorder(false);
        backend.fail_order_update_at(2);
        let order: Vec<String> = (1..=12).rev().map(|w| format!("w{w}")).collect();

        let err = cmd_reorder(&stores, created.plan.id, &order).await.unwrap_err();
        let sync_err = err.downcast_ref::<SyncError>().expect("sync error");
        assert!(matches!(sync_err, SyncError::PartialReorder(_)));
    }
}
