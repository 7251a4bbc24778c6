//! CLI handlers for `pathway plan` subcommands.
//!
//! Implements:
//! - `pathway plan create <title> [--start DATE]` -- create a 12-week plan
//! - `pathway plan list`                        -- list the user's plans
//! - `pathway plan show <plan-id> [--json]`     -- plan details and milestones
//! - `pathway plan rename <plan-id> <title>`    -- change the title
//! - `pathway plan reschedule <plan-id> <date>` -- move the start date
//! - `pathway plan submit <plan-id> <status>`   -- set the submission status
//! - `pathway plan continue <plan-id> <title>`  -- create the follow-on plan
//! - `pathway plan delete <plan-id>`            -- delete plan and milestones

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use uuid::Uuid;

use pathway_core::store::Stores;
use pathway_core::sync::{PlanList, PlanSync, SyncSnapshot};
use pathway_db::models::{Plan, PlanWithMilestones, SubmissionStatus};

use crate::PlanCommands;
use crate::config::PathwayConfig;
use crate::resolve::{parse_date, parse_id};

// -----------------------------------------------------------------------
// Public entry point
// -----------------------------------------------------------------------

/// Dispatch a `PlanCommands` variant to the appropriate handler.
pub async fn run_plan_command(
    command: PlanCommands,
    stores: &Stores,
    config: &PathwayConfig,
) -> Result<()> {
    match command {
        PlanCommands::Create { title, start } => {
            let start = start.as_deref().map(parse_date).transpose()?;
            cmd_create(stores, config.user_id()?, &title, start).await?;
            Ok(())
        }
        PlanCommands::List => cmd_list(stores, config.user_id()?).await,
        PlanCommands::Show { plan_id, json } => {
            cmd_show(stores, parse_id("plan", &plan_id)?, json).await
        }
        PlanCommands::Rename { plan_id, title } => {
            cmd_rename(stores, parse_id("plan", &plan_id)?, &title).await?;
            Ok(())
        }
        PlanCommands::Reschedule { plan_id, start } => {
            cmd_reschedule(stores, parse_id("plan", &plan_id)?, parse_date(&start)?).await?;
            Ok(())
        }
        PlanCommands::Submit { plan_id, status } => {
            let status: SubmissionStatus = status.parse()?;
            cmd_submit(stores, parse_id("plan", &plan_id)?, status).await?;
            Ok(())
        }
        PlanCommands::Continue { plan_id, title } => {
            cmd_continue(stores, parse_id("plan", &plan_id)?, &title).await?;
            Ok(())
        }
        PlanCommands::Delete { plan_id } => cmd_delete(stores, parse_id("plan", &plan_id)?).await,
    }
}

// -----------------------------------------------------------------------
// Handlers
// -----------------------------------------------------------------------

pub(crate) async fn cmd_create(
    stores: &Stores,
    owner_id: &str,
    title: &str,
    start: Option<NaiveDate>,
) -> Result<PlanWithMilestones> {
    let start = start.unwrap_or_else(|| Utc::now().date_naive());
    let list = PlanList::new(owner_id, stores.plans.clone());
    let created = list.create_plan(title, start).await?;
    tracing::debug!(plan_id = %created.plan.id, %owner_id, "plan created");

    println!("Plan created.");
    println!();
    print_plan_header(&created.plan);
    println!("  Milestones:   {}", created.milestones.len());
    Ok(created)
}

pub(crate) async fn cmd_list(stores: &Stores, owner_id: &str) -> Result<()> {
    let list = PlanList::new(owner_id, stores.plans.clone());
    let plans = list.plans().await?;

    if plans.is_empty() {
        println!("No plans found. Use `pathway plan create <title>` to create one.");
        return Ok(());
    }

    let id_w = 36;
    let title_w = plans.iter().map(|p| p.title.len()).max().unwrap_or(5).max(5);
    let status_w = 12;

    println!(
        "{:<id_w$}  {:<title_w$}  {:<status_w$}  {:<10}  END",
        "ID", "TITLE", "STATUS", "START",
    );
    for plan in &plans {
        println!(
            "{:<id_w$}  {:<title_w$}  {:<status_w$}  {:<10}  {}",
            plan.id,
            plan.title,
            plan.submission_status.to_string(),
            plan.start_date,
            plan.end_date,
        );
    }
    Ok(())
}

pub(crate) async fn cmd_show(stores: &Stores, plan_id: Uuid, json: bool) -> Result<()> {
    let sync = PlanSync::new(plan_id, stores);
    let snapshot = sync.read().await?;

    if json {
        let out = serde_json::json!({
            "plan": snapshot.plan,
            "milestones": snapshot.milestones,
            "progress": snapshot.progress(),
        });
        let text = serde_json::to_string_pretty(&out).context("failed to serialize plan")?;
        println!("{text}");
        return Ok(());
    }

    print_snapshot(&snapshot);
    Ok(())
}

pub(crate) async fn cmd_rename(stores: &Stores, plan_id: Uuid, title: &str) -> Result<Plan> {
    let sync = PlanSync::new(plan_id, stores);
    let plan = sync.update_details(Some(title), None).await?;
    println!("Plan {} renamed to {:?}.", plan.id, plan.title);
    Ok(plan)
}

pub(crate) async fn cmd_reschedule(stores: &Stores, plan_id: Uuid, start: NaiveDate) -> Result<Plan> {
    let sync = PlanSync::new(plan_id, stores);
    let plan = sync.update_details(None, Some(start)).await?;
    println!(
        "Plan {} now runs {} to {}.",
        plan.id, plan.start_date, plan.end_date
    );
    Ok(plan)
}

pub(crate) async fn cmd_submit(
    stores: &Stores,
    plan_id: Uuid,
    status: SubmissionStatus,
) -> Result<Plan> {
    let sync = PlanSync::new(plan_id, stores);
    let plan = sync.set_submission_status(status).await?;
    println!("Plan {} is now {}.", plan.id, plan.submission_status);
    Ok(plan)
}

pub(crate) async fn cmd_continue(
    stores: &Stores,
    plan_id: Uuid,
    title: &str,
) -> Result<PlanWithMilestones> {
    let sync = PlanSync::new(plan_id, stores);
    let parent = sync.refetch().await?;
    let list = Arc::new(PlanList::new(parent.plan.owner_id.clone(), stores.plans.clone()));
    let sync = sync.with_plan_list(list);

    let created = sync.create_continuation(title).await?;
    println!("Continuation plan created.");
    println!();
    print_plan_header(&created.plan);
    Ok(created)
}

pub(crate) async fn cmd_delete(stores: &Stores, plan_id: Uuid) -> Result<()> {
    let sync = PlanSync::new(plan_id, stores);
    sync.delete().await?;
    tracing::debug!(%plan_id, "plan deleted");
    println!("Plan {plan_id} deleted.");
    Ok(())
}

// -----------------------------------------------------------------------
// Output
// -----------------------------------------------------------------------

fn print_plan_header(plan: &Plan) {
    println!("  Plan ID:      {}", plan.id);
    println!("  Title:        {}", plan.title);
    println!("  Status:       {}", plan.submission_status);
    println!("  Runs:         {} to {}", plan.start_date, plan.end_date);
    if let Some(parent) = plan.parent_plan_id {
        println!("  Continues:    {parent}");
    }
}

fn print_snapshot(snapshot: &SyncSnapshot) {
    if let Some(plan) = &snapshot.plan {
        println!("Plan: {}", plan.title);
        print_plan_header(plan);
        println!(
            "  Updated:      {}",
            plan.updated_at.format("%Y-%m-%d %H:%M:%S UTC")
        );
    }

    let progress = snapshot.progress();
    println!(
        "  Progress:     {}% ({} completed, {} in progress, {} not started)",
        progress.percent_complete(),
        progress.completed,
        progress.in_progress,
        progress.not_started,
    );

    if snapshot.milestones.is_empty() {
        return;
    }

    println!();
    println!("  {:>3}  {:>4}  {:<11}  GOAL", "POS", "WEEK", "STATUS");
    for m in &snapshot.milestones {
        println!(
            "  {:>3}  {:>4}  {:<11}  {}",
            m.order_index + 1,
            format!("w{}", m.week_number),
            m.status.to_string(),
            m.goal,
        );
        let notes = m.notes.trim();
        if !notes.is_empty() {
            for line in notes.lines().take(3) {
                println!("{:>26}{}", "", line);
            }
        }
    }
}

// -----------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use pathway_test_utils::memory_stores;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[tokio::test]
    async fn create_then_continue_chains_dates() {
        let (_backend, stores) = memory_stores();
        let created = cmd_create(&stores, "owner-1", "First", Some(date(2025, 1, 6)))
            .await
            .unwrap();

        let next = cmd_continue(&stores, created.plan.id, "Second").await.unwrap();
        assert_eq!(next.plan.owner_id, "owner-1");
        assert_eq!(next.plan.start_date, date(2025, 3, 31));
        assert_eq!(next.plan.parent_plan_id, Some(created.plan.id));
    }

    #[tokio::test]
    async fn create_defaults_start_to_today() {
        let (_backend, stores) = memory_stores();
        let created = cmd_create(&stores, "owner-1", "Today", None).await.unwrap();
        assert_eq!(created.plan.start_date, Utc::now().date_naive());
    }

    #[tokio::test]
    async fn rename_and_reschedule() {
        let (_backend, stores) = memory_stores();
        let created = cmd_create(&stores, "owner-1", "Old", Some(date(2025, 1, 6)))
            .await
            .unwrap();

        let renamed = cmd_rename(&stores, created.plan.id, "New").await.unwrap();
        assert_eq!(renamed.title, "New");
        assert!(cmd_rename(&stores, created.plan.id, " ").await.is_err());

        let moved = cmd_reschedule(&stores, created.plan.id, date(2025, 2, 3))
            .await
            .unwrap();
        assert_eq!(moved.end_date, date(2025, 4, 28));
    }

    #[tokio::test]
    async fn submit_sets_status() {
        let (_backend, stores) = memory_stores();
        let created = cmd_create(&stores, "owner-1", "Review", Some(date(2025, 1, 6)))
            .await
            .unwrap();
        let plan = cmd_submit(&stores, created.plan.id, SubmissionStatus::UnderReview)
            .await
            .unwrap();
        assert_eq!(plan.submission_status, SubmissionStatus::UnderReview);
    }

    #[tokio::test]
    async fn show_missing_plan_fails() {
        let (_backend, stores) = memory_stores();
        let err = cmd_show(&stores, Uuid::new_v4(), false).await.unwrap_err();
        assert!(err.to_string().contains("not found"), "{err}");
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let (backend, stores) = memory_stores();
        let created = cmd_create(&stores, "owner-1", "Gone", Some(date(2025, 1, 6)))
            .await
            .unwrap();
        cmd_delete(&stores, created.plan.id).await.unwrap();
        cmd_delete(&stores, created.plan.id).await.unwrap();
        assert_eq!(backend.plan_count(), 0);
    }
}
