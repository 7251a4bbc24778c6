//! CLI handlers for `pathway canvas` subcommands.
//!
//! Section edits go through [`CanvasAutosave`] and are flushed before the
//! command exits, so several `--set` pairs land in a single write.

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use uuid::Uuid;

use pathway_core::canvas::{self, CanvasAutosave};
use pathway_core::config::SyncConfig;
use pathway_core::linker::{CanvasPlanLinker, Linkage};
use pathway_core::store::Stores;
use pathway_db::models::{Canvas, CanvasSection, PlanWithMilestones};

use crate::CanvasCommands;
use crate::config::PathwayConfig;
use crate::resolve::{parse_date, parse_id, parse_section_assignment};

/// Dispatch a `CanvasCommands` variant to the appropriate handler.
pub async fn run_canvas_command(
    command: CanvasCommands,
    stores: &Stores,
    config: &PathwayConfig,
) -> Result<()> {
    let sync_config = SyncConfig::from_env();
    match command {
        CanvasCommands::Create { name } => {
            cmd_create(stores, config.user_id()?, &name, &sync_config).await?;
        }
        CanvasCommands::List => cmd_list(stores, config.user_id()?).await?,
        CanvasCommands::Show { canvas_id, json } => {
            cmd_show(stores, parse_id("canvas", &canvas_id)?, json).await?;
        }
        CanvasCommands::Edit { canvas_id, set } => {
            let edits = set
                .iter()
                .map(|s| parse_section_assignment(s))
                .collect::<Result<Vec<_>>>()?;
            cmd_edit(stores, parse_id("canvas", &canvas_id)?, edits, &sync_config).await?;
        }
        CanvasCommands::Rename { canvas_id, name } => {
            let renamed =
                canvas::rename_canvas(stores.canvases.as_ref(), parse_id("canvas", &canvas_id)?, &name)
                    .await?;
            println!("Canvas {} renamed to {:?}.", renamed.id, renamed.name);
        }
        CanvasCommands::Reorder { canvas_ids } => {
            let ids = canvas_ids
                .iter()
                .map(|id| parse_id("canvas", id))
                .collect::<Result<Vec<_>>>()?;
            cmd_reorder(stores, config.user_id()?, &ids).await?;
        }
        CanvasCommands::Link { canvas_id, plan_id } => {
            cmd_link(stores, parse_id("canvas", &canvas_id)?, parse_id("plan", &plan_id)?).await?;
        }
        CanvasCommands::Unlink { canvas_id } => {
            cmd_unlink(stores, parse_id("canvas", &canvas_id)?).await?;
        }
        CanvasCommands::Plan { canvas_id, start } => {
            let start = start.as_deref().map(parse_date).transpose()?;
            cmd_plan(stores, config.user_id()?, parse_id("canvas", &canvas_id)?, start).await?;
        }
        CanvasCommands::Delete { canvas_id } => {
            let id = parse_id("canvas", &canvas_id)?;
            canvas::delete_canvas(stores.canvases.as_ref(), id).await?;
            println!("Canvas {id} deleted.");
        }
    }
    Ok(())
}

pub(crate) async fn cmd_create(
    stores: &Stores,
    owner_id: &str,
    name: &str,
    sync_config: &SyncConfig,
) -> Result<Canvas> {
    let created = canvas::create_canvas(stores.canvases.as_ref(), owner_id, name, sync_config).await?;
    println!("Canvas created.");
    println!();
    print_canvas_header(&created);
    Ok(created)
}

pub(crate) async fn cmd_list(stores: &Stores, owner_id: &str) -> Result<()> {
    let canvases = canvas::list_canvases(stores.canvases.as_ref(), owner_id).await?;
    if canvases.is_empty() {
        println!("No canvases found. Use `pathway canvas create <name>` to create one.");
        return Ok(());
    }

    let id_w = 36;
    let name_w = canvases.iter().map(|c| c.name.len()).max().unwrap_or(4).max(4);
    println!("{:<id_w$}  {:<name_w$}  {:>8}  PLAN", "ID", "NAME", "COMPLETE");
    for c in &canvases {
        let plan = c.plan_id.map_or_else(|| "-".to_string(), |id| id.to_string());
        println!(
            "{:<id_w$}  {:<name_w$}  {:>7}%  {}",
            c.id, c.name, c.completion_percentage, plan
        );
    }
    Ok(())
}

pub(crate) async fn cmd_show(stores: &Stores, canvas_id: Uuid, json: bool) -> Result<()> {
    let c = canvas::get_canvas(stores.canvases.as_ref(), canvas_id).await?;
    if json {
        let text = serde_json::to_string_pretty(&c).context("failed to serialize canvas")?;
        println!("{text}");
        return Ok(());
    }

    println!("Canvas: {}", c.name);
    print_canvas_header(&c);
    println!();
    for section in CanvasSection::ALL {
        let text = c.sections.get(section).trim();
        println!("  {section}:");
        if text.is_empty() {
            println!("    (empty)");
        }
        for line in text.lines() {
            println!("    {line}");
        }
    }
    Ok(())
}

pub(crate) async fn cmd_edit(
    stores: &Stores,
    canvas_id: Uuid,
    edits: Vec<(CanvasSection, String)>,
    sync_config: &SyncConfig,
) -> Result<Canvas> {
    let current = canvas::get_canvas(stores.canvases.as_ref(), canvas_id).await?;
    let autosave = CanvasAutosave::new(&current, stores.canvases.clone(), sync_config.autosave_idle);
    for (section, text) in edits {
        autosave.edit_section(section, text).await;
    }

    let saved = match autosave.flush().await? {
        Some(saved) => saved,
        None => current,
    };
    println!(
        "Canvas {} saved; {}% complete.",
        saved.id, saved.completion_percentage
    );
    Ok(saved)
}

pub(crate) async fn cmd_reorder(stores: &Stores, owner_id: &str, ids: &[Uuid]) -> Result<()> {
    let reordered = canvas::reorder_canvases(stores.canvases.as_ref(), owner_id, ids).await?;
    println!("Canvases reordered.");
    for c in &reordered {
        println!("  {}. {}", c.position + 1, c.name);
    }
    Ok(())
}

pub(crate) async fn cmd_link(stores: &Stores, canvas_id: Uuid, plan_id: Uuid) -> Result<Canvas> {
    let linker = CanvasPlanLinker::new(stores);
    if let Linkage::Linked(existing) = linker.linkage(canvas_id).await? {
        if existing != plan_id {
            tracing::warn!(%canvas_id, replaced = %existing, "replacing existing plan link");
        }
    }
    let linked = linker.link_canvas_to_plan(canvas_id, plan_id).await?;
    println!("Canvas {canvas_id} linked to plan {plan_id}.");
    Ok(linked)
}

pub(crate) async fn cmd_unlink(stores: &Stores, canvas_id: Uuid) -> Result<Canvas> {
    let linker = CanvasPlanLinker::new(stores);
    let unlinked = linker.unlink_canvas_from_plan(canvas_id).await?;
    println!("Canvas {canvas_id} unlinked.");
    Ok(unlinked)
}

pub(crate) async fn cmd_plan(
    stores: &Stores,
    owner_id: &str,
    canvas_id: Uuid,
    start: Option<NaiveDate>,
) -> Result<PlanWithMilestones> {
    let linker = CanvasPlanLinker::new(stores);
    let start = start.unwrap_or_else(|| Utc::now().date_naive());
    let created = linker
        .create_plan_for_canvas(owner_id, canvas_id, start)
        .await?;
    tracing::debug!(plan_id = %created.plan.id, %canvas_id, "plan created from canvas");
    println!("Plan {} created from canvas {canvas_id}.", created.plan.id);
    println!("  Runs: {} to {}", created.plan.start_date, created.plan.end_date);
    Ok(created)
}

fn print_canvas_header(c: &Canvas) {
    println!("  Canvas ID:    {}", c.id);
    println!("  Name:         {}", c.name);
    println!("  Position:     {}", c.position + 1);
    println!("  Complete:     {}%", c.completion_percentage);
    match c.plan_id {
        Some(plan_id) => println!("  Plan:         {plan_id}"),
        None => println!("  Plan:         (none)"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pathway_core::error::{ErrorKind, SyncError};
    use pathway_test_utils::memory_stores;

    fn start() -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(2025, 1, 6)
    }

    #[tokio::test]
    async fn edit_applies_all_pairs_in_one_write() {
        let (backend, stores) = memory_stores();
        let config = SyncConfig::default();
        let c = cmd_create(&stores, "owner-1", "Staff", &config).await.unwrap();
        backend.reset_calls();

        let saved = cmd_edit(
            &stores,
            c.id,
            vec![
                (CanvasSection::TargetRole, "Staff engineer".to_string()),
                (CanvasSection::Motivation, "Wider scope".to_string()),
                (CanvasSection::Strengths, "Systems design".to_string()),
            ],
            &config,
        )
        .await
        .unwrap();
        assert_eq!(saved.completion_percentage, 33);
        assert_eq!(backend.calls("update_sections"), 1);
    }

    #[tokio::test]
    async fn edit_without_pairs_writes_nothing() {
        let (backend, stores) = memory_stores();
        let config = SyncConfig::default();
        let c = cmd_create(&stores, "owner-1", "Idle", &config).await.unwrap();
        backend.reset_calls();

        let saved = cmd_edit(&stores, c.id, Vec::new(), &config).await.unwrap();
        assert_eq!(saved, c);
        assert_eq!(backend.calls("update_sections"), 0);
    }

    #[tokio::test]
    async fn plan_from_canvas_then_refused() {
        let (backend, stores) = memory_stores();
        let c = cmd_create(&stores, "owner-1", "Manager", &SyncConfig::default())
            .await
            .unwrap();

        let created = cmd_plan(&stores, "owner-1", c.id, start()).await.unwrap();
        assert_eq!(created.plan.title, "Manager");

        let err = cmd_plan(&stores, "owner-1", c.id, start()).await.unwrap_err();
        let sync_err = err.downcast_ref::<SyncError>().expect("sync error");
        assert_eq!(sync_err.kind(), ErrorKind::AlreadyLinked);
        assert_eq!(backend.plan_count(), 1);
    }

    #[tokio::test]
    async fn link_then_unlink() {
        let (_backend, stores) = memory_stores();
        let c = cmd_create(&stores, "owner-1", "c", &SyncConfig::default())
            .await
            .unwrap();
        let created = cmd_plan(&stores, "owner-1", c.id, start()).await.unwrap();
        cmd_unlink(&stores, c.id).await.unwrap();

        let linked = cmd_link(&stores, c.id, created.plan.id).await.unwrap();
        assert_eq!(linked.plan_id, Some(created.plan.id));
    }

    #[tokio::test]
    async fn link_replaces_existing_plan() {
        let (backend, stores) = memory_stores();
        let c = cmd_create(&stores, "owner-1", "c", &SyncConfig::default())
            .await
            .unwrap();
        let first = cmd_plan(&stores, "owner-1", c.id, start()).await.unwrap();
        let second = pathway_core::plan::create_plan(
            stores.plans.as_ref(),
            "owner-1",
            "Second",
            start().unwrap(),
        )
        .await
        .unwrap();

        let linked = cmd_link(&stores, c.id, second.plan.id).await.unwrap();
        assert_eq!(linked.plan_id, Some(second.plan.id));
        assert_eq!(backend.plan_count(), 2, "{} is kept", first.plan.id);
    }

    #[tokio::test]
    async fn fourth_canvas_is_refused() {
        let (_backend, stores) = memory_stores();
        let config = SyncConfig::default();
        for name in ["a", "b", "c"] {
            cmd_create(&stores, "owner-1", name, &config).await.unwrap();
        }
        let err = cmd_create(&stores, "owner-1", "d", &config).await.unwrap_err();
        assert!(err.to_string().contains("maximum of 3"), "{err}");
    }
}
