//! Canvas service: creation under the per-owner limit, section edits with
//! a derived completion percentage, renaming, ordering and deletion.

pub mod autosave;

use std::collections::HashSet;

use tracing::info;
use uuid::Uuid;

use pathway_db::models::{CANVAS_SECTION_COUNT, Canvas, CanvasSection, CanvasSections};

use crate::config::SyncConfig;
use crate::error::{StoreError, SyncError, SyncResult, ValidationError};
use crate::store::CanvasStore;

pub use autosave::CanvasAutosave;

/// `round(100 * filled_sections / 9)`.
pub fn completion_percentage(sections: &CanvasSections) -> i32 {
    let filled = sections.filled_count() as f64;
    (filled * 100.0 / CANVAS_SECTION_COUNT as f64).round() as i32
}

fn validate_name(name: &str) -> Result<String, ValidationError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::CanvasNameEmpty);
    }
    Ok(trimmed.to_owned())
}

/// Create an empty canvas, failing with
/// [`SyncError::CanvasLimitReached`] once the owner holds the maximum.
pub async fn create_canvas(
    store: &dyn CanvasStore,
    owner_id: &str,
    name: &str,
    config: &SyncConfig,
) -> SyncResult<Canvas> {
    let name = validate_name(name)?;
    let max = config.max_canvases_per_owner;
    match store.create_canvas(owner_id, &name, max).await {
        Ok(canvas) => {
            info!(canvas_id = %canvas.id, owner_id, "canvas created");
            Ok(canvas)
        }
        Err(StoreError::Conflict(_)) => Err(SyncError::CanvasLimitReached {
            owner_id: owner_id.to_owned(),
            max,
        }),
        Err(err) => Err(err.into()),
    }
}

pub async fn get_canvas(store: &dyn CanvasStore, canvas_id: Uuid) -> SyncResult<Canvas> {
    Ok(store.get_canvas(canvas_id).await?)
}

pub async fn list_canvases(store: &dyn CanvasStore, owner_id: &str) -> SyncResult<Vec<Canvas>> {
    Ok(store.list_canvases(owner_id).await?)
}

/// Write all sections. The completion percentage is always recomputed
/// here from the sections being written.
pub async fn update_sections(
    store: &dyn CanvasStore,
    canvas_id: Uuid,
    sections: &CanvasSections,
) -> SyncResult<Canvas> {
    let completion = completion_percentage(sections);
    Ok(store.update_sections(canvas_id, sections, completion).await?)
}

/// Change one section, keeping the others as currently stored.
pub async fn update_section(
    store: &dyn CanvasStore,
    canvas_id: Uuid,
    section: CanvasSection,
    text: &str,
) -> SyncResult<Canvas> {
    let mut sections = store.get_canvas(canvas_id).await?.sections;
    sections.set(section, text);
    update_sections(store, canvas_id, &sections).await
}

pub async fn rename_canvas(
    store: &dyn CanvasStore,
    canvas_id: Uuid,
    name: &str,
) -> SyncResult<Canvas> {
    let name = validate_name(name)?;
    Ok(store.rename_canvas(canvas_id, &name).await?)
}

/// Put the owner's canvases in the given order. The ids must be exactly
/// the owner's canvases.
pub async fn reorder_canvases(
    store: &dyn CanvasStore,
    owner_id: &str,
    ordered_ids: &[Uuid],
) -> SyncResult<Vec<Canvas>> {
    let current: HashSet<Uuid> = store
        .list_canvases(owner_id)
        .await?
        .into_iter()
        .map(|c| c.id)
        .collect();
    let requested: HashSet<Uuid> = ordered_ids.iter().copied().collect();
    if requested.len() != ordered_ids.len() || requested != current {
        return Err(ValidationError::InvalidOrdering(format!(
            "canvas ordering must list each of the owner's {} canvases exactly once",
            current.len()
        ))
        .into());
    }
    store.set_positions(owner_id, ordered_ids).await?;
    Ok(store.list_canvases(owner_id).await?)
}

/// Delete a canvas. A linked plan is not deleted or modified.
pub async fn delete_canvas(store: &dyn CanvasStore, canvas_id: Uuid) -> SyncResult<()> {
    store.delete_canvas(canvas_id).await?;
    info!(%canvas_id, "canvas deleted");
    Ok(())
}
