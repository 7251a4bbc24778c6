//! Debounced canvas saving.
//!
//! Each edit cancels the pending timer and starts a new one. Only the
//! sections present when a timer finally expires are written, so edits
//! superseded within the idle window never reach the store.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

use pathway_db::models::{Canvas, CanvasSection, CanvasSections};

use crate::error::{Failure, SyncResult};
use crate::store::CanvasStore;

struct Pending {
    generation: u64,
    sections: CanvasSections,
    cancel: CancellationToken,
}

#[derive(Default)]
struct AutosaveState {
    /// Sections as last edited, saved or not.
    local: CanvasSections,
    pending: Option<Pending>,
    generation: u64,
    last_saved: Option<Canvas>,
    last_error: Option<Failure>,
}

struct Shared {
    canvas_id: Uuid,
    store: Arc<dyn CanvasStore>,
    state: Mutex<AutosaveState>,
    /// Serializes store writes so an older write cannot land last.
    write_lock: Mutex<()>,
}

/// Cancel-and-restart autosave for one canvas's sections.
pub struct CanvasAutosave {
    idle: Duration,
    shared: Arc<Shared>,
}

impl CanvasAutosave {
    /// Start from the canvas as last read.
    pub fn new(canvas: &Canvas, store: Arc<dyn CanvasStore>, idle: Duration) -> Self {
        let state = AutosaveState {
            local: canvas.sections.clone(),
            ..AutosaveState::default()
        };
        Self {
            idle,
            shared: Arc::new(Shared {
                canvas_id: canvas.id,
                store,
                state: Mutex::new(state),
                write_lock: Mutex::new(()),
            }),
        }
    }

    pub fn canvas_id(&self) -> Uuid {
        self.shared.canvas_id
    }

    /// Replace all sections and restart the idle timer.
    pub async fn edit(&self, sections: CanvasSections) {
        let mut state = self.shared.state.lock().await;
        state.local = sections;
        self.schedule(&mut state);
    }

    /// Change one section and restart the idle timer.
    pub async fn edit_section(&self, section: CanvasSection, text: impl Into<String>) {
        let mut state = self.shared.state.lock().await;
        state.local.set(section, text);
        self.schedule(&mut state);
    }

    /// Write the pending sections now. Returns `Ok(None)` when nothing is
    /// pending.
    pub async fn flush(&self) -> SyncResult<Option<Canvas>> {
        write_pending(&self.shared, None).await
    }

    /// Whether an edit is waiting for its timer.
    pub async fn pending(&self) -> bool {
        self.shared.state.lock().await.pending.is_some()
    }

    /// Sections as currently edited, including unsaved changes.
    pub async fn local_sections(&self) -> CanvasSections {
        self.shared.state.lock().await.local.clone()
    }

    pub async fn last_saved(&self) -> Option<Canvas> {
        self.shared.state.lock().await.last_saved.clone()
    }

    pub async fn last_error(&self) -> Option<Failure> {
        self.shared.state.lock().await.last_error.clone()
    }

    fn schedule(&self, state: &mut AutosaveState) {
        if let Some(previous) = state.pending.take() {
            previous.cancel.cancel();
        }
        state.generation += 1;
        let generation = state.generation;
        let cancel = CancellationToken::new();
        state.pending = Some(Pending {
            generation,
            sections: state.local.clone(),
            cancel: cancel.clone(),
        });

        let shared = self.shared.clone();
        let idle = self.idle;
        tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {}
                _ = tokio::time::sleep(idle) => {
                    // Failures are recorded in `last_error`.
                    let _ = write_pending(&shared, Some(generation)).await;
                }
            }
        });
    }
}

/// Take the pending sections (if still the expected generation) and write
/// them.
async fn write_pending(shared: &Shared, generation: Option<u64>) -> SyncResult<Option<Canvas>> {
    let _write = shared.write_lock.lock().await;

    let pending = {
        let mut state = shared.state.lock().await;
        match &state.pending {
            Some(p) if generation.is_none_or(|g| g == p.generation) => state.pending.take(),
            _ => None,
        }
    };
    let Some(pending) = pending else {
        return Ok(None);
    };
    pending.cancel.cancel();

    let result =
        super::update_sections(shared.store.as_ref(), shared.canvas_id, &pending.sections).await;

    let mut state = shared.state.lock().await;
    match &result {
        Ok(canvas) => {
            debug!(
                canvas_id = %shared.canvas_id,
                completion = canvas.completion_percentage,
                "canvas autosaved"
            );
            state.last_saved = Some(canvas.clone());
            state.last_error = None;
        }
        Err(err) => state.last_error = Some(Failure::from(err)),
    }
    result.map(Some)
}
