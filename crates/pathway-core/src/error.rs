//! Error taxonomy for the synchronization core.
//!
//! [`StoreError`] is what a persistence backend reports. [`SyncError`] is
//! what services and the plan hook surface to callers.

use std::fmt;

use thiserror::Error;
use uuid::Uuid;

/// The kind of record an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Plan,
    Milestone,
    Canvas,
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Plan => "plan",
            Self::Milestone => "milestone",
            Self::Canvas => "canvas",
        })
    }
}

/// Failure reported by a store implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{entity} {id} not found")]
    NotFound { entity: Entity, id: Uuid },

    /// The backend lacks an optional primitive (the atomic reorder).
    #[error("operation not supported by this store: {0}")]
    Unsupported(&'static str),

    /// A conditional write found the row in an unexpected state.
    #[error("conflicting write: {0}")]
    Conflict(String),

    /// The backend rejected an ordering that does not list each milestone
    /// of the plan exactly once.
    #[error("invalid milestone ordering: {0}")]
    InvalidOrdering(String),

    #[error(transparent)]
    Transport(#[from] anyhow::Error),
}

impl StoreError {
    pub fn not_found(entity: Entity, id: Uuid) -> Self {
        Self::NotFound { entity, id }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Input rejected before anything reaches a store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("goal is {len} characters; the limit is {max}")]
    GoalTooLong { len: usize, max: usize },

    #[error("invalid milestone ordering: {0}")]
    InvalidOrdering(String),

    #[error("plan title must not be empty")]
    TitleEmpty,

    #[error("canvas name must not be empty")]
    CanvasNameEmpty,
}

/// Some of the per-milestone writes of a non-atomic reorder failed.
///
/// Writes that succeeded are not rolled back, so the stored order may match
/// neither the old nor the requested one.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error(
    "reorder of plan {plan_id} partially failed: {} of {attempted} writes failed (first: {first_error})",
    .failed.len()
)]
pub struct PartialReorderFailure {
    pub plan_id: Uuid,
    pub attempted: usize,
    /// Milestones whose write failed, in requested order.
    pub failed: Vec<Uuid>,
    pub first_error: String,
}

/// Error surfaced by services and the plan synchronization hook.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("{entity} {id} not found")]
    NotFound { entity: Entity, id: Uuid },

    #[error(transparent)]
    PartialReorder(#[from] PartialReorderFailure),

    #[error("canvas {canvas_id} is already linked to plan {plan_id}")]
    AlreadyLinked { canvas_id: Uuid, plan_id: Uuid },

    #[error("owner {owner_id} already has the maximum of {max} canvases")]
    CanvasLimitReached { owner_id: String, max: usize },

    #[error("backend request failed: {0:#}")]
    Transport(anyhow::Error),
}

impl From<StoreError> for SyncError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { entity, id } => Self::NotFound { entity, id },
            StoreError::Transport(e) => Self::Transport(e),
            StoreError::InvalidOrdering(reason) => {
                Self::Validation(ValidationError::InvalidOrdering(reason))
            }
            other @ (StoreError::Unsupported(_) | StoreError::Conflict(_)) => {
                Self::Transport(anyhow::Error::new(other))
            }
        }
    }
}

/// Coarse classification of a [`SyncError`], cheap to copy into UI state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    PartialReorder,
    AlreadyLinked,
    CanvasLimitReached,
    Transport,
}

impl SyncError {
    pub fn not_found(entity: Entity, id: Uuid) -> Self {
        Self::NotFound { entity, id }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::PartialReorder(_) => ErrorKind::PartialReorder,
            Self::AlreadyLinked { .. } => ErrorKind::AlreadyLinked,
            Self::CanvasLimitReached { .. } => ErrorKind::CanvasLimitReached,
            Self::Transport(_) => ErrorKind::Transport,
        }
    }

    /// Whether the UI may offer a "try again" affordance. The core itself
    /// never retries.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::PartialReorder(_))
    }
}

/// A recorded failure: its kind plus the rendered message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&SyncError> for Failure {
    fn from(err: &SyncError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

pub type SyncResult<T> = Result<T, SyncError>;
