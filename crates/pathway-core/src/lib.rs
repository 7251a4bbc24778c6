//! Plan and milestone synchronization core.

pub mod canvas;
pub mod config;
pub mod error;
pub mod generate;
pub mod linker;
pub mod milestone;
pub mod plan;
pub mod reorder;
pub mod store;
pub mod sync;

pub use config::SyncConfig;
pub use error::{ErrorKind, Failure, PartialReorderFailure, SyncError, SyncResult, ValidationError};
pub use linker::{CanvasPlanLinker, Linkage};
pub use reorder::{ReorderCoordinator, ReorderPath};
pub use store::{PgStore, Stores};
pub use sync::{PlanList, PlanSync, SyncSnapshot};
