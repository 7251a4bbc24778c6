//! Plan management: creation (including continuations), metadata edits,
//! deletion and read-time progress.

pub mod progress;
pub mod service;

pub use progress::PlanProgress;
pub use service::{
    continuation_start, create_continuation, create_plan, delete_plan, end_date_for, get_plan,
    list_plans, set_submission_status, update_plan_details,
};
