//! PostgreSQL persistence for pathway: schema migrations, connection
//! pooling, row models and query functions for plans, milestones and
//! canvases.

pub mod config;
pub mod models;
pub mod pool;
pub mod queries;
