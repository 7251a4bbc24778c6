mod canvas_cmds;
mod config;
mod milestone_cmds;
mod plan_cmds;
mod resolve;
#[cfg(test)]
mod test_util;

use std::sync::Arc;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

use pathway_core::store::{PgStore, Stores};
use pathway_db::pool;

use config::PathwayConfig;

#[derive(Parser)]
#[command(name = "pathway", about = "Twelve-week career plans, milestones and canvases")]
struct Cli {
    /// Database URL (overrides PATHWAY_DATABASE_URL env var)
    #[arg(long, global = true)]
    database_url: Option<String>,

    /// Owner id to act as (overrides PATHWAY_USER_ID env var)
    #[arg(long, global = true)]
    user: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a pathway config file (no database required)
    Init {
        /// PostgreSQL connection URL
        #[arg(long, default_value = "postgresql://localhost:5432/pathway")]
        db_url: String,
        /// Owner id used to scope plans and canvases
        #[arg(long)]
        user_id: Option<String>,
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },
    /// Create and migrate the pathway database
    DbInit,
    /// Plan management
    Plan {
        #[command(subcommand)]
        command: PlanCommands,
    },
    /// Milestone edits within a plan
    Milestone {
        #[command(subcommand)]
        command: MilestoneCommands,
    },
    /// Career canvas management
    Canvas {
        #[command(subcommand)]
        command: CanvasCommands,
    },
    /// Print shell completions
    Completions {
        /// Target shell
        shell: Shell,
    },
}

#[derive(Subcommand)]
pub enum PlanCommands {
    /// Create a twelve-week plan
    Create {
        /// Plan title
        title: String,
        /// Start date (YYYY-MM-DD, defaults to today)
        #[arg(long)]
        start: Option<String>,
    },
    /// List your plans, newest first
    List,
    /// Show a plan with its milestones
    Show {
        /// Plan ID
        plan_id: String,
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Change a plan's title
    Rename {
        /// Plan ID
        plan_id: String,
        /// New title
        title: String,
    },
    /// Move a plan's start date (the end date follows)
    Reschedule {
        /// Plan ID
        plan_id: String,
        /// New start date (YYYY-MM-DD)
        start: String,
    },
    /// Set the submission status (draft, submitted, under_review, approved)
    Submit {
        /// Plan ID
        plan_id: String,
        /// New status
        status: String,
    },
    /// Create the plan that follows this one
    Continue {
        /// Parent plan ID
        plan_id: String,
        /// Title of the new plan
        title: String,
    },
    /// Delete a plan and its milestones
    Delete {
        /// Plan ID
        plan_id: String,
    },
}

#[derive(Subcommand)]
pub enum MilestoneCommands {
    /// Edit a milestone's goal, notes or status
    Edit {
        /// Plan ID
        plan_id: String,
        /// Milestone ID or week number (e.g. w5)
        milestone: String,
        /// Goal text (at most 200 characters)
        #[arg(long)]
        goal: Option<String>,
        /// Free-form notes
        #[arg(long)]
        notes: Option<String>,
        /// Status: not_started, in_progress, completed
        #[arg(long)]
        status: Option<String>,
    },
    /// Cycle a milestone's status
    Toggle {
        /// Plan ID
        plan_id: String,
        /// Milestone ID or week number
        milestone: String,
    },
    /// Set the display order of all twelve milestones
    Reorder {
        /// Plan ID
        plan_id: String,
        /// Milestone IDs or week numbers in the new order
        #[arg(required = true, num_args = 1..)]
        order: Vec<String>,
    },
}

#[derive(Subcommand)]
pub enum CanvasCommands {
    /// Create a canvas (at most three per user)
    Create {
        /// Canvas name
        name: String,
    },
    /// List your canvases
    List,
    /// Show a canvas's sections
    Show {
        /// Canvas ID
        canvas_id: String,
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Edit canvas sections
    Edit {
        /// Canvas ID
        canvas_id: String,
        /// Section assignment, e.g. --set target_role="Staff engineer"
        #[arg(long, required = true)]
        set: Vec<String>,
    },
    /// Rename a canvas
    Rename {
        /// Canvas ID
        canvas_id: String,
        /// New name
        name: String,
    },
    /// Set the display order of your canvases
    Reorder {
        /// Canvas IDs in the new order
        #[arg(required = true, num_args = 1..)]
        canvas_ids: Vec<String>,
    },
    /// Link a canvas to a plan (replaces an existing link)
    Link {
        /// Canvas ID
        canvas_id: String,
        /// Plan ID
        plan_id: String,
    },
    /// Remove a canvas's plan link
    Unlink {
        /// Canvas ID
        canvas_id: String,
    },
    /// Create a plan from an unlinked canvas and link it
    Plan {
        /// Canvas ID
        canvas_id: String,
        /// Start date (YYYY-MM-DD, defaults to today)
        #[arg(long)]
        start: Option<String>,
    },
    /// Delete a canvas (its plan is kept)
    Delete {
        /// Canvas ID
        canvas_id: String,
    },
}

/// Execute the `pathway init` command: write config file.
fn cmd_init(db_url: &str, user_id: Option<String>, force: bool) -> anyhow::Result<()> {
    let path = config::config_path();

    if path.exists() && !force {
        anyhow::bail!(
            "config file already exists at {}\nUse --force to overwrite.",
            path.display()
        );
    }

    let cfg = config::ConfigFile {
        database: config::DatabaseSection {
            url: db_url.to_string(),
        },
        user: user_id.map(|id| config::UserSection { id }),
    };

    config::save_config(&cfg)?;

    println!("Config written to {}", path.display());
    println!("  database.url = {db_url}");
    if let Some(user) = &cfg.user {
        println!("  user.id = {}", user.id);
    }
    println!();
    println!("Next: run `pathway db-init` to create and migrate the database.");

    Ok(())
}

/// Execute the `pathway db-init` command: create database and run migrations.
async fn cmd_db_init(resolved: &PathwayConfig) -> anyhow::Result<()> {
    println!("Initializing pathway database...");

    pool::ensure_database_exists(&resolved.db_config).await?;
    let db_pool = pool::create_pool(&resolved.db_config).await?;
    pool::run_migrations(&db_pool).await?;

    let counts = pool::table_counts(&db_pool).await?;
    println!("Database ready. Tables:");
    for (table, count) in &counts {
        println!("  {table}: {count} rows");
    }

    db_pool.close().await;

    println!("pathway db-init complete.");
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init {
            db_url,
            user_id,
            force,
        } => {
            cmd_init(&db_url, user_id, force)?;
        }
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "pathway", &mut std::io::stdout());
        }
        Commands::DbInit => {
            let resolved = PathwayConfig::resolve(cli.database_url.as_deref(), cli.user.as_deref());
            cmd_db_init(&resolved).await?;
        }
        Commands::Plan { command } => {
            let resolved = PathwayConfig::resolve(cli.database_url.as_deref(), cli.user.as_deref());
            let db_pool = pool::create_pool(&resolved.db_config).await?;
            let stores = Stores::from_backend(Arc::new(PgStore::new(db_pool.clone())));
            let result = plan_cmds::run_plan_command(command, &stores, &resolved).await;
            db_pool.close().await;
            result?;
        }
        Commands::Milestone { command } => {
            let resolved = PathwayConfig::resolve(cli.database_url.as_deref(), cli.user.as_deref());
            let db_pool = pool::create_pool(&resolved.db_config).await?;
            let stores = Stores::from_backend(Arc::new(PgStore::new(db_pool.clone())));
            let result = milestone_cmds::run_milestone_command(command, &stores).await;
            db_pool.close().await;
            result?;
        }
        Commands::Canvas { command } => {
            let resolved = PathwayConfig::resolve(cli.database_url.as_deref(), cli.user.as_deref());
            let db_pool = pool::create_pool(&resolved.db_config).await?;
            let stores = Stores::from_backend(Arc::new(PgStore::new(db_pool.clone())));
            let result = canvas_cmds::run_canvas_command(command, &stores, &resolved).await;
            db_pool.close().await;
            result?;
        }
    }

    Ok(())
}
