//! # Context Loop CLI (`loopctl`)
//!
//! The `loopctl` binary initializes the database, asks the assistant
//! questions, inspects the context cache, manages embeddings, and starts the
//! HTTP server.
//!
//! ## Usage
//!
//! ```bash
//! loopctl --config ./config/loop.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `loopctl init` | Create the SQLite database and schema |
//! | `loopctl ask <ws> <user> "<query>"` | Answer one assistant query |
//! | `loopctl search <ws> "<query>"` | Semantic search over cached context |
//! | `loopctl context get <ws> <item>` | Show one cached context item |
//! | `loopctl context list <ws>` | List cached context items |
//! | `loopctl context build <ws> <type> <id>` | Build and cache one context |
//! | `loopctl embed item <ws> <item>` | Embed one cached item |
//! | `loopctl embed backfill <ws>` | Re-embed every cached item |
//! | `loopctl serve` | Start the HTTP server |
//!
//! ## Examples
//!
//! ```bash
//! loopctl init
//! loopctl ask acme alice "Which projects are active?" --mode dashboard
//! loopctl ask acme alice "What is blocking this?" --project p-launch
//! loopctl context build acme project p-launch
//! loopctl embed backfill acme --batch-size 20
//! loopctl search acme "pricing decision" --type page
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use context_loop::ask::{self, AskArgs};
use context_loop::{config, embed_cmd, get, logging, migrate, search, server};
use context_loop_core::api::{Anchors, LoopMode};

/// Context Loop CLI: a contextual-assistant backend.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/loop.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "loopctl",
    about = "Context Loop: workspace-scoped context retrieval and an LLM assistant loop",
    version,
    long_about = "Context Loop gathers tenant-scoped context for a question (workspace, \
    pages, projects, tasks, org, activity, and semantically similar cached items), asks a \
    language model, and executes the messaging commands embedded in its answer."
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/loop.toml`.
    #[arg(long, global = true, default_value = "./config/loop.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and all tables. Running it again
    /// is safe.
    Init,

    /// Ask the assistant a question.
    Ask {
        workspace: String,
        user: String,
        query: String,

        /// Surface the question is asked from: spaces, org, or dashboard.
        #[arg(long, default_value = "spaces")]
        mode: LoopMode,

        /// Anchor on a project. Any entity anchor forces `spaces` mode.
        #[arg(long)]
        project: Option<String>,

        #[arg(long)]
        page: Option<String>,

        #[arg(long)]
        task: Option<String>,

        /// Focus org context on a role.
        #[arg(long)]
        role: Option<String>,

        /// Focus org context on a team.
        #[arg(long)]
        team: Option<String>,

        /// Add semantically similar cached items to the context.
        #[arg(long)]
        semantic: bool,

        /// Number of semantic hits to include.
        #[arg(long)]
        max_items: Option<usize>,

        /// Mark the query as an explicit action request.
        #[arg(long)]
        action: bool,

        /// Default channel for action requests.
        #[arg(long)]
        channel: Option<String>,

        /// Print the full response as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Semantic search over a workspace's cached context.
    Search {
        workspace: String,
        query: String,

        /// Restrict to one context type (page, project, task, ...).
        #[arg(long = "type")]
        kind: Option<String>,

        #[arg(long)]
        limit: Option<usize>,
    },

    /// Inspect and build cached context.
    Context {
        #[command(subcommand)]
        action: ContextAction,
    },

    /// Manage embeddings of cached context items.
    Embed {
        #[command(subcommand)]
        action: EmbedAction,
    },

    /// Start the HTTP server on `[server].bind`.
    Serve,
}

#[derive(Subcommand)]
enum ContextAction {
    /// Show one cached item.
    Get { workspace: String, item: String },

    /// List cached items, most recently updated first.
    List {
        workspace: String,

        #[arg(long = "type")]
        kind: Option<String>,

        #[arg(long, default_value_t = 50)]
        limit: usize,

        #[arg(long, default_value_t = 0)]
        offset: usize,
    },

    /// Build one context from the workspace's entities and cache it.
    ///
    /// `unified` tries the id as a page, then a project, then a task.
    Build {
        workspace: String,
        /// workspace, page, project, task, epic, org, activity, or unified.
        kind: String,
        /// Entity id. Ignored for workspace, org and activity.
        #[arg(default_value = "")]
        id: String,
    },
}

#[derive(Subcommand)]
enum EmbedAction {
    /// Embed (or re-embed) one cached item.
    Item { workspace: String, item: String },

    /// Re-embed every cached item of a workspace in throttled batches.
    Backfill {
        workspace: String,

        /// Items embedded between pauses. Overrides `[backfill].batch_size`.
        #[arg(long)]
        batch_size: Option<usize>,

        /// Pause between batches in milliseconds.
        #[arg(long)]
        delay_ms: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;
    logging::init(&cfg.logging);

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Ask {
            workspace,
            user,
            query,
            mode,
            project,
            page,
            task,
            role,
            team,
            semantic,
            max_items,
            action,
            channel,
            json,
        } => {
            let args = AskArgs {
                workspace_id: workspace,
                user_id: user,
                query,
                mode,
                anchors: Anchors {
                    project_id: project,
                    page_id: page,
                    task_id: task,
                    role_id: role,
                    team_id: team,
                },
                semantic,
                max_items,
                action_flag: action,
                channel,
                json,
            };
            ask::run_ask(&cfg, args).await?;
        }
        Commands::Search {
            workspace,
            query,
            kind,
            limit,
        } => {
            search::run_search(&cfg, &workspace, &query, kind.as_deref(), limit).await?;
        }
        Commands::Context { action } => match action {
            ContextAction::Get { workspace, item } => {
                get::run_get(&cfg, &workspace, &item).await?;
            }
            ContextAction::List {
                workspace,
                kind,
                limit,
                offset,
            } => {
                get::run_list(&cfg, &workspace, kind.as_deref(), limit, offset).await?;
            }
            ContextAction::Build {
                workspace,
                kind,
                id,
            } => {
                get::run_build(&cfg, &workspace, &kind, &id).await?;
            }
        },
        Commands::Embed { action } => match action {
            EmbedAction::Item { workspace, item } => {
                embed_cmd::run_embed_item(&cfg, &workspace, &item).await?;
            }
            EmbedAction::Backfill {
                workspace,
                batch_size,
                delay_ms,
            } => {
                embed_cmd::run_embed_backfill(&cfg, &workspace, batch_size, delay_ms).await?;
            }
        },
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
