//! Idempotent schema setup.
//!
//! Creates the context-store tables and the domain tables read by
//! [`SqliteDomain`](crate::sqlite_domain::SqliteDomain). Timestamps are
//! unix milliseconds, list-valued columns are JSON arrays, and vectors are
//! little-endian `f32` BLOBs.

use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

const SCHEMA: &[&str] = &[
    // Context store
    r#"
    CREATE TABLE IF NOT EXISTS context_items (
        id TEXT PRIMARY KEY,
        context_id TEXT NOT NULL,
        workspace_id TEXT NOT NULL,
        type TEXT NOT NULL,
        title TEXT NOT NULL,
        summary TEXT NOT NULL,
        data TEXT NOT NULL,
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL,
        UNIQUE(workspace_id, type, context_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS context_embeddings (
        context_item_id TEXT PRIMARY KEY,
        workspace_id TEXT NOT NULL,
        model TEXT NOT NULL,
        dims INTEGER NOT NULL,
        content_hash TEXT NOT NULL,
        vector BLOB NOT NULL,
        updated_at INTEGER NOT NULL,
        FOREIGN KEY (context_item_id) REFERENCES context_items(id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS context_summaries (
        context_item_id TEXT PRIMARY KEY,
        workspace_id TEXT NOT NULL,
        summary TEXT NOT NULL,
        updated_at INTEGER NOT NULL,
        FOREIGN KEY (context_item_id) REFERENCES context_items(id)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_context_items_ws_updated ON context_items(workspace_id, updated_at DESC)",
    "CREATE INDEX IF NOT EXISTS idx_context_embeddings_ws_updated ON context_embeddings(workspace_id, updated_at DESC)",
    // Domain tables
    r#"
    CREATE TABLE IF NOT EXISTS workspaces (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        description TEXT,
        member_count INTEGER NOT NULL DEFAULT 0,
        created_at INTEGER NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS pages (
        id TEXT PRIMARY KEY,
        workspace_id TEXT NOT NULL,
        title TEXT NOT NULL,
        content TEXT NOT NULL DEFAULT '',
        tags TEXT NOT NULL DEFAULT '[]',
        parent_id TEXT,
        project_id TEXT,
        owner_id TEXT,
        is_personal INTEGER NOT NULL DEFAULT 0,
        archived INTEGER NOT NULL DEFAULT 0,
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS projects (
        id TEXT PRIMARY KEY,
        workspace_id TEXT NOT NULL,
        name TEXT NOT NULL,
        description TEXT,
        status TEXT NOT NULL,
        tags TEXT NOT NULL DEFAULT '[]',
        owner_id TEXT,
        due_date TEXT,
        updated_at INTEGER NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS tasks (
        id TEXT PRIMARY KEY,
        workspace_id TEXT NOT NULL,
        project_id TEXT,
        epic_id TEXT,
        title TEXT NOT NULL,
        description TEXT,
        status TEXT NOT NULL,
        priority TEXT NOT NULL DEFAULT 'medium',
        assignee_id TEXT,
        depends_on TEXT NOT NULL DEFAULT '[]',
        tags TEXT NOT NULL DEFAULT '[]',
        due_date TEXT,
        updated_at INTEGER NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS epics (
        id TEXT PRIMARY KEY,
        workspace_id TEXT NOT NULL,
        project_id TEXT,
        title TEXT NOT NULL,
        description TEXT,
        status TEXT NOT NULL,
        updated_at INTEGER NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS org_positions (
        id TEXT PRIMARY KEY,
        workspace_id TEXT NOT NULL,
        user_id TEXT NOT NULL,
        name TEXT NOT NULL,
        title TEXT NOT NULL,
        team_id TEXT,
        team_name TEXT,
        role_id TEXT,
        manager_id TEXT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS activities (
        id TEXT PRIMARY KEY,
        workspace_id TEXT NOT NULL,
        actor_id TEXT NOT NULL,
        action TEXT NOT NULL,
        entity_type TEXT NOT NULL,
        entity_id TEXT NOT NULL,
        summary TEXT NOT NULL,
        occurred_at INTEGER NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_pages_ws ON pages(workspace_id, updated_at DESC)",
    "CREATE INDEX IF NOT EXISTS idx_projects_ws ON projects(workspace_id, updated_at DESC)",
    "CREATE INDEX IF NOT EXISTS idx_tasks_ws ON tasks(workspace_id, updated_at DESC)",
    "CREATE INDEX IF NOT EXISTS idx_epics_ws ON epics(workspace_id, project_id)",
    "CREATE INDEX IF NOT EXISTS idx_org_positions_ws ON org_positions(workspace_id)",
    "CREATE INDEX IF NOT EXISTS idx_activities_ws ON activities(workspace_id, occurred_at DESC)",
];

/// Apply the schema to an open pool. Safe to run repeatedly.
pub async fn apply_schema(pool: &SqlitePool) -> Result<()> {
    for statement in SCHEMA {
        sqlx::query(statement).execute(pool).await?;
    }
    Ok(())
}

/// Open the configured database, apply the schema, and close the pool.
pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    apply_schema(&pool).await?;
    pool.close().await;
    Ok(())
}
