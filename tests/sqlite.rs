//! SQLite store and domain source against a real database file.

use std::sync::Arc;

use sqlx::SqlitePool;
use tempfile::TempDir;

use context_loop::config::RetrievalConfig;
use context_loop::db;
use context_loop::engine::ContextEngine;
use context_loop::migrate;
use context_loop::sqlite_domain::SqliteDomain;
use context_loop::sqlite_store::SqliteContextStore;
use context_loop_core::api::Anchors;
use context_loop_core::models::{ContextKind, TaskStatus, UnifiedAnchor};
use context_loop_core::store::ContextStore;

const NOW_MS: i64 = 1_760_000_000_000;

async fn open() -> (TempDir, SqlitePool) {
    let tmp = TempDir::new().unwrap();
    let pool = db::connect_path(&tmp.path().join("data/loop.sqlite"))
        .await
        .unwrap();
    migrate::apply_schema(&pool).await.unwrap();
    (tmp, pool)
}

async fn exec(pool: &SqlitePool, sql: &str) {
    sqlx::query(sql).execute(pool).await.unwrap();
}

async fn seed(pool: &SqlitePool) {
    let ws = format!(
        "INSERT INTO workspaces (id, name, member_count, created_at) VALUES \
         ('ws1', 'Acme', 3, {now}), ('ws2', 'Globex', 9, {now})",
        now = NOW_MS
    );
    exec(pool, &ws).await;

    let projects = format!(
        "INSERT INTO projects (id, workspace_id, name, status, tags, updated_at) VALUES \
         ('p1', 'ws1', 'Apollo Launch', 'active', '[\"launch\"]', {a}), \
         ('p2', 'ws1', 'Old Portal', 'archived', '[]', {b}), \
         ('p9', 'ws2', 'Secret Falcon', 'active', '[]', {a})",
        a = NOW_MS,
        b = NOW_MS - 1000
    );
    exec(pool, &projects).await;

    let tasks = format!(
        "INSERT INTO tasks (id, workspace_id, project_id, title, status, priority, \
                            assignee_id, depends_on, updated_at) VALUES \
         ('t1', 'ws1', 'p1', 'Write press release', 'in_progress', 'high', 'u1', '[\"t2\",\"t-gone\"]', {n}), \
         ('t2', 'ws1', 'p1', 'Book venue', 'done', 'medium', 'u2', '[]', {n}), \
         ('t3', 'ws1', 'p1', 'Order swag', 'todo', 'low', NULL, '[]', {n})",
        n = NOW_MS
    );
    exec(pool, &tasks).await;

    let pages = format!(
        "INSERT INTO pages (id, workspace_id, title, content, tags, parent_id, project_id, \
                            created_at, updated_at) VALUES \
         ('root', 'ws1', 'Handbook', 'All the things', '[]', NULL, NULL, {n}, {n}), \
         ('plan', 'ws1', 'Launch plan', 'Ship on Friday', '[\"launch\"]', 'root', 'p1', {n}, {n}), \
         ('faq', 'ws1', 'Launch FAQ', 'Questions', '[\"Launch\"]', 'root', NULL, {n}, {m})",
        n = NOW_MS,
        m = NOW_MS - 5000
    );
    exec(pool, &pages).await;
}

fn engine(pool: &SqlitePool) -> (ContextEngine, Arc<SqliteContextStore>) {
    let store = Arc::new(SqliteContextStore::new(pool.clone()));
    let engine = ContextEngine::new(
        Arc::new(SqliteDomain::new(pool.clone())),
        store.clone(),
        RetrievalConfig::default(),
    );
    (engine, store)
}

#[tokio::test]
async fn test_schema_is_idempotent() {
    let (_tmp, pool) = open().await;
    migrate::apply_schema(&pool).await.unwrap();
    migrate::apply_schema(&pool).await.unwrap();
}

#[tokio::test]
async fn test_workspace_context_counts_and_active_projects() {
    let (_tmp, pool) = open().await;
    seed(&pool).await;
    let (engine, store) = engine(&pool);

    let ctx = engine.workspace_context("ws1").await.unwrap().unwrap();
    assert_eq!(ctx.name, "Acme");
    assert_eq!(ctx.stats.project_count, 2);
    assert_eq!(ctx.stats.active_project_count, 1);
    assert_eq!(ctx.stats.task_count, 3);
    assert_eq!(ctx.stats.open_task_count, 2);
    assert_eq!(ctx.active_projects.len(), 1);
    assert_eq!(ctx.active_projects[0].id, "p1");

    let cached = store
        .get("ws1", ContextKind::Workspace, "ws1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(cached.title, "Acme");
}

#[tokio::test]
async fn test_page_context_reads_hierarchy_and_related_docs() {
    let (_tmp, pool) = open().await;
    seed(&pool).await;
    let (engine, _store) = engine(&pool);

    let ctx = engine.page_context("ws1", "plan").await.unwrap().unwrap();
    assert_eq!(ctx.breadcrumbs.len(), 1);
    assert_eq!(ctx.breadcrumbs[0].id, "root");
    assert_eq!(ctx.related_docs.len(), 1);
    assert_eq!(ctx.related_docs[0].id, "faq");
    assert_eq!(ctx.project_id.as_deref(), Some("p1"));
}

#[tokio::test]
async fn test_task_context_skips_missing_dependencies() {
    let (_tmp, pool) = open().await;
    seed(&pool).await;
    let (engine, _store) = engine(&pool);

    let ctx = engine.task_context("ws1", "t1").await.unwrap().unwrap();
    assert_eq!(ctx.status, TaskStatus::InProgress);
    let deps: Vec<&str> = ctx.dependencies.iter().map(|d| d.id.as_str()).collect();
    assert_eq!(deps, vec!["t2"]);
}

#[tokio::test]
async fn test_entities_of_other_workspace_are_invisible() {
    let (_tmp, pool) = open().await;
    seed(&pool).await;
    let (engine, store) = engine(&pool);

    assert!(engine.project_context("ws1", "p9").await.unwrap().is_none());
    assert!(engine.project_context("ws2", "p1").await.unwrap().is_none());

    let anchors = Anchors {
        project_id: Some("p9".to_string()),
        ..Default::default()
    };
    let unified = engine.unified_context("ws1", &anchors).await.unwrap().unwrap();
    assert!(unified.anchor.is_none());
    assert_eq!(store.count("ws2", None).await.unwrap(), 0);
}

#[tokio::test]
async fn test_unified_task_anchor_brings_its_project() {
    let (_tmp, pool) = open().await;
    seed(&pool).await;
    let (engine, _store) = engine(&pool);

    let anchors = Anchors {
        task_id: Some("t3".to_string()),
        ..Default::default()
    };
    let unified = engine.unified_context("ws1", &anchors).await.unwrap().unwrap();
    match unified.anchor {
        Some(UnifiedAnchor::Task { task, project }) => {
            assert_eq!(task.header.id, "t3");
            assert_eq!(project.unwrap().header.id, "p1");
        }
        other => panic!("expected task anchor, got {:?}", other),
    }
}

#[tokio::test]
async fn test_store_upsert_keeps_identity() {
    let (_tmp, pool) = open().await;
    seed(&pool).await;
    let (engine, store) = engine(&pool);

    engine.project_context("ws1", "p1").await.unwrap();
    let first = store
        .get("p1", ContextKind::Project, "ws1")
        .await
        .unwrap()
        .unwrap();

    exec(&pool, "UPDATE projects SET name = 'Apollo Relaunch' WHERE id = 'p1'").await;
    engine.project_context("ws1", "p1").await.unwrap();
    let second = store
        .get("p1", ContextKind::Project, "ws1")
        .await
        .unwrap()
        .unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(first.created_at, second.created_at);
    assert_eq!(second.title, "Apollo Relaunch");
    assert_eq!(store.count("ws1", Some(ContextKind::Project)).await.unwrap(), 1);
}

#[tokio::test]
async fn test_vectors_and_summaries_are_workspace_scoped() {
    let (_tmp, pool) = open().await;
    seed(&pool).await;
    let (engine, store) = engine(&pool);

    engine.project_context("ws1", "p1").await.unwrap();
    engine.project_context("ws2", "p9").await.unwrap();
    let mine = store.get("p1", ContextKind::Project, "ws1").await.unwrap().unwrap();
    let theirs = store.get("p9", ContextKind::Project, "ws2").await.unwrap().unwrap();

    store
        .save_embedding(&mine.id, &[1.0, 0.0], "ws1", "m", "h1")
        .await
        .unwrap();
    store
        .save_embedding(&theirs.id, &[1.0, 0.0], "ws2", "m", "h2")
        .await
        .unwrap();
    assert!(store
        .save_embedding(&theirs.id, &[0.0, 1.0], "ws1", "m", "h3")
        .await
        .is_err());

    let hits = store.search("ws1", &[1.0, 0.0], None, 10).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].record.id, mine.id);
    assert!((hits[0].score - 1.0).abs() < 1e-6);

    assert!(store.get_item(&theirs.id, "ws1").await.unwrap().is_none());
    assert!(store.get_embedding(&theirs.id, "ws1").await.unwrap().is_none());

    assert_eq!(
        store.get_summary(&mine.id, "ws1").await.unwrap().as_deref(),
        Some(mine.summary.as_str())
    );
    store.save_summary(&mine.id, "Launching Friday", "ws1").await.unwrap();
    assert_eq!(
        store.get_summary(&mine.id, "ws1").await.unwrap().as_deref(),
        Some("Launching Friday")
    );
    assert!(store.get_summary(&mine.id, "ws2").await.unwrap().is_none());

    assert!(!store.delete(&mine.id, "ws2").await.unwrap());
    assert!(store.delete(&mine.id, "ws1").await.unwrap());
    assert!(store.get_embedding(&mine.id, "ws1").await.unwrap().is_none());
}

#[tokio::test]
async fn test_id_pages_cover_workspace_in_id_order() {
    let (_tmp, pool) = open().await;
    seed(&pool).await;
    let (engine, store) = engine(&pool);

    for task in ["t1", "t2", "t3"] {
        engine.task_context("ws1", task).await.unwrap();
    }
    engine.project_context("ws2", "p9").await.unwrap();

    let first = store.list_ids_after("ws1", None, 2).await.unwrap();
    let rest = store
        .list_ids_after("ws1", first.last().map(String::as_str), 2)
        .await
        .unwrap();
    let mut all = first.clone();
    all.extend(rest);

    let mut expected: Vec<String> = store
        .list("ws1", None, 100, 0)
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.id)
        .collect();
    expected.sort();
    assert_eq!(all, expected);
}
