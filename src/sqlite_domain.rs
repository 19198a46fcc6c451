//! SQLite-backed [`DomainSource`].
//!
//! Reads the product's workspace, page, project, task, epic, org-position
//! and activity tables. Every query filters on `workspace_id` in SQL.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use context_loop_core::domain::{
    ActivityRow, DomainSource, EpicRow, OrgPositionRow, PageFilter, PageRow, ProjectRow,
    TaskFilter, TaskRow, WorkspaceRow,
};

use crate::sqlite_store::from_millis;

pub struct SqliteDomain {
    pool: SqlitePool,
}

impl SqliteDomain {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn json_list(row: &SqliteRow, column: &str) -> Vec<String> {
    let raw: String = row.get(column);
    serde_json::from_str(&raw).unwrap_or_default()
}

fn date(row: &SqliteRow, column: &str) -> Option<NaiveDate> {
    let raw: Option<String> = row.get(column);
    raw.and_then(|s| NaiveDate::parse_from_str(&s, "%Y-%m-%d").ok())
}

fn parse_status<T>(row: &SqliteRow, column: &str) -> Result<T>
where
    T: std::str::FromStr<Err = anyhow::Error>,
{
    let raw: String = row.get(column);
    let id: String = row.get("id");
    raw.parse()
        .with_context(|| format!("bad {} on row {}", column, id))
}

fn page_from_row(row: &SqliteRow) -> PageRow {
    PageRow {
        id: row.get("id"),
        workspace_id: row.get("workspace_id"),
        title: row.get("title"),
        content: row.get("content"),
        tags: json_list(row, "tags"),
        parent_id: row.get("parent_id"),
        project_id: row.get("project_id"),
        owner_id: row.get("owner_id"),
        is_personal: row.get::<i64, _>("is_personal") != 0,
        archived: row.get::<i64, _>("archived") != 0,
        created_at: from_millis(row.get("created_at")),
        updated_at: from_millis(row.get("updated_at")),
    }
}

fn project_from_row(row: &SqliteRow) -> Result<ProjectRow> {
    Ok(ProjectRow {
        id: row.get("id"),
        workspace_id: row.get("workspace_id"),
        name: row.get("name"),
        description: row.get("description"),
        status: parse_status(row, "status")?,
        tags: json_list(row, "tags"),
        owner_id: row.get("owner_id"),
        due_date: date(row, "due_date"),
        updated_at: from_millis(row.get("updated_at")),
    })
}

fn task_from_row(row: &SqliteRow) -> Result<TaskRow> {
    Ok(TaskRow {
        id: row.get("id"),
        workspace_id: row.get("workspace_id"),
        project_id: row.get("project_id"),
        epic_id: row.get("epic_id"),
        title: row.get("title"),
        description: row.get("description"),
        status: parse_status(row, "status")?,
        priority: parse_status(row, "priority")?,
        assignee_id: row.get("assignee_id"),
        depends_on: json_list(row, "depends_on"),
        tags: json_list(row, "tags"),
        due_date: date(row, "due_date"),
        updated_at: from_millis(row.get("updated_at")),
    })
}

fn epic_from_row(row: &SqliteRow) -> Result<EpicRow> {
    Ok(EpicRow {
        id: row.get("id"),
        workspace_id: row.get("workspace_id"),
        project_id: row.get("project_id"),
        title: row.get("title"),
        description: row.get("description"),
        status: parse_status(row, "status")?,
        updated_at: from_millis(row.get("updated_at")),
    })
}

#[async_trait]
impl DomainSource for SqliteDomain {
    async fn workspace(&self, workspace_id: &str) -> Result<Option<WorkspaceRow>> {
        let row = sqlx::query(
            "SELECT id, name, description, member_count, created_at FROM workspaces WHERE id = ?",
        )
        .bind(workspace_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| WorkspaceRow {
            id: r.get("id"),
            name: r.get("name"),
            description: r.get("description"),
            member_count: r.get::<i64, _>("member_count").max(0) as u32,
            created_at: from_millis(r.get("created_at")),
        }))
    }

    async fn page(&self, workspace_id: &str, page_id: &str) -> Result<Option<PageRow>> {
        let row = sqlx::query("SELECT * FROM pages WHERE workspace_id = ? AND id = ?")
            .bind(workspace_id)
            .bind(page_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(page_from_row))
    }

    async fn pages(&self, workspace_id: &str, filter: &PageFilter) -> Result<Vec<PageRow>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM pages
            WHERE workspace_id = ?
              AND (? OR archived = 0)
              AND (? = 0 OR is_personal = 1)
              AND (? IS NULL OR owner_id = ?)
            ORDER BY updated_at DESC, id ASC
            LIMIT ?
            "#,
        )
        .bind(workspace_id)
        .bind(filter.include_archived)
        .bind(filter.personal_only)
        .bind(filter.owner_id.as_deref())
        .bind(filter.owner_id.as_deref())
        .bind(filter.limit.map(|l| l as i64).unwrap_or(-1))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(page_from_row).collect())
    }

    async fn project(&self, workspace_id: &str, project_id: &str) -> Result<Option<ProjectRow>> {
        let row = sqlx::query("SELECT * FROM projects WHERE workspace_id = ? AND id = ?")
            .bind(workspace_id)
            .bind(project_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(project_from_row).transpose()
    }

    async fn projects(&self, workspace_id: &str) -> Result<Vec<ProjectRow>> {
        let rows = sqlx::query(
            "SELECT * FROM projects WHERE workspace_id = ? ORDER BY updated_at DESC, id ASC",
        )
        .bind(workspace_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(project_from_row).collect()
    }

    async fn task(&self, workspace_id: &str, task_id: &str) -> Result<Option<TaskRow>> {
        let row = sqlx::query("SELECT * FROM tasks WHERE workspace_id = ? AND id = ?")
            .bind(workspace_id)
            .bind(task_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(task_from_row).transpose()
    }

    async fn tasks(&self, workspace_id: &str, filter: &TaskFilter) -> Result<Vec<TaskRow>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM tasks
            WHERE workspace_id = ?
              AND (? IS NULL OR project_id = ?)
              AND (? IS NULL OR epic_id = ?)
              AND (? IS NULL OR assignee_id = ?)
            ORDER BY updated_at DESC, id ASC
            LIMIT ?
            "#,
        )
        .bind(workspace_id)
        .bind(filter.project_id.as_deref())
        .bind(filter.project_id.as_deref())
        .bind(filter.epic_id.as_deref())
        .bind(filter.epic_id.as_deref())
        .bind(filter.assignee_id.as_deref())
        .bind(filter.assignee_id.as_deref())
        .bind(filter.limit.map(|l| l as i64).unwrap_or(-1))
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(task_from_row).collect()
    }

    async fn epic(&self, workspace_id: &str, epic_id: &str) -> Result<Option<EpicRow>> {
        let row = sqlx::query("SELECT * FROM epics WHERE workspace_id = ? AND id = ?")
            .bind(workspace_id)
            .bind(epic_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(epic_from_row).transpose()
    }

    async fn epics(&self, workspace_id: &str, project_id: Option<&str>) -> Result<Vec<EpicRow>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM epics
            WHERE workspace_id = ? AND (? IS NULL OR project_id = ?)
            ORDER BY updated_at DESC, id ASC
            "#,
        )
        .bind(workspace_id)
        .bind(project_id)
        .bind(project_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(epic_from_row).collect()
    }

    async fn org_positions(&self, workspace_id: &str) -> Result<Vec<OrgPositionRow>> {
        let rows = sqlx::query(
            "SELECT * FROM org_positions WHERE workspace_id = ? ORDER BY name ASC, id ASC",
        )
        .bind(workspace_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|r| OrgPositionRow {
                id: r.get("id"),
                workspace_id: r.get("workspace_id"),
                user_id: r.get("user_id"),
                name: r.get("name"),
                title: r.get("title"),
                team_id: r.get("team_id"),
                team_name: r.get("team_name"),
                role_id: r.get("role_id"),
                manager_id: r.get("manager_id"),
            })
            .collect())
    }

    async fn activity(&self, workspace_id: &str, limit: usize) -> Result<Vec<ActivityRow>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM activities
            WHERE workspace_id = ?
            ORDER BY occurred_at DESC, id ASC
            LIMIT ?
            "#,
        )
        .bind(workspace_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|r| ActivityRow {
                id: r.get("id"),
                workspace_id: r.get("workspace_id"),
                actor_id: r.get("actor_id"),
                action: r.get("action"),
                entity_type: r.get("entity_type"),
                entity_id: r.get("entity_id"),
                summary: r.get("summary"),
                occurred_at: from_millis(r.get("occurred_at")),
            })
            .collect())
    }
}
