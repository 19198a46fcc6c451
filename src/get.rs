//! `loopctl context`: inspect cached snapshots and build fresh ones.

use anyhow::{bail, Result};

use context_loop_core::api::Anchors;
use context_loop_core::models::{ContextKind, ContextObject};
use context_loop_core::store::ContextItemRecord;

use crate::config::Config;
use crate::services::Services;

/// Print one cached item with its stored summary and snapshot.
pub async fn run_get(config: &Config, workspace_id: &str, item_id: &str) -> Result<()> {
    let services = Services::from_config(config).await?;
    let Some(record) = services.store.get_item(item_id, workspace_id).await? else {
        bail!("Context item not found: {}", item_id);
    };
    let summary = services
        .store
        .get_summary(item_id, workspace_id)
        .await?
        .unwrap_or_default();

    println!("--- Context item ---");
    println!("id:           {}", record.id);
    println!("type:         {}", record.kind);
    println!("context_id:   {}", record.context_id);
    println!("workspace_id: {}", record.workspace_id);
    println!("title:        {}", record.title);
    println!("created_at:   {}", record.created_at.format("%Y-%m-%dT%H:%M:%SZ"));
    println!("updated_at:   {}", record.updated_at.format("%Y-%m-%dT%H:%M:%SZ"));
    match services.store.get_embedding(item_id, workspace_id).await? {
        Some(e) => println!("embedding:    {} ({} dims)", e.model, e.vector.len()),
        None => println!("embedding:    (none)"),
    }
    println!();

    println!("--- Summary ---");
    println!("{}", summary);
    println!();

    println!("--- Snapshot ---");
    println!("{}", serde_json::to_string_pretty(&record.data)?);
    Ok(())
}

pub async fn run_list(
    config: &Config,
    workspace_id: &str,
    kind: Option<&str>,
    limit: usize,
    offset: usize,
) -> Result<()> {
    let kind: Option<ContextKind> = kind.map(str::parse).transpose()?;
    let services = Services::from_config(config).await?;
    let total = services.store.count(workspace_id, kind).await?;
    let items = services
        .store
        .list(workspace_id, kind, limit.max(1), offset)
        .await?;

    if items.is_empty() {
        println!("No context items.");
        return Ok(());
    }
    for item in &items {
        print_row(item);
    }
    println!();
    println!("{} of {} item(s)", items.len(), total);
    Ok(())
}

fn print_row(item: &ContextItemRecord) {
    println!(
        "{}  {:<9}  {}  {}",
        item.id,
        item.kind.as_str(),
        item.updated_at.format("%Y-%m-%d %H:%M"),
        item.title
    );
}

/// Build (and cache) the context for one entity and print it as JSON.
pub async fn run_build(config: &Config, workspace_id: &str, kind: &str, id: &str) -> Result<()> {
    let kind: ContextKind = kind.parse()?;
    let services = Services::from_config(config).await?;
    let engine = &services.engine;

    let built: Option<ContextObject> = match kind {
        ContextKind::Workspace => engine.workspace_context(workspace_id).await?.map(Into::into),
        ContextKind::Page => engine.page_context(workspace_id, id).await?.map(Into::into),
        ContextKind::Project => engine.project_context(workspace_id, id).await?.map(Into::into),
        ContextKind::Task => engine.task_context(workspace_id, id).await?.map(Into::into),
        ContextKind::Epic => engine.epic_context(workspace_id, id).await?.map(Into::into),
        ContextKind::Org => Some(engine.org_context(workspace_id, None, None).await?.into()),
        ContextKind::Activity => Some(engine.activity_context(workspace_id).await?.into()),
        ContextKind::Unified => {
            let anchors = Anchors {
                page_id: Some(id.to_string()),
                project_id: Some(id.to_string()),
                task_id: Some(id.to_string()),
                ..Default::default()
            };
            engine
                .unified_context(workspace_id, &anchors)
                .await?
                .map(Into::into)
        }
    };

    let Some(ctx) = built else {
        bail!("No {} '{}' in workspace {}", kind, id, workspace_id);
    };
    println!("{}", serde_json::to_string_pretty(&ctx)?);
    Ok(())
}
