//! `loopctl embed`: embed one cached item or backfill a workspace.

use anyhow::{bail, Result};

use crate::config::{BackfillConfig, Config};
use crate::services::Services;

pub async fn run_embed_item(config: &Config, workspace_id: &str, item_id: &str) -> Result<()> {
    require_embeddings(config)?;
    let services = Services::from_config(config).await?;
    let outcome = services
        .semantic()?
        .embed_context_item(workspace_id, item_id)
        .await?;

    println!("embed item");
    println!("  item: {}", outcome.item_id);
    println!("  model: {}", outcome.model);
    println!("  dims: {}", outcome.dims);
    println!("  content_hash: {}", outcome.content_hash);
    Ok(())
}

/// CLI flags override the `[backfill]` section.
pub async fn run_embed_backfill(
    config: &Config,
    workspace_id: &str,
    batch_size: Option<usize>,
    delay_ms: Option<u64>,
) -> Result<()> {
    require_embeddings(config)?;
    let settings = BackfillConfig {
        batch_size: batch_size.unwrap_or(config.backfill.batch_size),
        delay_ms: delay_ms.unwrap_or(config.backfill.delay_ms),
        ..config.backfill.clone()
    };

    let services = Services::from_config(config).await?;
    let report = services
        .semantic()?
        .backfill(workspace_id, &settings)
        .await?;

    println!("embed backfill");
    println!("  total: {}", report.total);
    println!("  processed: {}", report.processed);
    println!("  succeeded: {}", report.succeeded);
    println!("  failed: {}", report.failed);
    for err in &report.errors {
        eprintln!("Warning: {}: {}", err.item_id, err.message);
    }
    Ok(())
}

fn require_embeddings(config: &Config) -> Result<()> {
    if !config.embedding.is_enabled() {
        bail!("Embeddings are disabled. Set [embedding] provider in config.");
    }
    Ok(())
}
