//! `loopctl search`: semantic search over a workspace's cached context.

use anyhow::{bail, Result};

use context_loop_core::models::ContextKind;

use crate::config::Config;
use crate::semantic::SemanticHit;
use crate::services::Services;

const SUMMARY_PREVIEW_CHARS: usize = 160;

pub async fn run_search(
    config: &Config,
    workspace_id: &str,
    query: &str,
    kind: Option<&str>,
    limit: Option<usize>,
) -> Result<()> {
    if query.trim().is_empty() {
        println!("No results.");
        return Ok(());
    }
    if !config.embedding.is_enabled() {
        bail!("Search requires embeddings. Set [embedding] provider in config.");
    }
    let kind: Option<ContextKind> = kind.map(str::parse).transpose()?;
    let limit = limit
        .unwrap_or(config.retrieval.default_context_items)
        .clamp(1, config.retrieval.max_context_items);

    let services = Services::from_config(config).await?;
    let hits = services
        .semantic()?
        .search_similar(workspace_id, query, kind, limit)
        .await?;

    if hits.is_empty() {
        println!("No results.");
        return Ok(());
    }
    for (i, hit) in hits.iter().enumerate() {
        print_hit(i + 1, hit);
    }
    Ok(())
}

fn print_hit(rank: usize, hit: &SemanticHit) {
    println!(
        "{}. [{:.3}] {} ({}: {})",
        rank, hit.score, hit.title, hit.kind, hit.context_id
    );
    println!("    item: {}", hit.item_id);
    if !hit.summary.is_empty() {
        println!("    {}", preview(&hit.summary, SUMMARY_PREVIEW_CHARS));
    }
}

fn preview(text: &str, max_chars: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max_chars {
        return flat;
    }
    let head: String = flat.chars().take(max_chars).collect();
    format!("{}...", head.trim_end())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preview_flattens_and_truncates() {
        assert_eq!(preview("a\n\n b", 10), "a b");
        assert_eq!(preview("abcdef ghij", 6), "abcdef...");
    }
}
