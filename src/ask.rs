//! `loopctl ask`: run one assistant query from the terminal.

use anyhow::Result;

use context_loop_core::api::{Anchors, LoopMode, LoopRequest, LoopResponse};

use crate::config::Config;
use crate::services::Services;

pub struct AskArgs {
    pub workspace_id: String,
    pub user_id: String,
    pub query: String,
    pub mode: LoopMode,
    pub anchors: Anchors,
    pub semantic: bool,
    pub max_items: Option<usize>,
    pub action_flag: bool,
    pub channel: Option<String>,
    pub json: bool,
}

pub async fn run_ask(config: &Config, args: AskArgs) -> Result<()> {
    let services = Services::from_config(config).await?;
    let request = LoopRequest {
        anchors: args.anchors,
        use_semantic_search: args.semantic,
        max_context_items: args.max_items,
        action_flag: args.action_flag,
        action_channel: args.channel,
        ..LoopRequest::new(args.workspace_id, args.user_id, args.mode, args.query)
    };
    let response = services.orchestrator.handle(request).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&response)?);
    } else {
        print_response(&response);
    }
    Ok(())
}

fn print_response(response: &LoopResponse) {
    println!("{}", response.answer.trim_end());
    println!();

    let ctx = &response.context;
    if let Some(primary) = &ctx.primary {
        println!("context:   {} {} ({})", primary.kind, primary.id, primary.title);
    }
    if !ctx.sources_used.is_empty() {
        println!("sources:   {}", ctx.sources_used.join(", "));
    }
    if !ctx.sources_failed.is_empty() {
        println!("failed:    {}", ctx.sources_failed.join(", "));
    }
    let meta = &response.metadata;
    println!(
        "mode:      {} (asked from {})",
        response.mode, meta.declared_mode
    );
    println!("model:     {}", meta.model);
    if let Some(usage) = &meta.token_usage {
        println!("tokens:    {}", usage.total_tokens);
    }
    for action in &meta.actions_executed {
        let status = if action.ok { "ok" } else { "failed" };
        println!(
            "action:    {} {} ({})",
            action.verb,
            action.channel.as_deref().unwrap_or("-"),
            status
        );
    }
    if !response.suggestions.is_empty() {
        println!();
        println!("Try asking:");
        for s in &response.suggestions {
            println!("  - {}", s);
        }
    }
}
