//! Execution of action commands found in generated answers.
//!
//! [`scan_commands`] finds the tokens; [`CommandExecutor`] runs them one at
//! a time, in source order, and splices a confirmation or an inline failure
//! note in place of each token. A failing command never fails the answer.

use context_loop_core::api::{ActionOutcome, TokenUsage};
use context_loop_core::command::{scan_commands, ActionCommand, CommandError};
use context_loop_core::text::excerpt;

use crate::actions::{ActionAdapter, ChannelMessage};
use crate::llm::{CompletionRequest, LlmClient};

const LISTED_MESSAGE_CHARS: usize = 280;
const SUMMARY_INPUT_MESSAGE_CHARS: usize = 500;

const SUMMARY_SYSTEM: &str = "You summarize chat channel messages for a busy reader. Be \
faithful to the messages and do not add information that is not in them.";

/// Settings for the follow-up call that summarizes fetched messages.
#[derive(Debug, Clone, Copy)]
pub struct SummarySettings {
    pub temperature: f32,
    pub max_tokens: u32,
}

/// Result of running one command.
#[derive(Debug, Clone)]
pub struct CommandRun {
    pub replacement: String,
    pub outcome: ActionOutcome,
    pub usage: Option<TokenUsage>,
}

/// An answer after every embedded command has been executed.
#[derive(Debug, Clone)]
pub struct Execution {
    pub text: String,
    pub outcomes: Vec<ActionOutcome>,
    pub usage: Option<TokenUsage>,
}

pub struct CommandExecutor<'a> {
    actions: &'a dyn ActionAdapter,
    llm: &'a dyn LlmClient,
    summary: SummarySettings,
}

fn add_usage(total: Option<TokenUsage>, more: Option<TokenUsage>) -> Option<TokenUsage> {
    match (total, more) {
        (Some(a), Some(b)) => Some(a + b),
        (a, b) => a.or(b),
    }
}

fn outcome(verb: &str, channel: Option<&str>, ok: bool) -> ActionOutcome {
    ActionOutcome {
        verb: verb.to_string(),
        channel: channel.map(str::to_string),
        ok,
    }
}

/// Plain bullet listing, used when the summary call fails.
pub fn list_messages(channel: &str, messages: &[ChannelMessage]) -> String {
    let mut out = format!("**Latest messages in {}:**\n", channel);
    for m in messages {
        out.push_str(&format!(
            "- **{}**: {}\n",
            m.user,
            excerpt(&m.text, LISTED_MESSAGE_CHARS)
        ));
    }
    out.trim_end().to_string()
}

impl<'a> CommandExecutor<'a> {
    pub fn new(
        actions: &'a dyn ActionAdapter,
        llm: &'a dyn LlmClient,
        summary: SummarySettings,
    ) -> Self {
        Self {
            actions,
            llm,
            summary,
        }
    }

    /// Execute every command in `answer` and return the rewritten text.
    pub async fn execute(&self, answer: &str) -> Execution {
        let tokens = scan_commands(answer);
        if tokens.is_empty() {
            return Execution {
                text: answer.to_string(),
                outcomes: Vec::new(),
                usage: None,
            };
        }

        let mut text = String::with_capacity(answer.len());
        let mut outcomes = Vec::with_capacity(tokens.len());
        let mut usage = None;
        let mut cursor = 0;

        for token in tokens {
            text.push_str(&answer[cursor..token.span.start]);
            cursor = token.span.end;

            match &token.command {
                Ok(command) => {
                    let run = self.run(command).await;
                    text.push_str(&run.replacement);
                    outcomes.push(run.outcome);
                    usage = add_usage(usage, run.usage);
                }
                Err(e) => {
                    tracing::warn!(token = %excerpt(&token.raw, 120), error = %e, "malformed action command");
                    text.push_str(&format!("_(Action skipped: {}.)_", e));
                    let verb = match e {
                        CommandError::MissingField { verb, .. } => *verb,
                    };
                    outcomes.push(outcome(verb, None, false));
                }
            }
        }
        text.push_str(&answer[cursor..]);

        Execution {
            text,
            outcomes,
            usage,
        }
    }

    /// Run one command and produce its replacement text.
    pub async fn run(&self, command: &ActionCommand) -> CommandRun {
        match command {
            ActionCommand::Send { channel, text } => self.send(channel, text).await,
            ActionCommand::Read { channel, limit } => self.read(channel, *limit).await,
        }
    }

    async fn send(&self, channel: &str, text: &str) -> CommandRun {
        match self.actions.send(channel, text).await {
            Ok(receipt) => {
                tracing::info!(channel, ts = %receipt.ts, "message sent");
                CommandRun {
                    replacement: format!("✅ Sent to {}.", channel),
                    outcome: outcome("SEND", Some(channel), true),
                    usage: None,
                }
            }
            Err(e) => {
                tracing::warn!(channel, error = %e, "send action failed");
                CommandRun {
                    replacement: format!("_(Could not send the message to {}.)_", channel),
                    outcome: outcome("SEND", Some(channel), false),
                    usage: None,
                }
            }
        }
    }

    async fn read(&self, channel: &str, limit: u32) -> CommandRun {
        let messages = match self.actions.read(channel, limit).await {
            Ok(m) => m,
            Err(e) => {
                tracing::warn!(channel, limit, error = %e, "read action failed");
                return CommandRun {
                    replacement: format!("_(Could not read messages from {}.)_", channel),
                    outcome: outcome("READ", Some(channel), false),
                    usage: None,
                };
            }
        };

        if messages.is_empty() {
            return CommandRun {
                replacement: format!("No recent messages in {}.", channel),
                outcome: outcome("READ", Some(channel), true),
                usage: None,
            };
        }

        let (replacement, usage) = match self.summarize(channel, &messages).await {
            Some((summary, usage)) => (
                format!("**Summary of {}:**\n{}", channel, summary.trim()),
                usage,
            ),
            None => (list_messages(channel, &messages), None),
        };

        CommandRun {
            replacement,
            outcome: outcome("READ", Some(channel), true),
            usage,
        }
    }

    async fn summarize(
        &self,
        channel: &str,
        messages: &[ChannelMessage],
    ) -> Option<(String, Option<TokenUsage>)> {
        let mut prompt = format!(
            "Summarize these {} recent messages from {} in a few bullet points. Call out \
             decisions, questions, and action items.\n\n",
            messages.len(),
            channel
        );
        for m in messages {
            prompt.push_str(&format!(
                "- {}: {}\n",
                m.user,
                excerpt(&m.text, SUMMARY_INPUT_MESSAGE_CHARS)
            ));
        }

        let request = CompletionRequest {
            system: SUMMARY_SYSTEM.to_string(),
            prompt,
            temperature: self.summary.temperature,
            max_tokens: self.summary.max_tokens,
        };
        match self.llm.complete(request).await {
            Ok(c) if !c.content.trim().is_empty() => Some((c.content, c.usage)),
            Ok(_) => {
                tracing::warn!(channel, "empty message summary; falling back to listing");
                None
            }
            Err(e) => {
                tracing::warn!(channel, error = %e, "message summary failed; falling back to listing");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use crate::actions::{ActionError, SendReceipt};
    use crate::llm::{Completion, LlmError};

    #[derive(Default)]
    struct ScriptedActions {
        fail: bool,
        sent: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl ActionAdapter for ScriptedActions {
        fn is_available(&self) -> bool {
            true
        }

        async fn send(&self, channel: &str, text: &str) -> Result<SendReceipt, ActionError> {
            if self.fail {
                return Err(ActionError::Api("channel_not_found".to_string()));
            }
            self.sent
                .lock()
                .unwrap()
                .push((channel.to_string(), text.to_string()));
            Ok(SendReceipt {
                channel: channel.to_string(),
                ts: "1700000000.000100".to_string(),
            })
        }

        async fn read(&self, _channel: &str, limit: u32) -> Result<Vec<ChannelMessage>, ActionError> {
            if self.fail {
                return Err(ActionError::Http("timeout".to_string()));
            }
            Ok((0..limit.min(2))
                .map(|i| ChannelMessage {
                    user: format!("u{}", i),
                    text: format!("update {}", i),
                    ts: i.to_string(),
                })
                .collect())
        }
    }

    struct FixedLlm(Result<&'static str, ()>);

    #[async_trait]
    impl LlmClient for FixedLlm {
        async fn complete(&self, _request: CompletionRequest) -> Result<Completion, LlmError> {
            match self.0 {
                Ok(content) => Ok(Completion {
                    content: content.to_string(),
                    model: "fixed".to_string(),
                    usage: Some(TokenUsage {
                        prompt_tokens: 5,
                        completion_tokens: 3,
                        total_tokens: 8,
                    }),
                }),
                Err(()) => Err(LlmError::Http("down".to_string())),
            }
        }
    }

    const SETTINGS: SummarySettings = SummarySettings {
        temperature: 0.2,
        max_tokens: 100,
    };

    #[tokio::test]
    async fn test_send_success_replaces_token() {
        let actions = ScriptedActions::default();
        let llm = FixedLlm(Ok("unused"));
        let exec = CommandExecutor::new(&actions, &llm, SETTINGS);

        let out = exec.execute("Done. [SEND:channel=general:text=Hello team]").await;
        assert!(!out.text.contains("[SEND:"));
        assert!(out.text.starts_with("Done. "));
        assert!(out.text.contains("Sent to #general"));
        assert_eq!(out.outcomes.len(), 1);
        assert!(out.outcomes[0].ok);
        assert_eq!(
            actions.sent.lock().unwrap().as_slice(),
            &[("#general".to_string(), "Hello team".to_string())]
        );
    }

    #[tokio::test]
    async fn test_send_failure_leaves_inline_note() {
        let actions = ScriptedActions {
            fail: true,
            ..Default::default()
        };
        let llm = FixedLlm(Ok("unused"));
        let exec = CommandExecutor::new(&actions, &llm, SETTINGS);

        let out = exec
            .execute("Done. [SEND:channel=general:text=Hello team] Anything else?")
            .await;
        assert!(out.text.starts_with("Done. "));
        assert!(out.text.ends_with(" Anything else?"));
        assert!(out.text.contains("Could not send the message to #general"));
        assert!(!out.outcomes[0].ok);
    }

    #[tokio::test]
    async fn test_read_summary_and_fallback() {
        let actions = ScriptedActions::default();

        let llm = FixedLlm(Ok("- two updates"));
        let out = CommandExecutor::new(&actions, &llm, SETTINGS)
            .execute("[READ:channel=ops:limit=5]")
            .await;
        assert!(out.text.contains("Summary of #ops"));
        assert_eq!(out.usage.unwrap().total_tokens, 8);

        let llm = FixedLlm(Err(()));
        let out = CommandExecutor::new(&actions, &llm, SETTINGS)
            .execute("[READ:channel=ops:limit=5]")
            .await;
        assert!(out.text.contains("Latest messages in #ops"));
        assert!(out.text.contains("**u1**: update 1"));
        assert!(out.outcomes[0].ok);
        assert!(out.usage.is_none());
    }

    #[tokio::test]
    async fn test_commands_run_in_source_order() {
        let actions = ScriptedActions::default();
        let llm = FixedLlm(Ok("unused"));
        let exec = CommandExecutor::new(&actions, &llm, SETTINGS);

        let out = exec
            .execute("[SEND:channel=a:text=one] then [SEND:channel=b:text=two]")
            .await;
        let sent = actions.sent.lock().unwrap();
        assert_eq!(sent[0].0, "#a");
        assert_eq!(sent[1].0, "#b");
        assert!(out.text.find("#a").unwrap() < out.text.find("#b").unwrap());
    }

    #[tokio::test]
    async fn test_malformed_command_is_noted() {
        let actions = ScriptedActions::default();
        let llm = FixedLlm(Ok("unused"));
        let out = CommandExecutor::new(&actions, &llm, SETTINGS)
            .execute("Hi [SEND:channel=general]")
            .await;
        assert!(out.text.starts_with("Hi "));
        assert!(!out.text.contains("[SEND:"));
        assert_eq!(out.outcomes[0].verb, "SEND");
        assert!(!out.outcomes[0].ok);
        assert!(actions.sent.lock().unwrap().is_empty());
    }
}
