//! Scanner for action commands embedded in generated text.
//!
//! The language model may emit bracketed tokens such as
//! `[SEND:channel=#general:text=Hello team]` or
//! `[READ:channel=ops:limit=20]`. [`scan_commands`] finds them in source
//! order and parses each into an [`ActionCommand`]; executing them is the
//! caller's concern.
//!
//! Grammar rules:
//! - verbs and keys are case-insensitive;
//! - a `:` inside a value is kept unless what follows it is a known `key=`;
//! - a token ends at the first `]` and may not exceed [`MAX_TOKEN_CHARS`];
//! - channels are normalized to exactly one leading `#`;
//! - `limit` is clamped to `1..=100` and defaults to [`DEFAULT_READ_LIMIT`].

use std::ops::Range;

use thiserror::Error;

/// Longest token, brackets included, that the scanner will consider.
pub const MAX_TOKEN_CHARS: usize = 2000;
pub const DEFAULT_READ_LIMIT: u32 = 50;
pub const MAX_READ_LIMIT: u32 = 100;

const KNOWN_KEYS: [&str; 3] = ["channel", "text", "limit"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionCommand {
    Send { channel: String, text: String },
    Read { channel: String, limit: u32 },
}

impl ActionCommand {
    pub fn verb(&self) -> &'static str {
        match self {
            ActionCommand::Send { .. } => "SEND",
            ActionCommand::Read { .. } => "READ",
        }
    }

    pub fn channel(&self) -> &str {
        match self {
            ActionCommand::Send { channel, .. } | ActionCommand::Read { channel, .. } => channel,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("{verb} command is missing '{field}'")]
    MissingField { verb: &'static str, field: &'static str },
}

/// One recognized token and its parse result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandToken {
    /// Byte range of the whole token, brackets included.
    pub span: Range<usize>,
    pub raw: String,
    pub command: Result<ActionCommand, CommandError>,
}

/// Normalize a channel reference to `#name`. Returns `None` for blanks.
pub fn normalize_channel(raw: &str) -> Option<String> {
    let name = raw.trim().trim_start_matches('#').trim();
    if name.is_empty() {
        None
    } else {
        Some(format!("#{}", name))
    }
}

/// Parse a limit value, clamping into range. Unparseable values fall back
/// to the default.
pub fn clamp_limit(raw: Option<&str>) -> u32 {
    match raw.and_then(|v| v.trim().parse::<i64>().ok()) {
        Some(n) => n.clamp(1, MAX_READ_LIMIT as i64) as u32,
        None => DEFAULT_READ_LIMIT,
    }
}

/// Find every `SEND`/`READ` token in `text`, in source order.
///
/// Brackets that do not open a known verb are left alone, as are
/// unterminated or oversized tokens.
pub fn scan_commands(text: &str) -> Vec<CommandToken> {
    let mut tokens = Vec::new();
    let mut cursor = 0;

    while let Some(offset) = text[cursor..].find('[') {
        let start = cursor + offset;
        match token_at(text, start) {
            Some(token) => {
                cursor = token.span.end;
                tokens.push(token);
            }
            None => cursor = start + 1,
        }
    }
    tokens
}

fn token_at(text: &str, start: usize) -> Option<CommandToken> {
    let rest = &text[start..];
    let close = rest
        .char_indices()
        .take(MAX_TOKEN_CHARS)
        .find(|&(_, c)| c == ']')
        .map(|(i, _)| i)?;
    let body = &rest[1..close];

    let (verb, args) = body.split_once(':')?;
    let verb: &'static str = match verb.trim().to_ascii_uppercase().as_str() {
        "SEND" => "SEND",
        "READ" => "READ",
        _ => return None,
    };

    let pairs = split_pairs(args);
    let get = |key: &str| {
        pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    };

    let channel = get("channel").and_then(normalize_channel);
    let command = match (verb, channel) {
        (_, None) => Err(CommandError::MissingField {
            verb,
            field: "channel",
        }),
        ("SEND", Some(channel)) => match get("text").map(str::trim).filter(|t| !t.is_empty()) {
            Some(body) => Ok(ActionCommand::Send {
                channel,
                text: body.to_string(),
            }),
            None => Err(CommandError::MissingField {
                verb: "SEND",
                field: "text",
            }),
        },
        (_, Some(channel)) => Ok(ActionCommand::Read {
            channel,
            limit: clamp_limit(get("limit")),
        }),
    };

    let end = start + close + 1;
    Some(CommandToken {
        span: start..end,
        raw: text[start..end].to_string(),
        command,
    })
}

/// Split `key=value:key=value` on colons that begin a known key.
fn split_pairs(args: &str) -> Vec<(String, String)> {
    let mut pairs: Vec<(String, String)> = Vec::new();
    for segment in args.split(':') {
        match known_key(segment) {
            Some((key, value)) => pairs.push((key, value.to_string())),
            None => {
                if let Some((_, value)) = pairs.last_mut() {
                    value.push(':');
                    value.push_str(segment);
                }
            }
        }
    }
    pairs
}

fn known_key(segment: &str) -> Option<(String, &str)> {
    let (key, value) = segment.split_once('=')?;
    let key = key.trim().to_ascii_lowercase();
    if KNOWN_KEYS.contains(&key.as_str()) {
        Some((key, value))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn only(text: &str) -> CommandToken {
        let mut tokens = scan_commands(text);
        assert_eq!(tokens.len(), 1, "expected one token in {:?}", text);
        tokens.remove(0)
    }

    #[test]
    fn test_send_with_bare_channel() {
        let text = "Done. [SEND:channel=general:text=Hello team]";
        let token = only(text);
        assert_eq!(
            token.command,
            Ok(ActionCommand::Send {
                channel: "#general".to_string(),
                text: "Hello team".to_string(),
            })
        );
        assert_eq!(&text[token.span.clone()], "[SEND:channel=general:text=Hello team]");
    }

    #[test]
    fn test_case_insensitive_verb_and_keys() {
        let token = only("[read:Channel=##ops:LIMIT=20]");
        assert_eq!(
            token.command,
            Ok(ActionCommand::Read {
                channel: "#ops".to_string(),
                limit: 20,
            })
        );
    }

    #[test]
    fn test_colon_inside_value_is_kept() {
        let token = only("[SEND:channel=#dev:text=Deploy at 10:30: all good]");
        match token.command.unwrap() {
            ActionCommand::Send { text, .. } => assert_eq!(text, "Deploy at 10:30: all good"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_limit_clamping() {
        assert_eq!(clamp_limit(Some("500")), 100);
        assert_eq!(clamp_limit(Some("0")), 1);
        assert_eq!(clamp_limit(Some("-4")), 1);
        assert_eq!(clamp_limit(Some("lots")), DEFAULT_READ_LIMIT);
        assert_eq!(clamp_limit(None), DEFAULT_READ_LIMIT);
    }

    #[test]
    fn test_missing_fields_are_errors_not_skips() {
        let token = only("[SEND:channel=#x]");
        assert_eq!(
            token.command,
            Err(CommandError::MissingField {
                verb: "SEND",
                field: "text",
            })
        );
        assert!(only("[READ:limit=5]").command.is_err());
    }

    #[test]
    fn test_multiple_tokens_in_order() {
        let tokens = scan_commands("a [READ:channel=a] b [SEND:channel=b:text=hi] c");
        let verbs: Vec<&str> = tokens
            .iter()
            .map(|t| t.command.as_ref().unwrap().verb())
            .collect();
        assert_eq!(verbs, vec!["READ", "SEND"]);
        assert!(tokens[0].span.end <= tokens[1].span.start);
    }

    #[test]
    fn test_non_commands_are_ignored() {
        assert!(scan_commands("see [1] and [link](http://x) and [NOTE:text=hi]").is_empty());
        assert!(scan_commands("[SEND:channel=a:text=unterminated").is_empty());
        let long = format!("[SEND:channel=a:text={}]", "y".repeat(MAX_TOKEN_CHARS));
        assert!(scan_commands(&long).is_empty());
    }

    #[test]
    fn test_normalize_channel() {
        assert_eq!(normalize_channel(" general "), Some("#general".to_string()));
        assert_eq!(normalize_channel("###ops"), Some("#ops".to_string()));
        assert_eq!(normalize_channel("#"), None);
    }
}
