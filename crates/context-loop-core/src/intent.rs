//! Narrow detection of direct action requests in a raw user query.
//!
//! Used before any context is loaded: a query like "send Deploy is done to
//! #releases" or "read the last 20 messages in #ops" is executed directly
//! instead of going through retrieval and the language model.
//!
//! A query only counts as an action when all three hold:
//! 1. it starts with an action verb (optionally after "please");
//! 2. it names a channel with a `#token`, or the request carries a
//!    fallback channel;
//! 3. there is an explicit marker: the request's action flag, an action
//!    keyword (`slack`, `channel`, `message`, `post`) after the verb, or an
//!    unambiguous verb (`send`, `post`, `notify`, `read`, `fetch`) together
//!    with a `#token`. A `to/in/from #channel` binding alone is not a marker.
//!
//! Questions (ending in `?` or opening with an interrogative) are never
//! actions.

use crate::command::{clamp_limit, normalize_channel, ActionCommand};

const SEND_VERBS: [&str; 4] = ["send", "post", "message", "notify"];
const READ_VERBS: [&str; 3] = ["read", "fetch", "pull"];
const EXPLICIT_VERBS: [&str; 5] = ["send", "post", "notify", "read", "fetch"];
const KEYWORDS: [&str; 6] = ["slack", "channel", "message", "messages", "post", "dm"];
const BINDINGS: [&str; 5] = ["to", "in", "into", "on", "from"];
const INTERROGATIVES: [&str; 11] = [
    "what", "why", "how", "who", "whom", "whose", "when", "where", "which", "is", "are",
];
const FILLERS: [&str; 5] = ["a message saying", "message saying", "saying", "message", "that"];

fn is_question(query: &str) -> bool {
    if query.trim_end().ends_with('?') {
        return true;
    }
    query
        .split_whitespace()
        .next()
        .map(|w| INTERROGATIVES.contains(&bare(w).as_str()))
        .unwrap_or(false)
}

/// Lowercase word with surrounding punctuation removed.
fn bare(word: &str) -> String {
    word.trim_matches(|c: char| !c.is_alphanumeric() && c != '#')
        .to_ascii_lowercase()
}

fn channel_word(word: &str) -> Option<String> {
    let w = word.trim_end_matches(|c: char| matches!(c, ':' | ',' | '.' | '!' | ';'));
    if w.starts_with('#') && w.chars().skip(1).any(|c| c.is_alphanumeric()) {
        normalize_channel(w)
    } else {
        None
    }
}

fn strip_fillers(text: &str) -> String {
    let mut t = text
        .trim()
        .trim_start_matches(|c: char| c == ':' || c == '-')
        .trim()
        .to_string();
    for filler in FILLERS {
        let lower = t.to_ascii_lowercase();
        if lower.starts_with(filler)
            && lower[filler.len()..].starts_with(|c: char| c.is_whitespace() || c == ':')
        {
            t = t[filler.len()..]
                .trim_start_matches(|c: char| c.is_whitespace() || c == ':')
                .to_string();
            break;
        }
    }
    t.trim_matches(|c: char| c == '"' || c == '\'' || c == '“' || c == '”')
        .trim()
        .to_string()
}

/// Return the action a query asks for directly, if any.
pub fn detect_action_intent(
    query: &str,
    action_channel: Option<&str>,
    action_flag: bool,
) -> Option<ActionCommand> {
    let query = query.trim();
    if query.is_empty() || is_question(query) {
        return None;
    }

    let words: Vec<&str> = query.split_whitespace().collect();
    let verb_idx = match words.first().map(|w| bare(w)) {
        Some(w) if w == "please" => 1,
        _ => 0,
    };
    let verb = bare(words.get(verb_idx)?);
    let is_send = SEND_VERBS.contains(&verb.as_str());
    let is_read = READ_VERBS.contains(&verb.as_str());
    if !is_send && !is_read {
        return None;
    }

    let channel_pos = words
        .iter()
        .enumerate()
        .skip(verb_idx + 1)
        .find_map(|(i, w)| channel_word(w).map(|c| (i, c)));
    let bound = channel_pos
        .as_ref()
        .map_or(false, |(i, _)| *i > 0 && BINDINGS.contains(&bare(words[*i - 1]).as_str()));
    let has_keyword = words
        .iter()
        .enumerate()
        .any(|(i, w)| i != verb_idx && KEYWORDS.contains(&bare(w).as_str()));
    let explicit_verb = EXPLICIT_VERBS.contains(&verb.as_str()) && channel_pos.is_some();
    if !(action_flag || has_keyword || explicit_verb) {
        return None;
    }

    let channel = match &channel_pos {
        Some((_, c)) => c.clone(),
        None => action_channel.and_then(normalize_channel)?,
    };

    if is_read {
        let limit = words
            .iter()
            .skip(verb_idx + 1)
            .find(|w| bare(w).parse::<i64>().is_ok())
            .map(|w| bare(w));
        return Some(ActionCommand::Read {
            channel,
            limit: clamp_limit(limit.as_deref()),
        });
    }

    let body: Vec<&str> = match channel_pos {
        Some((i, _)) if bound && i > verb_idx + 2 => words[verb_idx + 1..i - 1].to_vec(),
        Some((i, _)) if bound => words[i + 1..].to_vec(),
        Some((i, _)) => words[verb_idx + 1..]
            .iter()
            .enumerate()
            .filter(|(j, _)| verb_idx + 1 + j != i)
            .map(|(_, w)| *w)
            .collect(),
        None => {
            let mut rest = words[verb_idx + 1..].to_vec();
            if rest.len() >= 2
                && bare(rest[rest.len() - 1]) == "slack"
                && BINDINGS.contains(&bare(rest[rest.len() - 2]).as_str())
            {
                rest.truncate(rest.len() - 2);
            }
            rest
        }
    };
    let text = strip_fillers(&body.join(" "));
    if text.is_empty() {
        return None;
    }
    Some(ActionCommand::Send { channel, text })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_with_binding() {
        assert_eq!(
            detect_action_intent("send Deploy is done to #releases", None, false),
            Some(ActionCommand::Send {
                channel: "#releases".to_string(),
                text: "Deploy is done".to_string(),
            })
        );
    }

    #[test]
    fn test_send_text_after_channel() {
        assert_eq!(
            detect_action_intent("Please post to #general: \"standup moved to 10\"", None, false),
            Some(ActionCommand::Send {
                channel: "#general".to_string(),
                text: "standup moved to 10".to_string(),
            })
        );
    }

    #[test]
    fn test_read_with_count() {
        assert_eq!(
            detect_action_intent("read the last 20 messages in #ops", None, false),
            Some(ActionCommand::Read {
                channel: "#ops".to_string(),
                limit: 20,
            })
        );
    }

    #[test]
    fn test_fallback_channel_needs_marker() {
        assert_eq!(
            detect_action_intent("send the release notes", Some("releases"), false),
            None
        );
        assert_eq!(
            detect_action_intent("send the release notes", Some("releases"), true),
            Some(ActionCommand::Send {
                channel: "#releases".to_string(),
                text: "the release notes".to_string(),
            })
        );
    }

    #[test]
    fn test_questions_are_never_actions() {
        assert_eq!(detect_action_intent("can you send hi to #general?", None, true), None);
        assert_eq!(detect_action_intent("what was posted in #ops", None, false), None);
    }

    #[test]
    fn test_plain_requests_are_not_actions() {
        assert_eq!(detect_action_intent("show my open tasks", None, false), None);
        assert_eq!(detect_action_intent("show tasks tagged #backend", None, false), None);
        assert_eq!(detect_action_intent("summarize project Apollo", None, true), None);
        assert_eq!(detect_action_intent("", None, true), None);
        assert_eq!(
            detect_action_intent("Tell me about the release checklist in #releases", None, false),
            None
        );
        assert_eq!(detect_action_intent("show my open tasks in #backend", None, false), None);
        assert_eq!(detect_action_intent("get the latest build status from #ci", None, false), None);
    }

    #[test]
    fn test_binding_alone_is_not_a_marker() {
        assert_eq!(detect_action_intent("pull the notes from #ops", None, false), None);
        assert_eq!(
            detect_action_intent("pull the last 5 messages from #ops", None, false),
            Some(ActionCommand::Read {
                channel: "#ops".to_string(),
                limit: 5,
            })
        );
    }
}
