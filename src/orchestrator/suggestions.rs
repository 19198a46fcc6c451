//! Follow-up question suggestions.

use context_loop_core::api::{Anchors, LoopMode};

/// Offered only when a messaging integration is connected.
pub const ACTION_SUGGESTION: &str = "Share a summary of this in a channel";

pub fn suggestions(mode: LoopMode, anchors: &Anchors, actions_available: bool) -> Vec<String> {
    let mut out: Vec<&str> = match mode {
        LoopMode::Spaces if anchors.page().is_some() => vec![
            "Summarize this page",
            "What related documents should I read?",
            "What decisions does this page record?",
        ],
        LoopMode::Spaces if anchors.project().is_some() => vec![
            "What is blocking this project?",
            "Which tasks are still open?",
            "How far along are the epics?",
        ],
        LoopMode::Spaces if anchors.task().is_some() => vec![
            "What does this task depend on?",
            "Who else is working on this project?",
            "Break this task into next steps",
        ],
        LoopMode::Spaces => vec![
            "What changed in this workspace recently?",
            "Which projects are active?",
            "Find documents about onboarding",
        ],
        LoopMode::Org => vec![
            "Who is on my team?",
            "Who should I talk to about this?",
            "How is the organization structured?",
        ],
        LoopMode::Dashboard => vec![
            "What should I focus on today?",
            "Which of my tasks are blocked?",
            "What projects are active?",
        ],
    };
    if actions_available {
        out.push(ACTION_SUGGESTION);
    }
    out.into_iter().map(str::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_suggestion_needs_integration() {
        let anchors = Anchors::default();
        let without = suggestions(LoopMode::Dashboard, &anchors, false);
        assert!(!without.iter().any(|s| s == ACTION_SUGGESTION));
        let with = suggestions(LoopMode::Dashboard, &anchors, true);
        assert_eq!(with.last().map(String::as_str), Some(ACTION_SUGGESTION));
    }
}
