//! Conversation history windows

use super::parse::truncate_chars;
use crate::llm::ChatMessage;

/// The most recent `n` turns, oldest first
pub fn recent_turns(history: &[ChatMessage], n: usize) -> &[ChatMessage] {
    &history[history.len().saturating_sub(n)..]
}

/// Render turns as `Role: content` lines, each cut to `max_chars`
pub fn format_history(turns: &[ChatMessage], max_chars: usize) -> String {
    turns
        .iter()
        .map(|turn| {
            let content = truncate_chars(turn.content.trim(), max_chars);
            format!("{}: {}", role_label(&turn.role), content)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn role_label(role: &str) -> String {
    match role {
        "user" => "User".to_string(),
        "assistant" => "Assistant".to_string(),
        "system" => "System".to_string(),
        other => {
            let mut chars = other.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => "Unknown".to_string(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recent_turns_window() {
        let history: Vec<ChatMessage> = (0..10)
            .map(|i| ChatMessage::user(format!("turn {}", i)))
            .collect();
        let recent = recent_turns(&history, 3);
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[0].content, "turn 7");
        assert_eq!(recent_turns(&history[..2], 6).len(), 2);
    }

    #[test]
    fn test_format_history() {
        let turns = vec![
            ChatMessage::user("What is the fund size?"),
            ChatMessage::assistant("It is $250M and closed in 2021."),
        ];
        assert_eq!(
            format_history(&turns, 10),
            "User: What is th\nAssistant: It is $250"
        );
    }
}
