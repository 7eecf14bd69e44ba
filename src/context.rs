//! Context assembly: the ordered message list handed to the completion
//! provider. Pure functions over what the memory store and compactor
//! expose — no I/O here.

use crate::models::ChatTurn;

/// Label prefixed to the synthetic summary block so the model can tell
/// compacted history from live instructions.
const SUMMARY_LABEL: &str = "HISTORY SUMMARY (context):";

/// System prompt followed by the capped raw history, oldest first. The
/// caller appends the new user turn.
pub fn build_context(system_prompt: &str, history: Vec<ChatTurn>) -> Vec<ChatTurn> {
    let mut messages = Vec::with_capacity(history.len() + 1);
    messages.push(ChatTurn::system(system_prompt));
    messages.extend(history);
    messages
}

/// System prompt, then (when present) a synthetic system block carrying
/// the running summary, then the live tail window, oldest first.
pub fn build_context_with_summary(
    system_prompt: &str,
    summary: Option<&str>,
    tail: Vec<ChatTurn>,
) -> Vec<ChatTurn> {
    let mut messages = Vec::with_capacity(tail.len() + 2);
    messages.push(ChatTurn::system(system_prompt));
    if let Some(summary) = summary.map(str::trim).filter(|s| !s.is_empty()) {
        messages.push(ChatTurn::system(format!("{SUMMARY_LABEL}\n{summary}")));
    }
    messages.extend(tail);
    messages
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ChatRole;

    #[test]
    fn test_plain_context_order() {
        let history = vec![ChatTurn::user("hi"), ChatTurn::assistant("hello")];
        let messages = build_context("be brief", history);
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0].role, ChatRole::System);
        assert_eq!(messages[0].content, "be brief");
        assert_eq!(messages[1].content, "hi");
        assert_eq!(messages[2].content, "hello");
    }

    #[test]
    fn test_summary_block_inserted_after_system() {
        let tail = vec![ChatTurn::user("next question")];
        let messages = build_context_with_summary("be brief", Some("- user likes tea"), tail);
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[1].role, ChatRole::System);
        assert!(messages[1].content.starts_with("HISTORY SUMMARY"));
        assert!(messages[1].content.contains("user likes tea"));
    }

    #[test]
    fn test_empty_summary_omitted() {
        let messages = build_context_with_summary("sys", Some("   "), vec![ChatTurn::user("q")]);
        assert_eq!(messages.len(), 2);
        let messages = build_context_with_summary("sys", None, vec![]);
        assert_eq!(messages.len(), 1);
    }
}
