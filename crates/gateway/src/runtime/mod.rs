//! Agent-loop runtime: the ReAct control core and its supporting state.

pub mod bus;
pub mod cancel;
pub mod runs;
pub mod session_lock;
pub mod turn;

use eda_domain::tool::{ContentPart, Message, MessageContent, Role, ToolCall};

/// Truncate `s` to at most `max` bytes, respecting UTF-8 character
/// boundaries, appending `"..."` when truncated.
pub(super) fn truncate_str(s: &str, max: usize) -> String {
    if s.len() <= max {
        s.to_string()
    } else {
        let mut end = max;
        while !s.is_char_boundary(end) && end > 0 {
            end -= 1;
        }
        format!("{}...", &s[..end])
    }
}

/// Build the assistant message for one agent-loop iteration: optional
/// text content followed by a `ToolUse` part per tool call, in emission
/// order. This is the turn persisted to `SessionStore` alongside the
/// synthetic tool-result turn the executor's outputs produce.
pub(super) fn build_assistant_tool_message(text: &str, tool_calls: &[ToolCall]) -> Message {
    let mut parts = Vec::new();
    if !text.is_empty() {
        parts.push(ContentPart::Text {
            text: text.to_string(),
        });
    }
    for tc in tool_calls {
        parts.push(ContentPart::ToolUse {
            id: tc.call_id.clone(),
            name: tc.tool_name.clone(),
            input: tc.arguments.clone(),
        });
    }
    Message {
        role: Role::Assistant,
        content: MessageContent::Parts(parts),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_str_empty_is_unchanged() {
        assert_eq!(truncate_str("", 10), "");
    }

    #[test]
    fn truncate_str_within_limit_is_unchanged() {
        assert_eq!(truncate_str("hello", 10), "hello");
    }

    #[test]
    fn truncate_str_exact_boundary_is_unchanged() {
        assert_eq!(truncate_str("hello", 5), "hello");
    }

    #[test]
    fn truncate_str_ascii_over_limit_appends_ellipsis() {
        assert_eq!(truncate_str("hello world", 5), "hello...");
    }

    #[test]
    fn truncate_str_never_splits_a_multibyte_char() {
        // "é" is 2 bytes (0xC3 0xA9); cutting at 1 must land before it.
        let s = "aébc";
        let t = truncate_str(s, 2);
        assert!(std::str::from_utf8(t.as_bytes()).is_ok());
    }

    #[test]
    fn truncate_str_emoji_boundary() {
        let s = "a🎉b";
        let t = truncate_str(s, 2);
        assert!(std::str::from_utf8(t.as_bytes()).is_ok());
        assert!(t.ends_with("..."));
    }

    #[test]
    fn truncate_str_max_zero_still_valid_utf8() {
        let t = truncate_str("hello", 0);
        assert!(std::str::from_utf8(t.as_bytes()).is_ok());
    }

    #[test]
    fn truncate_str_max_exceeds_len_is_unchanged() {
        assert_eq!(truncate_str("hi", 1000), "hi");
    }

    fn tc(id: &str, name: &str) -> ToolCall {
        ToolCall {
            call_id: id.into(),
            tool_name: name.into(),
            arguments: serde_json::json!({"a": 1}),
        }
    }

    #[test]
    fn assistant_message_text_only() {
        let msg = build_assistant_tool_message("hello", &[]);
        match msg.content {
            MessageContent::Parts(parts) => {
                assert_eq!(parts.len(), 1);
                assert!(matches!(parts[0], ContentPart::Text { .. }));
            }
            _ => panic!("expected Parts"),
        }
    }

    #[test]
    fn assistant_message_tool_calls_only() {
        let msg = build_assistant_tool_message("", &[tc("c1", "write_file")]);
        match msg.content {
            MessageContent::Parts(parts) => {
                assert_eq!(parts.len(), 1);
                assert!(matches!(parts[0], ContentPart::ToolUse { .. }));
            }
            _ => panic!("expected Parts"),
        }
    }

    #[test]
    fn assistant_message_text_and_tool_calls_preserves_order() {
        let msg = build_assistant_tool_message("thinking...", &[tc("c1", "a"), tc("c2", "b")]);
        match msg.content {
            MessageContent::Parts(parts) => {
                assert_eq!(parts.len(), 3);
                assert!(matches!(parts[0], ContentPart::Text { .. }));
                match &parts[1] {
                    ContentPart::ToolUse { id, .. } => assert_eq!(id, "c1"),
                    _ => panic!("expected ToolUse"),
                }
                match &parts[2] {
                    ContentPart::ToolUse { id, .. } => assert_eq!(id, "c2"),
                    _ => panic!("expected ToolUse"),
                }
            }
            _ => panic!("expected Parts"),
        }
    }

    #[test]
    fn assistant_message_empty_text_is_not_included() {
        let msg = build_assistant_tool_message("", &[tc("c1", "a")]);
        match msg.content {
            MessageContent::Parts(parts) => {
                assert!(!parts.iter().any(|p| matches!(p, ContentPart::Text { .. })));
            }
            _ => panic!("expected Parts"),
        }
    }
}
