//! Token estimation utilities.
//!
//! Uses a byte-based heuristic: ~4 bytes per token, rounded up. It is
//! monotonic in the text length and stable across runs, which is all the
//! context tiers need.

use kubrick_core::message::Message;

/// Per-message overhead for role names and delimiters.
const MESSAGE_OVERHEAD: usize = 4;

/// Estimate the token count for a string.
pub fn estimate_tokens(text: &str) -> usize {
    text.len().div_ceil(4)
}

/// Estimate tokens for a single message as it is sent to the provider.
pub fn estimate_message_tokens(message: &Message) -> usize {
    MESSAGE_OVERHEAD + estimate_tokens(&message.content_for_chat())
}

/// Estimate tokens for a slice of messages.
pub fn estimate_messages_tokens(messages: &[Message]) -> usize {
    messages.iter().map(estimate_message_tokens).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_string_is_zero() {
        assert_eq!(estimate_tokens(""), 0);
    }

    #[test]
    fn four_bytes_is_one_token() {
        assert_eq!(estimate_tokens("test"), 1);
    }

    #[test]
    fn five_bytes_rounds_up() {
        assert_eq!(estimate_tokens("hello"), 2);
    }

    #[test]
    fn multi_byte_text_counts_bytes() {
        // 3 characters, 9 bytes
        assert_eq!(estimate_tokens("日本語"), 3);
    }

    #[test]
    fn message_includes_overhead() {
        let msg = Message::user("test"); // 1 token + 4 overhead
        assert_eq!(estimate_message_tokens(&msg), 5);
    }

    #[test]
    fn tool_messages_count_their_prefix() {
        let msg = Message::tool_result("ls", "ok"); // "Tool: ls\nok" is 11 bytes
        assert_eq!(estimate_message_tokens(&msg), 4 + 3);
    }

    #[test]
    fn multiple_messages() {
        let msgs = vec![Message::user("hello"), Message::assistant("world")];
        assert_eq!(estimate_messages_tokens(&msgs), 12);
    }
}
