//! 文本占位内容
//!
//! 按原文长度分三档：短文本显示固定提示，中等长度显示首尾片段，
//! 长文本显示第一句并附加提示。

use crate::moderation::config::constants;

pub const SHORT_PLACEHOLDER: &str = "[Content filtered by PageGuard]";
pub const ADDITIONAL_CONTENT_NOTICE: &str = "[Additional content filtered]";

const EDGE_CHARS: usize = 20;
const MAX_SENTENCE_CHARS: usize = 150;

/// 生成与原文长度相称的占位文本
pub fn placeholder_for(text: &str) -> String {
    let text = text.trim();
    let length = text.chars().count();

    if length < constants::SHORT_TEXT_LIMIT {
        SHORT_PLACEHOLDER.to_string()
    } else if length < constants::MEDIUM_TEXT_LIMIT {
        let head: String = text.chars().take(EDGE_CHARS).collect();
        let tail: String = text.chars().skip(length - EDGE_CHARS).collect();
        format!("{} … {}", head.trim_end(), tail.trim_start())
    } else {
        format!("{} {}", first_sentence(text), ADDITIONAL_CONTENT_NOTICE)
    }
}

/// 第一句话；句子过长时截断
fn first_sentence(text: &str) -> String {
    let mut sentence = String::new();
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        sentence.push(c);
        let at_boundary = matches!(c, '.' | '!' | '?' | '。' | '！' | '？')
            && chars.peek().map_or(true, |next| next.is_whitespace());
        if at_boundary {
            break;
        }
        if sentence.chars().count() >= MAX_SENTENCE_CHARS {
            sentence.push('…');
            break;
        }
    }

    sentence
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_text() {
        assert_eq!(placeholder_for("You absolute bastard"), SHORT_PLACEHOLDER);
    }

    #[test]
    fn test_medium_text_keeps_head_and_tail() {
        let text = "This opening part is fine but somewhere in the middle there is something nasty, and then it ends calmly.";
        let placeholder = placeholder_for(text);
        assert!(placeholder.starts_with("This opening part is"));
        assert!(placeholder.ends_with("then it ends calmly."));
        assert!(placeholder.contains('…'));
        assert!(!placeholder.contains("nasty"));
    }

    #[test]
    fn test_long_text_first_sentence() {
        let text = format!("First sentence here. {}", "More words follow. ".repeat(20));
        assert_eq!(
            placeholder_for(&text),
            format!("First sentence here. {}", ADDITIONAL_CONTENT_NOTICE)
        );
    }

    #[test]
    fn test_long_text_without_punctuation() {
        let text = "word ".repeat(100);
        let placeholder = placeholder_for(&text);
        assert!(placeholder.ends_with(ADDITIONAL_CONTENT_NOTICE));
        assert!(placeholder.chars().count() < 200);
    }
}
