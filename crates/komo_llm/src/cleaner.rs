//! Reply cleaning applied to every provider success.
//!
//! Cleaning is infallible: anything that does not match a complete pattern
//! (an unterminated bracket or reasoning block) is left untouched.

use std::sync::OnceLock;

use regex::Regex;

fn reasoning_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<think>.*?</think>|<thinking>.*?</thinking>").unwrap())
}

fn control_tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\[[^\]\n]*\]").unwrap())
}

fn markup_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\*\*|[*#`_>]").unwrap())
}

fn blank_lines_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\n[ \t]*(?:\n[ \t]*)+\n").unwrap())
}

/// Strip reasoning blocks, bracketed control tags and markup from a reply.
///
/// Order: `<think>` blocks, same-line `[ ... ]` tags, markup punctuation,
/// runs of blank lines collapsed to one, then the ends are trimmed.
pub fn clean_reply(raw: &str) -> String {
    let text = reasoning_re().replace_all(raw, "");
    let text = control_tag_re().replace_all(&text, "");
    let text = markup_re().replace_all(&text, "");
    let text = blank_lines_re().replace_all(&text, "\n\n");
    text.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_control_tags_removed() {
        assert_eq!(clean_reply("Hello [ID:12] world"), "Hello  world");
        assert_eq!(clean_reply("[ID:17]やったね！"), "やったね！");
    }

    #[test]
    fn test_unterminated_bracket_untouched() {
        assert_eq!(clean_reply("Hello [ID:12 world"), "Hello [ID:12 world");
        // A bracket closing on a later line is not a control tag
        assert_eq!(clean_reply("a [b\nc] d"), "a [b\nc] d");
    }

    #[test]
    fn test_reasoning_blocks_removed() {
        let raw = "<think>\nthe user wants a greeting\n</think>\nこんにちは";
        assert_eq!(clean_reply(raw), "こんにちは");
        assert_eq!(clean_reply("<thinking>x</thinking>ok"), "ok");
    }

    #[test]
    fn test_markup_stripped() {
        assert_eq!(clean_reply("**bold** and *em* `code` # title"), "bold and em code  title");
        assert_eq!(clean_reply("> quoted_text"), "quotedtext");
    }

    #[test]
    fn test_blank_lines_collapsed_and_trimmed() {
        assert_eq!(clean_reply("  one\n\n\n\ntwo\n \n\t\nthree  "), "one\n\ntwo\n\nthree");
        assert_eq!(clean_reply("   "), "");
    }
}
