//! Input text helpers shared by the router and the performance trigger.

/// Characters dropped by [`normalize_input`] besides whitespace.
const NOISE: &[char] = &['。', '?', '？', '!', '！', '、'];

/// Strip punctuation and whitespace that speech recognition tends to sprinkle
/// into otherwise identical phrases.
pub fn normalize_input(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_whitespace() && !NOISE.contains(c))
        .collect()
}

/// True if `text` contains any of the non-empty `phrases`.
pub fn contains_any<S: AsRef<str>>(text: &str, phrases: &[S]) -> bool {
    phrases
        .iter()
        .map(AsRef::as_ref)
        .any(|p| !p.is_empty() && text.contains(p))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_strips_punctuation_and_spaces() {
        assert_eq!(normalize_input("歌って！"), "歌って");
        assert_eq!(normalize_input(" ブラウザ を 起動。"), "ブラウザを起動");
        assert_eq!(normalize_input("what?\tnow!"), "whatnow");
        assert_eq!(normalize_input("、。"), "");
    }

    #[test]
    fn test_contains_any_ignores_empty_phrases() {
        assert!(contains_any("今日はコンサート", &["ライブ", "コンサート"]));
        assert!(!contains_any("hello", &[""]));
        assert!(!contains_any("hello", &Vec::<String>::new()));
    }
}
