//! Line-oriented link helpers for preparing input lists.
//!
//! Both helpers map one line to zero or one URL.

use std::sync::OnceLock;

use regex::Regex;

fn telegram_link_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(https?://t\.me/\S+)").expect("valid regex"))
}

fn numbered_link_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*\d+\.\s*(https?://\S+)").expect("valid regex"))
}

fn any_link_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(https?://\S+)").expect("valid regex"))
}

/// First `t.me` link found anywhere in a free-form line.
pub fn extract_link(line: &str) -> Option<&str> {
    telegram_link_re().find(line).map(|m| m.as_str())
}

/// `"42. https://..."` → `"https://..."`; otherwise the first URL in the line.
pub fn strip_numbering(line: &str) -> Option<&str> {
    if let Some(m) = numbered_link_re().captures(line).and_then(|c| c.get(1)) {
        return Some(m.as_str());
    }
    any_link_re().find(line).map(|m| m.as_str())
}

/// Apply a line helper to a whole document, one URL per output line.
pub fn transform_lines<'a>(text: &'a str, f: impl Fn(&'a str) -> Option<&'a str>) -> String {
    let mut out = String::new();
    for line in text.lines() {
        if let Some(url) = f(line) {
            out.push_str(url);
            out.push('\n');
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_numbering_prefix() {
        assert_eq!(
            strip_numbering("42. https://t.me/examplechat"),
            Some("https://t.me/examplechat")
        );
        assert_eq!(
            strip_numbering("  7.https://t.me/x_chat trailing"),
            Some("https://t.me/x_chat")
        );
    }

    #[test]
    fn strip_numbering_falls_back_to_any_url() {
        assert_eq!(
            strip_numbering("see https://example.com/page now"),
            Some("https://example.com/page")
        );
        assert_eq!(strip_numbering("no links here"), None);
    }

    #[test]
    fn extracts_telegram_links_only() {
        assert_eq!(
            extract_link("[12:01] alice: join https://t.me/rustaceans please"),
            Some("https://t.me/rustaceans")
        );
        assert_eq!(extract_link("https://example.com/x"), None);
    }

    #[test]
    fn transform_lines_drops_lines_without_links() {
        let text = "1. https://t.me/a\nnothing\n2. https://t.me/b\n";
        assert_eq!(
            transform_lines(text, strip_numbering),
            "https://t.me/a\nhttps://t.me/b\n"
        );
    }
}
