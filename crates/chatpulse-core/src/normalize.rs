//! Chat reference normalization.
//!
//! Accepted shapes: `name`, `@name`, `t.me/name`, `https://t.me/name`,
//! `telegram.me/name`, `tg://resolve?domain=name`, invite links and numbered
//! list lines such as `42. https://t.me/name`.

use std::{collections::HashSet, sync::OnceLock};

use regex::Regex;

use crate::domain::ChatIdentifier;

pub const PLATFORM_DOMAIN: &str = "t.me";

const TELEGRAM_HOSTS: &[&str] = &["t.me", "telegram.me", "telegram.dog"];

fn list_number_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d+[.)]\s*").expect("valid regex"))
}

fn inline_separator_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[,;\s]+").expect("valid regex"))
}

/// True for a plain username-like token (`[A-Za-z0-9_]+`).
pub fn is_simple_name(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_')
}

/// Normalize one raw line into a canonical identifier.
///
/// Returns `None` for blank lines, `#` comments and tokens that are neither a
/// username nor a Telegram link.
pub fn normalize(raw: &str) -> Option<ChatIdentifier> {
    let line = raw.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }

    let line = list_number_re().replace(line, "");
    let line = line.trim();
    let line = line.strip_prefix('@').unwrap_or(line).trim();
    if line.is_empty() {
        return None;
    }

    let canonical = match canonical_url(line) {
        Some(url) => url,
        None if is_simple_name(line) => line.to_string(),
        None => {
            tracing::warn!(line = raw.trim(), "not a Telegram chat reference; skipped");
            return None;
        }
    };
    Some(ChatIdentifier::from_canonical(canonical))
}

/// Canonical form of a Telegram link, or `None` when `s` is not one.
fn canonical_url(s: &str) -> Option<String> {
    if let Some(query) = strip_prefix_ignore_case(s, "tg://resolve?") {
        let domain = query
            .split('&')
            .find_map(|kv| kv.strip_prefix("domain="))?;
        return is_simple_name(domain).then(|| domain.to_string());
    }

    let rest = strip_prefix_ignore_case(s, "https://")
        .or_else(|| strip_prefix_ignore_case(s, "http://"))
        .unwrap_or(s);
    let rest = strip_prefix_ignore_case(rest, "www.").unwrap_or(rest);

    let (host, path) = rest.split_once('/')?;
    if !TELEGRAM_HOSTS.iter().any(|h| host.eq_ignore_ascii_case(h)) {
        return None;
    }

    let path = path.split(['?', '#']).next().unwrap_or_default();
    let path = path.trim_end_matches('/');
    if path.is_empty() {
        return None;
    }

    let segments: Vec<&str> = path.split('/').collect();
    let name = match segments.as_slice() {
        [name] => Some(*name),
        // Web preview (`s/name`) and post links (`name/123`).
        ["s", name] => Some(*name),
        [name, post] if post.bytes().all(|b| b.is_ascii_digit()) => Some(*name),
        _ => None,
    };

    match name {
        Some(name) if is_simple_name(name) && name != "c" => Some(name.to_string()),
        _ => Some(format!("https://{PLATFORM_DOMAIN}/{path}")),
    }
}

fn strip_prefix_ignore_case<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    let head = s.get(..prefix.len())?;
    if head.eq_ignore_ascii_case(prefix) {
        Some(&s[prefix.len()..])
    } else {
        None
    }
}

/// Normalize and de-duplicate a sequence of raw references, keeping the
/// first-seen order and spelling.
pub fn normalize_all<'a>(lines: impl IntoIterator<Item = &'a str>) -> Vec<ChatIdentifier> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for raw in lines {
        let Some(id) = normalize(raw) else {
            continue;
        };
        if seen.insert(id.dedup_key()) {
            out.push(id);
        }
    }
    out
}

/// Parse a file body with one reference per line.
pub fn parse_list(text: &str) -> Vec<ChatIdentifier> {
    normalize_all(text.lines())
}

/// Parse an inline list separated by commas, semicolons, spaces or newlines.
pub fn parse_inline(text: &str) -> Vec<ChatIdentifier> {
    normalize_all(inline_separator_re().split(text))
}
