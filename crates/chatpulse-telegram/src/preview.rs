//! Parsers for Telegram's public web pages.
//!
//! - `https://t.me/<name>`: title plus a counter line such as
//!   `12 345 members, 678 online` or `12 345 subscribers`.
//! - `https://t.me/s/<name>`: the channel preview, oldest message first.

use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;

use chatpulse_core::domain::{EntityKind, MessageSample};

/// What the `t.me/<name>` landing page tells us.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChatPage {
    pub title: Option<String>,
    pub kind: EntityKind,
    pub members: Option<u64>,
    pub online: Option<u64>,
}

/// One message from the `t.me/s/<name>` preview.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PreviewMessage {
    pub id: u64,
    pub sample: Option<MessageSample>,
}

fn title_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?s)<div class="tgme_page_title"[^>]*>(.*?)</div>"#).expect("valid regex")
    })
}

fn extra_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?s)<div class="tgme_page_extra"[^>]*>(.*?)</div>"#).expect("valid regex")
    })
}

fn counter_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)(\d[\d\s.,]*[KM]?)\s+(members?|subscribers?|online)\b")
            .expect("valid regex")
    })
}

fn tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<[^>]+>").expect("valid regex"))
}

fn post_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"data-post="[^"/]+/(\d+)""#).expect("valid regex"))
}

fn time_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"<time[^>]*datetime="([^"]+)""#).expect("valid regex"))
}

/// Parse the landing page. `None` means the page names no chat at all.
pub fn parse_chat_page(html: &str) -> Option<ChatPage> {
    let title = title_re()
        .captures(html)
        .and_then(|c| c.get(1))
        .map(|m| clean_text(m.as_str()))
        .filter(|t| !t.is_empty());
    let extra = extra_re()
        .captures(html)
        .and_then(|c| c.get(1))
        .map(|m| clean_text(m.as_str()))
        .unwrap_or_default();

    if title.is_none() && extra.is_empty() {
        return None;
    }

    let mut members = None;
    let mut online = None;
    let mut is_channel = false;
    // Counts may carry `,` thousands separators, so the line is not split.
    for c in counter_re().captures_iter(&extra) {
        let count = parse_count(&c[1]);
        match c[2].to_lowercase().as_str() {
            "online" => online = count,
            "subscriber" | "subscribers" => {
                is_channel = true;
                members = count;
            }
            _ => members = count,
        }
    }

    let kind = match (members, is_channel) {
        (Some(_), true) => EntityKind::Channel,
        (Some(_), false) => EntityKind::Supergroup,
        // Users and bots show their @handle instead of a counter.
        (None, _) if extra.starts_with('@') => EntityKind::Other("user".to_string()),
        (None, _) => EntityKind::Other("unknown".to_string()),
    };

    Some(ChatPage {
        title,
        kind,
        members,
        online,
    })
}

/// Parse the preview page, keeping page order (oldest first).
pub fn parse_messages(html: &str) -> Vec<PreviewMessage> {
    let mut out = Vec::new();
    for chunk in html.split(r#"class="tgme_widget_message_wrap"#).skip(1) {
        let Some(id) = post_re()
            .captures(chunk)
            .and_then(|c| c[1].parse::<u64>().ok())
        else {
            continue;
        };
        let sample = time_re()
            .captures(chunk)
            .and_then(|c| DateTime::parse_from_rfc3339(&c[1]).ok())
            .map(|ts| MessageSample {
                timestamp: ts.with_timezone(&Utc),
                is_service: chunk.contains("service_message"),
            });
        out.push(PreviewMessage { id, sample });
    }
    out
}

/// `"12 345"` → 12345, `"1.2K"` → 1200, `"3M"` → 3000000.
pub fn parse_count(raw: &str) -> Option<u64> {
    let s: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    let (digits, scale) = match s.chars().last()? {
        'K' | 'k' => (&s[..s.len() - 1], 1_000f64),
        'M' | 'm' => (&s[..s.len() - 1], 1_000_000f64),
        _ => (s.as_str(), 1f64),
    };
    if scale == 1f64 {
        let plain: String = digits.chars().filter(|c| c.is_ascii_digit()).collect();
        return plain.parse().ok();
    }
    let v: f64 = digits.replace(',', ".").parse().ok()?;
    Some((v * scale).round() as u64)
}

fn clean_text(html: &str) -> String {
    let text = tag_re().replace_all(html, " ");
    let text = text
        .replace("&nbsp;", " ")
        .replace('\u{a0}', " ")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&");
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
