//! Rendering canonical identifiers for the output files.

use crate::{
    domain::{ChatIdentifier, OutputFormat},
    normalize::{is_simple_name, PLATFORM_DOMAIN},
};

/// Render `id` in the requested representation. Never fails.
pub fn format_identifier(id: &ChatIdentifier, mode: OutputFormat) -> String {
    match mode {
        OutputFormat::Raw => id.as_str().to_string(),
        OutputFormat::Handle => match single_name_path(id.as_str()) {
            Some(name) => format!("@{name}"),
            None if id.is_url() => id.as_str().to_string(),
            None => format!("@{}", id.as_str()),
        },
        OutputFormat::Url => {
            if id.is_url() {
                id.as_str().to_string()
            } else {
                format!("https://{PLATFORM_DOMAIN}/{}", id.as_str())
            }
        }
    }
}

/// `https://t.me/<name>` → `<name>`, when the path is one simple name.
fn single_name_path(s: &str) -> Option<&str> {
    let path = s
        .strip_prefix("https://")?
        .strip_prefix(PLATFORM_DOMAIN)?
        .strip_prefix('/')?;
    is_simple_name(path).then_some(path)
}

/// Render a whole list, one identifier per line with a trailing newline.
pub fn render_list<'a>(
    ids: impl IntoIterator<Item = &'a ChatIdentifier>,
    mode: OutputFormat,
) -> String {
    let mut out = String::new();
    for id in ids {
        out.push_str(&format_identifier(id, mode));
        out.push('\n');
    }
    out
}
