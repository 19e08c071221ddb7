//! Reading the chat list and writing result files.

use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::{
    config::Settings,
    domain::{ChatIdentifier, OutputFormat},
    errors::Error,
    formatting::render_list,
    links::transform_lines,
    normalize::{parse_inline, parse_list},
    orchestrator::Report,
    Result,
};

/// Identifiers to check: the inline `CHATS` list if set, else the input file.
pub fn load_identifiers(settings: &Settings) -> Result<Vec<ChatIdentifier>> {
    if let Some(inline) = &settings.inline_chats {
        return Ok(parse_inline(inline));
    }
    let text = read_input(&settings.input_file)?;
    Ok(parse_list(&text))
}

fn read_input(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|e| Error::InvalidPath {
        path: path.to_path_buf(),
        reason: format!("cannot read input file: {e}"),
    })
}

/// Paths written by [`write_outputs`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WrittenFiles {
    pub active: PathBuf,
    pub inactive: PathBuf,
    pub report: Option<PathBuf>,
}

/// Write the active and inactive lists (and the JSON report, if configured).
pub fn write_outputs(report: &Report, settings: &Settings) -> Result<WrittenFiles> {
    write_list(&settings.active_file, &report.active, settings.output_format)?;
    write_list(&settings.inactive_file, &report.inactive, settings.output_format)?;

    if let Some(path) = &settings.report_file {
        let json = serde_json::to_string_pretty(report)?;
        fs::write(path, json + "\n")?;
    }

    Ok(WrittenFiles {
        active: settings.active_file.clone(),
        inactive: settings.inactive_file.clone(),
        report: settings.report_file.clone(),
    })
}

fn write_list(path: &Path, ids: &[ChatIdentifier], mode: OutputFormat) -> Result<()> {
    fs::write(path, render_list(ids, mode))?;
    Ok(())
}

/// Run a line helper over `input` and write the extracted URLs to `output`.
/// Returns the number of URLs written.
pub fn rewrite_links(
    input: &Path,
    output: &Path,
    f: impl for<'a> Fn(&'a str) -> Option<&'a str>,
) -> Result<usize> {
    let text = read_input(input)?;
    let out = transform_lines(&text, |line| f(line));
    fs::write(output, &out)?;
    Ok(out.lines().count())
}
