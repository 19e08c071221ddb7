use std::{path::PathBuf, sync::Arc};

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;

use chatpulse_core::{
    config::Settings,
    files::{self, load_identifiers, write_outputs},
    links,
    orchestrator::Orchestrator,
};
use chatpulse_telegram::TelegramFetcher;

#[derive(Parser, Debug)]
#[command(name = "chatpulse")]
#[command(about = "Sort Telegram chats into active and inactive lists", long_about = None)]
#[command(version)]
struct Cli {
    /// Defaults to `check`
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, PartialEq)]
enum Command {
    /// Classify chats (configured via env / .env)
    Check,

    /// Pull t.me links out of free-form text
    ExtractLinks {
        #[arg(default_value = "active_chats.txt")]
        input: PathBuf,
        #[arg(default_value = "active_links.txt")]
        output: PathBuf,
    },

    /// Turn `N. <url>` lines into bare URLs
    StripNumbering {
        #[arg(default_value = "links_with_nums.txt")]
        input: PathBuf,
        #[arg(default_value = "links_clean.txt")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    chatpulse_core::logging::init("chatpulse")?;

    match cli.command.unwrap_or(Command::Check) {
        Command::Check => check().await,
        Command::ExtractLinks { input, output } => rewrite(input, output, links::extract_link),
        Command::StripNumbering { input, output } => {
            rewrite(input, output, links::strip_numbering)
        }
    }
}

async fn check() -> anyhow::Result<()> {
    let (settings, warnings) = Settings::load().context("loading configuration")?;
    for w in &warnings {
        tracing::warn!("{w}");
    }

    let ids = load_identifiers(&settings)?;
    tracing::info!(
        chats = ids.len(),
        concurrency = settings.concurrency,
        "starting"
    );

    let fetcher = TelegramFetcher::from_settings(&settings).context("creating Telegram client")?;
    let orchestrator = Orchestrator::new(
        Arc::new(fetcher),
        settings.thresholds,
        settings.batch_options(),
    );

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupt received; finishing chats in flight");
                cancel.cancel();
            }
        }
    });

    let report = orchestrator.run(ids, cancel).await;
    let written = write_outputs(&report, &settings).context("writing results")?;

    println!(
        "Checked {} chats. Active: {}, Inactive: {}.",
        report.checked(),
        report.active.len(),
        report.inactive.len()
    );
    if report.failed() > 0 {
        println!(
            "{} of the inactive chats could not be fetched (see warnings above).",
            report.failed()
        );
    }
    if !report.skipped.is_empty() {
        println!("{} chats were not checked (interrupted).", report.skipped.len());
    }
    println!(
        "Results: {} / {}",
        written.active.display(),
        written.inactive.display()
    );
    if let Some(path) = written.report {
        println!("Report: {}", path.display());
    }
    Ok(())
}

fn rewrite(
    input: PathBuf,
    output: PathBuf,
    f: for<'a> fn(&'a str) -> Option<&'a str>,
) -> anyhow::Result<()> {
    let n = files::rewrite_links(&input, &output, f)
        .with_context(|| format!("processing {}", input.display()))?;
    println!(
        "Done: {n} links from '{}' written to '{}'.",
        input.display(),
        output.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_subcommand_means_check() {
        let cli = Cli::try_parse_from(["chatpulse"]).expect("parse");
        assert_eq!(cli.command, None);
        let cli = Cli::try_parse_from(["chatpulse", "check"]).expect("parse");
        assert_eq!(cli.command, Some(Command::Check));
    }

    #[test]
    fn link_commands_default_their_files() {
        let cli = Cli::try_parse_from(["chatpulse", "extract-links"]).expect("parse");
        assert_eq!(
            cli.command,
            Some(Command::ExtractLinks {
                input: PathBuf::from("active_chats.txt"),
                output: PathBuf::from("active_links.txt"),
            })
        );

        let cli = Cli::try_parse_from(["chatpulse", "strip-numbering", "in.txt"]).expect("parse");
        assert_eq!(
            cli.command,
            Some(Command::StripNumbering {
                input: PathBuf::from("in.txt"),
                output: PathBuf::from("links_clean.txt"),
            })
        );
    }

    #[test]
    fn rejects_extra_and_unknown_arguments() {
        assert!(Cli::try_parse_from(["chatpulse", "extract-links", "a", "b", "c"]).is_err());
        assert!(Cli::try_parse_from(["chatpulse", "frobnicate"]).is_err());
        assert!(Cli::try_parse_from(["chatpulse", "check", "extra"]).is_err());
    }

    #[test]
    fn version_flag_is_handled_by_clap() {
        let err = Cli::try_parse_from(["chatpulse", "--version"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayVersion);
    }
}
