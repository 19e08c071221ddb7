use std::{
    collections::HashMap,
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{
    domain::{OutputFormat, ThresholdConfig},
    errors::Error,
    orchestrator::BatchOptions,
    Result,
};

/// Upper bound for `CONCURRENCY`; larger values fall back to the default.
pub const MAX_CONCURRENCY: u64 = 64;

/// Where chat metadata comes from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SignalSource {
    /// Public `t.me` web preview pages only.
    Web,
    /// Bot API for kind and member count; history still from the web preview.
    BotApi { token: String },
}

/// Typed configuration, built once at startup and passed around explicitly.
#[derive(Clone, Debug)]
pub struct Settings {
    pub thresholds: ThresholdConfig,

    // Files
    pub input_file: PathBuf,
    pub active_file: PathBuf,
    pub inactive_file: PathBuf,
    pub report_file: Option<PathBuf>,
    /// Inline list; takes precedence over `input_file`.
    pub inline_chats: Option<String>,
    pub output_format: OutputFormat,

    // Fetching
    pub signal_source: SignalSource,
    pub concurrency: usize,
    pub request_interval: Duration,
    pub history_limit: usize,
    pub http_timeout: Duration,
}

/// A setting that could not be parsed and was replaced by its default.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConfigWarning {
    pub key: String,
    pub value: String,
    pub fallback: String,
}

impl std::fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "invalid value {:?} for {}; using default {}",
            self.value, self.key, self.fallback
        )
    }
}

impl Settings {
    /// Load from `.env` (if present) and the process environment.
    pub fn load() -> Result<(Self, Vec<ConfigWarning>)> {
        load_dotenv_if_present(Path::new(".env"));
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_map(vars: &HashMap<String, String>) -> Result<(Self, Vec<ConfigWarning>)> {
        Self::from_lookup(|key| vars.get(key).cloned())
    }

    pub fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(Self, Vec<ConfigWarning>)> {
        let mut r = Reader {
            lookup: &lookup,
            warnings: Vec::new(),
        };

        let defaults = ThresholdConfig::default();
        let thresholds = ThresholdConfig {
            min_participants: r.number("MIN_PARTICIPANTS", defaults.min_participants),
            min_online: r.number("MIN_ONLINE", defaults.min_online),
            recent_window_seconds: r.number("MSG_PERIOD_SECONDS", defaults.recent_window_seconds),
            max_messages_in_window: r.number("MAX_MSG_COUNT", defaults.max_messages_in_window),
            max_staleness_days: r.number("RECENT_DAYS", defaults.max_staleness_days),
        };

        let input_file = r.path("INPUT_FILE", "chats.txt");
        let active_file = r.path("ACTIVE_FILE", "active_chats.txt");
        let inactive_file = r.path("INACTIVE_FILE", "inactive_chats.txt");
        let report_file = r.non_empty("REPORT_FILE").map(PathBuf::from);
        let inline_chats = r.non_empty("CHATS");

        let output_format = match r.non_empty("OUTPUT_FORMAT") {
            None => OutputFormat::default(),
            Some(v) => OutputFormat::parse(&v).unwrap_or_else(|| {
                r.warn("OUTPUT_FORMAT", &v, "at");
                OutputFormat::default()
            }),
        };

        let token = r.non_empty("TELEGRAM_BOT_TOKEN");
        let signal_source = match r.non_empty("SIGNAL_SOURCE").as_deref() {
            None | Some("web") => SignalSource::Web,
            Some("bot_api") => {
                let token = token.ok_or_else(|| {
                    Error::Config(
                        "TELEGRAM_BOT_TOKEN environment variable is required when SIGNAL_SOURCE=bot_api"
                            .to_string(),
                    )
                })?;
                SignalSource::BotApi { token }
            }
            Some(other) => {
                return Err(Error::Config(format!(
                    "SIGNAL_SOURCE must be `web` or `bot_api`, got {other:?}"
                )))
            }
        };

        let batch = BatchOptions::default();
        let concurrency =
            r.bounded("CONCURRENCY", batch.concurrency as u64, MAX_CONCURRENCY).max(1) as usize;
        let history_limit = r.number("HISTORY_LIMIT", batch.history_limit as u64) as usize;
        let request_interval = Duration::from_millis(r.number("REQUEST_INTERVAL_MS", 1000));
        let http_timeout = Duration::from_millis(r.number("HTTP_TIMEOUT_MS", 15_000));

        let settings = Self {
            thresholds,
            input_file,
            active_file,
            inactive_file,
            report_file,
            inline_chats,
            output_format,
            signal_source,
            concurrency,
            request_interval,
            history_limit,
            http_timeout,
        };
        Ok((settings, r.warnings))
    }

    pub fn batch_options(&self) -> BatchOptions {
        BatchOptions {
            concurrency: self.concurrency,
            history_limit: self.history_limit,
        }
    }
}

struct Reader<'a> {
    lookup: &'a dyn Fn(&str) -> Option<String>,
    warnings: Vec<ConfigWarning>,
}

impl Reader<'_> {
    fn non_empty(&self, key: &str) -> Option<String> {
        (self.lookup)(key).and_then(non_empty)
    }

    fn path(&self, key: &str, default: &str) -> PathBuf {
        PathBuf::from(self.non_empty(key).unwrap_or_else(|| default.to_string()))
    }

    fn number(&mut self, key: &str, default: u64) -> u64 {
        let Some(raw) = self.non_empty(key) else {
            return default;
        };
        match raw.trim().parse::<u64>() {
            Ok(v) => v,
            Err(_) => {
                self.warn(key, &raw, &default.to_string());
                default
            }
        }
    }

    /// Like `number`, but values above `max` fall back to the default.
    fn bounded(&mut self, key: &str, default: u64, max: u64) -> u64 {
        let v = self.number(key, default);
        if v <= max {
            return v;
        }
        self.warn(key, &v.to_string(), &default.to_string());
        default
    }

    fn warn(&mut self, key: &str, value: &str, fallback: &str) {
        self.warnings.push(ConfigWarning {
            key: key.to_string(),
            value: value.to_string(),
            fallback: fallback.to_string(),
        });
    }
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for (key, val) in parse_dotenv(&contents) {
        if env::var_os(&key).is_some() {
            continue; // do not override existing env
        }
        env::set_var(key, val);
    }
}

fn parse_dotenv(contents: &str) -> Vec<(String, String)> {
    let mut out = Vec::new();
    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let line = line.strip_prefix("export ").unwrap_or(line);

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }

        let mut val = v.trim().to_string();
        // Strip optional surrounding quotes.
        if val.len() >= 2
            && ((val.starts_with('"') && val.ends_with('"'))
                || (val.starts_with('\'') && val.ends_with('\'')))
        {
            val = val[1..val.len() - 1].to_string();
        }

        out.push((key.to_string(), val));
    }
    out
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}
