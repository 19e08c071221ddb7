use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Canonical reference to a Telegram group or channel.
///
/// Either a bare username (`examplechat`) or, for references that do not name
/// a public username (invite links, `t.me/c/...`), a full `https://t.me/...` URL.
/// Only [`crate::normalize`] produces these.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ChatIdentifier(String);

impl ChatIdentifier {
    pub(crate) fn from_canonical(s: String) -> Self {
        Self(s)
    }

    /// Normalize a raw reference. See [`crate::normalize::normalize`].
    pub fn parse(raw: &str) -> Option<Self> {
        crate::normalize::normalize(raw)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_url(&self) -> bool {
        self.0.starts_with("https://")
    }

    /// The public username, when the identifier is a bare handle.
    pub fn username(&self) -> Option<&str> {
        if self.is_url() {
            None
        } else {
            Some(&self.0)
        }
    }

    /// Key used for de-duplication (usernames are case-insensitive).
    pub fn dedup_key(&self) -> String {
        if self.is_url() {
            self.0.clone()
        } else {
            self.0.to_ascii_lowercase()
        }
    }
}

impl fmt::Display for ChatIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Kind of a resolved entity. Only groups and channels are classified.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EntityKind {
    Channel,
    Supergroup,
    Group,
    Other(String),
}

/// A chat the fetcher managed to resolve.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EntityHandle {
    pub identifier: ChatIdentifier,
    pub kind: EntityKind,
    pub title: Option<String>,
}

/// Full-chat metadata; the shape depends on the entity kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChatMetadata {
    /// Basic groups expose no online counter.
    Group { participants: u64 },
    /// Channels and supergroups.
    Channel {
        participants: u64,
        online: Option<u64>,
    },
}

impl ChatMetadata {
    pub fn participants(&self) -> u64 {
        match self {
            Self::Group { participants } | Self::Channel { participants, .. } => *participants,
        }
    }

    pub fn online(&self) -> Option<u64> {
        match self {
            Self::Group { .. } => None,
            Self::Channel { online, .. } => *online,
        }
    }
}

/// One message as seen by the activity scan.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MessageSample {
    pub timestamp: DateTime<Utc>,
    /// Joins, pins, title changes and other service events.
    pub is_service: bool,
}

/// Raw signals for one chat, collected for a single classification.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SignalSnapshot {
    pub participant_count: u64,
    pub online_count: Option<u64>,
    pub last_message_at: Option<DateTime<Utc>>,
    /// Newest first.
    pub recent_messages: Vec<MessageSample>,
}

/// Activity thresholds, fixed for the whole run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ThresholdConfig {
    pub min_participants: u64,
    pub min_online: u64,
    pub recent_window_seconds: u64,
    pub max_messages_in_window: u64,
    pub max_staleness_days: u64,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            min_participants: 2000,
            min_online: 300,
            recent_window_seconds: 60,
            max_messages_in_window: 15,
            max_staleness_days: 365,
        }
    }
}

/// How identifiers are written to the output files.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    Raw,
    #[default]
    Handle,
    Url,
}

impl OutputFormat {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "raw" => Some(Self::Raw),
            "at" | "handle" => Some(Self::Handle),
            "url" => Some(Self::Url),
            _ => None,
        }
    }
}

/// Why a chat was judged inactive.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "check", rename_all = "snake_case")]
pub enum InactiveReason {
    TooFewParticipants { participants: u64 },
    NoMessages,
    Stale { days: i64 },
    TooManyMessages { counted: u64 },
    TooFewOnline { online: u64 },
}

impl fmt::Display for InactiveReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooFewParticipants { participants } => {
                write!(f, "only {participants} participants")
            }
            Self::NoMessages => f.write_str("no messages"),
            Self::Stale { days } => write!(f, "last message {days} days ago"),
            Self::TooManyMessages { counted } => {
                write!(f, "more than {counted} messages in the recent window")
            }
            Self::TooFewOnline { online } => write!(f, "only {online} online"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Active,
    Inactive { reason: InactiveReason },
    FetchFailed { error: String },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Verdict {
    pub identifier: ChatIdentifier,
    #[serde(flatten)]
    pub outcome: Outcome,
}

impl Verdict {
    pub fn is_active(&self) -> bool {
        matches!(self.outcome, Outcome::Active)
    }
}
