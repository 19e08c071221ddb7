//! Chat metadata over the Bot API (teloxide).
//!
//! The Bot API can resolve public usernames and count members, but exposes
//! neither an online counter nor message history.

use teloxide::{prelude::*, types::Recipient, ApiError, RequestError};

use chatpulse_core::{domain::EntityKind, ports::FetchResult, throttle::Throttle, FetchError};

#[derive(Clone)]
pub struct BotApiClient {
    bot: Bot,
    throttle: Throttle,
}

/// What `getChat` reports about a public chat.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BotChat {
    pub kind: EntityKind,
    pub title: Option<String>,
}

impl BotApiClient {
    pub fn new(token: &str, throttle: Throttle) -> Self {
        Self {
            bot: Bot::new(token),
            throttle,
        }
    }

    fn recipient(username: &str) -> Recipient {
        Recipient::ChannelUsername(format!("@{username}"))
    }

    pub async fn get_chat(&self, username: &str) -> FetchResult<BotChat> {
        self.throttle.wait().await;
        let chat = self
            .bot
            .get_chat(Self::recipient(username))
            .await
            .map_err(map_err)?;

        let kind = if chat.is_channel() {
            EntityKind::Channel
        } else if chat.is_supergroup() {
            EntityKind::Supergroup
        } else if chat.is_group() {
            EntityKind::Group
        } else {
            EntityKind::Other("private".to_string())
        };

        Ok(BotChat {
            kind,
            title: chat.title().map(|t| t.to_string()),
        })
    }

    pub async fn member_count(&self, username: &str) -> FetchResult<u64> {
        self.throttle.wait().await;
        let n = self
            .bot
            .get_chat_member_count(Self::recipient(username))
            .await
            .map_err(map_err)?;
        Ok(u64::from(n))
    }
}

fn map_err(e: RequestError) -> FetchError {
    match e {
        RequestError::Api(ApiError::ChatNotFound) => {
            FetchError::NotFound("telegram: chat not found".to_string())
        }
        RequestError::Api(api) => FetchError::PermissionDenied(format!("telegram: {api}")),
        RequestError::RetryAfter(_) => FetchError::RateLimited("telegram: retry after".to_string()),
        RequestError::InvalidJson { .. } => FetchError::Parse(format!("telegram: {e}")),
        other => FetchError::Network(format!("telegram error: {other}")),
    }
}
