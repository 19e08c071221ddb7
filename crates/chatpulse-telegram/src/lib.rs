//! Telegram adapter.
//!
//! Implements the `chatpulse-core` SignalFetcher over Telegram's public web
//! preview, optionally taking chat kind and member counts from the Bot API.

use std::{collections::HashMap, time::Duration};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

pub mod bot_api;
pub mod preview;
pub mod web;

use chatpulse_core::{
    config::{Settings, SignalSource},
    domain::{ChatIdentifier, ChatMetadata, EntityHandle, EntityKind},
    normalize::PLATFORM_DOMAIN,
    ports::{FetchResult, MessageCursor, SignalFetcher, VecCursor},
    throttle::Throttle,
    FetchError,
};

use crate::{
    bot_api::BotApiClient,
    preview::{parse_chat_page, ChatPage, PreviewMessage},
    web::{PreviewCursor, WebClient},
};

pub struct TelegramFetcher {
    web: WebClient,
    bot: Option<BotApiClient>,
    /// Landing pages fetched during `resolve`, reused by `full_metadata`.
    pages: Mutex<HashMap<String, ChatPage>>,
    /// First preview page read by `last_message_at`, reused as the start of
    /// `recent_messages`. `None` records a chat without a public preview.
    previews: Mutex<HashMap<String, Option<Vec<PreviewMessage>>>>,
}

impl TelegramFetcher {
    pub fn new(
        source: &SignalSource,
        http_timeout: Duration,
        request_interval: Duration,
    ) -> FetchResult<Self> {
        let throttle = Throttle::new(request_interval);
        let web = WebClient::new(http_timeout, throttle.clone())?;
        let bot = match source {
            SignalSource::Web => None,
            SignalSource::BotApi { token } => Some(BotApiClient::new(token, throttle)),
        };
        Ok(Self {
            web,
            bot,
            pages: Mutex::new(HashMap::new()),
            previews: Mutex::new(HashMap::new()),
        })
    }

    pub fn from_settings(settings: &Settings) -> FetchResult<Self> {
        Self::new(
            &settings.signal_source,
            settings.http_timeout,
            settings.request_interval,
        )
    }

    fn landing_url(id: &ChatIdentifier) -> String {
        match id.username() {
            Some(name) => format!("https://{PLATFORM_DOMAIN}/{name}"),
            None => id.as_str().to_string(),
        }
    }

    async fn landing_page(&self, id: &ChatIdentifier) -> FetchResult<ChatPage> {
        let page = self.web.get(&Self::landing_url(id)).await?;
        parse_chat_page(&page.body).ok_or_else(|| FetchError::NotFound(id.to_string()))
    }

    /// Cached landing page if `resolve` left one, otherwise a fresh fetch.
    async fn take_page(&self, id: &ChatIdentifier) -> FetchResult<ChatPage> {
        let cached = self.pages.lock().await.remove(id.as_str());
        match cached {
            Some(page) => Ok(page),
            None => self.landing_page(id).await,
        }
    }

    async fn first_preview(&self, username: &str) -> FetchResult<Option<Vec<PreviewMessage>>> {
        let page = self.web.preview_page(username, None).await?;
        self.previews
            .lock()
            .await
            .insert(username.to_string(), page.clone());
        Ok(page)
    }
}

fn ensure_chat(kind: &EntityKind) -> FetchResult<()> {
    match kind {
        EntityKind::Other(what) => Err(FetchError::UnsupportedKind(what.clone())),
        _ => Ok(()),
    }
}

#[async_trait]
impl SignalFetcher for TelegramFetcher {
    async fn resolve(&self, id: &ChatIdentifier) -> FetchResult<EntityHandle> {
        // A preview left by an earlier check of this chat is stale now.
        if let Some(name) = id.username() {
            self.previews.lock().await.remove(name);
        }

        if let (Some(bot), Some(name)) = (&self.bot, id.username()) {
            let chat = bot.get_chat(name).await?;
            ensure_chat(&chat.kind)?;
            return Ok(EntityHandle {
                identifier: id.clone(),
                kind: chat.kind,
                title: chat.title,
            });
        }

        let page = self.take_page(id).await?;
        ensure_chat(&page.kind)?;
        tracing::debug!(chat = %id, kind = ?page.kind, title = ?page.title, "resolved");
        let entity = EntityHandle {
            identifier: id.clone(),
            kind: page.kind.clone(),
            title: page.title.clone(),
        };
        self.pages.lock().await.insert(id.as_str().to_string(), page);
        Ok(entity)
    }

    async fn full_metadata(&self, entity: &EntityHandle) -> FetchResult<ChatMetadata> {
        let id = &entity.identifier;
        if let (Some(bot), Some(name)) = (&self.bot, id.username()) {
            let participants = bot.member_count(name).await?;
            return Ok(match entity.kind {
                EntityKind::Group => ChatMetadata::Group { participants },
                _ => ChatMetadata::Channel {
                    participants,
                    online: None,
                },
            });
        }

        let page = self.take_page(id).await?;
        let participants = page
            .members
            .ok_or_else(|| FetchError::Parse(format!("no member count on page for {id}")))?;
        Ok(match (&entity.kind, page.online) {
            (EntityKind::Group, None) => ChatMetadata::Group { participants },
            (_, online) => ChatMetadata::Channel {
                participants,
                online,
            },
        })
    }

    async fn last_message_at(&self, entity: &EntityHandle) -> FetchResult<Option<DateTime<Utc>>> {
        let Some(name) = entity.identifier.username() else {
            return Ok(None);
        };
        let Some(page) = self.first_preview(name).await? else {
            return Ok(None);
        };
        Ok(page
            .iter()
            .rev()
            .filter_map(|m| m.sample)
            .find(|s| !s.is_service)
            .map(|s| s.timestamp))
    }

    async fn recent_messages(
        &self,
        entity: &EntityHandle,
        max_count: usize,
    ) -> FetchResult<Box<dyn MessageCursor>> {
        let Some(name) = entity.identifier.username() else {
            return Ok(Box::new(VecCursor::new(Vec::new())));
        };
        let cursor = PreviewCursor::new(self.web.clone(), name, max_count);
        let cached = self.previews.lock().await.remove(name);
        let cursor: Box<dyn MessageCursor> = match cached {
            Some(Some(first)) => Box::new(cursor.with_first_page(first)),
            Some(None) => Box::new(VecCursor::new(Vec::new())),
            None => Box::new(cursor),
        };
        Ok(cursor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn landing_urls() {
        let named = ChatIdentifier::parse("@news").unwrap();
        assert_eq!(TelegramFetcher::landing_url(&named), "https://t.me/news");
        let invite = ChatIdentifier::parse("t.me/+AbC").unwrap();
        assert_eq!(TelegramFetcher::landing_url(&invite), "https://t.me/+AbC");
    }

    #[test]
    fn users_are_unsupported() {
        assert_eq!(
            ensure_chat(&EntityKind::Other("user".to_string())),
            Err(FetchError::UnsupportedKind("user".to_string()))
        );
        assert_eq!(ensure_chat(&EntityKind::Channel), Ok(()));
    }

    #[tokio::test]
    async fn metadata_comes_from_the_resolved_page() {
        let fetcher =
            TelegramFetcher::new(&SignalSource::Web, Duration::from_secs(1), Duration::ZERO)
                .unwrap();
        let id = ChatIdentifier::parse("rust_group").unwrap();
        fetcher.pages.lock().await.insert(
            id.as_str().to_string(),
            ChatPage {
                title: Some("Rust".to_string()),
                kind: EntityKind::Supergroup,
                members: Some(4_000),
                online: Some(120),
            },
        );

        let entity = fetcher.resolve(&id).await.unwrap();
        assert_eq!(entity.kind, EntityKind::Supergroup);
        let meta = fetcher.full_metadata(&entity).await.unwrap();
        assert_eq!(
            meta,
            ChatMetadata::Channel {
                participants: 4_000,
                online: Some(120)
            }
        );
        assert!(fetcher.pages.lock().await.is_empty());
    }

    fn web_fetcher() -> TelegramFetcher {
        TelegramFetcher::new(&SignalSource::Web, Duration::from_secs(1), Duration::ZERO).unwrap()
    }

    #[tokio::test]
    async fn rejected_chats_leave_no_cached_page() {
        let fetcher = web_fetcher();
        let id = ChatIdentifier::parse("alice").unwrap();
        fetcher.pages.lock().await.insert(
            id.as_str().to_string(),
            ChatPage {
                title: Some("Alice".to_string()),
                kind: EntityKind::Other("user".to_string()),
                members: None,
                online: None,
            },
        );

        let err = fetcher.resolve(&id).await.unwrap_err();
        assert_eq!(err, FetchError::UnsupportedKind("user".to_string()));
        assert!(fetcher.pages.lock().await.is_empty());
    }

    #[tokio::test]
    async fn history_starts_from_the_cached_preview() {
        use chatpulse_core::domain::MessageSample;
        use chrono::TimeZone;

        let fetcher = web_fetcher();
        let entity = EntityHandle {
            identifier: ChatIdentifier::parse("news").unwrap(),
            kind: EntityKind::Channel,
            title: None,
        };
        let at = |minute| MessageSample {
            timestamp: Utc.with_ymd_and_hms(2026, 3, 1, 10, minute, 0).unwrap(),
            is_service: false,
        };
        // Post ids reach 1, so the cursor needs no further page.
        fetcher.previews.lock().await.insert(
            "news".to_string(),
            Some(vec![
                PreviewMessage { id: 1, sample: Some(at(0)) },
                PreviewMessage { id: 2, sample: Some(at(5)) },
            ]),
        );

        let mut cursor = fetcher.recent_messages(&entity, 100).await.unwrap();
        assert_eq!(cursor.next().await.unwrap(), Some(at(5)));
        assert_eq!(cursor.next().await.unwrap(), Some(at(0)));
        assert_eq!(cursor.next().await.unwrap(), None);
        assert!(fetcher.previews.lock().await.is_empty());

        fetcher.previews.lock().await.insert("news".to_string(), None);
        let mut cursor = fetcher.recent_messages(&entity, 100).await.unwrap();
        assert_eq!(cursor.next().await.unwrap(), None);
    }

    #[tokio::test]
    async fn invite_links_have_no_history() {
        let fetcher =
            TelegramFetcher::new(&SignalSource::Web, Duration::from_secs(1), Duration::ZERO)
                .unwrap();
        let entity = EntityHandle {
            identifier: ChatIdentifier::parse("t.me/+AbC").unwrap(),
            kind: EntityKind::Group,
            title: None,
        };
        assert_eq!(fetcher.last_message_at(&entity).await.unwrap(), None);
        let mut cursor = fetcher.recent_messages(&entity, 100).await.unwrap();
        assert!(cursor.next().await.unwrap().is_none());
    }
}
