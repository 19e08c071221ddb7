use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    domain::{ChatIdentifier, ChatMetadata, EntityHandle, MessageSample},
    errors::FetchError,
};

pub type FetchResult<T> = std::result::Result<T, FetchError>;

/// Lazy, newest-first view over a chat's message history.
///
/// Implementations must yield messages in descending chronological order;
/// the window scan stops at the first message older than its window.
#[async_trait]
pub trait MessageCursor: Send {
    async fn next(&mut self) -> FetchResult<Option<MessageSample>>;
}

/// Hexagonal port for collecting activity signals from the platform.
///
/// Authentication, sessions and transport live entirely behind this trait.
#[async_trait]
pub trait SignalFetcher: Send + Sync {
    async fn resolve(&self, id: &ChatIdentifier) -> FetchResult<EntityHandle>;

    async fn full_metadata(&self, entity: &EntityHandle) -> FetchResult<ChatMetadata>;

    async fn last_message_at(&self, entity: &EntityHandle) -> FetchResult<Option<DateTime<Utc>>>;

    /// A fresh cursor over at most `max_count` messages.
    async fn recent_messages(
        &self,
        entity: &EntityHandle,
        max_count: usize,
    ) -> FetchResult<Box<dyn MessageCursor>>;
}

/// Cursor over an in-memory, already ordered list.
pub struct VecCursor {
    items: std::vec::IntoIter<MessageSample>,
}

impl VecCursor {
    pub fn new(items: Vec<MessageSample>) -> Self {
        Self {
            items: items.into_iter(),
        }
    }
}

#[async_trait]
impl MessageCursor for VecCursor {
    async fn next(&mut self) -> FetchResult<Option<MessageSample>> {
        Ok(self.items.next())
    }
}
