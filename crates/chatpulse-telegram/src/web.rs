//! HTTP access to the public `t.me` pages, sharing one request budget.

use std::{collections::VecDeque, time::Duration};

use async_trait::async_trait;
use reqwest::{header, StatusCode};

use chatpulse_core::{
    domain::MessageSample,
    normalize::PLATFORM_DOMAIN,
    ports::{FetchResult, MessageCursor},
    throttle::Throttle,
    FetchError,
};

use crate::preview::{parse_messages, PreviewMessage};

#[derive(Clone)]
pub struct WebClient {
    http: reqwest::Client,
    throttle: Throttle,
}

/// A fetched page plus the URL it ended up at after redirects.
pub struct Page {
    pub url: reqwest::Url,
    pub body: String,
}

impl WebClient {
    pub fn new(timeout: Duration, throttle: Throttle) -> FetchResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("chatpulse/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| FetchError::Network(format!("http client: {e}")))?;
        Ok(Self { http, throttle })
    }

    pub async fn get(&self, url: &str) -> FetchResult<Page> {
        self.throttle.wait().await;
        tracing::debug!(%url, "GET");

        let resp = self
            .http
            .get(url)
            .header(header::ACCEPT_LANGUAGE, "en")
            .send()
            .await
            .map_err(map_reqwest_err)?;

        let status = resp.status();
        if !status.is_success() {
            return Err(map_status(status, url));
        }
        let final_url = resp.url().clone();
        let body = resp.text().await.map_err(map_reqwest_err)?;
        Ok(Page {
            url: final_url,
            body,
        })
    }

    /// One page of the channel preview, newest message last.
    ///
    /// Returns `None` when the chat has no public preview (Telegram redirects
    /// such requests to the landing page).
    pub async fn preview_page(
        &self,
        username: &str,
        before: Option<u64>,
    ) -> FetchResult<Option<Vec<PreviewMessage>>> {
        let mut url = format!("https://{PLATFORM_DOMAIN}/s/{username}");
        if let Some(before) = before {
            url.push_str(&format!("?before={before}"));
        }
        let page = self.get(&url).await?;
        if !page.url.path().starts_with("/s/") {
            return Ok(None);
        }
        Ok(Some(parse_messages(&page.body)))
    }
}

fn map_reqwest_err(e: reqwest::Error) -> FetchError {
    if let Some(status) = e.status() {
        let url = e.url().map(|u| u.to_string()).unwrap_or_default();
        return map_status(status, &url);
    }
    FetchError::Network(e.to_string())
}

fn map_status(status: StatusCode, url: &str) -> FetchError {
    match status {
        StatusCode::NOT_FOUND => FetchError::NotFound(url.to_string()),
        StatusCode::FORBIDDEN | StatusCode::UNAUTHORIZED => {
            FetchError::PermissionDenied(format!("{status} for {url}"))
        }
        StatusCode::TOO_MANY_REQUESTS => FetchError::RateLimited(url.to_string()),
        _ => FetchError::Network(format!("{status} for {url}")),
    }
}

/// Newest-first cursor over the channel preview, paging backwards with
/// `?before=<oldest id seen>` until `remaining` messages were yielded.
pub struct PreviewCursor {
    client: WebClient,
    username: String,
    buffer: VecDeque<MessageSample>,
    before: Option<u64>,
    remaining: usize,
    exhausted: bool,
}

impl PreviewCursor {
    pub fn new(client: WebClient, username: impl Into<String>, max_count: usize) -> Self {
        Self {
            client,
            username: username.into(),
            buffer: VecDeque::new(),
            before: None,
            remaining: max_count,
            exhausted: max_count == 0,
        }
    }

    /// Seed the cursor with an already fetched first page.
    pub fn with_first_page(mut self, page: Vec<PreviewMessage>) -> Self {
        self.absorb(page);
        self
    }

    fn absorb(&mut self, page: Vec<PreviewMessage>) {
        let Some(oldest) = page.iter().map(|m| m.id).min() else {
            self.exhausted = true;
            return;
        };
        // Guard against a page that does not move backwards.
        if self.before.is_some_and(|b| oldest >= b) || oldest <= 1 {
            self.exhausted = true;
        }
        self.before = Some(oldest);
        self.buffer.extend(page.iter().rev().filter_map(|m| m.sample));
    }
}

#[async_trait]
impl MessageCursor for PreviewCursor {
    async fn next(&mut self) -> FetchResult<Option<MessageSample>> {
        loop {
            if self.remaining == 0 {
                return Ok(None);
            }
            if let Some(msg) = self.buffer.pop_front() {
                self.remaining -= 1;
                return Ok(Some(msg));
            }
            if self.exhausted {
                return Ok(None);
            }
            match self.client.preview_page(&self.username, self.before).await? {
                Some(page) => self.absorb(page),
                None => self.exhausted = true,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn msg(id: u64, minute: u32) -> PreviewMessage {
        PreviewMessage {
            id,
            sample: Some(MessageSample {
                timestamp: Utc.with_ymd_and_hms(2026, 3, 1, 10, minute, 0).unwrap(),
                is_service: false,
            }),
        }
    }

    fn cursor(max: usize) -> PreviewCursor {
        let client =
            WebClient::new(Duration::from_secs(1), Throttle::new(Duration::ZERO)).unwrap();
        PreviewCursor::new(client, "news", max)
    }

    #[tokio::test]
    async fn first_page_is_yielded_newest_first() {
        let mut c = cursor(10).with_first_page(vec![msg(1, 0), msg(2, 1), msg(3, 2)]);
        let mut minutes = Vec::new();
        while let Some(m) = c.next().await.unwrap() {
            minutes.push(chrono::Timelike::minute(&m.timestamp));
        }
        // id 1 is the oldest possible post, so no further page is requested.
        assert_eq!(minutes, vec![2, 1, 0]);
    }

    #[tokio::test]
    async fn respects_max_count() {
        let mut c = cursor(2).with_first_page(vec![msg(5, 0), msg(6, 1), msg(7, 2)]);
        assert!(c.next().await.unwrap().is_some());
        assert!(c.next().await.unwrap().is_some());
        assert!(c.next().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn empty_first_page_ends_the_scan() {
        let mut c = cursor(10).with_first_page(Vec::new());
        assert!(c.next().await.unwrap().is_none());
    }

    #[test]
    fn maps_http_statuses() {
        assert!(matches!(
            map_status(StatusCode::NOT_FOUND, "u"),
            FetchError::NotFound(_)
        ));
        assert!(matches!(
            map_status(StatusCode::TOO_MANY_REQUESTS, "u"),
            FetchError::RateLimited(_)
        ));
        assert!(matches!(
            map_status(StatusCode::BAD_GATEWAY, "u"),
            FetchError::Network(_)
        ));
    }
}
