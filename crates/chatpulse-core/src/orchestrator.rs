//! Batch driver: fetch + classify every identifier and split the results.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::{sync::Semaphore, task::JoinSet};
use tokio_util::sync::CancellationToken;

use crate::{
    classify::{
        check_freshness, check_online, check_participants, CheckResult, ScanStep, WindowCounter,
    },
    domain::{ChatIdentifier, Outcome, ThresholdConfig, Verdict},
    ports::{FetchResult, SignalFetcher},
};

/// Source of "now". Read once per classified chat.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[derive(Clone, Copy, Debug)]
pub struct BatchOptions {
    /// Chats processed at the same time; 1 means strictly sequential.
    pub concurrency: usize,
    /// Upper bound on messages read by the window scan.
    pub history_limit: usize,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            concurrency: 1,
            history_limit: 1000,
        }
    }
}

/// Outcome of a batch run.
///
/// `active` and `inactive` partition every processed identifier in input
/// order. `skipped` holds identifiers never started because the run was
/// cancelled.
#[derive(Clone, Debug, Default, Serialize)]
pub struct Report {
    pub active: Vec<ChatIdentifier>,
    pub inactive: Vec<ChatIdentifier>,
    pub skipped: Vec<ChatIdentifier>,
    pub verdicts: Vec<Verdict>,
}

impl Report {
    pub fn checked(&self) -> usize {
        self.verdicts.len()
    }

    pub fn failed(&self) -> usize {
        self.verdicts
            .iter()
            .filter(|v| matches!(v.outcome, Outcome::FetchFailed { .. }))
            .count()
    }

    fn from_slots(ids: Vec<ChatIdentifier>, slots: Vec<Option<Verdict>>) -> Self {
        let mut report = Self::default();
        for (id, slot) in ids.into_iter().zip(slots) {
            match slot {
                Some(verdict) => {
                    if verdict.is_active() {
                        report.active.push(id);
                    } else {
                        report.inactive.push(id);
                    }
                    report.verdicts.push(verdict);
                }
                None => report.skipped.push(id),
            }
        }
        report
    }
}

/// Everything a worker needs to judge one chat. Shared read-only.
struct Probe {
    fetcher: Arc<dyn SignalFetcher>,
    thresholds: ThresholdConfig,
    history_limit: usize,
    clock: Arc<dyn Clock>,
}

impl Probe {
    async fn check(&self, id: &ChatIdentifier) -> Verdict {
        tracing::info!("Checking {id}...");

        let outcome = match self.evaluate(id).await {
            Ok(Ok(())) => Outcome::Active,
            Ok(Err(reason)) => {
                tracing::debug!(chat = %id, %reason, "inactive");
                Outcome::Inactive { reason }
            }
            Err(e) => {
                tracing::warn!(chat = %id, error = %e, "fetch failed; counting as inactive");
                Outcome::FetchFailed {
                    error: e.to_string(),
                }
            }
        };

        Verdict {
            identifier: id.clone(),
            outcome,
        }
    }

    /// Same decision order as [`crate::classify::evaluate`], fetching each
    /// signal only once the cheaper checks before it have passed.
    async fn evaluate(&self, id: &ChatIdentifier) -> FetchResult<CheckResult> {
        let t = &self.thresholds;
        let entity = self.fetcher.resolve(id).await?;
        let now = self.clock.now();

        let meta = self.fetcher.full_metadata(&entity).await?;
        if let Err(reason) = check_participants(meta.participants(), t) {
            return Ok(Err(reason));
        }

        let last = self.fetcher.last_message_at(&entity).await?;
        if let Err(reason) = check_freshness(last, t, now) {
            return Ok(Err(reason));
        }

        let mut cursor = self
            .fetcher
            .recent_messages(&entity, self.history_limit)
            .await?;
        let mut counter = WindowCounter::new(t, now);
        while let Some(msg) = cursor.next().await? {
            if counter.observe(&msg) != ScanStep::Continue {
                break;
            }
        }
        if let Err(reason) = counter.into_result() {
            return Ok(Err(reason));
        }

        Ok(check_online(meta.online(), t))
    }
}

pub struct Orchestrator {
    probe: Arc<Probe>,
    concurrency: usize,
}

impl Orchestrator {
    pub fn new(
        fetcher: Arc<dyn SignalFetcher>,
        thresholds: ThresholdConfig,
        opts: BatchOptions,
    ) -> Self {
        Self::with_clock(fetcher, thresholds, opts, Arc::new(SystemClock))
    }

    pub fn with_clock(
        fetcher: Arc<dyn SignalFetcher>,
        thresholds: ThresholdConfig,
        opts: BatchOptions,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            probe: Arc::new(Probe {
                fetcher,
                thresholds,
                history_limit: opts.history_limit,
                clock,
            }),
            concurrency: opts.concurrency.clamp(1, Semaphore::MAX_PERMITS),
        }
    }

    pub async fn check_one(&self, id: &ChatIdentifier) -> Verdict {
        self.probe.check(id).await
    }

    /// Classify every identifier.
    ///
    /// At most `concurrency` chats are in flight. Results are slotted by
    /// input index, so output order never depends on completion order.
    /// Cancelling `cancel` stops new chats from starting; in-flight ones
    /// finish and are kept.
    pub async fn run(&self, ids: Vec<ChatIdentifier>, cancel: CancellationToken) -> Report {
        let mut slots: Vec<Option<Verdict>> = vec![None; ids.len()];
        let permits = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks = JoinSet::new();
        let mut started = 0;

        for (idx, id) in ids.iter().enumerate() {
            let permit = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::warn!("interrupted; {} chats not started", ids.len() - idx);
                    break;
                }
                permit = Arc::clone(&permits).acquire_owned() => match permit {
                    Ok(p) => p,
                    Err(_) => break,
                },
            };

            let probe = Arc::clone(&self.probe);
            let id = id.clone();
            tasks.spawn(async move {
                let _permit = permit;
                (idx, probe.check(&id).await)
            });
            started = idx + 1;
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((idx, verdict)) => slots[idx] = Some(verdict),
                Err(e) => tracing::error!(error = %e, "worker crashed"),
            }
        }

        // A started chat without a verdict belongs to a crashed worker.
        for (id, slot) in ids.iter().zip(slots.iter_mut()).take(started) {
            if slot.is_none() {
                *slot = Some(Verdict {
                    identifier: id.clone(),
                    outcome: Outcome::FetchFailed {
                        error: "worker crashed".to_string(),
                    },
                });
            }
        }

        Report::from_slots(ids, slots)
    }
}
