//! Activity classification.
//!
//! Checks run in a fixed order and the first failing one decides:
//! participants, freshness of the last message, message volume in the
//! trailing window, online count. Each check is exposed on its own so the
//! orchestrator can stop fetching as soon as one fails.

use chrono::{DateTime, TimeDelta, Utc};

use crate::domain::{InactiveReason, MessageSample, Outcome, SignalSnapshot, ThresholdConfig};

pub type CheckResult = std::result::Result<(), InactiveReason>;

pub fn check_participants(participants: u64, t: &ThresholdConfig) -> CheckResult {
    if participants < t.min_participants {
        return Err(InactiveReason::TooFewParticipants { participants });
    }
    Ok(())
}

pub fn check_freshness(
    last_message_at: Option<DateTime<Utc>>,
    t: &ThresholdConfig,
    now: DateTime<Utc>,
) -> CheckResult {
    let Some(last) = last_message_at else {
        return Err(InactiveReason::NoMessages);
    };
    let max_age = TimeDelta::try_days(saturating_i64(t.max_staleness_days));
    let age = now.signed_duration_since(last);
    match max_age {
        Some(max_age) if age > max_age => Err(InactiveReason::Stale {
            days: age.num_days(),
        }),
        _ => Ok(()),
    }
}

pub fn check_online(online: Option<u64>, t: &ThresholdConfig) -> CheckResult {
    match online {
        Some(online) if online < t.min_online => Err(InactiveReason::TooFewOnline { online }),
        _ => Ok(()),
    }
}

/// What the window scan wants after seeing one more message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScanStep {
    Continue,
    /// Reached a message older than the window; nothing older can count.
    Done,
    Exceeded,
}

/// Counts non-service messages inside the trailing window.
///
/// Messages must be fed newest first. The scan stops at the first message
/// older than the window start, so out-of-order input undercounts.
#[derive(Clone, Debug)]
pub struct WindowCounter {
    cutoff: Option<DateTime<Utc>>,
    max: u64,
    counted: u64,
}

impl WindowCounter {
    pub fn new(t: &ThresholdConfig, now: DateTime<Utc>) -> Self {
        let cutoff = TimeDelta::try_seconds(saturating_i64(t.recent_window_seconds))
            .and_then(|w| now.checked_sub_signed(w));
        Self {
            cutoff,
            max: t.max_messages_in_window,
            counted: 0,
        }
    }

    pub fn counted(&self) -> u64 {
        self.counted
    }

    pub fn observe(&mut self, msg: &MessageSample) -> ScanStep {
        if msg.is_service {
            return ScanStep::Continue;
        }
        if let Some(cutoff) = self.cutoff {
            if msg.timestamp < cutoff {
                return ScanStep::Done;
            }
        }
        self.counted += 1;
        if self.counted > self.max {
            return ScanStep::Exceeded;
        }
        ScanStep::Continue
    }

    pub fn into_result(self) -> CheckResult {
        if self.counted > self.max {
            return Err(InactiveReason::TooManyMessages {
                counted: self.counted,
            });
        }
        Ok(())
    }
}

/// Run the window scan over an already collected, newest-first slice.
pub fn check_window(
    recent: &[MessageSample],
    t: &ThresholdConfig,
    now: DateTime<Utc>,
) -> CheckResult {
    let mut counter = WindowCounter::new(t, now);
    for msg in recent {
        if counter.observe(msg) != ScanStep::Continue {
            break;
        }
    }
    counter.into_result()
}

/// Classify a full snapshot. Pure: the verdict depends only on the arguments.
pub fn evaluate(snapshot: &SignalSnapshot, t: &ThresholdConfig, now: DateTime<Utc>) -> CheckResult {
    check_participants(snapshot.participant_count, t)?;
    check_freshness(snapshot.last_message_at, t, now)?;
    check_window(&snapshot.recent_messages, t, now)?;
    check_online(snapshot.online_count, t)
}

pub fn classify(snapshot: &SignalSnapshot, t: &ThresholdConfig, now: DateTime<Utc>) -> Outcome {
    match evaluate(snapshot, t, now) {
        Ok(()) => Outcome::Active,
        Err(reason) => Outcome::Inactive { reason },
    }
}

fn saturating_i64(v: u64) -> i64 {
    i64::try_from(v).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    fn msg(secs_ago: i64, is_service: bool) -> MessageSample {
        MessageSample {
            timestamp: now() - TimeDelta::seconds(secs_ago),
            is_service,
        }
    }

    fn healthy() -> SignalSnapshot {
        SignalSnapshot {
            participant_count: 5000,
            online_count: Some(800),
            last_message_at: Some(now() - TimeDelta::minutes(5)),
            recent_messages: vec![msg(10, false), msg(20, false), msg(600, false)],
        }
    }

    #[test]
    fn healthy_chat_is_active() {
        let t = ThresholdConfig::default();
        assert_eq!(classify(&healthy(), &t, now()), Outcome::Active);
    }

    #[test]
    fn too_few_participants_short_circuits() {
        let t = ThresholdConfig::default();
        // Nothing else in the snapshot is valid; the first check decides.
        let snap = SignalSnapshot {
            participant_count: 500,
            ..SignalSnapshot::default()
        };
        assert_eq!(
            evaluate(&snap, &t, now()),
            Err(InactiveReason::TooFewParticipants { participants: 500 })
        );
    }

    #[test]
    fn stale_last_message_is_inactive() {
        let t = ThresholdConfig::default();
        let snap = SignalSnapshot {
            participant_count: 5000,
            last_message_at: Some(now() - TimeDelta::days(400)),
            ..healthy()
        };
        assert_eq!(
            evaluate(&snap, &t, now()),
            Err(InactiveReason::Stale { days: 400 })
        );
    }

    #[test]
    fn missing_last_message_is_inactive() {
        let t = ThresholdConfig::default();
        let snap = SignalSnapshot {
            last_message_at: None,
            ..healthy()
        };
        assert_eq!(evaluate(&snap, &t, now()), Err(InactiveReason::NoMessages));
    }

    #[test]
    fn staleness_boundary_is_inclusive() {
        let t = ThresholdConfig::default();
        let at_limit = Some(now() - TimeDelta::days(365));
        assert_eq!(check_freshness(at_limit, &t, now()), Ok(()));
        let past_limit = Some(now() - TimeDelta::days(365) - TimeDelta::seconds(1));
        assert!(check_freshness(past_limit, &t, now()).is_err());
    }

    #[test]
    fn busy_window_stops_at_sixteenth_message() {
        let t = ThresholdConfig::default();
        let recent: Vec<_> = (0..20).map(|i| msg(i * 2, false)).collect();
        let mut counter = WindowCounter::new(&t, now());
        let mut seen = 0;
        for m in &recent {
            seen += 1;
            if counter.observe(m) == ScanStep::Exceeded {
                break;
            }
        }
        assert_eq!(seen, 16);
        assert_eq!(
            counter.into_result(),
            Err(InactiveReason::TooManyMessages { counted: 16 })
        );

        let snap = SignalSnapshot {
            recent_messages: recent,
            ..healthy()
        };
        assert!(matches!(
            classify(&snap, &t, now()),
            Outcome::Inactive {
                reason: InactiveReason::TooManyMessages { .. }
            }
        ));
    }

    #[test]
    fn window_scan_skips_service_events_and_stops_at_old_messages() {
        let t = ThresholdConfig {
            max_messages_in_window: 2,
            ..ThresholdConfig::default()
        };
        let mut recent = vec![msg(1, false), msg(2, true), msg(3, true), msg(4, false)];
        // Older than the window: everything after it is ignored.
        recent.push(msg(120, false));
        recent.extend((0..10).map(|_| msg(5, false)));
        assert_eq!(check_window(&recent, &t, now()), Ok(()));
    }

    #[test]
    fn missing_online_count_does_not_block() {
        let t = ThresholdConfig::default();
        let snap = SignalSnapshot {
            participant_count: 3000,
            online_count: None,
            last_message_at: Some(now() - TimeDelta::hours(1)),
            recent_messages: (0..5).map(|i| msg(i, false)).collect(),
        };
        assert_eq!(classify(&snap, &t, now()), Outcome::Active);
    }

    #[test]
    fn low_online_count_is_inactive() {
        let t = ThresholdConfig::default();
        let snap = SignalSnapshot {
            online_count: Some(299),
            ..healthy()
        };
        assert_eq!(
            evaluate(&snap, &t, now()),
            Err(InactiveReason::TooFewOnline { online: 299 })
        );
    }

    #[test]
    fn classification_is_deterministic() {
        let t = ThresholdConfig::default();
        let snap = healthy();
        let a = classify(&snap, &t, now());
        let b = classify(&snap, &t, now());
        assert_eq!(a, b);
    }

    #[test]
    fn huge_thresholds_do_not_overflow() {
        let t = ThresholdConfig {
            recent_window_seconds: u64::MAX,
            max_staleness_days: u64::MAX,
            ..ThresholdConfig::default()
        };
        assert_eq!(classify(&healthy(), &t, now()), Outcome::Active);
    }
}
