//! Request budgeting against rolling windows and hard period quotas.
//!
//! [`RateBudgetTracker`] answers "may I call this platform now?" and, when the
//! answer is no, "how long until I may?". Each platform is checked against one
//! or more rolling request-count windows plus an optional hard quota per
//! calendar month. The tracker is constructor-injected into fetchers (never a
//! process-wide global) and every method takes `now` explicitly, so tests can
//! drive independent trackers with simulated clocks.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use tokio::sync::Mutex;

use trendscout_core::Platform;

/// One rolling request-count ceiling.
#[derive(Debug, Clone, Copy)]
pub struct WindowRule {
    pub max_requests: usize,
    pub length: Duration,
}

/// Budget rules for a single platform.
#[derive(Debug, Clone)]
pub struct PlatformRules {
    pub windows: Vec<WindowRule>,
    /// Hard request cap per calendar month, when the provider has one.
    pub period_quota: Option<u64>,
}

/// Per-platform budget rules.
#[derive(Debug, Clone, Default)]
pub struct RateBudgetConfig {
    rules: HashMap<Platform, PlatformRules>,
}

impl RateBudgetConfig {
    /// Provider defaults: Reddit allows 60 requests/minute and 600 per
    /// 10 minutes with no meaningful monthly cap; X admits one search per
    /// 15 minutes and 50 per month.
    #[must_use]
    pub fn standard() -> Self {
        Self::default()
            .with_rules(
                Platform::Reddit,
                PlatformRules {
                    windows: vec![
                        WindowRule {
                            max_requests: 60,
                            length: Duration::minutes(1),
                        },
                        WindowRule {
                            max_requests: 600,
                            length: Duration::minutes(10),
                        },
                    ],
                    period_quota: None,
                },
            )
            .with_rules(
                Platform::X,
                PlatformRules {
                    windows: vec![WindowRule {
                        max_requests: 1,
                        length: Duration::minutes(15),
                    }],
                    period_quota: Some(50),
                },
            )
    }

    #[must_use]
    pub fn with_rules(mut self, platform: Platform, rules: PlatformRules) -> Self {
        self.rules.insert(platform, rules);
        self
    }
}

/// Outcome of a [`RateBudgetTracker::try_acquire`] check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acquire {
    /// All ceilings have headroom; the caller may issue one request and must
    /// account for it with [`RateBudgetTracker::record_request`].
    Allowed,
    /// A rolling window is saturated; retry once `wait_until` passes.
    RateLimited { wait_until: DateTime<Utc> },
    /// The period quota is spent; blocked until the provider resets it.
    QuotaExhausted { reset_at: DateTime<Utc> },
}

#[derive(Debug)]
struct PlatformState {
    rules: PlatformRules,
    /// Sliding log of request timestamps, pruned to the longest window.
    log: VecDeque<DateTime<Utc>>,
    period_used: u64,
    period_anchor: DateTime<Utc>,
    /// Provider-reported quota block, set via `record_quota_exhausted`.
    blocked_until: Option<DateTime<Utc>>,
}

impl PlatformState {
    fn new(rules: PlatformRules, now: DateTime<Utc>) -> Self {
        Self {
            rules,
            log: VecDeque::new(),
            period_used: 0,
            period_anchor: period_start(now),
            blocked_until: None,
        }
    }

    /// Resets the period counter when the calendar month rolls over.
    fn roll_period(&mut self, now: DateTime<Utc>) {
        let anchor = period_start(now);
        if anchor != self.period_anchor {
            self.period_anchor = anchor;
            self.period_used = 0;
        }
    }

    fn prune(&mut self, now: DateTime<Utc>) {
        let Some(longest) = self.rules.windows.iter().map(|w| w.length).max() else {
            self.log.clear();
            return;
        };
        let floor = now - longest;
        while self.log.front().is_some_and(|t| *t <= floor) {
            self.log.pop_front();
        }
    }
}

/// Tracks request budgets for all configured platforms.
///
/// Platforms are independent: saturating one never blocks another. State for
/// a platform is only touched through `&mut self`, so wrapping the tracker in
/// a mutex (see [`shared`]) gives the per-platform critical section the
/// fetchers rely on.
#[derive(Debug)]
pub struct RateBudgetTracker {
    states: HashMap<Platform, PlatformState>,
}

impl RateBudgetTracker {
    #[must_use]
    pub fn new(config: RateBudgetConfig, now: DateTime<Utc>) -> Self {
        let states = config
            .rules
            .into_iter()
            .map(|(platform, rules)| (platform, PlatformState::new(rules, now)))
            .collect();
        Self { states }
    }

    /// Checks every ceiling for `platform` without consuming anything.
    ///
    /// `Allowed` means one request may be issued right now; the caller must
    /// follow up with [`Self::record_request`] for the request it sends.
    /// `RateLimited.wait_until` is the instant the last of the violated
    /// windows frees a slot (the binding window). A platform with no
    /// configured rules is unthrottled.
    pub fn try_acquire(&mut self, platform: Platform, now: DateTime<Utc>) -> Acquire {
        let Some(state) = self.states.get_mut(&platform) else {
            return Acquire::Allowed;
        };

        state.roll_period(now);

        if let Some(blocked_until) = state.blocked_until {
            if now < blocked_until {
                return Acquire::QuotaExhausted {
                    reset_at: blocked_until,
                };
            }
            state.blocked_until = None;
        }

        if let Some(quota) = state.rules.period_quota {
            if state.period_used >= quota {
                return Acquire::QuotaExhausted {
                    reset_at: next_period_start(now),
                };
            }
        }

        state.prune(now);

        let mut wait_until: Option<DateTime<Utc>> = None;
        for window in &state.rules.windows {
            let floor = now - window.length;
            let in_window = state.log.iter().filter(|t| **t > floor).count();
            if in_window >= window.max_requests {
                if let Some(oldest) = state.log.iter().find(|t| **t > floor) {
                    let expiry = *oldest + window.length;
                    wait_until = Some(wait_until.map_or(expiry, |w| w.max(expiry)));
                }
            }
        }

        match wait_until {
            Some(wait_until) => Acquire::RateLimited { wait_until },
            None => Acquire::Allowed,
        }
    }

    /// Accounts for one request actually sent at `now`.
    pub fn record_request(&mut self, platform: Platform, now: DateTime<Utc>) {
        if let Some(state) = self.states.get_mut(&platform) {
            state.roll_period(now);
            state.log.push_back(now);
            state.period_used = state.period_used.saturating_add(1);
            state.prune(now);
        }
    }

    /// Marks `platform` blocked until `reset_at` after a provider-reported
    /// quota exhaustion. Until then `try_acquire` answers `QuotaExhausted`,
    /// which callers surface distinctly from a rolling-window rate limit.
    pub fn record_quota_exhausted(&mut self, platform: Platform, reset_at: DateTime<Utc>) {
        // A provider-reported block sticks even for platforms with no
        // configured rules.
        let state = self.states.entry(platform).or_insert_with(|| {
            PlatformState::new(
                PlatformRules {
                    windows: Vec::new(),
                    period_quota: None,
                },
                reset_at,
            )
        });
        state.blocked_until = Some(reset_at);
    }
}

/// Tracker handle shared between source tasks.
pub type SharedBudget = Arc<Mutex<RateBudgetTracker>>;

/// Wraps a tracker for sharing across concurrently-running fetchers.
#[must_use]
pub fn shared(tracker: RateBudgetTracker) -> SharedBudget {
    Arc::new(Mutex::new(tracker))
}

/// First instant of the UTC calendar month containing `t`.
#[must_use]
pub fn period_start(t: DateTime<Utc>) -> DateTime<Utc> {
    let first = t.date_naive().with_day(1).unwrap_or_else(|| t.date_naive());
    Utc.from_utc_datetime(&first.and_time(NaiveTime::MIN))
}

/// First instant of the UTC calendar month after the one containing `t`.
///
/// Used as the conservative quota-reset default when a provider reports
/// exhaustion without a reset timestamp.
#[must_use]
pub fn next_period_start(t: DateTime<Utc>) -> DateTime<Utc> {
    let (year, month) = if t.month() == 12 {
        (t.year() + 1, 1)
    } else {
        (t.year(), t.month() + 1)
    };
    let first = NaiveDate::from_ymd_opt(year, month, 1).unwrap_or_else(|| t.date_naive());
    Utc.from_utc_datetime(&first.and_time(NaiveTime::MIN))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap()
    }

    fn single_window(max_requests: usize, length: Duration) -> RateBudgetConfig {
        RateBudgetConfig::default().with_rules(
            Platform::X,
            PlatformRules {
                windows: vec![WindowRule {
                    max_requests,
                    length,
                }],
                period_quota: None,
            },
        )
    }

    #[test]
    fn unconfigured_platform_is_unthrottled() {
        let mut tracker = RateBudgetTracker::new(RateBudgetConfig::default(), t0());
        for _ in 0..1000 {
            assert_eq!(tracker.try_acquire(Platform::Reddit, t0()), Acquire::Allowed);
            tracker.record_request(Platform::Reddit, t0());
        }
    }

    #[test]
    fn second_request_in_tight_window_is_rate_limited() {
        let mut tracker = RateBudgetTracker::new(single_window(1, Duration::minutes(15)), t0());

        assert_eq!(tracker.try_acquire(Platform::X, t0()), Acquire::Allowed);
        tracker.record_request(Platform::X, t0());

        let denied = tracker.try_acquire(Platform::X, t0() + Duration::minutes(5));
        assert_eq!(
            denied,
            Acquire::RateLimited {
                wait_until: t0() + Duration::minutes(15)
            }
        );
    }

    #[test]
    fn window_frees_a_slot_after_it_slides_past() {
        let mut tracker = RateBudgetTracker::new(single_window(1, Duration::minutes(15)), t0());
        tracker.record_request(Platform::X, t0());

        let after_expiry = t0() + Duration::minutes(15);
        assert_eq!(tracker.try_acquire(Platform::X, after_expiry), Acquire::Allowed);
    }

    #[test]
    fn reddit_defaults_deny_the_61st_request_within_a_minute() {
        let mut tracker = RateBudgetTracker::new(RateBudgetConfig::standard(), t0());
        for i in 0..60 {
            let now = t0() + Duration::milliseconds(i * 100);
            assert_eq!(tracker.try_acquire(Platform::Reddit, now), Acquire::Allowed);
            tracker.record_request(Platform::Reddit, now);
        }
        let now = t0() + Duration::seconds(6);
        assert!(matches!(
            tracker.try_acquire(Platform::Reddit, now),
            Acquire::RateLimited { .. }
        ));
    }

    #[test]
    fn wait_until_is_the_binding_violated_window() {
        // Both windows are saturated; the wait must clear the longer one.
        let config = RateBudgetConfig::default().with_rules(
            Platform::Reddit,
            PlatformRules {
                windows: vec![
                    WindowRule {
                        max_requests: 2,
                        length: Duration::minutes(1),
                    },
                    WindowRule {
                        max_requests: 3,
                        length: Duration::minutes(5),
                    },
                ],
                period_quota: None,
            },
        );
        let mut tracker = RateBudgetTracker::new(config, t0());
        tracker.record_request(Platform::Reddit, t0());
        tracker.record_request(Platform::Reddit, t0() + Duration::seconds(10));
        tracker.record_request(Platform::Reddit, t0() + Duration::seconds(20));

        let denied = tracker.try_acquire(Platform::Reddit, t0() + Duration::seconds(30));
        assert_eq!(
            denied,
            Acquire::RateLimited {
                wait_until: t0() + Duration::minutes(5)
            }
        );
    }

    #[test]
    fn period_quota_exhaustion_reports_next_month_reset() {
        let config = RateBudgetConfig::default().with_rules(
            Platform::X,
            PlatformRules {
                windows: vec![],
                period_quota: Some(2),
            },
        );
        let mut tracker = RateBudgetTracker::new(config, t0());
        for _ in 0..2 {
            assert_eq!(tracker.try_acquire(Platform::X, t0()), Acquire::Allowed);
            tracker.record_request(Platform::X, t0());
        }

        let denied = tracker.try_acquire(Platform::X, t0());
        assert_eq!(
            denied,
            Acquire::QuotaExhausted {
                reset_at: Utc.with_ymd_and_hms(2026, 4, 1, 0, 0, 0).unwrap()
            }
        );
    }

    #[test]
    fn period_counter_resets_at_month_boundary() {
        let config = RateBudgetConfig::default().with_rules(
            Platform::X,
            PlatformRules {
                windows: vec![],
                period_quota: Some(1),
            },
        );
        let mut tracker = RateBudgetTracker::new(config, t0());
        tracker.record_request(Platform::X, t0());
        assert!(matches!(
            tracker.try_acquire(Platform::X, t0()),
            Acquire::QuotaExhausted { .. }
        ));

        let next_month = Utc.with_ymd_and_hms(2026, 4, 1, 0, 0, 1).unwrap();
        assert_eq!(tracker.try_acquire(Platform::X, next_month), Acquire::Allowed);
    }

    #[test]
    fn provider_reported_block_holds_then_clears() {
        let mut tracker = RateBudgetTracker::new(RateBudgetConfig::standard(), t0());
        let reset_at = t0() + Duration::hours(6);
        tracker.record_quota_exhausted(Platform::X, reset_at);

        assert_eq!(
            tracker.try_acquire(Platform::X, t0() + Duration::hours(1)),
            Acquire::QuotaExhausted { reset_at }
        );
        assert_eq!(tracker.try_acquire(Platform::X, reset_at), Acquire::Allowed);
    }

    /// Ceiling property: however `try_acquire` is driven, the number of
    /// allowed-and-recorded requests inside any rolling window never exceeds
    /// the ceiling.
    #[test]
    fn allowed_requests_never_exceed_window_ceiling() {
        let length = Duration::minutes(1);
        let mut tracker = RateBudgetTracker::new(single_window(3, length), t0());
        let mut allowed: Vec<DateTime<Utc>> = Vec::new();

        // Hammer the tracker every 2 simulated seconds for 10 minutes.
        for step in 0..300 {
            let now = t0() + Duration::seconds(step * 2);
            if tracker.try_acquire(Platform::X, now) == Acquire::Allowed {
                tracker.record_request(Platform::X, now);
                allowed.push(now);
            }
        }

        assert!(!allowed.is_empty());
        for &t in &allowed {
            let floor = t - length;
            let in_window = allowed.iter().filter(|&&a| a > floor && a <= t).count();
            assert!(
                in_window <= 3,
                "{in_window} allowed requests inside the window ending at {t}"
            );
        }
    }

    #[test]
    fn next_period_start_handles_december() {
        let dec = Utc.with_ymd_and_hms(2026, 12, 31, 23, 59, 59).unwrap();
        assert_eq!(
            next_period_start(dec),
            Utc.with_ymd_and_hms(2027, 1, 1, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn period_start_is_first_of_month() {
        assert_eq!(
            period_start(t0()),
            Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap()
        );
    }
}
