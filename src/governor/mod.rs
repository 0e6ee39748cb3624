//! API usage governor.
//!
//! Gates every outbound generative-AI call. Three controls apply, in order:
//! the kill switch (`system_enabled`), a per-minute ceiling over a sliding
//! 60-second window, and soft throttling (an added delay) once monthly usage
//! crosses a percentage of the budget. Usage at 100% of the budget flips the
//! kill switch off until an administrator turns it back on.
//!
//! State lives behind one async mutex. Mutations happen under the lock;
//! persistence and the throttling delay happen after it is released, so a
//! throttled caller never blocks other requests. Every snapshot is numbered
//! under the state lock and writes are serialized, so the store never goes
//! back to an older snapshot than the one it already holds.

pub mod clock;
pub mod state;
pub mod store;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::GovernorConfig;

pub use clock::{Clock, ManualClock, SystemClock};
pub use state::{ThresholdOutcome, UsageSnapshot, UsageState, WINDOW_SECONDS};
pub use store::{ConfigStore, MemoryConfigStore, StoreError};

/// Config key under which the usage snapshot is stored.
pub const STATE_KEY: &str = "api_monitor_state";

const AUTO_DISABLE_REASON: &str = "monthly budget exhausted";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdmissionDenied {
    #[error("system disabled")]
    SystemDisabled,

    #[error("per-minute limit reached ({limit} requests per minute)")]
    PerMinuteLimit { limit: usize },
}

/// Point-in-time view of the governor, as returned to clients.
#[derive(Debug, Clone, Serialize)]
pub struct UsageReport {
    pub system_enabled: bool,
    pub throttling_active: bool,
    pub total_requests: u64,
    pub month_requests: u64,
    pub recent_count: usize,
    pub tokens_used: u64,
    pub last_request_at: Option<DateTime<Utc>>,
    pub per_minute_limit: usize,
    pub monthly_budget: u64,
    pub usage_percent: f64,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PeriodStats {
    pub period_days: u32,
    pub average_requests_per_day: f64,
    pub period_total: u64,
    pub peak_requests_per_minute: usize,
}

/// A snapshot numbered in mutation order.
struct PendingWrite {
    sequence: u64,
    snapshot: UsageSnapshot,
}

pub struct UsageGovernor {
    config: GovernorConfig,
    state: Mutex<UsageState>,
    store: Arc<dyn ConfigStore>,
    clock: Arc<dyn Clock>,
    sequence: AtomicU64,
    last_written: Mutex<u64>,
}

impl UsageGovernor {
    pub fn new(config: GovernorConfig, store: Arc<dyn ConfigStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            state: Mutex::new(UsageState::default()),
            store,
            clock,
            sequence: AtomicU64::new(0),
            last_written: Mutex::new(0),
        }
    }

    /// Build a governor and rehydrate it from the store. Never fails: a
    /// missing or unreadable snapshot leaves the defaults in place.
    pub async fn load(config: GovernorConfig, store: Arc<dyn ConfigStore>, clock: Arc<dyn Clock>) -> Self {
        let governor = Self::new(config, store, clock);
        governor.rehydrate().await;
        governor
    }

    pub fn config(&self) -> &GovernorConfig {
        &self.config
    }

    async fn rehydrate(&self) {
        let snapshot = match self.read_snapshot().await {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => {
                debug!("No persisted usage state, starting from defaults");
                return;
            }
            Err(e) => {
                warn!(error = %e, "Failed to load usage state, starting from defaults");
                return;
            }
        };

        let mut state = self.state.lock().await;
        state.restore(&snapshot);
        info!(
            total_requests = state.total_requests,
            month_requests = state.month_requests,
            system_enabled = state.system_enabled,
            "Usage state restored"
        );
    }

    async fn read_snapshot(&self) -> Result<Option<UsageSnapshot>, StoreError> {
        match self.store.get_config_value(STATE_KEY).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    async fn write_snapshot(&self, snapshot: &UsageSnapshot) -> Result<(), StoreError> {
        let raw = serde_json::to_string(snapshot)?;
        self.store.upsert_config_value(STATE_KEY, &raw).await
    }

    /// Must be called with the state lock held.
    fn stamp(&self, state: &UsageState, now: DateTime<Utc>) -> PendingWrite {
        PendingWrite {
            sequence: self.sequence.fetch_add(1, Ordering::SeqCst) + 1,
            snapshot: state.snapshot(now),
        }
    }

    /// Best-effort save. The only place a persistence failure is observed.
    /// Snapshots older than the last one written are dropped.
    async fn persist(&self, pending: PendingWrite) {
        let mut last_written = self.last_written.lock().await;
        if pending.sequence <= *last_written {
            debug!(sequence = pending.sequence, "Skipping superseded usage snapshot");
            return;
        }
        *last_written = pending.sequence;
        if let Err(e) = self.write_snapshot(&pending.snapshot).await {
            warn!(error = %e, "Failed to persist usage state");
        }
    }

    fn evaluate(&self, state: &mut UsageState, monthly_budget: u64) -> ThresholdOutcome {
        let outcome = state.evaluate_thresholds(monthly_budget, self.config.throttling_threshold_percent);
        if outcome.throttling_engaged {
            warn!(
                usage_percent = outcome.percent,
                threshold = self.config.throttling_threshold_percent,
                "Usage threshold reached, throttling engaged"
            );
        }
        if outcome.auto_disabled {
            warn!(reason = AUTO_DISABLE_REASON, usage_percent = outcome.percent, "System disabled");
        }
        outcome
    }

    /// Count one completed AI call.
    pub async fn record_request(&self, tokens: u64) {
        let snapshot = {
            let mut state = self.state.lock().await;
            let now = self.clock.now();
            state.record(now, tokens);
            self.evaluate(&mut state, self.config.monthly_budget);
            info!(
                tokens,
                month_requests = state.month_requests,
                recent_count = state.recent_count(),
                "API request recorded"
            );
            self.stamp(&state, now)
        };
        self.persist(snapshot).await;
    }

    /// Decide whether an AI call may proceed. When throttling is active the
    /// calling task sleeps for the configured delay before being admitted.
    pub async fn check_admission(&self) -> Result<(), AdmissionDenied> {
        let delay = self.admit().await?;
        self.throttle(delay).await;
        Ok(())
    }

    /// The admission decision without the wait. On success, returns the delay
    /// the caller owes before its AI call, zero unless throttling is active.
    pub async fn admit(&self) -> Result<std::time::Duration, AdmissionDenied> {
        let (decision, snapshot) = {
            let mut state = self.state.lock().await;
            let now = self.clock.now();
            let outcome = self.evaluate(&mut state, self.config.monthly_budget);
            state.prune_window(now);

            let decision = if !state.system_enabled {
                Err(AdmissionDenied::SystemDisabled)
            } else if state.recent_count() >= self.config.per_minute_limit {
                Err(AdmissionDenied::PerMinuteLimit {
                    limit: self.config.per_minute_limit,
                })
            } else {
                Ok(state.throttling_active)
            };
            (decision, outcome.changed().then(|| self.stamp(&state, now)))
        };

        if let Some(snapshot) = snapshot {
            self.persist(snapshot).await;
        }

        let throttled = decision.inspect_err(|reason| {
            debug!(%reason, "Admission denied");
        })?;

        Ok(if throttled {
            self.config.throttling_delay()
        } else {
            std::time::Duration::ZERO
        })
    }

    /// Sleep on the calling task only.
    pub async fn throttle(&self, delay: std::time::Duration) {
        if !delay.is_zero() {
            info!(delay_secs = delay.as_secs_f64(), "Throttling active, delaying request");
            tokio::time::sleep(delay).await;
        }
    }

    /// Percentage of `monthly_budget` used this month, with threshold side effects.
    pub async fn compute_usage_percent(&self, monthly_budget: u64) -> f64 {
        let (outcome, snapshot) = {
            let mut state = self.state.lock().await;
            let outcome = self.evaluate(&mut state, monthly_budget);
            (outcome, outcome.changed().then(|| self.stamp(&state, self.clock.now())))
        };
        if let Some(snapshot) = snapshot {
            self.persist(snapshot).await;
        }
        outcome.percent
    }

    pub async fn usage_percent(&self) -> f64 {
        self.compute_usage_percent(self.config.monthly_budget).await
    }

    pub async fn enable_system(&self) {
        let snapshot = {
            let mut state = self.state.lock().await;
            state.system_enabled = true;
            self.stamp(&state, self.clock.now())
        };
        info!("System enabled");
        self.persist(snapshot).await;
    }

    /// The reason is logged, never persisted.
    pub async fn disable_system(&self, reason: &str) {
        let snapshot = {
            let mut state = self.state.lock().await;
            state.system_enabled = false;
            self.stamp(&state, self.clock.now())
        };
        warn!(reason, "System disabled");
        self.persist(snapshot).await;
    }

    pub async fn reset_monthly(&self) {
        let snapshot = {
            let mut state = self.state.lock().await;
            state.reset_monthly();
            self.stamp(&state, self.clock.now())
        };
        info!("Monthly usage counter reset");
        self.persist(snapshot).await;
    }

    pub async fn report(&self) -> UsageReport {
        let (report, changed) = {
            let mut state = self.state.lock().await;
            let now = self.clock.now();
            let outcome = self.evaluate(&mut state, self.config.monthly_budget);
            state.prune_window(now);
            let report = UsageReport {
                system_enabled: state.system_enabled,
                throttling_active: state.throttling_active,
                total_requests: state.total_requests,
                month_requests: state.month_requests,
                recent_count: state.recent_count(),
                tokens_used: state.tokens_used,
                last_request_at: state.last_request_at,
                per_minute_limit: self.config.per_minute_limit,
                monthly_budget: self.config.monthly_budget,
                usage_percent: outcome.percent,
                generated_at: now,
            };
            (report, outcome.changed().then(|| self.stamp(&state, now)))
        };
        if let Some(snapshot) = changed {
            self.persist(snapshot).await;
        }
        report
    }

    /// Coarse usage statistics. Daily averages assume a 30-day month.
    pub async fn period_stats(&self, days: u32) -> PeriodStats {
        let mut state = self.state.lock().await;
        state.prune_window(self.clock.now());
        PeriodStats {
            period_days: days,
            average_requests_per_day: state.month_requests as f64 / 30.0,
            period_total: state.month_requests,
            peak_requests_per_minute: state.recent_count().max(1),
        }
    }

    /// Copy of the current state.
    pub async fn state(&self) -> UsageState {
        self.state.lock().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Duration;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    struct FailingStore {
        writes: AtomicUsize,
    }

    #[async_trait]
    impl ConfigStore for FailingStore {
        async fn get_config_value(&self, _key: &str) -> Result<Option<String>, StoreError> {
            Err(StoreError::Unavailable("connection refused".to_string()))
        }

        async fn upsert_config_value(&self, _key: &str, _value: &str) -> Result<(), StoreError> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            Err(StoreError::Unavailable("connection refused".to_string()))
        }
    }

    /// Holds its first write back so a later write can overtake it.
    #[derive(Default)]
    struct SlowFirstStore {
        inner: MemoryConfigStore,
        delayed: AtomicBool,
    }

    #[async_trait]
    impl ConfigStore for SlowFirstStore {
        async fn get_config_value(&self, key: &str) -> Result<Option<String>, StoreError> {
            self.inner.get_config_value(key).await
        }

        async fn upsert_config_value(&self, key: &str, value: &str) -> Result<(), StoreError> {
            if !self.delayed.swap(true, Ordering::SeqCst) {
                tokio::time::sleep(std::time::Duration::from_millis(100)).await;
            }
            self.inner.upsert_config_value(key, value).await
        }
    }

    async fn persisted(store: &dyn ConfigStore) -> UsageSnapshot {
        let raw = store.get_config_value(STATE_KEY).await.unwrap().unwrap();
        serde_json::from_str(&raw).unwrap()
    }

    fn start() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2025-06-01T08:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn config(per_minute_limit: usize, monthly_budget: u64) -> GovernorConfig {
        GovernorConfig {
            per_minute_limit,
            throttling_threshold_percent: 80.0,
            throttling_delay_seconds: 0.0,
            monthly_budget,
        }
    }

    fn governor_with(config: GovernorConfig) -> (UsageGovernor, Arc<ManualClock>, Arc<MemoryConfigStore>) {
        let clock = Arc::new(ManualClock::new(start()));
        let store = Arc::new(MemoryConfigStore::new());
        let governor = UsageGovernor::new(config, store.clone(), clock.clone());
        (governor, clock, store)
    }

    #[tokio::test]
    async fn counts_every_recorded_request() {
        let (governor, _, _) = governor_with(config(1000, 0));
        for _ in 0..7 {
            governor.record_request(10).await;
        }
        governor.reset_monthly().await;
        for _ in 0..3 {
            governor.record_request(10).await;
        }

        let state = governor.state().await;
        assert_eq!(state.total_requests, 10);
        assert_eq!(state.month_requests, 3);
        assert_eq!(state.tokens_used, 100);
    }

    #[tokio::test]
    async fn window_only_holds_last_minute() {
        let (governor, clock, _) = governor_with(config(1000, 0));
        governor.record_request(1).await;
        clock.advance(Duration::seconds(30));
        governor.record_request(1).await;
        clock.advance(Duration::seconds(31));
        governor.record_request(1).await;

        let state = governor.state().await;
        let cutoff = clock.now() - Duration::seconds(WINDOW_SECONDS);
        assert_eq!(state.recent_count(), 2);
        assert!(state.recent_request_times.iter().all(|at| *at > cutoff));

        clock.advance(Duration::seconds(61));
        governor.check_admission().await.unwrap();
        assert_eq!(governor.state().await.recent_count(), 0);
    }

    #[tokio::test]
    async fn per_minute_limit_blocks_until_window_slides() {
        let (governor, clock, _) = governor_with(config(3, 0));
        for _ in 0..3 {
            governor.record_request(1).await;
            clock.advance(Duration::milliseconds(300));
        }

        assert_eq!(
            governor.check_admission().await,
            Err(AdmissionDenied::PerMinuteLimit { limit: 3 })
        );

        clock.advance(Duration::seconds(61));
        assert_eq!(governor.check_admission().await, Ok(()));
    }

    #[tokio::test]
    async fn throttling_engages_at_threshold_and_stays() {
        let (governor, _, _) = governor_with(config(1000, 100));
        for _ in 0..80 {
            governor.record_request(1).await;
        }
        assert_eq!(governor.compute_usage_percent(100).await, 80.0);
        assert!(governor.state().await.throttling_active);

        governor.record_request(1).await;
        let state = governor.state().await;
        assert!(state.throttling_active);
        assert!(state.system_enabled);
        assert_eq!(governor.check_admission().await, Ok(()));
    }

    #[tokio::test]
    async fn exhausted_budget_disables_system() {
        let (governor, clock, _) = governor_with(config(1000, 100));
        for _ in 0..100 {
            governor.record_request(1).await;
        }
        assert_eq!(governor.compute_usage_percent(100).await, 100.0);
        assert!(!governor.state().await.system_enabled);

        clock.advance(Duration::minutes(10));
        assert_eq!(governor.check_admission().await, Err(AdmissionDenied::SystemDisabled));
    }

    #[tokio::test]
    async fn zero_budget_never_disables() {
        let (governor, _, _) = governor_with(config(1000, 0));
        for _ in 0..50 {
            governor.record_request(1).await;
        }
        assert_eq!(governor.compute_usage_percent(0).await, 0.0);
        let state = governor.state().await;
        assert!(state.system_enabled);
        assert!(!state.throttling_active);
    }

    #[tokio::test]
    async fn reset_monthly_keeps_lifetime_counters() {
        let (governor, _, _) = governor_with(config(1000, 10));
        for _ in 0..9 {
            governor.record_request(20).await;
        }
        assert!(governor.state().await.throttling_active);

        governor.reset_monthly().await;
        let state = governor.state().await;
        assert_eq!(state.month_requests, 0);
        assert!(!state.throttling_active);
        assert_eq!(state.total_requests, 9);
        assert_eq!(state.tokens_used, 180);
    }

    #[tokio::test]
    async fn disable_then_enable_keeps_counters() {
        let (governor, _, _) = governor_with(config(1000, 0));
        governor.record_request(5).await;
        governor.record_request(5).await;

        governor.disable_system("maintenance").await;
        assert_eq!(governor.check_admission().await, Err(AdmissionDenied::SystemDisabled));
        governor.disable_system("maintenance").await;

        governor.enable_system().await;
        governor.enable_system().await;
        let state = governor.state().await;
        assert!(state.system_enabled);
        assert_eq!(state.total_requests, 2);
        assert_eq!(state.month_requests, 2);
        assert_eq!(state.tokens_used, 10);
    }

    #[tokio::test]
    async fn failing_store_does_not_change_counters() {
        let clock = Arc::new(ManualClock::new(start()));
        let failing = Arc::new(FailingStore {
            writes: AtomicUsize::new(0),
        });
        let broken = UsageGovernor::load(config(1000, 100), failing.clone(), clock.clone()).await;
        let (working, _, _) = governor_with(config(1000, 100));

        for _ in 0..85 {
            broken.record_request(3).await;
            working.record_request(3).await;
        }

        assert_eq!(broken.state().await, working.state().await);
        assert_eq!(failing.writes.load(Ordering::SeqCst), 85);
    }

    #[tokio::test]
    async fn snapshot_round_trips_through_store() {
        let (governor, clock, store) = governor_with(config(1000, 1500));
        governor.record_request(40).await;
        governor.record_request(60).await;
        governor.disable_system("maintenance").await;

        let restored = UsageGovernor::load(config(1000, 1500), store.clone(), clock.clone()).await;
        let state = restored.state().await;
        assert_eq!(state.total_requests, 2);
        assert_eq!(state.month_requests, 2);
        assert_eq!(state.tokens_used, 100);
        assert!(!state.system_enabled);
        assert_eq!(state.recent_count(), 0);
    }

    #[tokio::test]
    async fn load_accepts_legacy_snapshot() {
        let raw = r#"{"requisicoes_total": 12, "requisicoes_mes": 4, "tokens_usados": 321,
                      "sistema_ativo": true, "throttling_ativo": false,
                      "ultima_atualizacao": "2025-05-30T10:00:00"}"#;
        let store = Arc::new(MemoryConfigStore::with_value(STATE_KEY, raw).await);
        let clock = Arc::new(ManualClock::new(start()));
        let governor = UsageGovernor::load(config(60, 1500), store, clock).await;

        let report = governor.report().await;
        assert_eq!(report.total_requests, 12);
        assert_eq!(report.month_requests, 4);
        assert_eq!(report.tokens_used, 321);
        assert!(report.system_enabled);
    }

    #[tokio::test]
    async fn corrupt_snapshot_falls_back_to_defaults() {
        let store = Arc::new(MemoryConfigStore::with_value(STATE_KEY, "not json").await);
        let clock = Arc::new(ManualClock::new(start()));
        let governor = UsageGovernor::load(config(60, 1500), store, clock).await;
        assert_eq!(governor.state().await, UsageState::default());
    }

    #[tokio::test]
    async fn report_evaluates_thresholds_first() {
        let clock = Arc::new(ManualClock::new(start()));
        let raw = r#"{"month_requests": 100, "total_requests": 100}"#;
        let store = Arc::new(MemoryConfigStore::with_value(STATE_KEY, raw).await);
        let governor = UsageGovernor::load(config(60, 100), store.clone(), clock).await;

        let report = governor.report().await;
        assert!(!report.system_enabled);
        assert!(report.throttling_active);
        assert_eq!(report.usage_percent, 100.0);
        assert_eq!(report.per_minute_limit, 60);

        let persisted = store.get_config_value(STATE_KEY).await.unwrap().unwrap();
        let snapshot: UsageSnapshot = serde_json::from_str(&persisted).unwrap();
        assert!(!snapshot.system_enabled);
    }

    #[tokio::test]
    async fn period_stats_uses_thirty_day_month() {
        let (governor, _, _) = governor_with(config(1000, 0));
        let stats = governor.period_stats(7).await;
        assert_eq!(stats.period_days, 7);
        assert_eq!(stats.period_total, 0);
        assert_eq!(stats.peak_requests_per_minute, 1);

        for _ in 0..60 {
            governor.record_request(1).await;
        }
        let stats = governor.period_stats(30).await;
        assert_eq!(stats.average_requests_per_day, 2.0);
        assert_eq!(stats.period_total, 60);
        assert_eq!(stats.peak_requests_per_minute, 60);
    }

    #[tokio::test]
    async fn slow_write_never_overwrites_newer_snapshot() {
        let clock = Arc::new(ManualClock::new(start()));
        let store = Arc::new(SlowFirstStore::default());
        let governor = Arc::new(UsageGovernor::new(config(1000, 0), store.clone(), clock.clone()));

        let recorder = {
            let governor = governor.clone();
            tokio::spawn(async move { governor.record_request(10).await })
        };
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        governor.disable_system("exam week").await;
        recorder.await.unwrap();

        let snapshot = persisted(store.as_ref()).await;
        assert!(!snapshot.system_enabled);
        assert_eq!(snapshot.total_requests, 1);

        let restarted = UsageGovernor::load(config(1000, 0), store, clock).await;
        assert!(!restarted.state().await.system_enabled);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_records_are_all_counted() {
        let clock = Arc::new(ManualClock::new(start()));
        let store = Arc::new(MemoryConfigStore::new());
        let governor = Arc::new(UsageGovernor::new(config(1000, 0), store.clone(), clock.clone()));

        let tasks: Vec<_> = (0..64)
            .map(|_| {
                let governor = governor.clone();
                tokio::spawn(async move { governor.record_request(2).await })
            })
            .collect();
        for task in futures::future::join_all(tasks).await {
            task.unwrap();
        }

        let state = governor.state().await;
        assert_eq!(state.total_requests, 64);
        assert_eq!(state.month_requests, 64);
        assert_eq!(state.tokens_used, 128);
        assert_eq!(state.recent_count(), 64);

        let mut expected = state.snapshot(clock.now());
        expected.updated_at = None;
        assert_eq!(persisted(store.as_ref()).await, expected);
    }

    #[tokio::test(start_paused = true)]
    async fn admit_returns_delay_without_waiting() {
        let clock = Arc::new(ManualClock::new(start()));
        let raw = r#"{"month_requests": 90}"#;
        let store = Arc::new(MemoryConfigStore::with_value(STATE_KEY, raw).await);
        let governor = UsageGovernor::load(
            GovernorConfig {
                throttling_delay_seconds: 0.5,
                ..config(60, 100)
            },
            store,
            clock,
        )
        .await;

        let started = tokio::time::Instant::now();
        let delay = governor.admit().await.unwrap();
        assert_eq!(delay, std::time::Duration::from_millis(500));
        assert_eq!(started.elapsed(), std::time::Duration::ZERO);

        governor.disable_system("maintenance").await;
        assert_eq!(governor.admit().await, Err(AdmissionDenied::SystemDisabled));
    }

    #[tokio::test(start_paused = true)]
    async fn throttled_admission_waits_for_delay() {
        let clock = Arc::new(ManualClock::new(start()));
        let raw = r#"{"month_requests": 90}"#;
        let store = Arc::new(MemoryConfigStore::with_value(STATE_KEY, raw).await);
        let governor = UsageGovernor::load(
            GovernorConfig {
                throttling_delay_seconds: 2.0,
                ..config(60, 100)
            },
            store,
            clock,
        )
        .await;

        let started = tokio::time::Instant::now();
        governor.check_admission().await.unwrap();
        assert!(started.elapsed() >= std::time::Duration::from_secs(2));
        assert!(governor.state().await.throttling_active);
    }
}
