use std::collections::VecDeque;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Width of the sliding request window.
pub const WINDOW_SECONDS: i64 = 60;

/// In-memory usage counters and flags. Authoritative for the process lifetime.
#[derive(Debug, Clone, PartialEq)]
pub struct UsageState {
    pub total_requests: u64,
    pub month_requests: u64,
    pub tokens_used: u64,
    pub last_request_at: Option<DateTime<Utc>>,
    /// Oldest first.
    pub recent_request_times: VecDeque<DateTime<Utc>>,
    pub system_enabled: bool,
    pub throttling_active: bool,
}

impl Default for UsageState {
    fn default() -> Self {
        Self {
            total_requests: 0,
            month_requests: 0,
            tokens_used: 0,
            last_request_at: None,
            recent_request_times: VecDeque::new(),
            system_enabled: true,
            throttling_active: false,
        }
    }
}

/// What a threshold evaluation changed, so the caller can log and persist.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThresholdOutcome {
    pub percent: f64,
    pub throttling_engaged: bool,
    pub auto_disabled: bool,
}

impl ThresholdOutcome {
    pub fn changed(&self) -> bool {
        self.throttling_engaged || self.auto_disabled
    }
}

impl UsageState {
    pub fn record(&mut self, now: DateTime<Utc>, tokens: u64) {
        self.total_requests = self.total_requests.saturating_add(1);
        self.month_requests = self.month_requests.saturating_add(1);
        self.tokens_used = self.tokens_used.saturating_add(tokens);
        self.last_request_at = Some(now);
        self.recent_request_times.push_back(now);
        self.prune_window(now);
    }

    /// Drop window entries that are not strictly newer than `now - 60s`.
    pub fn prune_window(&mut self, now: DateTime<Utc>) {
        let cutoff = now - Duration::seconds(WINDOW_SECONDS);
        while self
            .recent_request_times
            .front()
            .is_some_and(|at| *at <= cutoff)
        {
            self.recent_request_times.pop_front();
        }
    }

    pub fn recent_count(&self) -> usize {
        self.recent_request_times.len()
    }

    pub fn usage_percent(&self, monthly_budget: u64) -> f64 {
        if monthly_budget == 0 {
            return 0.0;
        }
        self.month_requests as f64 * 100.0 / monthly_budget as f64
    }

    /// Flip throttling / the kill switch when usage crosses the thresholds.
    /// A zero budget never triggers anything.
    pub fn evaluate_thresholds(&mut self, monthly_budget: u64, threshold_percent: f64) -> ThresholdOutcome {
        let percent = self.usage_percent(monthly_budget);
        let mut outcome = ThresholdOutcome {
            percent,
            throttling_engaged: false,
            auto_disabled: false,
        };
        if monthly_budget == 0 {
            return outcome;
        }

        if percent >= threshold_percent && !self.throttling_active {
            self.throttling_active = true;
            outcome.throttling_engaged = true;
        }
        if percent >= 100.0 && self.system_enabled {
            self.system_enabled = false;
            outcome.auto_disabled = true;
        }
        outcome
    }

    pub fn reset_monthly(&mut self) {
        self.month_requests = 0;
        self.throttling_active = false;
    }

    pub fn snapshot(&self, now: DateTime<Utc>) -> UsageSnapshot {
        UsageSnapshot {
            total_requests: self.total_requests,
            month_requests: self.month_requests,
            tokens_used: self.tokens_used,
            system_enabled: self.system_enabled,
            throttling_active: self.throttling_active,
            updated_at: Some(now),
        }
    }

    /// Take counters and flags from a persisted snapshot. The window and the
    /// last request time are never persisted.
    pub fn restore(&mut self, snapshot: &UsageSnapshot) {
        self.total_requests = snapshot.total_requests;
        self.month_requests = snapshot.month_requests;
        self.tokens_used = snapshot.tokens_used;
        self.system_enabled = snapshot.system_enabled;
        self.throttling_active = snapshot.throttling_active;
    }
}

fn enabled_by_default() -> bool {
    true
}

/// Persisted form of [`UsageState`], stored as JSON under one config key.
/// Older rows used Portuguese field names; those are still accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageSnapshot {
    #[serde(default, alias = "requisicoes_total")]
    pub total_requests: u64,
    #[serde(default, alias = "requisicoes_mes")]
    pub month_requests: u64,
    #[serde(default, alias = "tokens_usados")]
    pub tokens_used: u64,
    #[serde(default = "enabled_by_default", alias = "sistema_ativo")]
    pub system_enabled: bool,
    #[serde(default, alias = "throttling_ativo")]
    pub throttling_active: bool,
    #[serde(skip_deserializing)]
    pub updated_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t0() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2025-03-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn prune_keeps_only_strictly_recent_entries() {
        let mut state = UsageState::default();
        state.recent_request_times.push_back(t0() - Duration::seconds(90));
        state.recent_request_times.push_back(t0() - Duration::seconds(60));
        state.recent_request_times.push_back(t0() - Duration::seconds(59));
        state.recent_request_times.push_back(t0());

        state.prune_window(t0());
        assert_eq!(state.recent_count(), 2);
        assert_eq!(state.recent_request_times.front(), Some(&(t0() - Duration::seconds(59))));
    }

    #[test]
    fn record_updates_counters_and_window() {
        let mut state = UsageState::default();
        state.record(t0(), 10);
        state.record(t0() + Duration::seconds(1), 5);

        assert_eq!(state.total_requests, 2);
        assert_eq!(state.month_requests, 2);
        assert_eq!(state.tokens_used, 15);
        assert_eq!(state.last_request_at, Some(t0() + Duration::seconds(1)));
        assert_eq!(state.recent_count(), 2);
    }

    #[test]
    fn zero_budget_has_no_side_effects() {
        let mut state = UsageState {
            month_requests: 10_000,
            ..UsageState::default()
        };
        let outcome = state.evaluate_thresholds(0, 80.0);
        assert_eq!(outcome.percent, 0.0);
        assert!(!outcome.changed());
        assert!(state.system_enabled);
        assert!(!state.throttling_active);
    }

    #[test]
    fn percent_is_not_clamped() {
        let state = UsageState {
            month_requests: 150,
            ..UsageState::default()
        };
        assert_eq!(state.usage_percent(100), 150.0);
    }

    #[test]
    fn thresholds_fire_once() {
        let mut state = UsageState {
            month_requests: 100,
            ..UsageState::default()
        };
        let first = state.evaluate_thresholds(100, 80.0);
        assert!(first.throttling_engaged);
        assert!(first.auto_disabled);

        let second = state.evaluate_thresholds(100, 80.0);
        assert!(!second.changed());
        assert!(!state.system_enabled);
        assert!(state.throttling_active);
    }

    #[test]
    fn snapshot_accepts_legacy_field_names() {
        let json = r#"{
            "requisicoes_total": 42,
            "requisicoes_mes": 7,
            "tokens_usados": 900,
            "sistema_ativo": false,
            "throttling_ativo": true,
            "ultima_atualizacao": "2025-01-01T00:00:00"
        }"#;
        let snapshot: UsageSnapshot = serde_json::from_str(json).unwrap();
        assert_eq!(snapshot.total_requests, 42);
        assert_eq!(snapshot.month_requests, 7);
        assert_eq!(snapshot.tokens_used, 900);
        assert!(!snapshot.system_enabled);
        assert!(snapshot.throttling_active);
    }

    #[test]
    fn snapshot_defaults_missing_fields() {
        let snapshot: UsageSnapshot = serde_json::from_str("{}").unwrap();
        assert_eq!(snapshot.total_requests, 0);
        assert!(snapshot.system_enabled);
        assert!(!snapshot.throttling_active);
    }

    #[test]
    fn restore_leaves_window_alone() {
        let mut state = UsageState::default();
        state.record(t0(), 1);
        let snapshot = UsageSnapshot {
            total_requests: 10,
            month_requests: 3,
            tokens_used: 99,
            system_enabled: false,
            throttling_active: true,
            updated_at: None,
        };
        state.restore(&snapshot);

        assert_eq!(state.total_requests, 10);
        assert_eq!(state.month_requests, 3);
        assert_eq!(state.recent_count(), 1);
        assert_eq!(state.last_request_at, Some(t0()));
    }
}
