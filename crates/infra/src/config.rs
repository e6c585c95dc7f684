//! Ledger configuration loaded from the environment.

use std::str::FromStr;
use std::time::Duration;

use rust_decimal::Decimal;
use tracing::warn;

use stockledger_inventory::DECIMAL_SCALE;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_LOW_STOCK_THRESHOLD: i64 = 5;
pub const MIN_REPORT_INTERVAL: Duration = Duration::from_secs(5);
pub const MAX_REPORT_INTERVAL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Bounded retry of movement attempts on optimistic-concurrency mismatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff: Duration::ZERO,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    /// Total attempts, including the first one. Never below 1.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Linear backoff step; zero retries immediately.
    pub fn backoff(&self) -> Duration {
        self.backoff
    }

    /// Pause before `attempt` (1-based). The first attempt never waits.
    pub fn delay_before(&self, attempt: u32) -> Duration {
        self.backoff * attempt.saturating_sub(1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LowStockConfig {
    /// Rows with `quantity_on_hand <= threshold` are reported.
    pub threshold: Decimal,
    pub interval: Duration,
    pub initial_delay: Duration,
}

impl Default for LowStockConfig {
    fn default() -> Self {
        Self {
            threshold: Decimal::from(DEFAULT_LOW_STOCK_THRESHOLD),
            interval: Duration::from_secs(24 * 60 * 60),
            initial_delay: Duration::from_secs(2),
        }
    }
}

impl LowStockConfig {
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval.clamp(MIN_REPORT_INTERVAL, MAX_REPORT_INTERVAL);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LedgerConfig {
    pub retry: RetryPolicy,
    pub low_stock: LowStockConfig,
}

impl LedgerConfig {
    /// Read `LEDGER_*` / `LOW_STOCK_*` variables; unset or malformed values
    /// keep their defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let max_attempts = parsed(
            &lookup,
            "LEDGER_MAX_ATTEMPTS",
            defaults.retry.max_attempts(),
        );
        let backoff_ms = parsed(&lookup, "LEDGER_RETRY_BACKOFF_MS", 0u64);
        let mut threshold = parsed(
            &lookup,
            "LOW_STOCK_THRESHOLD",
            defaults.low_stock.threshold,
        );
        if threshold.normalize().scale() > DECIMAL_SCALE {
            warn!(%threshold, "threshold has too many decimal places; using default");
            threshold = defaults.low_stock.threshold;
        }
        let interval = parsed(
            &lookup,
            "LOW_STOCK_INTERVAL_SECS",
            defaults.low_stock.interval.as_secs(),
        );
        let initial_delay = parsed(
            &lookup,
            "LOW_STOCK_INITIAL_DELAY_SECS",
            defaults.low_stock.initial_delay.as_secs(),
        );

        Self {
            retry: RetryPolicy::new(max_attempts, Duration::from_millis(backoff_ms)),
            low_stock: LowStockConfig {
                threshold,
                initial_delay: Duration::from_secs(initial_delay),
                ..defaults.low_stock
            }
            .with_interval(Duration::from_secs(interval)),
        }
    }
}

fn parsed<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T
where
    T: FromStr + core::fmt::Display,
{
    let Some(raw) = lookup(key) else {
        return default;
    };
    match raw.trim().parse::<T>() {
        Ok(value) => value,
        Err(_) => {
            warn!(key, value = %raw, default = %default, "ignoring malformed setting");
            default
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> LedgerConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        LedgerConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let cfg = config(&[]);
        assert_eq!(cfg.retry.max_attempts(), 3);
        assert_eq!(cfg.retry.backoff(), Duration::ZERO);
        assert_eq!(cfg.low_stock.threshold, Decimal::from(5));
        assert_eq!(cfg.low_stock.interval, Duration::from_secs(86_400));
        assert_eq!(cfg.low_stock.initial_delay, Duration::from_secs(2));
    }

    #[test]
    fn malformed_values_fall_back() {
        let cfg = config(&[("LEDGER_MAX_ATTEMPTS", "many"), ("LOW_STOCK_THRESHOLD", "low")]);
        assert_eq!(cfg.retry.max_attempts(), 3);
        assert_eq!(cfg.low_stock.threshold, Decimal::from(5));
    }

    #[test]
    fn threshold_finer_than_storage_falls_back() {
        let cfg = config(&[("LOW_STOCK_THRESHOLD", "2.00001")]);
        assert_eq!(cfg.low_stock.threshold, Decimal::from(5));
        let cfg = config(&[("LOW_STOCK_THRESHOLD", "2.5")]);
        assert_eq!(cfg.low_stock.threshold, Decimal::new(25, 1));
    }

    #[test]
    fn interval_is_clamped() {
        assert_eq!(
            config(&[("LOW_STOCK_INTERVAL_SECS", "1")]).low_stock.interval,
            MIN_REPORT_INTERVAL
        );
        assert_eq!(
            config(&[("LOW_STOCK_INTERVAL_SECS", "99999999")]).low_stock.interval,
            MAX_REPORT_INTERVAL
        );
    }

    #[test]
    fn attempts_never_drop_below_one() {
        assert_eq!(config(&[("LEDGER_MAX_ATTEMPTS", "0")]).retry.max_attempts(), 1);
    }

    #[test]
    fn backoff_grows_linearly() {
        let policy = RetryPolicy::new(3, Duration::from_millis(10));
        assert_eq!(policy.delay_before(1), Duration::ZERO);
        assert_eq!(policy.delay_before(2), Duration::from_millis(10));
        assert_eq!(policy.delay_before(3), Duration::from_millis(20));
    }
}
