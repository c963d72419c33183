//! Request pacing for rate-limited providers.
//!
//! CoinGecko's public tier allows a small number of calls per minute, so the
//! downloader waits `inter_request_delay` between assets and retries failed
//! calls with exponential backoff starting at `base_retry_delay`.

use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffPolicy {
    /// Pause between consecutive asset downloads.
    #[serde(with = "secs")]
    pub inter_request_delay: Duration,
    /// First retry delay; doubles on every further attempt.
    #[serde(with = "secs")]
    pub base_retry_delay: Duration,
    pub max_retries: u32,
}

impl BackoffPolicy {
    /// No waiting at all. Used by tests and mock providers.
    pub fn none() -> Self {
        Self {
            inter_request_delay: Duration::ZERO,
            base_retry_delay: Duration::ZERO,
            max_retries: 0,
        }
    }

    /// Delay before retry number `attempt` (1-based). Zero for attempt 0.
    pub fn retry_delay(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        self.base_retry_delay
            .saturating_mul(2u32.saturating_pow(attempt - 1))
    }

    /// Retry delay, but never shorter than what the server asked for.
    pub fn retry_delay_with_hint(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        let backoff = self.retry_delay(attempt);
        retry_after.map_or(backoff, |hint| hint.max(backoff))
    }
}

impl Default for BackoffPolicy {
    /// 30s between assets keeps ten downloads well under the free-tier limit.
    fn default() -> Self {
        Self {
            inter_request_delay: Duration::from_secs(30),
            base_retry_delay: Duration::from_secs(5),
            max_retries: 3,
        }
    }
}

/// Durations as fractional seconds in config files.
mod secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(d)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_delay_doubles() {
        let policy = BackoffPolicy {
            inter_request_delay: Duration::ZERO,
            base_retry_delay: Duration::from_millis(500),
            max_retries: 4,
        };
        assert_eq!(policy.retry_delay(0), Duration::ZERO);
        assert_eq!(policy.retry_delay(1), Duration::from_millis(500));
        assert_eq!(policy.retry_delay(2), Duration::from_secs(1));
        assert_eq!(policy.retry_delay(3), Duration::from_secs(2));
    }

    #[test]
    fn server_hint_wins_when_longer() {
        let policy = BackoffPolicy::default();
        assert_eq!(
            policy.retry_delay_with_hint(1, Some(Duration::from_secs(60))),
            Duration::from_secs(60)
        );
        assert_eq!(policy.retry_delay_with_hint(1, None), Duration::from_secs(5));
    }

    #[test]
    fn serializes_as_seconds() {
        let json = serde_json::to_string(&BackoffPolicy::default()).unwrap();
        assert_eq!(
            json,
            r#"{"inter_request_delay":30.0,"base_retry_delay":5.0,"max_retries":3}"#
        );
        let back: BackoffPolicy = serde_json::from_str(&json).unwrap();
        assert_eq!(back, BackoffPolicy::default());
    }
}
