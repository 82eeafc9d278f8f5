//! # Retry policy for launch attempts.
//!
//! [`RetryPolicy`] controls how many times a failed launch is re-attempted
//! and how the inter-attempt delays grow. It is parameterized by:
//! - [`RetryPolicy::retries`] the number of re-attempts after the first try;
//! - [`RetryPolicy::factor`] the multiplicative growth factor;
//! - [`RetryPolicy::min_timeout`] the base delay unit;
//! - [`RetryPolicy::max_timeout`] the delay cap.
//!
//! The k-th inter-attempt delay (k >= 1) is
//! `min(k * factor * min_timeout, max_timeout)`.
//!
//! # Example
//! ```rust
//! use std::time::Duration;
//! use eirenewatch::RetryPolicy;
//!
//! let retry = RetryPolicy {
//!     retries: 2,
//!     factor: 2.0,
//!     min_timeout: Duration::from_millis(100),
//!     max_timeout: Duration::from_secs(1),
//! };
//!
//! assert_eq!(retry.delay(1), Duration::from_millis(200));
//! assert_eq!(retry.delay(2), Duration::from_millis(400));
//! // 10 * 2.0 * 100ms = 2s, capped at max_timeout
//! assert_eq!(retry.delay(10), Duration::from_secs(1));
//! ```

use std::time::Duration;

use crate::error::TemplateError;

/// Bounded linear-growth backoff policy for launch retries.
#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
    /// Number of re-attempts after the first try (`0` = single attempt).
    pub retries: u32,
    /// Multiplicative growth factor (`>= 1.0`).
    pub factor: f64,
    /// Base delay unit before the first retry.
    pub min_timeout: Duration,
    /// Maximum delay cap for retries.
    pub max_timeout: Duration,
}

impl Default for RetryPolicy {
    /// Returns a policy with:
    /// - `retries = 3`;
    /// - `factor = 2.0`;
    /// - `min_timeout = 1s`;
    /// - `max_timeout = 30s`.
    fn default() -> Self {
        Self {
            retries: 3,
            factor: 2.0,
            min_timeout: Duration::from_millis(1000),
            max_timeout: Duration::from_millis(30_000),
        }
    }
}

impl RetryPolicy {
    /// Computes the delay before the given attempt (`attempt >= 1`).
    ///
    /// Returns `min(attempt * factor * min_timeout, max_timeout)`.
    /// A non-finite product degrades to `max_timeout`.
    pub fn delay(&self, attempt: u32) -> Duration {
        let mul = f64::from(attempt) * self.factor;
        if !mul.is_finite() {
            return self.max_timeout;
        }
        let unclamped = self.min_timeout.mul_f64(mul);
        if unclamped > self.max_timeout {
            self.max_timeout
        } else {
            unclamped
        }
    }

    /// Validates the policy fields.
    pub(crate) fn validate(&self) -> Result<(), TemplateError> {
        if !self.factor.is_finite() || self.factor < 1.0 {
            return Err(TemplateError::InvalidRetry {
                reason: format!("factor must be >= 1.0, got {}", self.factor),
            });
        }
        if self.min_timeout > self.max_timeout {
            return Err(TemplateError::InvalidRetry {
                reason: format!(
                    "min_timeout {:?} exceeds max_timeout {:?}",
                    self.min_timeout, self.max_timeout
                ),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_grows_linearly_with_attempt() {
        let retry = RetryPolicy {
            retries: 5,
            factor: 1.0,
            min_timeout: Duration::from_millis(100),
            max_timeout: Duration::from_secs(10),
        };
        assert_eq!(retry.delay(1), Duration::from_millis(100));
        assert_eq!(retry.delay(2), Duration::from_millis(200));
        assert_eq!(retry.delay(3), Duration::from_millis(300));
    }

    #[test]
    fn factor_scales_each_delay() {
        let retry = RetryPolicy {
            factor: 2.0,
            min_timeout: Duration::from_millis(100),
            max_timeout: Duration::from_secs(10),
            ..RetryPolicy::default()
        };
        assert_eq!(retry.delay(1), Duration::from_millis(200));
        assert_eq!(retry.delay(2), Duration::from_millis(400));
    }

    #[test]
    fn delay_is_capped_at_max_timeout() {
        let retry = RetryPolicy {
            factor: 2.0,
            min_timeout: Duration::from_secs(1),
            max_timeout: Duration::from_secs(3),
            ..RetryPolicy::default()
        };
        assert_eq!(retry.delay(100), Duration::from_secs(3));
    }

    #[test]
    fn validate_rejects_small_factor() {
        let retry = RetryPolicy {
            factor: 0.5,
            ..RetryPolicy::default()
        };
        assert!(retry.validate().is_err());
    }

    #[test]
    fn validate_rejects_inverted_bounds() {
        let retry = RetryPolicy {
            min_timeout: Duration::from_secs(60),
            max_timeout: Duration::from_secs(30),
            ..RetryPolicy::default()
        };
        assert!(retry.validate().is_err());
    }
}
