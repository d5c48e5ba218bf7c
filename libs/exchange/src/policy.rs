//! Exchange policy constants
//!
//! The economic rules of the exchange: what a request costs, how taught
//! minutes convert into tokens, and how long a request may stay pending.

use chrono::Duration;

use crate::error::{ExchangeError, ExchangeResult};

/// Tokens debited from the sender when a request is sent.
pub const REQUEST_COST_TOKENS: i64 = 1;

/// Longest expiry horizon or upcoming window a policy may configure.
pub const MAX_HORIZON_DAYS: i64 = 3650;

/// Policy knobs for the exchange
#[derive(Debug, Clone, PartialEq)]
pub struct ExchangePolicy {
    /// Requested minutes must be a multiple of this value
    pub minutes_granularity: i32,
    /// Minutes used when a request omits them
    pub default_minutes: i32,
    /// Minutes of teaching that earn one token
    pub minutes_per_token: i32,
    /// Age after which a pending request is expired by the sweeper
    pub request_expiry: Duration,
    /// Tokens granted to a user when first created
    pub signup_grant_tokens: i64,
    /// Horizon for counting a session as upcoming in notifications
    pub upcoming_window: Duration,
}

impl Default for ExchangePolicy {
    fn default() -> Self {
        Self {
            minutes_granularity: 15,
            default_minutes: 60,
            minutes_per_token: 60,
            request_expiry: Duration::days(7),
            signup_grant_tokens: 1,
            upcoming_window: Duration::hours(24),
        }
    }
}

impl ExchangePolicy {
    /// Reject internally inconsistent policies
    pub fn validate(&self) -> ExchangeResult<()> {
        if self.minutes_granularity <= 0 {
            return Err(ExchangeError::Validation(
                "minutes granularity must be positive".to_string(),
            ));
        }
        if self.minutes_per_token <= 0 {
            return Err(ExchangeError::Validation(
                "minutes per token must be positive".to_string(),
            ));
        }
        if self.default_minutes <= 0 || self.default_minutes % self.minutes_granularity != 0 {
            return Err(ExchangeError::Validation(format!(
                "default minutes must be a positive multiple of {}",
                self.minutes_granularity
            )));
        }
        let max_horizon = Duration::days(MAX_HORIZON_DAYS);
        if self.request_expiry <= Duration::zero() || self.request_expiry > max_horizon {
            return Err(ExchangeError::Validation(format!(
                "request expiry must be positive and at most {MAX_HORIZON_DAYS} days"
            )));
        }
        if self.upcoming_window < Duration::zero() || self.upcoming_window > max_horizon {
            return Err(ExchangeError::Validation(format!(
                "upcoming window must be between 0 and {MAX_HORIZON_DAYS} days"
            )));
        }
        if self.signup_grant_tokens < 0 {
            return Err(ExchangeError::Validation(
                "signup grant cannot be negative".to_string(),
            ));
        }
        Ok(())
    }

    /// Resolve the minutes of a new request, applying the default
    pub fn resolve_minutes(&self, minutes: Option<i32>) -> ExchangeResult<i32> {
        let minutes = minutes.unwrap_or(self.default_minutes);
        if minutes <= 0 {
            return Err(ExchangeError::Validation(
                "minutes must be positive".to_string(),
            ));
        }
        if minutes % self.minutes_granularity != 0 {
            return Err(ExchangeError::Validation(format!(
                "minutes must be a multiple of {}",
                self.minutes_granularity
            )));
        }
        Ok(minutes)
    }

    /// Tokens earned by the teacher of a completed session.
    ///
    /// Floor division: a partial hour never mints a token.
    pub fn tokens_earned(&self, minutes: i32) -> i64 {
        if minutes <= 0 {
            return 0;
        }
        i64::from(minutes / self.minutes_per_token)
    }

    /// Minute-denominated view of a token amount
    pub fn minutes_for_tokens(&self, tokens: i64) -> i64 {
        tokens * i64::from(self.minutes_per_token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_is_valid() {
        ExchangePolicy::default().validate().unwrap();
    }

    #[test]
    fn resolve_minutes_applies_default() {
        let policy = ExchangePolicy::default();
        assert_eq!(policy.resolve_minutes(None).unwrap(), 60);
        assert_eq!(policy.resolve_minutes(Some(90)).unwrap(), 90);
    }

    #[test]
    fn resolve_minutes_rejects_bad_values() {
        let policy = ExchangePolicy::default();
        assert!(policy.resolve_minutes(Some(0)).unwrap_err().is_validation());
        assert!(policy.resolve_minutes(Some(-60)).unwrap_err().is_validation());
        assert!(policy.resolve_minutes(Some(50)).unwrap_err().is_validation());
    }

    #[test]
    fn tokens_earned_floors() {
        let policy = ExchangePolicy::default();
        assert_eq!(policy.tokens_earned(60), 1);
        assert_eq!(policy.tokens_earned(45), 0);
        assert_eq!(policy.tokens_earned(105), 1);
        assert_eq!(policy.tokens_earned(120), 2);
        assert_eq!(policy.tokens_earned(-30), 0);
    }

    #[test]
    fn minutes_view() {
        let policy = ExchangePolicy::default();
        assert_eq!(policy.minutes_for_tokens(3), 180);
        assert_eq!(policy.minutes_for_tokens(-1), -60);
    }

    #[test]
    fn inconsistent_policies_are_rejected() {
        let policy = ExchangePolicy {
            minutes_granularity: 0,
            ..Default::default()
        };
        assert!(policy.validate().is_err());

        let policy = ExchangePolicy {
            default_minutes: 50,
            ..Default::default()
        };
        assert!(policy.validate().is_err());

        let policy = ExchangePolicy {
            minutes_per_token: 0,
            ..Default::default()
        };
        assert!(policy.validate().is_err());
    }

    #[test]
    fn horizons_are_bounded() {
        let policy = ExchangePolicy {
            request_expiry: Duration::hours(3_000_000_000),
            ..Default::default()
        };
        assert!(policy.validate().unwrap_err().is_validation());

        let policy = ExchangePolicy {
            request_expiry: Duration::days(MAX_HORIZON_DAYS),
            ..Default::default()
        };
        assert!(policy.validate().is_ok());

        let policy = ExchangePolicy {
            upcoming_window: Duration::days(MAX_HORIZON_DAYS + 1),
            ..Default::default()
        };
        assert!(policy.validate().is_err());

        let policy = ExchangePolicy {
            upcoming_window: Duration::hours(-1),
            ..Default::default()
        };
        assert!(policy.validate().is_err());
    }
}
