//! Retry-until-visible reads for lagging read replicas.
//!
//! # Responsibility
//! - Poll a lookup with a fixed delay until it returns a row or the retry
//!   budget runs out.
//! - Validate the retry budget against hard ceilings before any attempt.
//!
//! # Invariants
//! - Caller-supplied ceilings are clamped to `MAX_DELAY_CEILING_MS` and
//!   `MAX_RETRIES_CEILING`; validation uses the clamped values.
//! - Exhausting the budget yields `None`; only the `_or_fail` variant turns
//!   that into `EntityNotFound`.
//! - No sleep follows the final attempt.
//!
//! Intended for queue workers reading right after a write committed on a
//! primary. The calling thread blocks for up to `(retries - 1) * delay_ms`.

use crate::error::{RepoError, RepoResult};
use crate::model::entity::{Entity, EntityId};
use crate::repo::repository::Repository;
use log::{debug, info};
use rusqlite::types::Value;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const MAX_DELAY_CEILING_MS: u64 = 2000;
pub const MAX_RETRIES_CEILING: u32 = 100;

/// Retry budget for continuous reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Number of lookups to attempt.
    pub retries: u32,
    /// Fixed pause between two attempts.
    pub delay_ms: u64,
    /// Upper bound for `delay_ms`, itself capped at 2000.
    pub max_delay_ms: u64,
    /// Upper bound for `retries`, itself capped at 100.
    pub max_retries: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 10,
            delay_ms: 100,
            max_delay_ms: MAX_DELAY_CEILING_MS,
            max_retries: MAX_RETRIES_CEILING,
        }
    }
}

impl RetryPolicy {
    /// Default ceilings with a custom attempt count and delay.
    pub fn new(retries: u32, delay_ms: u64) -> Self {
        Self {
            retries,
            delay_ms,
            ..Self::default()
        }
    }

    /// Checks the budget against the clamped ceilings.
    ///
    /// # Errors
    /// - `InvalidArgument` when `delay_ms` or `retries` exceed their ceiling.
    pub fn validate(&self) -> RepoResult<()> {
        let max_delay = self.max_delay_ms.min(MAX_DELAY_CEILING_MS);
        let max_retries = self.max_retries.min(MAX_RETRIES_CEILING);

        if self.delay_ms > max_delay {
            return Err(RepoError::InvalidArgument(format!(
                "maximum delay is {max_delay} milliseconds, got {}",
                self.delay_ms
            )));
        }
        if self.retries > max_retries {
            return Err(RepoError::InvalidArgument(format!(
                "maximum retry amount is {max_retries}, got {}",
                self.retries
            )));
        }
        Ok(())
    }

    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

/// Runs `attempt` until it yields a value or the policy is exhausted.
///
/// `attempt` receives the 1-based attempt number; `sleep` is called between
/// misses.
pub(crate) fn poll_until_found<T>(
    policy: &RetryPolicy,
    mut sleep: impl FnMut(Duration),
    mut attempt: impl FnMut(u32) -> RepoResult<Option<T>>,
) -> RepoResult<Option<T>> {
    policy.validate()?;

    for attempt_no in 1..=policy.retries {
        if let Some(found) = attempt(attempt_no)? {
            return Ok(Some(found));
        }
        if attempt_no < policy.retries {
            sleep(policy.delay());
        }
    }
    Ok(None)
}

impl<E: Entity> Repository<'_, E> {
    /// `get_by`, retried with a fixed delay until the row becomes visible.
    ///
    /// Returns `Ok(None)` once `policy.retries` attempts all missed.
    pub fn get_by_continuously(
        &mut self,
        column: &str,
        value: impl Into<Value>,
        columns: &[&str],
        policy: &RetryPolicy,
    ) -> RepoResult<Option<E>> {
        let value = value.into();
        let found = poll_until_found(policy, std::thread::sleep, |attempt_no| {
            let found = self.get_by(column, value.clone(), columns)?;
            if found.is_none() {
                debug!(
                    "event=continuous_read module=repo status=miss table={} column={} attempt={} retries={}",
                    E::table_name(),
                    column,
                    attempt_no,
                    policy.retries
                );
            }
            Ok(found)
        })?;

        if found.is_none() {
            info!(
                "event=continuous_read module=repo status=exhausted table={} column={} retries={} delay_ms={}",
                E::table_name(),
                column,
                policy.retries,
                policy.delay_ms
            );
        }
        Ok(found)
    }

    pub fn get_by_id_continuously(
        &mut self,
        id: EntityId,
        columns: &[&str],
        policy: &RetryPolicy,
    ) -> RepoResult<Option<E>> {
        self.get_by_continuously(E::primary_key(), id, columns, policy)
    }

    /// Fails with `EntityNotFound` when the row never became visible.
    pub fn get_by_id_continuously_or_fail(
        &mut self,
        id: EntityId,
        columns: &[&str],
        policy: &RetryPolicy,
    ) -> RepoResult<E> {
        self.get_by_id_continuously(id, columns, policy)?
            .ok_or_else(|| {
                RepoError::EntityNotFound(format!(
                    "{} not found continuously by id with value [{id}]",
                    E::table_name()
                ))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::{poll_until_found, RetryPolicy};
    use crate::error::RepoError;
    use std::time::Duration;

    #[test]
    fn exhausted_budget_returns_none_after_every_attempt() {
        let mut attempts = 0;
        let mut sleeps = Vec::new();
        let policy = RetryPolicy::new(3, 10);

        let result = poll_until_found(
            &policy,
            |delay| sleeps.push(delay),
            |_| -> Result<Option<()>, RepoError> {
                attempts += 1;
                Ok(None)
            },
        )
        .unwrap();

        assert!(result.is_none());
        assert_eq!(attempts, 3);
        assert_eq!(sleeps, vec![Duration::from_millis(10); 2]);
    }

    #[test]
    fn hit_returns_immediately_without_sleeping_again() {
        let mut sleeps = 0;
        let policy = RetryPolicy::new(5, 1);

        let result = poll_until_found(
            &policy,
            |_| sleeps += 1,
            |attempt_no| Ok((attempt_no == 2).then_some(attempt_no)),
        )
        .unwrap();

        assert_eq!(result, Some(2));
        assert_eq!(sleeps, 1);
    }

    #[test]
    fn delay_over_clamped_ceiling_fails_before_any_attempt() {
        let mut attempts = 0;
        let policy = RetryPolicy {
            delay_ms: 3000,
            max_delay_ms: 2000,
            ..RetryPolicy::default()
        };

        let err = poll_until_found(
            &policy,
            |_| {},
            |_| -> Result<Option<()>, RepoError> {
                attempts += 1;
                Ok(None)
            },
        )
        .unwrap_err();

        assert!(matches!(err, RepoError::InvalidArgument(_)));
        assert_eq!(attempts, 0);
    }

    #[test]
    fn ceilings_are_clamped_before_validation() {
        let policy = RetryPolicy {
            delay_ms: 2500,
            max_delay_ms: 10_000,
            ..RetryPolicy::default()
        };
        assert!(matches!(policy.validate(), Err(RepoError::InvalidArgument(_))));

        let policy = RetryPolicy {
            retries: 150,
            max_retries: 500,
            ..RetryPolicy::default()
        };
        assert!(matches!(policy.validate(), Err(RepoError::InvalidArgument(_))));

        let policy = RetryPolicy {
            retries: 100,
            delay_ms: 2000,
            max_delay_ms: 10_000,
            max_retries: 500,
        };
        assert!(policy.validate().is_ok());
    }

    #[test]
    fn defaults_match_documented_budget() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.retries, 10);
        assert_eq!(policy.delay_ms, 100);
        assert_eq!(policy.max_delay_ms, 2000);
        assert_eq!(policy.max_retries, 100);
    }
}
