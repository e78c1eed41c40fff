//! Failed-attempt counter and lock-expiry state machine.
//!
//! Pure functions over the account security fields; persistence is the
//! caller's job. Expired locks are cleared lazily on the next attempt, there
//! is no background sweep.

use chrono::{DateTime, Duration, Utc};

pub const MAX_FAILED_ATTEMPTS: i32 = 5;
pub const LOCK_MINUTES: i64 = 30;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LockState {
    pub failed_attempts: i32,
    pub lock_until: Option<DateTime<Utc>>,
}

impl LockState {
    #[must_use]
    pub fn clear() -> Self {
        Self {
            failed_attempts: 0,
            lock_until: None,
        }
    }
}

/// An account is locked iff the expiry is present and still in the future.
#[must_use]
pub fn is_locked(state: &LockState, now: DateTime<Utc>) -> bool {
    state.lock_until.is_some_and(|until| until > now)
}

/// Count one failed attempt; lock at the threshold.
#[must_use]
pub fn record_failure(state: &LockState, now: DateTime<Utc>) -> LockState {
    // A lock that already expired resets the counter before this attempt
    // is counted.
    let state = if state.lock_until.is_some_and(|until| until <= now) {
        LockState::clear()
    } else {
        *state
    };

    let failed_attempts = state.failed_attempts + 1;
    let lock_until = if failed_attempts >= MAX_FAILED_ATTEMPTS && !is_locked(&state, now) {
        Some(now + Duration::minutes(LOCK_MINUTES))
    } else {
        state.lock_until
    };

    LockState {
        failed_attempts,
        lock_until,
    }
}

/// A successful authentication clears both fields unconditionally.
#[must_use]
pub fn record_success() -> LockState {
    LockState::clear()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2025-03-01T12:00:00Z")
            .map(|t| t.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now())
    }

    #[test]
    fn five_failures_lock_for_thirty_minutes() {
        let now = now();
        let mut state = LockState::clear();
        for attempt in 1..=MAX_FAILED_ATTEMPTS {
            assert!(!is_locked(&state, now), "locked after {attempt} attempts");
            state = record_failure(&state, now);
        }
        assert_eq!(state.failed_attempts, 5);
        assert_eq!(state.lock_until, Some(now + Duration::minutes(30)));
        assert!(is_locked(&state, now));
        assert!(is_locked(&state, now + Duration::minutes(29)));
        assert!(!is_locked(&state, now + Duration::minutes(30)));
    }

    #[test]
    fn further_failures_do_not_extend_the_lock() {
        let now = now();
        let mut state = LockState::clear();
        for _ in 0..MAX_FAILED_ATTEMPTS {
            state = record_failure(&state, now);
        }
        let lock_until = state.lock_until;
        let state = record_failure(&state, now + Duration::minutes(1));
        assert_eq!(state.lock_until, lock_until);
        assert_eq!(state.failed_attempts, 6);
    }

    #[test]
    fn success_clears_counter_and_lock() {
        let state = record_success();
        assert_eq!(state, LockState::clear());
    }

    #[test]
    fn expired_lock_resets_counter_on_next_failure() {
        let now = now();
        let state = LockState {
            failed_attempts: 5,
            lock_until: Some(now - Duration::seconds(1)),
        };
        assert!(!is_locked(&state, now));

        let state = record_failure(&state, now);
        assert_eq!(state.failed_attempts, 1);
        assert_eq!(state.lock_until, None);
    }

    #[test]
    fn missing_expiry_means_unlocked() {
        let state = LockState {
            failed_attempts: 4,
            lock_until: None,
        };
        assert!(!is_locked(&state, now()));
    }
}
