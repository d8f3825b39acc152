//! Retry classification and scheduling for webhook delivery.
//!
//! The policy is pure: it decides whether an attempt outcome is worth retrying
//! and how long to wait first. The dispatcher owns the clock and the sleeping.

use std::time::Duration;

/// Default waits between attempts: 1s, 3s, then 9s.
pub const DEFAULT_RETRY_DELAYS_MS: [u64; 3] = [1_000, 3_000, 9_000];
pub const DEFAULT_MAX_ATTEMPTS: u32 = 4;
pub const DEFAULT_ATTEMPT_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_DEADLINE_MS: u64 = 30_000;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    /// Wait before retry `n` is `delays[n - 1]`; the last entry repeats.
    pub delays: Vec<Duration>,
    pub attempt_timeout: Duration,
    /// Upper bound on the whole call, waits included.
    pub deadline: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            delays: DEFAULT_RETRY_DELAYS_MS.iter().map(|ms| Duration::from_millis(*ms)).collect(),
            attempt_timeout: Duration::from_millis(DEFAULT_ATTEMPT_TIMEOUT_MS),
            deadline: Duration::from_millis(DEFAULT_DEADLINE_MS),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StatusClass {
    Success,
    /// Worth another attempt: 408, 500, 502, 503, 504.
    Transient,
    /// 401/403: the shared secret is wrong or missing.
    Unauthorized,
    /// Anything else; retrying cannot change the answer.
    Terminal,
}

pub fn classify_status(status: u16) -> StatusClass {
    match status {
        200..=299 => StatusClass::Success,
        408 | 500 | 502 | 503 | 504 => StatusClass::Transient,
        401 | 403 => StatusClass::Unauthorized,
        _ => StatusClass::Terminal,
    }
}

/// Why a single attempt did not produce a usable response.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AttemptFailure {
    Timeout,
    Connect(String),
    Status { status: u16, body: String },
}

impl AttemptFailure {
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout | Self::Connect(_) => true,
            Self::Status { status, .. } => classify_status(*status) == StatusClass::Transient,
        }
    }
}

impl std::fmt::Display for AttemptFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Timeout => f.write_str("request timed out"),
            Self::Connect(message) => write!(f, "connection failed: {message}"),
            Self::Status { status, .. } => write!(f, "backend answered with status {status}"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RetryDecision {
    RetryAfter(Duration),
    GiveUp,
}

impl RetryPolicy {
    /// Decides what happens after attempt number `attempts_made` failed, given
    /// how much of the deadline has already been spent.
    pub fn decide(
        &self,
        failure: &AttemptFailure,
        attempts_made: u32,
        elapsed: Duration,
    ) -> RetryDecision {
        if !failure.is_retryable() || attempts_made >= self.max_attempts {
            return RetryDecision::GiveUp;
        }

        let delay = self.delay_before_retry(attempts_made);
        match elapsed.checked_add(delay) {
            Some(resume_at) if resume_at < self.deadline => RetryDecision::RetryAfter(delay),
            _ => RetryDecision::GiveUp,
        }
    }

    /// Wait before the retry that follows attempt `attempts_made` (1-based).
    pub fn delay_before_retry(&self, attempts_made: u32) -> Duration {
        if self.delays.is_empty() {
            return Duration::ZERO;
        }
        let index = (attempts_made.max(1) as usize - 1).min(self.delays.len() - 1);
        self.delays[index]
    }

    /// Latency if every attempt times out and every wait is taken, ignoring the deadline.
    pub fn unbounded_worst_case(&self) -> Duration {
        let waits = (1..self.max_attempts)
            .map(|attempt| self.delay_before_retry(attempt))
            .fold(Duration::ZERO, |total, delay| total.saturating_add(delay));
        self.attempt_timeout.saturating_mul(self.max_attempts).saturating_add(waits)
    }

    pub fn worst_case_latency(&self) -> Duration {
        self.unbounded_worst_case().min(self.deadline)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{classify_status, AttemptFailure, RetryDecision, RetryPolicy, StatusClass};

    fn status(status: u16) -> AttemptFailure {
        AttemptFailure::Status { status, body: String::new() }
    }

    #[test]
    fn retries_only_transient_statuses() {
        for code in [408, 500, 502, 503, 504] {
            assert!(status(code).is_retryable(), "{code} should be retried");
        }
        for code in [400, 401, 403, 404, 409, 422, 501] {
            assert!(!status(code).is_retryable(), "{code} should not be retried");
        }
        assert!(AttemptFailure::Timeout.is_retryable());
        assert!(AttemptFailure::Connect("refused".to_string()).is_retryable());
    }

    #[test]
    fn auth_statuses_are_classified_separately() {
        assert_eq!(classify_status(401), StatusClass::Unauthorized);
        assert_eq!(classify_status(403), StatusClass::Unauthorized);
        assert_eq!(classify_status(404), StatusClass::Terminal);
        assert_eq!(classify_status(201), StatusClass::Success);
    }

    #[test]
    fn default_schedule_is_one_three_nine_seconds() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 4);
        assert_eq!(policy.delay_before_retry(1), Duration::from_secs(1));
        assert_eq!(policy.delay_before_retry(2), Duration::from_secs(3));
        assert_eq!(policy.delay_before_retry(3), Duration::from_secs(9));
        assert_eq!(policy.delay_before_retry(7), Duration::from_secs(9));
    }

    #[test]
    fn never_exceeds_max_attempts() {
        let policy = RetryPolicy::default();
        let failure = status(503);

        assert_eq!(
            policy.decide(&failure, 1, Duration::ZERO),
            RetryDecision::RetryAfter(Duration::from_secs(1))
        );
        assert_eq!(
            policy.decide(&failure, 3, Duration::ZERO),
            RetryDecision::RetryAfter(Duration::from_secs(9))
        );
        assert_eq!(policy.decide(&failure, 4, Duration::ZERO), RetryDecision::GiveUp);
    }

    #[test]
    fn terminal_failure_gives_up_immediately() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.decide(&status(404), 1, Duration::ZERO), RetryDecision::GiveUp);
        assert_eq!(policy.decide(&status(401), 1, Duration::ZERO), RetryDecision::GiveUp);
    }

    #[test]
    fn gives_up_when_wait_would_cross_deadline() {
        let policy = RetryPolicy { deadline: Duration::from_secs(5), ..RetryPolicy::default() };
        assert_eq!(
            policy.decide(&AttemptFailure::Timeout, 2, Duration::from_secs(3)),
            RetryDecision::GiveUp
        );
    }

    #[test]
    fn worst_case_is_capped_by_deadline() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.unbounded_worst_case(), Duration::from_secs(4 * 10 + 1 + 3 + 9));
        assert_eq!(policy.worst_case_latency(), Duration::from_secs(30));
    }
}
