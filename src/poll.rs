//! Bounded polling with exponential backoff.
//!
//! Activation is asynchronous on the provider side, so an asset is re-fetched until it
//! reports `active`. A [`PollPolicy`] caps that loop by attempt count and, optionally, by
//! wall-clock time.
//!
//! ```text
//! delay(n) = min(base_delay * multiplier^(n - 1), max_delay)
//! ```
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;

const DEFAULT_MAX_ATTEMPTS: u32 = 60;
const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(2);
const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(30);
const DEFAULT_MULTIPLIER: f64 = 1.5;

#[derive(Debug, Clone, PartialEq)]
pub struct PollPolicy {
    /// Maximum number of re-fetches after the activation request.
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
    multiplier: f64,
    timeout: Option<Duration>,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            multiplier: DEFAULT_MULTIPLIER,
            timeout: None,
        }
    }
}

impl PollPolicy {
    pub fn new(
        max_attempts: u32,
        base_delay: Duration,
        max_delay: Duration,
        multiplier: f64,
    ) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay: max_delay.max(base_delay),
            multiplier: if multiplier < 1.0 { 1.0 } else { multiplier },
            timeout: None,
        }
    }

    /// Fixed zero delay, for tests and mocked providers.
    pub fn immediate(max_attempts: u32) -> Self {
        Self::new(max_attempts, Duration::ZERO, Duration::ZERO, 1.0)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Delay before poll number `attempt` (1-indexed).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(64) as i32;
        let secs = self.base_delay.as_secs_f64() * self.multiplier.powi(exponent);
        if !secs.is_finite() || secs >= self.max_delay.as_secs_f64() {
            return self.max_delay;
        }
        Duration::from_secs_f64(secs)
    }

    pub fn start(&self) -> PollBudget<'_> {
        PollBudget {
            policy: self,
            attempts: 0,
            // a timeout too large to represent is no deadline at all
            deadline: self
                .timeout
                .and_then(|t| Instant::now().checked_add(t)),
        }
    }
}

/// Tracks attempts consumed by one polling loop.
#[derive(Debug)]
pub struct PollBudget<'a> {
    policy: &'a PollPolicy,
    attempts: u32,
    deadline: Option<Instant>,
}

impl PollBudget<'_> {
    /// Sleeps for the next backoff interval and returns `false` once the budget is spent.
    pub async fn next(&mut self) -> bool {
        if self.attempts >= self.policy.max_attempts {
            return false;
        }
        let delay = self.policy.delay_for(self.attempts + 1);
        if let Some(deadline) = self.deadline {
            match Instant::now().checked_add(delay) {
                Some(wake) if wake < deadline => {}
                _ => return false,
            }
        }
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.attempts += 1;
        true
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Time left before the deadline, or `None` when the policy has no timeout.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }
}

/// Serializable form of [`PollPolicy`], used in image selection files.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct PollSettings {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub multiplier: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay_ms: DEFAULT_BASE_DELAY.as_millis() as u64,
            max_delay_ms: DEFAULT_MAX_DELAY.as_millis() as u64,
            multiplier: DEFAULT_MULTIPLIER,
            timeout_secs: None,
        }
    }
}

impl From<&PollSettings> for PollPolicy {
    fn from(settings: &PollSettings) -> Self {
        let policy = PollPolicy::new(
            settings.max_attempts,
            Duration::from_millis(settings.base_delay_ms),
            Duration::from_millis(settings.max_delay_ms),
            settings.multiplier,
        );
        match settings.timeout_secs {
            Some(secs) => policy.with_timeout(Duration::from_secs(secs)),
            None => policy,
        }
    }
}
