use std::time::Duration;

pub const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 5;
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(2000);

/// Exponential reconnect policy: `base_delay * 2^(attempt - 1)`, capped by attempt count
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
        }
    }
}

impl ReconnectPolicy {
    /// Delay before the given 1-based attempt
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.base_delay.saturating_mul(1u32 << exponent)
    }
}

/// What to do after a connection was lost
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectDecision {
    Retry { attempt: u32, delay: Duration },
    Exhausted,
}

/// Attempt counter driven by connection outcomes
#[derive(Debug, Clone, Default)]
pub struct ReconnectState {
    policy: ReconnectPolicy,
    attempts: u32,
}

impl ReconnectState {
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self { policy, attempts: 0 }
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn policy(&self) -> &ReconnectPolicy {
        &self.policy
    }

    /// A connection opened successfully
    pub fn reset(&mut self) {
        self.attempts = 0;
    }

    /// A connection closed or failed to open
    pub fn next(&mut self) -> ReconnectDecision {
        self.attempts = self.attempts.saturating_add(1);

        if self.attempts <= self.policy.max_attempts {
            ReconnectDecision::Retry {
                attempt: self.attempts,
                delay: self.policy.delay_for(self.attempts),
            }
        } else {
            ReconnectDecision::Exhausted
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_delays_double() {
        let mut state = ReconnectState::default();
        let delays: Vec<u64> = (0..5)
            .map(|_| match state.next() {
                ReconnectDecision::Retry { delay, .. } => delay.as_millis() as u64,
                ReconnectDecision::Exhausted => panic!("exhausted early"),
            })
            .collect();

        assert_eq!(delays, vec![2000, 4000, 8000, 16000, 32000]);
        assert_eq!(state.next(), ReconnectDecision::Exhausted);
        assert_eq!(state.next(), ReconnectDecision::Exhausted);
    }

    #[test]
    fn test_reset_restarts_sequence() {
        let mut state = ReconnectState::default();
        state.next();
        state.next();
        state.next();
        assert_eq!(state.attempts(), 3);

        state.reset();
        assert_eq!(state.attempts(), 0);
        assert_eq!(
            state.next(),
            ReconnectDecision::Retry {
                attempt: 1,
                delay: Duration::from_secs(2)
            }
        );
    }

    #[test]
    fn test_custom_policy() {
        let mut state = ReconnectState::new(ReconnectPolicy {
            max_attempts: 1,
            base_delay: Duration::from_millis(10),
        });

        assert_eq!(
            state.next(),
            ReconnectDecision::Retry {
                attempt: 1,
                delay: Duration::from_millis(10)
            }
        );
        assert_eq!(state.next(), ReconnectDecision::Exhausted);
    }

    #[test]
    fn test_zero_attempts_exhausts_immediately() {
        let mut state = ReconnectState::new(ReconnectPolicy {
            max_attempts: 0,
            ..ReconnectPolicy::default()
        });
        assert_eq!(state.next(), ReconnectDecision::Exhausted);
    }
}
