use std::time::Duration;

use rand::Rng;

/// Reconnect schedule for a [`Connection`](crate::Connection).
///
/// The n-th retry (0-based) waits `initial_delay * multiplier^n`, capped at
/// `max_delay`, then spread by up to `jitter` of itself in either direction
/// so a room full of displays does not reconnect in lockstep.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectPolicy {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
    /// Fraction in `0.0..=1.0`.
    pub jitter: f64,
    /// Consecutive failed attempts before giving up. `None` retries forever.
    pub max_attempts: Option<u32>,
    /// Upper bound on a single handshake.
    pub connect_timeout: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
            jitter: 0.2,
            max_attempts: None,
            connect_timeout: Duration::from_secs(10),
        }
    }
}

impl ReconnectPolicy {
    /// Delay before retry `attempt`, without jitter.
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.max(1.0).powi(attempt.min(64) as i32);
        let secs = self.initial_delay.as_secs_f64() * factor;
        if !secs.is_finite() || secs >= self.max_delay.as_secs_f64() {
            self.max_delay
        } else {
            Duration::from_secs_f64(secs)
        }
    }

    /// Delay before retry `attempt`, jittered.
    pub fn delay(&self, attempt: u32) -> Duration {
        let base = self.base_delay(attempt);
        let jitter = self.jitter.clamp(0.0, 1.0);
        if jitter == 0.0 || base.is_zero() {
            return base;
        }
        let spread = rand::rng().random_range(-jitter..=jitter);
        base.mul_f64(1.0 + spread)
    }

    /// Delay after `failures` consecutive failed attempts. The first retry
    /// waits `initial_delay`.
    pub fn delay_after(&self, failures: u32) -> Duration {
        self.delay(failures.saturating_sub(1))
    }

    /// True once `failures` consecutive attempts have been used up.
    pub fn exhausted(&self, failures: u32) -> bool {
        self.max_attempts.is_some_and(|max| failures >= max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> ReconnectPolicy {
        ReconnectPolicy {
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(2),
            multiplier: 2.0,
            jitter: 0.0,
            max_attempts: Some(5),
            connect_timeout: Duration::from_secs(1),
        }
    }

    #[test]
    fn doubles_until_capped() {
        let p = policy();
        let delays: Vec<_> = (0..7).map(|n| p.base_delay(n).as_millis()).collect();
        assert_eq!(delays, vec![100, 200, 400, 800, 1600, 2000, 2000]);
    }

    #[test]
    fn huge_attempt_counts_stay_at_cap() {
        let p = policy();
        assert_eq!(p.base_delay(u32::MAX), Duration::from_secs(2));
    }

    #[test]
    fn jitter_stays_in_band() {
        let p = ReconnectPolicy {
            jitter: 0.25,
            ..policy()
        };
        for _ in 0..200 {
            let d = p.delay(2).as_secs_f64();
            assert!((0.299..=0.501).contains(&d), "delay {d} out of band");
        }
    }

    #[test]
    fn zero_jitter_is_deterministic() {
        let p = policy();
        assert_eq!(p.delay(3), p.base_delay(3));
    }

    #[test]
    fn first_retry_waits_the_initial_delay() {
        let p = policy();
        assert_eq!(p.delay_after(0), Duration::from_millis(100));
        assert_eq!(p.delay_after(1), Duration::from_millis(100));
        assert_eq!(p.delay_after(2), Duration::from_millis(200));
        assert_eq!(p.delay_after(3), Duration::from_millis(400));
    }

    #[test]
    fn exhaustion() {
        let p = policy();
        assert!(!p.exhausted(4));
        assert!(p.exhausted(5));

        let forever = ReconnectPolicy {
            max_attempts: None,
            ..policy()
        };
        assert!(!forever.exhausted(u32::MAX));
    }
}
