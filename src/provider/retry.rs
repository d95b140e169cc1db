use rand::Rng;
use std::time::Duration;

/// Share of the base delay added as uniform jitter.
pub const JITTER_FRACTION: f64 = 0.3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    pub fn max_attempts(&self) -> u32 {
        self.max_retries + 1
    }

    pub fn delay_for(&self, attempt: u32) -> Duration {
        backoff_delay(attempt, self.base_delay, self.max_delay, &mut rand::thread_rng())
    }
}

/// `base * 2^attempt` plus up to 30% of `base` in jitter, capped at `cap`.
pub fn backoff_delay<R: Rng + ?Sized>(
    attempt: u32,
    base: Duration,
    cap: Duration,
    rng: &mut R,
) -> Duration {
    let exponential = base.saturating_mul(2u32.saturating_pow(attempt.min(16)));
    let jitter_ceiling = base.mul_f64(JITTER_FRACTION);
    let jitter = if jitter_ceiling.is_zero() {
        Duration::ZERO
    } else {
        jitter_ceiling.mul_f64(rng.gen_range(0.0..=1.0))
    };
    exponential.saturating_add(jitter).min(cap)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn delay_doubles_per_attempt_within_jitter_band() {
        let mut rng = StdRng::seed_from_u64(7);
        let base = Duration::from_millis(100);
        let cap = Duration::from_secs(60);

        for attempt in 0..6 {
            let delay = backoff_delay(attempt, base, cap, &mut rng);
            let floor = base * 2u32.pow(attempt);
            assert!(delay >= floor, "attempt {} delay {:?}", attempt, delay);
            assert!(delay <= floor + Duration::from_millis(30), "attempt {} delay {:?}", attempt, delay);
        }
    }

    #[test]
    fn delay_is_capped() {
        let mut rng = StdRng::seed_from_u64(1);
        let delay = backoff_delay(10, Duration::from_millis(500), Duration::from_secs(2), &mut rng);
        assert_eq!(delay, Duration::from_secs(2));
    }

    #[test]
    fn zero_base_means_no_wait() {
        let mut rng = StdRng::seed_from_u64(3);
        assert_eq!(
            backoff_delay(3, Duration::ZERO, Duration::from_secs(1), &mut rng),
            Duration::ZERO
        );
    }

    #[test]
    fn default_policy_allows_three_attempts() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts(), 3);
    }
}
