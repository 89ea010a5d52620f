// Reconnect backoff - exponential growth with jitter
use rand::Rng;
use std::time::Duration;

pub const BACKOFF_BASE: Duration = Duration::from_secs(1);
pub const BACKOFF_CAP: Duration = Duration::from_secs(30);

/// Jitter envelope applied to every delay, so a fleet of clients does
/// not hammer a recovering endpoint in lockstep.
const JITTER_LOW: f64 = 0.9;
const JITTER_HIGH: f64 = 1.1;

/// Increasing delay between reconnect attempts: doubles from `base` up
/// to `cap`, reset to `base` after every successful connect.
#[derive(Debug)]
pub struct Backoff {
    base: Duration,
    cap: Duration,
    current: Duration,
}

impl Backoff {
    pub fn new(base: Duration, cap: Duration) -> Self {
        Self {
            base,
            cap,
            current: base,
        }
    }

    /// The next delay to sleep before reconnecting. Advances the
    /// internal schedule.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = self.current.saturating_mul(2).min(self.cap);
        jitter(delay)
    }

    /// Back to the base delay, called on every successful open.
    pub fn reset(&mut self) {
        self.current = self.base;
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(BACKOFF_BASE, BACKOFF_CAP)
    }
}

fn jitter(delay: Duration) -> Duration {
    let factor = rand::rng().random_range(JITTER_LOW..=JITTER_HIGH);
    delay.mul_f64(factor)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn within_jitter(actual: Duration, nominal: Duration) -> bool {
        actual >= nominal.mul_f64(JITTER_LOW) && actual <= nominal.mul_f64(JITTER_HIGH)
    }

    #[test]
    fn test_first_delay_is_base() {
        let mut backoff = Backoff::new(Duration::from_secs(1), Duration::from_secs(30));
        assert!(within_jitter(backoff.next_delay(), Duration::from_secs(1)));
    }

    #[test]
    fn test_doubles_until_cap() {
        let mut backoff = Backoff::new(Duration::from_secs(1), Duration::from_secs(30));
        let mut nominal = 1u64;
        for _ in 0..8 {
            let delay = backoff.next_delay();
            assert!(
                within_jitter(delay, Duration::from_secs(nominal)),
                "delay {delay:?} outside jitter envelope of {nominal}s"
            );
            nominal = (nominal * 2).min(30);
        }
    }

    #[test]
    fn test_cap_is_stable() {
        let mut backoff = Backoff::new(Duration::from_secs(1), Duration::from_secs(30));
        for _ in 0..10 {
            backoff.next_delay();
        }
        for _ in 0..5 {
            assert!(within_jitter(backoff.next_delay(), Duration::from_secs(30)));
        }
    }

    #[test]
    fn test_reset_returns_to_base() {
        let mut backoff = Backoff::new(Duration::from_secs(1), Duration::from_secs(30));
        for _ in 0..6 {
            backoff.next_delay();
        }
        backoff.reset();
        assert!(within_jitter(backoff.next_delay(), Duration::from_secs(1)));
    }
}
