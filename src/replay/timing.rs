//! Deadline waiting

use std::time::{Duration, Instant};

/// Blocks until `target`, then returns how late it returned.
///
/// While more than `spin_threshold` remains, the thread sleeps for all but
/// the threshold; the rest is busy-waited, since OS sleeps can overshoot by
/// more than the threshold. A deadline already in the past returns at once.
pub fn wait_until(target: Instant, spin_threshold: Duration) -> Duration {
    let now = Instant::now();
    if now >= target {
        return now - target;
    }

    let remaining = target - now;
    if remaining > spin_threshold {
        std::thread::sleep(remaining - spin_threshold);
    }

    loop {
        let now = Instant::now();
        if now >= target {
            return now - target;
        }
        std::hint::spin_loop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const THRESHOLD: Duration = Duration::from_millis(2);

    #[test]
    fn never_returns_early() {
        for ms in [0, 1, 3, 15] {
            let target = Instant::now() + Duration::from_millis(ms);
            wait_until(target, THRESHOLD);
            assert!(Instant::now() >= target);
        }
    }

    #[test]
    fn hits_the_deadline_closely() {
        let target = Instant::now() + Duration::from_millis(50);
        let late = wait_until(target, THRESHOLD);
        assert!(late < Duration::from_millis(2), "late by {:?}", late);
    }

    #[test]
    fn past_deadline_reports_lateness() {
        let target = Instant::now();
        std::thread::sleep(Duration::from_millis(5));
        let late = wait_until(target, THRESHOLD);
        assert!(late >= Duration::from_millis(5));
    }
}
