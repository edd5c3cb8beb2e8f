//! Sliding window of device message arrivals.

use std::collections::VecDeque;
use std::time::Duration;

use tokio::time::Instant;

/// Arrival timestamps within the last window; the rate is refreshed on sweep.
#[derive(Debug)]
pub struct RateWindow {
    window: Duration,
    arrivals: VecDeque<Instant>,
    rate: usize,
}

impl RateWindow {
    /// Empty window of the given length.
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            arrivals: VecDeque::new(),
            rate: 0,
        }
    }

    /// Record one device message.
    pub fn record(&mut self, now: Instant) {
        self.arrivals.push_back(now);
    }

    /// Drop arrivals older than the window and publish the remaining count.
    pub fn sweep(&mut self, now: Instant) -> usize {
        while let Some(&oldest) = self.arrivals.front() {
            if now.saturating_duration_since(oldest) <= self.window {
                break;
            }
            let _ = self.arrivals.pop_front();
        }
        self.rate = self.arrivals.len();
        self.rate
    }

    /// Rate published by the last sweep.
    pub fn rate(&self) -> usize {
        self.rate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECOND: Duration = Duration::from_millis(1000);

    #[test]
    fn rate_updates_only_on_sweep() {
        let mut window = RateWindow::new(SECOND);
        let t0 = Instant::now();
        window.record(t0);
        window.record(t0);
        assert_eq!(window.rate(), 0);
        assert_eq!(window.sweep(t0), 2);
        assert_eq!(window.rate(), 2);
    }

    #[test]
    fn old_arrivals_pruned() {
        let mut window = RateWindow::new(SECOND);
        let t0 = Instant::now();
        window.record(t0);
        window.record(t0 + Duration::from_millis(600));
        window.record(t0 + Duration::from_millis(900));
        assert_eq!(window.sweep(t0 + Duration::from_millis(1500)), 2);
        assert_eq!(window.sweep(t0 + Duration::from_millis(3000)), 0);
    }

    #[test]
    fn boundary_is_inclusive() {
        let mut window = RateWindow::new(SECOND);
        let t0 = Instant::now();
        window.record(t0);
        assert_eq!(window.sweep(t0 + SECOND), 1);
        assert_eq!(window.sweep(t0 + SECOND + Duration::from_millis(1)), 0);
    }

    #[test]
    fn empty_window_is_zero() {
        let mut window = RateWindow::new(SECOND);
        assert_eq!(window.sweep(Instant::now()), 0);
    }
}
