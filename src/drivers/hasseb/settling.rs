use log::trace;
use tokio::time::{Duration, Instant};

/// Minimum idle time between two transmissions
pub const SETTLING_TIME: Duration = Duration::from_millis(20);

/// Keeps track of the last bus activity seen through the adapter.
#[derive(Debug)]
pub struct SettlingTimer {
    min_gap: Duration,
    last_activity: Option<Instant>,
}

impl SettlingTimer {
    pub fn new(min_gap: Duration) -> SettlingTimer {
        SettlingTimer {
            min_gap,
            last_activity: None,
        }
    }

    /// Time left of the settling time at `now`
    pub fn wait_needed(&self, now: Instant) -> Duration {
        match self.last_activity {
            Some(last) => self
                .min_gap
                .saturating_sub(now.saturating_duration_since(last)),
            None => Duration::ZERO,
        }
    }

    pub async fn wait_if_needed(&self) {
        let wait = self.wait_needed(Instant::now());
        if !wait.is_zero() {
            trace!("Settling for {:?}", wait);
            tokio::time::sleep(wait).await;
        }
    }

    pub fn mark_activity(&mut self, now: Instant) {
        self.last_activity = Some(now);
    }
}

impl Default for SettlingTimer {
    fn default() -> Self {
        SettlingTimer::new(SETTLING_TIME)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn no_wait_before_first_activity() {
        let timer = SettlingTimer::default();
        assert_eq!(timer.wait_needed(Instant::now()), Duration::ZERO);
    }

    #[test]
    fn remaining_gap() {
        let mut timer = SettlingTimer::default();
        let t0 = Instant::now();
        timer.mark_activity(t0);
        assert_eq!(timer.wait_needed(t0), Duration::from_millis(20));
        assert_eq!(
            timer.wait_needed(t0 + Duration::from_millis(5)),
            Duration::from_millis(15)
        );
        assert_eq!(timer.wait_needed(t0 + Duration::from_millis(20)), Duration::ZERO);
        assert_eq!(timer.wait_needed(t0 + Duration::from_millis(500)), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn send_requested_early_is_delayed() {
        let mut timer = SettlingTimer::default();
        let t0 = Instant::now();
        timer.mark_activity(t0);
        tokio::time::sleep(Duration::from_millis(5)).await;
        timer.wait_if_needed().await;
        assert!(Instant::now() - t0 >= Duration::from_millis(20));
    }

    #[tokio::test(start_paused = true)]
    async fn idle_bus_is_not_delayed() {
        let mut timer = SettlingTimer::default();
        timer.mark_activity(Instant::now());
        tokio::time::sleep(Duration::from_millis(50)).await;
        let before = Instant::now();
        timer.wait_if_needed().await;
        assert_eq!(Instant::now(), before);
    }
}
