use std::time::{Duration, Instant};

/**
 * Rate-limited progress reporting for the outer integration loop. The
 * driver asks `time_to_update` once per step and pushes a status line
 * through the logger when the interval has elapsed.
 */
pub struct ProgressBar {
    total: f64,
    done: f64,
    start: Instant,
    last_update: Instant,
    interval: Duration,
}




// ============================================================================
impl ProgressBar {

    pub fn new(total: f64, interval_ms: u64) -> Self {
        let now = Instant::now();
        Self {
            total,
            done: 0.0,
            start: now,
            last_update: now,
            interval: Duration::from_millis(interval_ms),
        }
    }

    pub fn time_to_update(&self) -> bool {
        self.last_update.elapsed() >= self.interval
    }

    pub fn update(&mut self, done: f64) {
        self.done = done.min(self.total).max(0.0);
        self.last_update = Instant::now();
    }

    pub fn fraction(&self) -> f64 {
        if self.total > 0.0 {
            self.done / self.total
        } else {
            1.0
        }
    }

    pub fn status(&self) -> String {
        let elapsed = self.start.elapsed().as_secs_f64();
        let fraction = self.fraction();
        let remaining = if fraction > 0.0 {
            elapsed * (1.0 - fraction) / fraction
        } else {
            f64::INFINITY
        };
        format!(
            "{:5.1}% complete | elapsed {:.1} s | remaining {:.1} s",
            100.0 * fraction,
            elapsed,
            remaining
        )
    }

    pub fn final_status(&self) -> String {
        format!("completed in {:.1} s", self.start.elapsed().as_secs_f64())
    }
}




// ============================================================================
#[cfg(test)]
mod test {
    use super::ProgressBar;

    #[test]
    fn fraction_saturates_at_one() {
        let mut progress = ProgressBar::new(10.0, 0);
        progress.update(25.0);
        assert_eq!(progress.fraction(), 1.0);
    }

    #[test]
    fn zero_interval_is_always_ready() {
        let progress = ProgressBar::new(10.0, 0);
        assert!(progress.time_to_update());
    }
}
