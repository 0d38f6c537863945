use std::time::{Duration, Instant};

const REPORT_INTERVAL: Duration = Duration::from_secs(1);

/// Counts presented frames and yields a frames-per-second figure once per interval
#[derive(Debug)]
pub struct FrameStats {
    window_start: Instant,
    frames: u32,
}

impl FrameStats {
    pub fn new(now: Instant) -> Self {
        Self {
            window_start: now,
            frames: 0,
        }
    }

    pub fn frame_presented(&mut self, now: Instant) -> Option<f64> {
        self.frames += 1;
        let elapsed = now.saturating_duration_since(self.window_start);
        if elapsed < REPORT_INTERVAL {
            return None;
        }
        let fps = self.frames as f64 / elapsed.as_secs_f64();
        self.window_start = now;
        self.frames = 0;
        Some(fps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn reports_once_per_second() {
        let start = Instant::now();
        let mut stats = FrameStats::new(start);

        for i in 1..60 {
            assert_eq!(stats.frame_presented(start + Duration::from_millis(i * 16)), None);
        }
        let fps = stats.frame_presented(start + Duration::from_secs(1)).unwrap();
        assert_relative_eq!(fps, 60.0);

        // The counter starts over after a report
        assert_eq!(stats.frame_presented(start + Duration::from_millis(1500)), None);
    }
}
