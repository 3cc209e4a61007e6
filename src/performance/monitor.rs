//! Rolling frame-time statistics.

use std::collections::VecDeque;
use std::time::Instant;

use serde::{Deserialize, Serialize};

/// Frame times at or above this are treated as stalls, not frames.
pub const MAX_VALID_FRAME_MS: f64 = 1000.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorOptions {
    pub target_fps: f64,
    pub history_size: usize,
    pub min_calibration_samples: usize,
    /// Frame-time standard deviation at which stability reaches zero.
    pub max_acceptable_variance_ms: f64,
    /// Weight of the newest sample in the smoothed FPS.
    pub ema_alpha: f64,
    /// Most recent samples the trend regression looks at.
    pub trend_window: usize,
}

impl Default for MonitorOptions {
    fn default() -> Self {
        Self {
            target_fps: 60.0,
            history_size: 120,
            min_calibration_samples: 30,
            max_acceptable_variance_ms: 8.0,
            ema_alpha: 0.1,
            trend_window: 30,
        }
    }
}

/// Snapshot of the current frame statistics.
///
/// `p50`/`p95`/`p99` are frame times in milliseconds (higher is worse). The
/// `low_*`/`high_*` tails are FPS values (a low `low_1_fps` means stutter).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub sample_count: usize,
    pub calibrated: bool,
    pub average_fps: f64,
    pub smoothed_fps: f64,
    pub min_fps: f64,
    pub max_fps: f64,
    pub p50_frame_ms: f64,
    pub p95_frame_ms: f64,
    pub p99_frame_ms: f64,
    pub low_0_1_fps: f64,
    pub low_1_fps: f64,
    pub high_99_fps: f64,
    pub high_99_9_fps: f64,
    /// Standard deviation of frame times, milliseconds.
    pub frame_time_std_ms: f64,
    /// Regression slope of recent FPS, normalized to `[-1, 1]`.
    pub trend: f64,
    /// `1` for perfectly even frames, `0` at or beyond the acceptable variance.
    pub stability: f64,
    /// `0` at half the target FPS or below, `1` at the target or above.
    pub headroom: f64,
}

#[derive(Debug, Clone)]
pub struct PerformanceMonitor {
    options: MonitorOptions,
    fps_history: VecDeque<f64>,
    frame_times: VecDeque<f64>,
    smoothed_fps: f64,
    last_frame: Option<Instant>,
}

impl PerformanceMonitor {
    pub fn new(options: MonitorOptions) -> Self {
        let capacity = options.history_size.max(1);
        Self {
            smoothed_fps: options.target_fps,
            fps_history: VecDeque::with_capacity(capacity),
            frame_times: VecDeque::with_capacity(capacity),
            last_frame: None,
            options,
        }
    }

    pub fn options(&self) -> &MonitorOptions {
        &self.options
    }

    /// Samples the wall clock. The first call only starts the clock.
    pub fn record_frame(&mut self) -> bool {
        self.record_frame_at(Instant::now())
    }

    pub fn record_frame_at(&mut self, now: Instant) -> bool {
        let accepted = match self.last_frame {
            Some(previous) => {
                let elapsed = now.saturating_duration_since(previous);
                self.record_frame_time(elapsed.as_secs_f64() * 1000.0)
            }
            None => false,
        };
        self.last_frame = Some(now);
        accepted
    }

    /// Records one frame duration. Values outside `(0, 1000)` ms are
    /// discarded and `false` is returned.
    pub fn record_frame_time(&mut self, frame_ms: f64) -> bool {
        if !(frame_ms > 0.0 && frame_ms < MAX_VALID_FRAME_MS) {
            return false;
        }
        let fps = 1000.0 / frame_ms;
        let limit = self.options.history_size.max(1);
        push_bounded(&mut self.fps_history, fps, limit);
        push_bounded(&mut self.frame_times, frame_ms, limit);

        let alpha = self.options.ema_alpha.clamp(0.0, 1.0);
        self.smoothed_fps = alpha * fps + (1.0 - alpha) * self.smoothed_fps;
        true
    }

    pub fn sample_count(&self) -> usize {
        self.fps_history.len()
    }

    /// Enough samples for the metrics to mean something.
    pub fn is_calibrated(&self) -> bool {
        let needed = self
            .options
            .min_calibration_samples
            .min(self.options.history_size / 2)
            .max(1);
        self.fps_history.len() >= needed
    }

    pub fn get_metrics(&self) -> PerformanceMetrics {
        let headroom = self.headroom();
        if self.fps_history.is_empty() {
            return PerformanceMetrics {
                smoothed_fps: self.smoothed_fps,
                headroom,
                ..PerformanceMetrics::default()
            };
        }

        let n = self.fps_history.len() as f64;
        let mut fps: Vec<f64> = self.fps_history.iter().copied().collect();
        let mut frame_ms: Vec<f64> = self.frame_times.iter().copied().collect();
        let average_fps = fps.iter().sum::<f64>() / n;
        let mean_ms = frame_ms.iter().sum::<f64>() / n;
        let frame_time_std_ms =
            (frame_ms.iter().map(|t| (t - mean_ms).powi(2)).sum::<f64>() / n).sqrt();

        fps.sort_by(f64::total_cmp);
        frame_ms.sort_by(f64::total_cmp);

        let stability = if self.options.max_acceptable_variance_ms > 0.0 {
            (1.0 - frame_time_std_ms / self.options.max_acceptable_variance_ms).max(0.0)
        } else {
            0.0
        };

        PerformanceMetrics {
            sample_count: self.fps_history.len(),
            calibrated: self.is_calibrated(),
            average_fps,
            smoothed_fps: self.smoothed_fps,
            min_fps: fps[0],
            max_fps: fps[fps.len() - 1],
            p50_frame_ms: percentile(&frame_ms, 50.0),
            p95_frame_ms: percentile(&frame_ms, 95.0),
            p99_frame_ms: percentile(&frame_ms, 99.0),
            low_0_1_fps: percentile(&fps, 0.1),
            low_1_fps: percentile(&fps, 1.0),
            high_99_fps: percentile(&fps, 99.0),
            high_99_9_fps: percentile(&fps, 99.9),
            frame_time_std_ms,
            trend: self.trend(),
            stability,
            headroom,
        }
    }

    /// Clears history and re-seeds the smoothed FPS to the target.
    pub fn reset(&mut self) {
        self.fps_history.clear();
        self.frame_times.clear();
        self.smoothed_fps = self.options.target_fps;
        self.last_frame = None;
    }

    fn headroom(&self) -> f64 {
        let half = self.options.target_fps / 2.0;
        if half <= 0.0 {
            return 0.0;
        }
        ((self.smoothed_fps - half) / half).clamp(0.0, 1.0)
    }

    /// Least-squares slope over the trend window, as the FPS change across
    /// the window relative to the target.
    fn trend(&self) -> f64 {
        let window = self.options.trend_window.max(2).min(self.fps_history.len());
        if window < 2 || self.options.target_fps <= 0.0 {
            return 0.0;
        }
        let recent = self.fps_history.iter().skip(self.fps_history.len() - window);
        let n = window as f64;
        let mean_x = (n - 1.0) / 2.0;
        let mean_y = recent.clone().sum::<f64>() / n;
        let (mut num, mut den) = (0.0, 0.0);
        for (i, y) in recent.enumerate() {
            let dx = i as f64 - mean_x;
            num += dx * (y - mean_y);
            den += dx * dx;
        }
        if den == 0.0 {
            return 0.0;
        }
        (num / den * n / self.options.target_fps).clamp(-1.0, 1.0)
    }
}

impl Default for PerformanceMonitor {
    fn default() -> Self {
        Self::new(MonitorOptions::default())
    }
}

fn push_bounded(history: &mut VecDeque<f64>, value: f64, limit: usize) {
    history.push_back(value);
    while history.len() > limit {
        history.pop_front();
    }
}

/// Linear interpolation between closest ranks of an ascending slice.
fn percentile(sorted: &[f64], p: f64) -> f64 {
    match sorted.len() {
        0 => 0.0,
        1 => sorted[0],
        len => {
            let rank = (p / 100.0).clamp(0.0, 1.0) * (len - 1) as f64;
            let lower = rank.floor() as usize;
            let upper = rank.ceil() as usize;
            let frac = rank - lower as f64;
            sorted[lower] + (sorted[upper] - sorted[lower]) * frac
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_percentile_interpolates() {
        let data = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(percentile(&data, 0.0), 1.0);
        assert_eq!(percentile(&data, 50.0), 3.0);
        assert_eq!(percentile(&data, 100.0), 5.0);
        assert_eq!(percentile(&data, 12.5), 1.5);
        assert_eq!(percentile(&[], 50.0), 0.0);
    }

    #[test]
    fn test_invalid_frames_are_discarded() {
        let mut monitor = PerformanceMonitor::default();
        assert!(!monitor.record_frame_time(0.0));
        assert!(!monitor.record_frame_time(-3.0));
        assert!(!monitor.record_frame_time(1000.0));
        assert!(!monitor.record_frame_time(f64::NAN));
        assert!(monitor.record_frame_time(16.0));
        assert_eq!(monitor.sample_count(), 1);
    }

    #[test]
    fn test_history_is_bounded() {
        let mut monitor = PerformanceMonitor::new(MonitorOptions {
            history_size: 10,
            ..MonitorOptions::default()
        });
        for _ in 0..25 {
            monitor.record_frame_time(20.0);
        }
        assert_eq!(monitor.sample_count(), 10);
    }

    #[test]
    fn test_first_instant_only_starts_clock() {
        let mut monitor = PerformanceMonitor::default();
        let t0 = Instant::now();
        assert!(!monitor.record_frame_at(t0));
        assert!(monitor.record_frame_at(t0 + Duration::from_millis(20)));
        let metrics = monitor.get_metrics();
        assert_eq!(metrics.sample_count, 1);
        assert!((metrics.average_fps - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_trend_sign() {
        let mut monitor = PerformanceMonitor::default();
        for i in 0..30 {
            monitor.record_frame_time(10.0 + i as f64);
        }
        assert!(monitor.get_metrics().trend < 0.0);

        monitor.reset();
        for i in 0..30 {
            monitor.record_frame_time(40.0 - i as f64);
        }
        assert!(monitor.get_metrics().trend > 0.0);
    }
}
