//! Per-frame timing for the pipeline loops.
//!
//! Each frame is split into three stages: waiting for the detector,
//! interpreting the frame, and dispatching its events.  Only the last two
//! count against the frame budget; detector wait is the camera's pace.

use std::collections::VecDeque;
use std::time::Duration;

/// Rolling timing statistics over a window of frames.
#[derive(Debug)]
pub struct FrameTiming {
    wait_times: VecDeque<f64>,
    process_times: VecDeque<f64>,
    dispatch_times: VecDeque<f64>,
    window_size: usize,
    /// Frames recorded since start.
    pub total_frames: u64,
    /// Frames whose processing + dispatch exceeded the budget.
    pub over_budget: u64,
    /// Budget in milliseconds.
    pub budget_ms: f64,
}

impl Default for FrameTiming {
    fn default() -> Self {
        Self::new(300, 33.3)
    }
}

impl FrameTiming {
    pub fn new(window_size: usize, budget_ms: f64) -> Self {
        let window_size = window_size.max(1);
        Self {
            wait_times: VecDeque::with_capacity(window_size),
            process_times: VecDeque::with_capacity(window_size),
            dispatch_times: VecDeque::with_capacity(window_size),
            window_size,
            total_frames: 0,
            over_budget: 0,
            budget_ms,
        }
    }

    pub fn record_frame(&mut self, wait: Duration, process: Duration, dispatch: Duration) {
        let (wait, process, dispatch) = (ms(wait), ms(process), ms(dispatch));
        push(&mut self.wait_times, wait, self.window_size);
        push(&mut self.process_times, process, self.window_size);
        push(&mut self.dispatch_times, dispatch, self.window_size);

        self.total_frames += 1;
        if process + dispatch > self.budget_ms {
            self.over_budget += 1;
        }
    }

    pub fn stats(&self) -> FrameTimingStats {
        let wait = sorted(&self.wait_times);
        let process = sorted(&self.process_times);
        let dispatch = sorted(&self.dispatch_times);
        let frame: Vec<f64> = {
            let mut v: Vec<f64> = self
                .wait_times
                .iter()
                .zip(&self.process_times)
                .zip(&self.dispatch_times)
                .map(|((w, p), d)| w + p + d)
                .collect();
            v.sort_by(|a, b| a.total_cmp(b));
            v
        };

        let frame_p50 = percentile(&frame, 50.0);
        FrameTimingStats {
            wait_p50: percentile(&wait, 50.0),
            process_p50: percentile(&process, 50.0),
            process_p99: percentile(&process, 99.0),
            dispatch_p50: percentile(&dispatch, 50.0),
            dispatch_p99: percentile(&dispatch, 99.0),
            fps: if frame_p50 > 0.0 { 1000.0 / frame_p50 } else { 0.0 },
            over_budget_pct: if self.total_frames > 0 {
                self.over_budget as f64 / self.total_frames as f64 * 100.0
            } else {
                0.0
            },
            total_frames: self.total_frames,
        }
    }

    /// Stats as an s-expression for the status log.
    pub fn stats_sexp(&self) -> String {
        let s = self.stats();
        format!(
            "(:wait-p50 {:.1} :process-p50 {:.2} :process-p99 {:.2} :dispatch-p50 {:.2} :dispatch-p99 {:.2} :fps {:.0} :over-budget-pct {:.1} :total-frames {})",
            s.wait_p50,
            s.process_p50,
            s.process_p99,
            s.dispatch_p50,
            s.dispatch_p99,
            s.fps,
            s.over_budget_pct,
            s.total_frames,
        )
    }
}

/// Computed timing statistics, all in milliseconds.
#[derive(Debug, Clone)]
pub struct FrameTimingStats {
    pub wait_p50: f64,
    pub process_p50: f64,
    pub process_p99: f64,
    pub dispatch_p50: f64,
    pub dispatch_p99: f64,
    pub fps: f64,
    pub over_budget_pct: f64,
    pub total_frames: u64,
}

fn ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

fn push(samples: &mut VecDeque<f64>, value: f64, window_size: usize) {
    if samples.len() == window_size {
        samples.pop_front();
    }
    samples.push_back(value);
}

fn sorted(samples: &VecDeque<f64>) -> Vec<f64> {
    let mut v: Vec<f64> = samples.iter().copied().collect();
    v.sort_by(|a, b| a.total_cmp(b));
    v
}

fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let idx = ((sorted.len() as f64 - 1.0) * p / 100.0).round() as usize;
    sorted[idx.min(sorted.len() - 1)]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn millis(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    #[test]
    fn test_empty_stats() {
        let ft = FrameTiming::new(10, 33.3);
        let stats = ft.stats();
        assert_eq!(stats.total_frames, 0);
        assert_eq!(stats.fps, 0.0);
        assert_eq!(stats.over_budget_pct, 0.0);
    }

    #[test]
    fn test_fps_from_whole_frame() {
        let mut ft = FrameTiming::new(10, 33.3);
        ft.record_frame(millis(30), millis(2), millis(1));
        let stats = ft.stats();
        assert!((stats.fps - 1000.0 / 33.0).abs() < 0.01);
        assert!((stats.process_p50 - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_wait_does_not_count_against_budget() {
        let mut ft = FrameTiming::new(10, 10.0);
        ft.record_frame(millis(100), millis(2), millis(1));
        assert_eq!(ft.over_budget, 0);
        ft.record_frame(millis(0), millis(8), millis(5));
        assert_eq!(ft.over_budget, 1);
        assert_eq!(ft.total_frames, 2);
    }

    #[test]
    fn test_window_trim() {
        let mut ft = FrameTiming::new(4, 33.3);
        for i in 0..10 {
            ft.record_frame(millis(i), millis(1), millis(0));
        }
        assert_eq!(ft.process_times.len(), 4);
        assert_eq!(ft.total_frames, 10);
        // Window holds waits 6..=9.
        assert!((ft.stats().wait_p50 - 8.0).abs() < 1e-9);
    }

    #[test]
    fn test_stats_sexp_format() {
        let mut ft = FrameTiming::default();
        ft.record_frame(millis(30), millis(1), millis(1));
        let sexp = ft.stats_sexp();
        assert!(sexp.starts_with("(:wait-p50"));
        assert!(sexp.contains(":total-frames 1"));
        assert!(lexpr::from_str(&sexp).is_ok());
    }
}
