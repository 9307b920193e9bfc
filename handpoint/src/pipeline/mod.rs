//! Pipeline loops: read detector frames, run an engine, dispatch events.
//!
//! One loop per pipeline, single-threaded: each frame is fully processed
//! and its events dispatched before the next frame is read.  The loops
//! stop on end of stream, on the pipeline's exit key, on SIGINT/SIGTERM,
//! or when the effector reports a disconnection.

pub mod frame_timing;
pub mod menu;
pub mod pointer;

pub use frame_timing::FrameTiming;
pub use menu::MenuOutcome;

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::config::PipelineConfig;
use crate::source::{CaptureError, CaptureHealth, DetectorFrame, FrameSource};

// ── Shutdown signal ────────────────────────────────────────

/// Global flag set by SIGTERM/SIGINT handlers.
static SHUTDOWN_REQUESTED: AtomicBool = AtomicBool::new(false);

/// Install signal handlers for graceful shutdown (SIGTERM, SIGINT).
pub fn install_signal_handlers() {
    unsafe {
        libc::signal(libc::SIGTERM, signal_handler as libc::sighandler_t);
        libc::signal(libc::SIGINT, signal_handler as libc::sighandler_t);
    }
}

extern "C" fn signal_handler(_sig: libc::c_int) {
    SHUTDOWN_REQUESTED.store(true, Ordering::SeqCst);
}

pub fn shutdown_requested() -> bool {
    SHUTDOWN_REQUESTED.load(Ordering::SeqCst)
}

// ── Frame clock ────────────────────────────────────────────

/// Timestamps for frames: the detector's `t` when present, otherwise time
/// since the loop started.  Never goes backwards.
#[derive(Debug)]
pub struct FrameClock {
    start: Instant,
    last: Duration,
}

impl FrameClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            last: Duration::ZERO,
        }
    }

    pub fn timestamp(&mut self, frame: &DetectorFrame) -> Duration {
        let t = frame.timestamp().unwrap_or_else(|| self.start.elapsed());
        if t < self.last {
            debug!(
                "frame timestamp {:?} behind previous {:?}, holding",
                t, self.last
            );
            return self.last;
        }
        self.last = t;
        t
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}

// ── Loop driver ────────────────────────────────────────────

/// Why a loop stopped reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    EndOfStream,
    ExitKey,
    Signal,
}

impl StopReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EndOfStream => "end-of-stream",
            Self::ExitKey => "exit-key",
            Self::Signal => "signal",
        }
    }
}

/// Result of one read.
pub(crate) enum Step {
    /// A frame with its timestamp and how long we waited for it.
    Frame {
        frame: DetectorFrame,
        now: Duration,
        waited: Duration,
    },
    /// The frame was unreadable and skipped.
    Skipped,
    Stop(StopReason),
}

/// Shared bookkeeping of both pipeline loops.
pub(crate) struct FrameLoop {
    name: &'static str,
    exit_key: i32,
    status_interval: u64,
    clock: FrameClock,
    health: CaptureHealth,
    pub timing: FrameTiming,
    frames: u64,
}

impl FrameLoop {
    pub fn new(name: &'static str, exit_key: i32, config: &PipelineConfig) -> Self {
        Self {
            name,
            exit_key,
            status_interval: config.status_interval_frames.max(1),
            clock: FrameClock::new(),
            health: CaptureHealth::default(),
            timing: FrameTiming::new(config.timing_window, config.frame_budget_ms),
            frames: 0,
        }
    }

    /// Read the next frame.  Only fatal capture errors are returned.  The
    /// exit key is left to `exit_requested`, after the frame is handled.
    pub fn next<S: FrameSource + ?Sized>(&mut self, source: &mut S) -> Result<Step, CaptureError> {
        if shutdown_requested() {
            info!("{}: shutdown signal received", self.name);
            return Ok(Step::Stop(StopReason::Signal));
        }

        let started = Instant::now();
        let frame = match source.next_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                info!("{}: detector stream ended", self.name);
                return Ok(Step::Stop(StopReason::EndOfStream));
            }
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                self.health.record_failure(&e);
                return Ok(Step::Skipped);
            }
        };
        self.health.record_ok();

        let now = self.clock.timestamp(&frame);
        Ok(Step::Frame {
            frame,
            now,
            waited: started.elapsed(),
        })
    }

    /// Record a processed frame; logs status every `status_interval` frames.
    pub fn finish_frame(
        &mut self,
        waited: Duration,
        processed: Duration,
        dispatched: Duration,
        status: impl FnOnce() -> String,
    ) {
        self.frames += 1;
        self.timing.record_frame(waited, processed, dispatched);
        if self.frames % self.status_interval == 0 {
            info!("{} status: {} {}", self.name, status(), self.timing.stats_sexp());
        }
    }

    /// True when this frame carries the loop's exit key.
    pub fn exit_requested(&self, frame: &DetectorFrame) -> bool {
        let pressed = frame.key == Some(self.exit_key);
        if pressed {
            info!("{}: exit key pressed", self.name);
        }
        pressed
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn skipped(&self) -> u64 {
        self.health.total()
    }
}

/// Counters reported when a loop ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineSummary {
    pub stop: StopReason,
    pub frames: u64,
    pub skipped: u64,
    pub dispatched: u64,
    pub ignored: u64,
}
