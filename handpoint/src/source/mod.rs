//! Frame sources: adapters that deliver detector output to the pipelines.
//!
//! The landmark detector itself is an external program.  It writes one JSON
//! document per frame:
//!
//! ```text
//! {"t": 1.25, "width": 640, "height": 480, "key": 27,
//!  "hands": [{"label": "Right", "keypoints": [[x, y], ...]}]}
//! ```
//!
//! `t` (seconds) and `key` (last key code pressed in the preview window)
//! are optional.

pub mod jsonl;
pub mod process;

pub use jsonl::JsonLinesSource;
pub use process::DetectorProcess;

use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use tracing::warn;

use crate::tracking::DetectedHand;

// ── Frames ─────────────────────────────────────────────────

/// One detector frame.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DetectorFrame {
    /// Capture time in seconds, on the detector's clock.
    #[serde(default)]
    pub t: Option<f64>,
    pub width: u32,
    pub height: u32,
    /// Key code pressed in the preview window, if any.
    #[serde(default)]
    pub key: Option<i32>,
    #[serde(default)]
    pub hands: Vec<DetectedHand>,
}

impl DetectorFrame {
    pub fn frame_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Capture time, if the detector sent a usable one.
    pub fn timestamp(&self) -> Option<Duration> {
        self.t.and_then(|t| Duration::try_from_secs_f64(t).ok())
    }
}

// ── Errors ─────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum CaptureError {
    /// The source could not be started.  Fatal.
    #[error("cannot open frame source: {0}")]
    Open(String),
    /// Reading one frame failed.  The frame is skipped.
    #[error("frame read failed: {0}")]
    Read(#[from] std::io::Error),
    /// One frame could not be decoded.  The frame is skipped.
    #[error("frame decode failed: {0}")]
    Decode(#[from] serde_json::Error),
}

impl CaptureError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Open(_))
    }
}

// ── Source contract ────────────────────────────────────────

/// Blocking supplier of detector frames.
pub trait FrameSource {
    /// Next frame; `Ok(None)` at end of stream.
    fn next_frame(&mut self) -> Result<Option<DetectorFrame>, CaptureError>;
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn next_frame(&mut self) -> Result<Option<DetectorFrame>, CaptureError> {
        (**self).next_frame()
    }
}

/// Counts consecutive capture failures, logging every
/// `report_every` of them.
#[derive(Debug)]
pub struct CaptureHealth {
    consecutive: u64,
    total: u64,
    report_every: u64,
}

impl Default for CaptureHealth {
    fn default() -> Self {
        Self::new(100)
    }
}

impl CaptureHealth {
    pub fn new(report_every: u64) -> Self {
        Self {
            consecutive: 0,
            total: 0,
            report_every: report_every.max(1),
        }
    }

    pub fn record_ok(&mut self) {
        self.consecutive = 0;
    }

    /// Record a skipped frame.  Returns true when a report was logged.
    pub fn record_failure(&mut self, err: &CaptureError) -> bool {
        self.consecutive += 1;
        self.total += 1;
        if self.consecutive % self.report_every == 0 {
            warn!(
                "{} consecutive frames skipped (last: {})",
                self.consecutive, err
            );
            true
        } else {
            false
        }
    }

    pub fn total(&self) -> u64 {
        self.total
    }
}
