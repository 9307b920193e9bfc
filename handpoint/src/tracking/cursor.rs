//! Camera-space to screen-space cursor mapping with low-pass smoothing.
//!
//! The smoothed position is the only motion memory in the engine.  It is
//! kept in floating point so the first-order filter converges exactly;
//! only the emitted event is rounded to whole pixels.

use tracing::trace;

/// Configuration for cursor mapping.
#[derive(Debug, Clone, PartialEq)]
pub struct CursorConfig {
    /// Dead border (pixels) ignored on every side of the camera frame.
    pub margin_px: f32,
    /// Low-pass factor in (0, 1]: 1.0 follows the target exactly.
    pub smoothing: f32,
    /// Screen width in pixels.
    pub screen_width: u32,
    /// Screen height in pixels.
    pub screen_height: u32,
}

impl Default for CursorConfig {
    fn default() -> Self {
        Self {
            margin_px: 40.0,
            smoothing: 0.5,
            screen_width: 1920,
            screen_height: 1080,
        }
    }
}

/// Persistent cursor memory.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CursorState {
    /// Smoothed screen position (x, y).
    pub smoothed: [f64; 2],
}

/// Maps a control keypoint to a smoothed, clamped screen position.
#[derive(Debug, Clone)]
pub struct CursorMapper {
    pub config: CursorConfig,
    state: CursorState,
}

impl CursorMapper {
    pub fn new(config: CursorConfig) -> Self {
        Self {
            config,
            state: CursorState::default(),
        }
    }

    /// Current smoothed position.
    pub fn position(&self) -> [f64; 2] {
        self.state.smoothed
    }

    /// Current smoothed position rounded to whole pixels.
    pub fn pixel(&self) -> [i32; 2] {
        [
            self.state.smoothed[0].round() as i32,
            self.state.smoothed[1].round() as i32,
        ]
    }

    /// Unsmoothed screen target for a raw camera keypoint.
    ///
    /// `frame_size` is the camera frame (width, height) in pixels.
    pub fn target(&self, raw: [f32; 2], frame_size: (u32, u32)) -> [f64; 2] {
        let margin = self.config.margin_px as f64;
        let frame = [frame_size.0 as f64, frame_size.1 as f64];
        let screen = [
            self.config.screen_width as f64,
            self.config.screen_height as f64,
        ];

        let mut out = [0.0; 2];
        for axis in 0..2 {
            let usable = (frame[axis] - 2.0 * margin).max(1.0);
            let ratio = ((raw[axis] as f64 - margin) / usable).clamp(0.0, 1.0);
            let max_px = (screen[axis] - 1.0).max(0.0);
            out[axis] = (screen[axis] * ratio).clamp(0.0, max_px);
        }
        out
    }

    /// Feed one control keypoint; returns the new cursor pixel.
    pub fn update(&mut self, raw: [f32; 2], frame_size: (u32, u32)) -> [i32; 2] {
        let target = self.target(raw, frame_size);
        let factor = self.config.smoothing as f64;
        let prev = self.state.smoothed;

        self.state.smoothed = [
            prev[0] + (target[0] - prev[0]) * factor,
            prev[1] + (target[1] - prev[1]) * factor,
        ];

        trace!(
            raw_x = raw[0],
            raw_y = raw[1],
            x = self.state.smoothed[0],
            y = self.state.smoothed[1],
            "cursor update"
        );
        self.pixel()
    }

    pub fn status_sexp(&self) -> String {
        let [x, y] = self.position();
        format!(
            "(:x {:.1} :y {:.1} :smoothing {:.2} :margin {:.0} :screen ({} {}))",
            x,
            y,
            self.config.smoothing,
            self.config.margin_px,
            self.config.screen_width,
            self.config.screen_height,
        )
    }
}

// ── Tests ──────────────────────────────────────────────────
