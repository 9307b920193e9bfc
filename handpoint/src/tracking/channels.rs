//! Action channels: time-based interpretation of gesture primitives.
//!
//! Each channel owns its own pinch session and cooldown and turns the
//! per-frame `GestureFrame` stream into discrete or continuous action
//! events.  Channels never fail: a missing hand abandons any open pinch
//! without emitting anything, and a malformed frame holds current state.

use std::time::Duration;

use tracing::debug;

use super::classifier::GestureFrame;

// ── Events ─────────────────────────────────────────────────

/// Events emitted by the engine towards the effector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionEvent {
    /// Move the pointer to an absolute screen pixel.
    CursorMove { x: i32, y: i32 },
    Click,
    DoubleClick,
    RightClick,
    /// Scroll up by a fixed number of wheel units.
    ScrollUp(i32),
    /// Scroll down by a fixed number of wheel units.
    ScrollDown(i32),
    /// The launch button was pressed.
    Activate,
}

impl ActionEvent {
    /// String representation for logs and the event stream.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CursorMove { .. } => "cursor-move",
            Self::Click => "click",
            Self::DoubleClick => "double-click",
            Self::RightClick => "right-click",
            Self::ScrollUp(_) => "scroll-up",
            Self::ScrollDown(_) => "scroll-down",
            Self::Activate => "activate",
        }
    }
}

// ── Config ─────────────────────────────────────────────────

/// Thresholds for the pointer-control channels.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelConfig {
    /// Pinch distance (pixels) below which thumb and index count as joined.
    pub click_threshold_px: f32,
    /// Holds shorter than this are a click, longer a double-click.
    pub double_click_boundary: Duration,
    /// Minimum time between repeated right-clicks.
    pub right_click_cooldown: Duration,
    /// Wheel units per scroll event.
    pub scroll_amount: i32,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            click_threshold_px: 40.0,
            double_click_boundary: Duration::from_millis(500),
            right_click_cooldown: Duration::from_millis(300),
            scroll_amount: 60,
        }
    }
}

/// Thresholds for the launch-button channel.
#[derive(Debug, Clone, PartialEq)]
pub struct ActivationConfig {
    /// Pinch distance (pixels) below which the button is being pressed.
    pub threshold_px: f32,
    /// Minimum time between activations.
    pub cooldown: Duration,
}

impl Default for ActivationConfig {
    fn default() -> Self {
        Self {
            threshold_px: 40.0,
            cooldown: Duration::from_millis(450),
        }
    }
}

// ── Pinch session ──────────────────────────────────────────

/// Edge-tracking state of one pinch channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PinchSession {
    #[default]
    Idle,
    /// Thumb and index joined since `start`.
    Pinching { start: Duration },
}

impl PinchSession {
    /// Advance with this frame's pinch state.  Returns the hold duration on
    /// the Pinching -> Idle edge, nothing otherwise.
    pub fn update(&mut self, joined: bool, now: Duration) -> Option<Duration> {
        match (*self, joined) {
            (Self::Idle, true) => {
                *self = Self::Pinching { start: now };
                None
            }
            (Self::Pinching { start }, false) => {
                *self = Self::Idle;
                Some(now.saturating_sub(start))
            }
            _ => None,
        }
    }

    /// Drop an open session without producing a release.
    pub fn abandon(&mut self) -> bool {
        let was_pinching = self.is_pinching();
        *self = Self::Idle;
        was_pinching
    }

    pub fn is_pinching(&self) -> bool {
        matches!(self, Self::Pinching { .. })
    }
}

// ── Cooldown ───────────────────────────────────────────────

/// Minimum spacing between firings of one channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CooldownTimer {
    pub cooldown: Duration,
    last_fire: Option<Duration>,
}

impl CooldownTimer {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            last_fire: None,
        }
    }

    /// Whether the channel may fire at `now`.  A timer that never fired is
    /// always ready.
    pub fn ready(&self, now: Duration) -> bool {
        match self.last_fire {
            Some(last) => now.saturating_sub(last) >= self.cooldown,
            None => true,
        }
    }

    pub fn fire(&mut self, now: Duration) {
        self.last_fire = Some(now);
    }

}

/// Whether a frame carries usable pinch data.
fn usable(frame: &GestureFrame) -> bool {
    frame.pinch_distance.is_finite()
}

// ── Primary pinch: click / double-click ────────────────────

/// Click on a short pinch, double-click on a long one, decided at release.
#[derive(Debug, Clone)]
pub struct PrimaryPinchChannel {
    threshold_px: f32,
    double_click_boundary: Duration,
    session: PinchSession,
}

impl PrimaryPinchChannel {
    pub fn new(config: &ChannelConfig) -> Self {
        Self {
            threshold_px: config.click_threshold_px,
            double_click_boundary: config.double_click_boundary,
            session: PinchSession::Idle,
        }
    }

    /// `frame` is `None` when the controlling hand is not observed.
    pub fn update(&mut self, frame: Option<&GestureFrame>, now: Duration) -> Option<ActionEvent> {
        let Some(frame) = frame else {
            if self.session.abandon() {
                debug!("Primary pinch abandoned: hand lost");
            }
            return None;
        };
        if !usable(frame) {
            return None;
        }

        let joined = frame.pinch_distance < self.threshold_px;
        let held = self.session.update(joined, now)?;

        let event = if held < self.double_click_boundary {
            ActionEvent::Click
        } else {
            ActionEvent::DoubleClick
        };
        debug!("Primary pinch released after {:?}: {}", held, event.as_str());
        Some(event)
    }

    pub fn session(&self) -> PinchSession {
        self.session
    }
}

// ── Secondary pinch: right-click ───────────────────────────

/// Right-click on every pinched frame, rate limited by a cooldown.
#[derive(Debug, Clone)]
pub struct SecondaryPinchChannel {
    threshold_px: f32,
    cooldown: CooldownTimer,
}

impl SecondaryPinchChannel {
    pub fn new(config: &ChannelConfig) -> Self {
        Self {
            threshold_px: config.click_threshold_px,
            cooldown: CooldownTimer::new(config.right_click_cooldown),
        }
    }

    pub fn update(&mut self, frame: Option<&GestureFrame>, now: Duration) -> Option<ActionEvent> {
        let frame = frame.filter(|f| usable(f))?;
        if frame.pinch_distance < self.threshold_px && self.cooldown.ready(now) {
            self.cooldown.fire(now);
            debug!("Secondary pinch: right-click");
            return Some(ActionEvent::RightClick);
        }
        None
    }

}

// ── Scroll ─────────────────────────────────────────────────

/// Scroll up with three fingers raised, down with three curled.
#[derive(Debug, Clone)]
pub struct ScrollChannel {
    amount: i32,
}

impl ScrollChannel {
    pub fn new(config: &ChannelConfig) -> Self {
        Self {
            amount: config.scroll_amount,
        }
    }

    pub fn update(&mut self, frame: Option<&GestureFrame>) -> Option<ActionEvent> {
        let frame = frame?;
        if frame.three_up() {
            Some(ActionEvent::ScrollUp(self.amount))
        } else if frame.three_down() {
            Some(ActionEvent::ScrollDown(self.amount))
        } else {
            None
        }
    }
}

// ── Activation ─────────────────────────────────────────────

/// Axis-aligned rectangle in camera-frame pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TargetRect {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl TargetRect {
    /// Strict containment; the border itself is outside.
    pub fn contains(&self, point: [f32; 2]) -> bool {
        self.x1 < point[0] && point[0] < self.x2 && self.y1 < point[1] && point[1] < self.y2
    }

    pub fn center(&self) -> [f32; 2] {
        [(self.x1 + self.x2) / 2.0, (self.y1 + self.y2) / 2.0]
    }
}

/// Launch-button press: pinch released over the target, with its own
/// cooldown.  Releases elsewhere are absorbed without an event.
#[derive(Debug, Clone)]
pub struct ActivationChannel {
    threshold_px: f32,
    session: PinchSession,
    cooldown: CooldownTimer,
}

impl ActivationChannel {
    pub fn new(config: &ActivationConfig) -> Self {
        Self {
            threshold_px: config.threshold_px,
            session: PinchSession::Idle,
            cooldown: CooldownTimer::new(config.cooldown),
        }
    }

    /// `hand` carries the frame's primitives and the cursor position
    /// (camera pixels), or `None` when no hand is observed.
    pub fn update(
        &mut self,
        hand: Option<(&GestureFrame, [f32; 2])>,
        target: &TargetRect,
        now: Duration,
    ) -> Option<ActionEvent> {
        let Some((frame, cursor)) = hand else {
            if self.session.abandon() {
                debug!("Activation pinch abandoned: hand lost");
            }
            return None;
        };
        if !usable(frame) {
            return None;
        }

        let joined = frame.pinch_distance < self.threshold_px;
        self.session.update(joined, now)?;

        if !target.contains(cursor) {
            debug!("Activation release outside target at ({:.0}, {:.0})", cursor[0], cursor[1]);
            return None;
        }
        if !self.cooldown.ready(now) {
            debug!("Activation release during cooldown");
            return None;
        }
        self.cooldown.fire(now);
        debug!("Activation fired");
        Some(ActionEvent::Activate)
    }

    pub fn session(&self) -> PinchSession {
        self.session
    }
}

// ── Test helpers ───────────────────────────────────────────

#[cfg(test)]
pub(crate) fn frame_with_pinch(pinch_distance: f32) -> GestureFrame {
    GestureFrame {
        pinch_distance,
        finger_up: [false, true, false, true, false],
        target_distance: None,
    }
}

#[cfg(test)]
fn secs(s: f64) -> Duration {
    Duration::from_secs_f64(s)
}

// ── Tests ──────────────────────────────────────────────────
