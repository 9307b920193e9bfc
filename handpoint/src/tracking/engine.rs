//! Per-frame gesture engines for the two pipelines.
//!
//! `PointerEngine` drives the cursor plus click, right-click and scroll
//! channels.  `MenuEngine` drives the launch button.  Both own all of their
//! persistent state and are fed one detector frame at a time.

use std::time::Duration;

use tracing::trace;

use super::channels::{
    ActionEvent, ActivationChannel, ActivationConfig, ChannelConfig, PrimaryPinchChannel,
    ScrollChannel, SecondaryPinchChannel, TargetRect,
};
use super::classifier::{classify, classify_with_target, HoverConfig};
use super::cursor::{CursorConfig, CursorMapper};
use super::landmarks::{DetectedHand, HandRole, HandSet, Keypoint, LandmarkNormalizer, RoleMapping};

// ── Pointer ────────────────────────────────────────────────

/// Cursor and click/scroll interpretation for the pointer pipeline.
pub struct PointerEngine {
    normalizer: LandmarkNormalizer,
    cursor: CursorMapper,
    primary: PrimaryPinchChannel,
    secondary: SecondaryPinchChannel,
    scroll: ScrollChannel,
    /// Frames processed so far.
    frames: u64,
    /// Frames with no hand at all.
    empty_frames: u64,
}

impl PointerEngine {
    pub fn new(mapping: RoleMapping, cursor: CursorConfig, channels: &ChannelConfig) -> Self {
        Self {
            normalizer: LandmarkNormalizer::new(mapping),
            cursor: CursorMapper::new(cursor),
            primary: PrimaryPinchChannel::new(channels),
            secondary: SecondaryPinchChannel::new(channels),
            scroll: ScrollChannel::new(channels),
            frames: 0,
            empty_frames: 0,
        }
    }

    /// Process one detector frame and return the events to dispatch, in
    /// order: cursor move, click, scroll, right-click.
    pub fn process(
        &mut self,
        hands: &[DetectedHand],
        frame_size: (u32, u32),
        now: Duration,
    ) -> Vec<ActionEvent> {
        self.frames += 1;
        let set = self.normalizer.normalize(hands, now);
        if set.is_empty() {
            self.empty_frames += 1;
        }
        self.process_hands(&set, frame_size, now)
    }

    fn process_hands(&mut self, set: &HandSet, frame_size: (u32, u32), now: Duration) -> Vec<ActionEvent> {
        let mut events = Vec::new();

        if let Some(control) = set.control_hand() {
            let [x, y] = self
                .cursor
                .update(control.keypoint(Keypoint::IndexTip), frame_size);
            events.push(ActionEvent::CursorMove { x, y });
        }

        let primary = set.primary.as_ref().map(classify);
        events.extend(self.primary.update(primary.as_ref(), now));
        events.extend(self.scroll.update(primary.as_ref()));

        let secondary = set.secondary.as_ref().map(classify);
        events.extend(self.secondary.update(secondary.as_ref(), now));

        trace!(hands = set.len(), events = events.len(), "pointer frame");
        events
    }

    /// Generate s-expression for status logging.
    pub fn status_sexp(&self) -> String {
        format!(
            "(:frames {} :empty-frames {} :cursor {} :pinching {})",
            self.frames,
            self.empty_frames,
            self.cursor.status_sexp(),
            if self.primary.session().is_pinching() { "t" } else { "nil" },
        )
    }
}

// ── Menu ───────────────────────────────────────────────────

/// Launch button placement, as fractions of the camera frame.
#[derive(Debug, Clone, PartialEq)]
pub struct ButtonLayout {
    pub center_x: f32,
    pub center_y: f32,
    pub width: f32,
    pub height: f32,
}

impl Default for ButtonLayout {
    fn default() -> Self {
        Self {
            center_x: 0.5,
            center_y: 0.57,
            width: 0.32,
            height: 0.12,
        }
    }
}

impl ButtonLayout {
    /// Button rectangle in pixels for a frame of the given size.
    pub fn rect(&self, frame_size: (u32, u32)) -> TargetRect {
        let (w, h) = (frame_size.0 as f32, frame_size.1 as f32);
        let (cx, cy) = (w * self.center_x, h * self.center_y);
        let (half_w, half_h) = (w * self.width / 2.0, h * self.height / 2.0);
        TargetRect {
            x1: cx - half_w,
            y1: cy - half_h,
            x2: cx + half_w,
            y2: cy + half_h,
        }
    }
}

/// Configuration for the launch menu.
#[derive(Debug, Clone, PartialEq)]
pub struct MenuConfig {
    pub activation: ActivationConfig,
    pub hover: HoverConfig,
    pub button: ButtonLayout,
    /// Frames keep draining for this long after activation.
    pub transition: Duration,
}

impl Default for MenuConfig {
    fn default() -> Self {
        Self {
            activation: ActivationConfig::default(),
            hover: HoverConfig::default(),
            button: ButtonLayout::default(),
            transition: Duration::from_millis(1200),
        }
    }
}

/// Result of one menu frame.
#[derive(Debug, Clone, PartialEq)]
pub struct MenuFrame {
    pub events: Vec<ActionEvent>,
    /// Hover feedback in 0..1; zero with no hand.
    pub hover: f32,
    /// Pinch distance of the tracked hand, if any.
    pub pinch_distance: Option<f32>,
}

/// Launch-button interpretation for the menu pipeline.
pub struct MenuEngine {
    normalizer: LandmarkNormalizer,
    pub config: MenuConfig,
    activation: ActivationChannel,
    /// Role of the hand that opened the current pinch session.
    pinch_role: Option<HandRole>,
    frames: u64,
}

impl MenuEngine {
    pub fn new(mapping: RoleMapping, config: MenuConfig) -> Self {
        let activation = ActivationChannel::new(&config.activation);
        Self {
            normalizer: LandmarkNormalizer::new(mapping),
            config,
            activation,
            pinch_role: None,
            frames: 0,
        }
    }

    pub fn process(
        &mut self,
        hands: &[DetectedHand],
        frame_size: (u32, u32),
        now: Duration,
    ) -> MenuFrame {
        self.frames += 1;
        let set = self.normalizer.normalize(hands, now);
        let rect = self.config.button.rect(frame_size);

        // A session belongs to the hand that opened it: if that hand is gone
        // or no longer in control, abandon before reading another hand.
        if let Some(role) = self.pinch_role {
            if set.control_hand().map(|h| h.role) != Some(role) {
                self.activation.update(None, &rect, now);
                self.pinch_role = None;
            }
        }

        let Some(hand) = set.control_hand() else {
            let events = self.activation.update(None, &rect, now).into_iter().collect();
            return MenuFrame {
                events,
                hover: 0.0,
                pinch_distance: None,
            };
        };

        let gesture = classify_with_target(hand, rect.center());
        let hover = gesture
            .target_distance
            .map(|d| self.config.hover.intensity(d))
            .unwrap_or(0.0);
        let cursor = hand.keypoint(Keypoint::IndexTip);

        let events = self
            .activation
            .update(Some((&gesture, cursor)), &rect, now)
            .into_iter()
            .collect();
        self.pinch_role = self.activation.session().is_pinching().then_some(hand.role);

        trace!(t = ?hand.timestamp, hover, pinch = gesture.pinch_distance, "menu frame");
        MenuFrame {
            events,
            hover,
            pinch_distance: Some(gesture.pinch_distance),
        }
    }

    pub fn status_sexp(&self) -> String {
        format!(
            "(:frames {} :pinching {})",
            self.frames,
            if self.activation.session().is_pinching() { "t" } else { "nil" },
        )
    }
}

/// A hand with thumb and index tips at the given positions and the
/// other fingers neither all up nor all down.
#[cfg(test)]
pub(crate) fn make_hand(label: &str, thumb: [f32; 2], index: [f32; 2]) -> DetectedHand {
    let mut h = super::landmarks::make_detected(label);
    h.keypoints[Keypoint::ThumbTip.index()] = thumb;
    h.keypoints[Keypoint::IndexTip.index()] = index;
    // Index tip is above its PIP only if index[1] < 300.
    h.keypoints[Keypoint::IndexPip.index()] = [index[0], 300.0];
    // Middle up, ring down: never a scroll pattern.
    h.keypoints[Keypoint::MiddleTip.index()] = [0.0, 100.0];
    h.keypoints[Keypoint::MiddlePip.index()] = [0.0, 200.0];
    h.keypoints[Keypoint::RingTip.index()] = [0.0, 250.0];
    h.keypoints[Keypoint::RingPip.index()] = [0.0, 200.0];
    h
}

// ── Tests ──────────────────────────────────────────────────
