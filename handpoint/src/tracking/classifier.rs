//! Frame-local gesture primitives from one hand's keypoints.
//!
//! Computes pinch distance, per-finger extension flags, and proximity to a
//! UI target.  Stateless: everything here is recomputed every frame and the
//! time-based interpretation lives in `channels`.

use super::landmarks::{keypoint_distance, HandObservation, Keypoint};

// ── Fingers ────────────────────────────────────────────────

/// Finger index into `GestureFrame::finger_up`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Finger {
    Thumb,
    Index,
    Middle,
    Ring,
    Pinky,
}

impl Finger {
    pub fn index(&self) -> usize {
        *self as usize
    }
}

/// (tip, mid joint) pairs compared vertically for the four non-thumb fingers.
const FINGER_JOINTS: [(Finger, Keypoint, Keypoint); 4] = [
    (Finger::Index, Keypoint::IndexTip, Keypoint::IndexPip),
    (Finger::Middle, Keypoint::MiddleTip, Keypoint::MiddlePip),
    (Finger::Ring, Keypoint::RingTip, Keypoint::RingPip),
    (Finger::Pinky, Keypoint::PinkyTip, Keypoint::PinkyPip),
];

// ── Gesture frame ──────────────────────────────────────────

/// Geometric primitives derived from one hand in one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct GestureFrame {
    /// Thumb tip to index tip distance (pixels).
    pub pinch_distance: f32,
    /// Extension flags, indexed by `Finger`.
    pub finger_up: [bool; 5],
    /// Index tip to target center distance (pixels), activation only.
    pub target_distance: Option<f32>,
}

impl GestureFrame {
    pub fn is_up(&self, finger: Finger) -> bool {
        self.finger_up[finger.index()]
    }

    /// Index, middle and ring all extended.
    pub fn three_up(&self) -> bool {
        self.is_up(Finger::Index) && self.is_up(Finger::Middle) && self.is_up(Finger::Ring)
    }

    /// Index, middle and ring all curled.
    pub fn three_down(&self) -> bool {
        !self.is_up(Finger::Index) && !self.is_up(Finger::Middle) && !self.is_up(Finger::Ring)
    }
}

/// Compute the gesture primitives of one hand.
pub fn classify(hand: &HandObservation) -> GestureFrame {
    let pinch_distance = hand.distance(Keypoint::ThumbTip, Keypoint::IndexTip);

    let mut finger_up = [false; 5];

    // Thumb: only meaningful for the canonical (mirrored, palm-forward)
    // orientation.
    finger_up[Finger::Thumb.index()] =
        hand.keypoint(Keypoint::ThumbTip)[0] < hand.keypoint(Keypoint::ThumbIp)[0];

    // Image y grows downward, so "above" is numerically smaller.
    for (finger, tip, pip) in FINGER_JOINTS {
        finger_up[finger.index()] = hand.keypoint(tip)[1] < hand.keypoint(pip)[1];
    }

    GestureFrame {
        pinch_distance,
        finger_up,
        target_distance: None,
    }
}

/// Compute the gesture primitives plus the index tip's distance to a target.
pub fn classify_with_target(hand: &HandObservation, target_center: [f32; 2]) -> GestureFrame {
    let mut frame = classify(hand);
    frame.target_distance = Some(keypoint_distance(
        &hand.keypoint(Keypoint::IndexTip),
        &target_center,
    ));
    frame
}

// ── Hover ──────────────────────────────────────────────────

/// Falloff for the hover feedback signal.
#[derive(Debug, Clone, PartialEq)]
pub struct HoverConfig {
    /// Distance (pixels) at which intensity reaches zero.
    pub max_distance_px: f32,
    /// Distance span (pixels) over which intensity ramps from 0 to 1.
    pub range_px: f32,
}

impl Default for HoverConfig {
    fn default() -> Self {
        Self {
            max_distance_px: 260.0,
            range_px: 200.0,
        }
    }
}

impl HoverConfig {
    /// Continuous 0..1 proximity signal for visual feedback.
    pub fn intensity(&self, target_distance: f32) -> f32 {
        let range = self.range_px.max(f32::EPSILON);
        ((self.max_distance_px - target_distance) / range).clamp(0.0, 1.0)
    }
}

// ── Tests ──────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracking::landmarks::{make_observation, HandRole};

    fn set(hand: &mut HandObservation, keypoint: Keypoint, x: f32, y: f32) {
        hand.keypoints[keypoint.index()] = [x, y];
    }

    /// A hand with all four fingers pointing up and the thumb tucked.
    fn open_hand() -> HandObservation {
        let mut hand = make_observation(HandRole::Primary, 0.0);
        set(&mut hand, Keypoint::ThumbIp, 90.0, 200.0);
        set(&mut hand, Keypoint::ThumbTip, 100.0, 200.0);
        for (_, tip, pip) in FINGER_JOINTS {
            set(&mut hand, pip, 0.0, 150.0);
            set(&mut hand, tip, 0.0, 100.0);
        }
        hand
    }

    #[test]
    fn test_pinch_distance() {
        let mut hand = make_observation(HandRole::Primary, 0.0);
        set(&mut hand, Keypoint::ThumbTip, 100.0, 100.0);
        set(&mut hand, Keypoint::IndexTip, 120.0, 100.0);

        let frame = classify(&hand);
        assert!((frame.pinch_distance - 20.0).abs() < 0.001);
        assert!(frame.target_distance.is_none());
    }

    #[test]
    fn test_fingers_up() {
        let frame = classify(&open_hand());
        assert!(!frame.is_up(Finger::Thumb));
        assert!(frame.is_up(Finger::Index));
        assert!(frame.is_up(Finger::Middle));
        assert!(frame.is_up(Finger::Ring));
        assert!(frame.is_up(Finger::Pinky));
        assert!(frame.three_up());
        assert!(!frame.three_down());
    }

    #[test]
    fn test_fingers_down() {
        let mut hand = open_hand();
        for (_, tip, _) in FINGER_JOINTS {
            set(&mut hand, tip, 0.0, 180.0);
        }
        let frame = classify(&hand);
        assert!(frame.three_down());
        assert!(!frame.three_up());
        assert!(!frame.is_up(Finger::Pinky));
    }

    #[test]
    fn test_mixed_fingers_neither_pattern() {
        let mut hand = open_hand();
        set(&mut hand, Keypoint::MiddleTip, 0.0, 180.0);
        let frame = classify(&hand);
        assert!(!frame.three_up());
        assert!(!frame.three_down());
    }

    #[test]
    fn test_thumb_up_heuristic() {
        let mut hand = open_hand();
        set(&mut hand, Keypoint::ThumbTip, 60.0, 200.0);
        let frame = classify(&hand);
        assert!(frame.is_up(Finger::Thumb));
    }

    #[test]
    fn test_level_tip_is_not_up() {
        let mut hand = open_hand();
        set(&mut hand, Keypoint::IndexTip, 0.0, 150.0);
        let frame = classify(&hand);
        assert!(!frame.is_up(Finger::Index));
    }

    #[test]
    fn test_target_distance() {
        let mut hand = make_observation(HandRole::Primary, 0.0);
        set(&mut hand, Keypoint::IndexTip, 300.0, 400.0);

        let frame = classify_with_target(&hand, [0.0, 0.0]);
        let dist = frame.target_distance.unwrap();
        assert!((dist - 500.0).abs() < 0.01, "Expected 500, got {}", dist);
    }

    #[test]
    fn test_hover_intensity_range() {
        let hover = HoverConfig::default();
        assert_eq!(hover.intensity(0.0), 1.0);
        assert_eq!(hover.intensity(60.0), 1.0);
        assert!((hover.intensity(160.0) - 0.5).abs() < 0.001);
        assert_eq!(hover.intensity(260.0), 0.0);
        assert_eq!(hover.intensity(1000.0), 0.0);
    }

    #[test]
    fn test_finger_index() {
        assert_eq!(Finger::Thumb.index(), 0);
        assert_eq!(Finger::Ring.index(), 3);
    }
}
