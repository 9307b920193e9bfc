//! Hand keypoint definitions, role assignment, and per-frame normalization.
//!
//! Models the 21 keypoints per hand emitted by the landmark detector and
//! turns one frame of raw detector output into at most one observation per
//! role.  Malformed hands are dropped, never reported as errors.

use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, trace};

// ── Keypoint definitions ───────────────────────────────────

/// The 21 hand keypoints, in detector order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Keypoint {
    Wrist,
    ThumbCmc,
    ThumbMcp,
    ThumbIp,
    ThumbTip,
    IndexMcp,
    IndexPip,
    IndexDip,
    IndexTip,
    MiddleMcp,
    MiddlePip,
    MiddleDip,
    MiddleTip,
    RingMcp,
    RingPip,
    RingDip,
    RingTip,
    PinkyMcp,
    PinkyPip,
    PinkyDip,
    PinkyTip,
}

/// Total number of keypoints per hand.
pub const KEYPOINT_COUNT: usize = 21;

impl Keypoint {
    /// Convert keypoint enum to array index (0-20).
    pub fn index(&self) -> usize {
        *self as usize
    }
}

// ── Roles ──────────────────────────────────────────────────

/// Logical identity of a detected hand for one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandRole {
    /// Drives the cursor, clicks, and scrolling.
    Primary,
    /// Right-click hand; cursor fallback when the primary is absent.
    Secondary,
}

impl HandRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Secondary => "secondary",
        }
    }
}

/// Mapping from detector handedness labels to roles.
///
/// A label matching `primary_label` (ASCII case-insensitive) is the primary
/// hand; any other label, including unknown ones, is the secondary hand.
/// `swap` exchanges the two, for cameras that do not mirror the image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleMapping {
    pub primary_label: String,
    pub swap: bool,
}

impl Default for RoleMapping {
    fn default() -> Self {
        Self {
            primary_label: "Right".to_string(),
            swap: false,
        }
    }
}

impl RoleMapping {
    /// Role assigned to a detector label.
    pub fn role_for(&self, label: &str) -> HandRole {
        let is_primary = label.eq_ignore_ascii_case(&self.primary_label);
        match (is_primary, self.swap) {
            (true, false) | (false, true) => HandRole::Primary,
            (true, true) | (false, false) => HandRole::Secondary,
        }
    }

    pub fn describe(&self) -> String {
        format!(
            "label {:?} -> {}, other labels -> {}",
            self.primary_label,
            self.role_for(&self.primary_label).as_str(),
            if self.swap { "primary" } else { "secondary" },
        )
    }
}

// ── Detector output ────────────────────────────────────────

/// One hand as reported by the detector, before normalization.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DetectedHand {
    /// Handedness label, e.g. "Left" or "Right".
    pub label: String,
    /// Keypoints in pixel coordinates, detector order.
    pub keypoints: Vec<[f32; 2]>,
}

// ── Observations ───────────────────────────────────────────

/// A normalized hand for the current frame.
#[derive(Debug, Clone, PartialEq)]
pub struct HandObservation {
    pub role: HandRole,
    /// 21 keypoints indexed by `Keypoint`.
    pub keypoints: [[f32; 2]; KEYPOINT_COUNT],
    /// Time the frame was observed, relative to pipeline start.
    pub timestamp: Duration,
}

impl HandObservation {
    /// Pixel position of a keypoint.
    pub fn keypoint(&self, keypoint: Keypoint) -> [f32; 2] {
        self.keypoints[keypoint.index()]
    }

    /// Euclidean distance between two keypoints of this hand (pixels).
    pub fn distance(&self, a: Keypoint, b: Keypoint) -> f32 {
        keypoint_distance(&self.keypoint(a), &self.keypoint(b))
    }
}

/// The hands present in one frame, at most one per role.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HandSet {
    pub primary: Option<HandObservation>,
    pub secondary: Option<HandObservation>,
}

impl HandSet {
    fn slot_mut(&mut self, role: HandRole) -> &mut Option<HandObservation> {
        match role {
            HandRole::Primary => &mut self.primary,
            HandRole::Secondary => &mut self.secondary,
        }
    }

    /// The hand that drives the pointer: primary, else secondary.
    pub fn control_hand(&self) -> Option<&HandObservation> {
        self.primary.as_ref().or(self.secondary.as_ref())
    }

    pub fn len(&self) -> usize {
        self.primary.is_some() as usize + self.secondary.is_some() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ── Normalizer ─────────────────────────────────────────────

/// Turns raw detector output into a `HandSet`.
#[derive(Debug, Clone, Default)]
pub struct LandmarkNormalizer {
    pub mapping: RoleMapping,
}

impl LandmarkNormalizer {
    pub fn new(mapping: RoleMapping) -> Self {
        Self { mapping }
    }

    /// Normalize one frame of detector output.
    ///
    /// Hands with fewer than 21 keypoints are dropped.  A role seen twice
    /// keeps the later hand.
    pub fn normalize(&self, hands: &[DetectedHand], timestamp: Duration) -> HandSet {
        let mut set = HandSet::default();

        for hand in hands {
            if hand.keypoints.len() < KEYPOINT_COUNT {
                debug!(
                    "Dropping hand {:?}: expected {} keypoints, got {}",
                    hand.label,
                    KEYPOINT_COUNT,
                    hand.keypoints.len(),
                );
                continue;
            }

            let mut keypoints = [[0.0; 2]; KEYPOINT_COUNT];
            keypoints.copy_from_slice(&hand.keypoints[..KEYPOINT_COUNT]);

            let role = self.mapping.role_for(&hand.label);
            let slot = set.slot_mut(role);
            if slot.is_some() {
                trace!("Role {} seen twice this frame, keeping the later hand", role.as_str());
            }
            *slot = Some(HandObservation {
                role,
                keypoints,
                timestamp,
            });
        }

        set
    }
}

/// Euclidean distance between two pixel positions.
pub fn keypoint_distance(a: &[f32; 2], b: &[f32; 2]) -> f32 {
    let dx = b[0] - a[0];
    let dy = b[1] - a[1];
    (dx * dx + dy * dy).sqrt()
}

// ── Test helpers ───────────────────────────────────────────

/// A detected hand with every keypoint at the origin.
#[cfg(test)]
pub(crate) fn make_detected(label: &str) -> DetectedHand {
    DetectedHand {
        label: label.to_string(),
        keypoints: vec![[0.0, 0.0]; KEYPOINT_COUNT],
    }
}

/// An observation with every keypoint at the origin.
#[cfg(test)]
pub(crate) fn make_observation(role: HandRole, timestamp_s: f64) -> HandObservation {
    HandObservation {
        role,
        keypoints: [[0.0, 0.0]; KEYPOINT_COUNT],
        timestamp: Duration::from_secs_f64(timestamp_s),
    }
}

// ── Tests ──────────────────────────────────────────────────
