//! Gesture tracking core: landmark normalization, gesture primitives,
//! cursor mapping, and the action channels.
//!
//! Provides:
//! - `landmarks`: keypoint model and role assignment
//! - `classifier`: per-frame pinch/finger/target primitives
//! - `cursor`: smoothed camera-to-screen mapping
//! - `channels`: click, right-click, scroll, and activation state machines
//! - `engine`: per-pipeline wiring of the above

pub mod channels;
pub mod classifier;
pub mod cursor;
pub mod engine;
pub mod landmarks;

pub use channels::{ActionEvent, ActivationConfig, ChannelConfig};
pub use classifier::HoverConfig;
pub use cursor::CursorConfig;
pub use engine::{ButtonLayout, MenuConfig, MenuEngine, PointerEngine};
pub use landmarks::{DetectedHand, RoleMapping};
