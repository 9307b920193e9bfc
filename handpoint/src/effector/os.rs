//! OS pointer injection through enigo.

use enigo::{Axis, Button, Coordinate, Direction, Enigo, Mouse, Settings};
use tracing::info;

use super::{Effector, EffectorError};
use crate::tracking::ActionEvent;

/// Moves the real pointer and injects clicks and wheel events.
pub struct OsEffector {
    enigo: Enigo,
}

impl OsEffector {
    pub fn new() -> anyhow::Result<Self> {
        let enigo = Enigo::new(&Settings::default())
            .map_err(|e| anyhow::anyhow!("failed to connect to the input backend: {:?}", e))?;
        let effector = Self { enigo };
        match effector.display_size() {
            Some((w, h)) => info!("OS input effector ready, display {}x{}", w, h),
            None => info!("OS input effector ready, display size unknown"),
        }
        Ok(effector)
    }

    fn click(&mut self, button: Button) -> Result<(), EffectorError> {
        self.enigo
            .button(button, Direction::Click)
            .map_err(|e| EffectorError::Rejected(format!("{:?}", e)))
    }

    fn scroll(&mut self, amount: i32) -> Result<(), EffectorError> {
        self.enigo
            .scroll(amount, Axis::Vertical)
            .map_err(|e| EffectorError::Rejected(format!("{:?}", e)))
    }
}

impl Effector for OsEffector {
    fn name(&self) -> &'static str {
        "os"
    }

    fn perform(&mut self, event: &ActionEvent) -> Result<(), EffectorError> {
        match *event {
            ActionEvent::CursorMove { x, y } => self
                .enigo
                .move_mouse(x, y, Coordinate::Abs)
                .map_err(|e| EffectorError::Rejected(format!("{:?}", e))),
            ActionEvent::Click => self.click(Button::Left),
            ActionEvent::DoubleClick => {
                self.click(Button::Left)?;
                self.click(Button::Left)
            }
            ActionEvent::RightClick => self.click(Button::Right),
            // Positive wheel units scroll down in enigo.
            ActionEvent::ScrollUp(amount) => self.scroll(-amount),
            ActionEvent::ScrollDown(amount) => self.scroll(amount),
            ActionEvent::Activate => Err(EffectorError::Unsupported("activate")),
        }
    }

    fn display_size(&self) -> Option<(u32, u32)> {
        let (w, h) = self.enigo.main_display().ok()?;
        if w > 0 && h > 0 {
            Some((w as u32, h as u32))
        } else {
            None
        }
    }
}
