//! OS effector stub: used when the `os-input` feature is not enabled.
//!
//! Keeps the CLI surface identical; selecting `--effector os` fails at
//! startup with a clear message instead of at build time.

use super::{Effector, EffectorError};
use crate::tracking::ActionEvent;

/// Stub OS effector when enigo is not compiled in.
pub struct OsEffector {
    _private: (),
}

impl OsEffector {
    pub fn new() -> anyhow::Result<Self> {
        anyhow::bail!("OS input injection disabled (compiled without 'os-input' feature)")
    }
}

impl Effector for OsEffector {
    fn name(&self) -> &'static str {
        "os-disabled"
    }

    fn perform(&mut self, event: &ActionEvent) -> Result<(), EffectorError> {
        Err(EffectorError::Unsupported(event.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stub_constructor_fails() {
        let err = OsEffector::new().err().unwrap();
        assert!(err.to_string().contains("os-input"));
    }
}
