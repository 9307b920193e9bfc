//! Dispatch boundary: forwards action events to an effector.
//!
//! Provides:
//! - `Effector`: the fallible contract every output adapter implements
//! - `Dispatcher`: applies the failure disposition table
//! - `sexp`: s-expression event stream on any writer
//! - `OsEffector`: OS pointer injection (gated behind `os-input` feature)

pub mod sexp;

#[cfg(feature = "os-input")]
pub mod os;

#[cfg(feature = "os-input")]
pub use os::OsEffector;

#[cfg(not(feature = "os-input"))]
pub mod stub;

#[cfg(not(feature = "os-input"))]
pub use stub::OsEffector;

pub use sexp::SexpEffector;

use thiserror::Error;
use tracing::{debug, error, warn};

use crate::tracking::ActionEvent;

// ── Errors ─────────────────────────────────────────────────

/// Failure reported by an effector for one event.
#[derive(Debug, Error)]
pub enum EffectorError {
    /// The OS declined this one injection.
    #[error("input rejected: {0}")]
    Rejected(String),
    /// The effector has no way to express this event.
    #[error("unsupported event: {0}")]
    Unsupported(&'static str),
    /// The event sink is gone (closed pipe, lost display connection).
    #[error("effector disconnected: {0}")]
    Disconnected(String),
}

/// What the dispatcher does with a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Log, count, keep running.
    Ignore,
    /// Stop the pipeline and report to the caller.
    Surface,
}

impl EffectorError {
    /// The disposition table.
    pub fn disposition(&self) -> Disposition {
        match self {
            Self::Rejected(_) => Disposition::Ignore,
            Self::Unsupported(_) => Disposition::Ignore,
            Self::Disconnected(_) => Disposition::Surface,
        }
    }
}

// ── Effector contract ──────────────────────────────────────

/// Output side of the engine: turns action events into effects.
pub trait Effector {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Perform one event.
    fn perform(&mut self, event: &ActionEvent) -> Result<(), EffectorError>;

    /// Screen size in pixels, when the effector can tell.
    fn display_size(&self) -> Option<(u32, u32)> {
        None
    }
}

impl<E: Effector + ?Sized> Effector for Box<E> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn perform(&mut self, event: &ActionEvent) -> Result<(), EffectorError> {
        (**self).perform(event)
    }

    fn display_size(&self) -> Option<(u32, u32)> {
        (**self).display_size()
    }
}

/// Effector backed by a closure, e.g. a GUI activation callback.
pub struct CallbackEffector<F> {
    callback: F,
}

impl<F> CallbackEffector<F>
where
    F: FnMut(&ActionEvent) -> Result<(), EffectorError>,
{
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> Effector for CallbackEffector<F>
where
    F: FnMut(&ActionEvent) -> Result<(), EffectorError>,
{
    fn name(&self) -> &'static str {
        "callback"
    }

    fn perform(&mut self, event: &ActionEvent) -> Result<(), EffectorError> {
        (self.callback)(event)
    }
}

// ── Dispatcher ─────────────────────────────────────────────

/// Forwards events to one effector and applies the disposition table.
pub struct Dispatcher<E> {
    effector: E,
    /// Events the effector accepted.
    dispatched: u64,
    /// Failures logged and dropped.
    ignored: u64,
}

impl<E: Effector> Dispatcher<E> {
    pub fn new(effector: E) -> Self {
        Self {
            effector,
            dispatched: 0,
            ignored: 0,
        }
    }

    /// Forward one event.  Only failures with `Disposition::Surface` are
    /// returned.
    pub fn dispatch(&mut self, event: &ActionEvent) -> Result<(), EffectorError> {
        match self.effector.perform(event) {
            Ok(()) => {
                self.dispatched += 1;
                if !matches!(event, ActionEvent::CursorMove { .. }) {
                    debug!(effector = self.effector.name(), "dispatched {}", event.as_str());
                }
                Ok(())
            }
            Err(e) => match e.disposition() {
                Disposition::Ignore => {
                    self.ignored += 1;
                    warn!(effector = self.effector.name(), "dropping {}: {}", event.as_str(), e);
                    Ok(())
                }
                Disposition::Surface => {
                    error!(effector = self.effector.name(), "{} failed: {}", event.as_str(), e);
                    Err(e)
                }
            },
        }
    }

    /// Forward events in order, stopping at the first surfaced failure.
    pub fn dispatch_all(&mut self, events: &[ActionEvent]) -> Result<(), EffectorError> {
        for event in events {
            self.dispatch(event)?;
        }
        Ok(())
    }

    pub fn dispatched(&self) -> u64 {
        self.dispatched
    }

    pub fn ignored(&self) -> u64 {
        self.ignored
    }

    pub fn status_sexp(&self) -> String {
        format!(
            "(:effector \"{}\" :dispatched {} :ignored {})",
            self.effector.name(),
            self.dispatched,
            self.ignored,
        )
    }
}

// ── Tests ──────────────────────────────────────────────────
