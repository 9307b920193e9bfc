//! S-expression event stream effector.
//!
//! Writes one event per line, e.g. `(:type :event :event :click)`, so a
//! consumer (an Emacs process filter, a test harness, a shell pipe) can
//! drive the actual input injection.

use std::io::{self, Write};

use super::{Effector, EffectorError};
use crate::tracking::ActionEvent;

/// Format an event s-expression.
pub fn format_event(event_type: &str, fields: &[(&str, &str)]) -> String {
    let mut s = format!("(:type :event :event :{}", event_type);
    for (key, val) in fields {
        s.push_str(&format!(" :{} {}", key, val));
    }
    s.push(')');
    s
}

/// Render one action event.
pub fn event_sexp(event: &ActionEvent) -> String {
    match event {
        ActionEvent::CursorMove { x, y } => {
            format_event(event.as_str(), &[("x", &x.to_string()), ("y", &y.to_string())])
        }
        ActionEvent::ScrollUp(amount) | ActionEvent::ScrollDown(amount) => {
            format_event(event.as_str(), &[("amount", &amount.to_string())])
        }
        ActionEvent::Click
        | ActionEvent::DoubleClick
        | ActionEvent::RightClick
        | ActionEvent::Activate => format_event(event.as_str(), &[]),
    }
}

/// Effector writing the event stream to any writer (stdout by default).
pub struct SexpEffector<W: Write> {
    out: W,
}

impl SexpEffector<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> SexpEffector<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }
}

impl<W: Write> Effector for SexpEffector<W> {
    fn name(&self) -> &'static str {
        "sexp"
    }

    fn perform(&mut self, event: &ActionEvent) -> Result<(), EffectorError> {
        let line = event_sexp(event);
        writeln!(self.out, "{}", line)
            .and_then(|_| self.out.flush())
            .map_err(classify_io_error)
    }
}

fn classify_io_error(e: io::Error) -> EffectorError {
    match e.kind() {
        io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted | io::ErrorKind::TimedOut => {
            EffectorError::Rejected(e.to_string())
        }
        _ => EffectorError::Disconnected(e.to_string()),
    }
}
