//! Detector subprocess: spawns the landmark detector and reads its frames.
//!
//! The detector must print a single `READY` line once its camera and model
//! are initialized, then one JSON frame per line on stdout.  Its stderr is
//! inherited so detector diagnostics land next to ours.

use std::io::BufReader;
use std::process::{Child, ChildStdout, Command, Stdio};

use tracing::{debug, info, warn};

use super::{CaptureError, DetectorFrame, FrameSource, JsonLinesSource};

const READY: &str = "READY";

/// A running detector process.  Dropping it kills and reaps the child.
pub struct DetectorProcess {
    child: Child,
    frames: JsonLinesSource<BufReader<ChildStdout>>,
    program: String,
}

impl DetectorProcess {
    /// Spawn from a whitespace-separated command line.
    pub fn from_command_line(command: &str) -> Result<Self, CaptureError> {
        let mut parts = command.split_whitespace();
        let program = parts
            .next()
            .ok_or_else(|| CaptureError::Open("empty detector command".to_string()))?;
        let args: Vec<String> = parts.map(str::to_string).collect();
        Self::spawn(program, &args)
    }

    /// Spawn the detector and wait for its ready handshake.
    pub fn spawn(program: &str, args: &[String]) -> Result<Self, CaptureError> {
        info!("starting detector: {} {}", program, args.join(" "));
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| CaptureError::Open(format!("failed to start {}: {}", program, e)))?;

        let Some(stdout) = child.stdout.take() else {
            reap(&mut child);
            return Err(CaptureError::Open("detector stdout unavailable".to_string()));
        };

        let mut process = Self {
            child,
            frames: JsonLinesSource::new(BufReader::new(stdout)),
            program: program.to_string(),
        };
        process.handshake()?;
        info!(pid = process.pid(), "detector ready");
        Ok(process)
    }

    fn handshake(&mut self) -> Result<(), CaptureError> {
        let line = match self.frames.read_raw_line() {
            Ok(Some(line)) => line.to_string(),
            Ok(None) => {
                return Err(CaptureError::Open(format!(
                    "{} exited before signalling {}",
                    self.program, READY
                )))
            }
            Err(e) => return Err(CaptureError::Open(format!("handshake failed: {}", e))),
        };
        if line != READY {
            return Err(CaptureError::Open(format!(
                "{} did not signal {}, got: {:?}",
                self.program, READY, line
            )));
        }
        Ok(())
    }

    pub fn pid(&self) -> u32 {
        self.child.id()
    }
}

impl FrameSource for DetectorProcess {
    fn next_frame(&mut self) -> Result<Option<DetectorFrame>, CaptureError> {
        self.frames.next_frame()
    }
}

impl Drop for DetectorProcess {
    fn drop(&mut self) {
        debug!(pid = self.child.id(), "stopping detector");
        reap(&mut self.child);
    }
}

fn reap(child: &mut Child) {
    match child.try_wait() {
        Ok(Some(_)) => {}
        _ => {
            if let Err(e) = child.kill() {
                warn!("failed to kill detector: {}", e);
            }
            let _ = child.wait();
        }
    }
}
