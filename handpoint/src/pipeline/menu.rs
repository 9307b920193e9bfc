//! Launch-menu loop.
//!
//! Tracks one button.  A pinch released over it activates; the loop then
//! keeps reading frames for the transition window (the loading animation)
//! before reporting `MenuOutcome::Launch`.

use std::time::{Duration, Instant};

use anyhow::Context;
use tracing::{info, trace};

use super::{FrameLoop, StopReason, Step};
use crate::config::Config;
use crate::effector::{Dispatcher, Effector};
use crate::source::FrameSource;
use crate::tracking::{ActionEvent, MenuEngine};

/// How the menu ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuOutcome {
    /// The button was activated; start the pointer pipeline.
    Launch,
    /// The user quit, the stream ended, or a signal arrived.
    Closed,
}

impl MenuOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Launch => "launch",
            Self::Closed => "closed",
        }
    }
}

pub fn run<S, E>(
    source: &mut S,
    dispatcher: &mut Dispatcher<E>,
    config: &Config,
) -> anyhow::Result<MenuOutcome>
where
    S: FrameSource + ?Sized,
    E: Effector,
{
    let mut engine = MenuEngine::new(config.mapping.clone(), config.menu.clone());
    let mut frame_loop = FrameLoop::new("menu", config.pipeline.menu_exit_key, &config.pipeline);
    let transition = config.menu.transition;
    // Set once activated: end of the transition window.
    let mut launch_at: Option<Duration> = None;
    info!("menu running");

    let outcome = loop {
        let (frame, now, waited) = match frame_loop.next(source).context("detector failed")? {
            Step::Frame { frame, now, waited } => (frame, now, waited),
            Step::Skipped => continue,
            Step::Stop(StopReason::Signal) => break MenuOutcome::Closed,
            Step::Stop(reason) => break closing(launch_at, reason),
        };

        if let Some(deadline) = launch_at {
            if now >= deadline {
                break MenuOutcome::Launch;
            }
            trace!(remaining = ?(deadline - now), "transition");
            frame_loop.finish_frame(waited, Duration::ZERO, Duration::ZERO, || engine.status_sexp());
            if frame_loop.exit_requested(&frame) {
                break closing(launch_at, StopReason::ExitKey);
            }
            continue;
        }

        let started = Instant::now();
        let result = engine.process(&frame.hands, frame.frame_size(), now);
        let processed = started.elapsed();

        let started = Instant::now();
        dispatcher
            .dispatch_all(&result.events)
            .context("effector failed")?;
        let dispatched = started.elapsed();

        if result.events.contains(&ActionEvent::Activate) {
            info!("launch button activated, transition {:?}", transition);
            launch_at = Some(now.saturating_add(transition));
        }

        frame_loop.finish_frame(waited, processed, dispatched, || engine.status_sexp());

        if frame_loop.exit_requested(&frame) {
            break closing(launch_at, StopReason::ExitKey);
        }
    };

    info!("menu {} after {} frame(s)", outcome.as_str(), frame_loop.frames());
    Ok(outcome)
}

/// Outcome when the loop stops early: an activation already made still
/// launches.
fn closing(launch_at: Option<Duration>, reason: StopReason) -> MenuOutcome {
    if launch_at.is_some() {
        info!("transition cut short ({})", reason.as_str());
        MenuOutcome::Launch
    } else {
        MenuOutcome::Closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effector::CallbackEffector;
    use crate::pipeline::testing::{frame, key_frame, ScriptedSource};
    use crate::source::DetectorFrame;
    use crate::tracking::engine::make_hand;

    const CENTER: [f32; 2] = [320.0, 273.6];

    fn press(t: f64) -> DetectorFrame {
        frame(t, vec![make_hand("Right", [CENTER[0] - 10.0, CENTER[1]], CENTER)])
    }

    fn release(t: f64) -> DetectorFrame {
        frame(t, vec![make_hand("Right", [CENTER[0] - 100.0, CENTER[1]], CENTER)])
    }

    fn run_frames(frames: Vec<DetectorFrame>) -> (MenuOutcome, Vec<ActionEvent>, ScriptedSource) {
        let mut source = ScriptedSource::new(frames.into_iter().map(Ok).collect());
        let mut seen = Vec::new();
        let outcome = {
            let mut dispatcher = Dispatcher::new(CallbackEffector::new(|e: &ActionEvent| {
                seen.push(*e);
                Ok(())
            }));
            run(&mut source, &mut dispatcher, &Config::default()).unwrap()
        };
        (outcome, seen, source)
    }

    #[test]
    fn test_activation_then_transition() {
        let (outcome, seen, source) = run_frames(vec![
            press(0.0),
            release(0.1),
            // Inside the 1.2 s window: drained, not interpreted.
            press(0.5),
            release(0.6),
            // Window over: launch before reading the rest.
            frame(1.3, vec![]),
            frame(1.4, vec![]),
        ]);
        assert_eq!(outcome, MenuOutcome::Launch);
        assert_eq!(seen, vec![ActionEvent::Activate]);
        assert_eq!(source.frames.len(), 1);
    }

    #[test]
    fn test_quit_key_closes() {
        let (outcome, seen, _) = run_frames(vec![press(0.0), key_frame(0.1, b'q' as i32), release(0.2)]);
        assert_eq!(outcome, MenuOutcome::Closed);
        assert!(seen.is_empty());
    }

    #[test]
    fn test_quit_key_during_transition_launches() {
        let (outcome, _, _) = run_frames(vec![press(0.0), release(0.1), key_frame(0.2, b'q' as i32)]);
        assert_eq!(outcome, MenuOutcome::Launch);
    }

    #[test]
    fn test_end_of_stream_without_activation() {
        let (outcome, seen, _) = run_frames(vec![press(0.0), frame(0.1, vec![])]);
        assert_eq!(outcome, MenuOutcome::Closed);
        assert!(seen.is_empty());
    }

    #[test]
    fn test_release_with_quit_key_still_activates() {
        let release_and_quit = DetectorFrame {
            key: Some(b'q' as i32),
            ..release(0.1)
        };
        let (outcome, seen, source) = run_frames(vec![press(0.0), release_and_quit, frame(0.2, vec![])]);
        assert_eq!(seen, vec![ActionEvent::Activate]);
        assert_eq!(outcome, MenuOutcome::Launch);
        assert_eq!(source.frames.len(), 1);
    }

    #[test]
    fn test_activation_at_far_timestamp() {
        // Largest whole-second f64 a detector can send below `u64::MAX`.
        let far = (u64::MAX - 2047) as f64;
        let (outcome, seen, _) = run_frames(vec![press(far), release(far), frame(far, vec![])]);
        assert_eq!(seen, vec![ActionEvent::Activate]);
        assert_eq!(outcome, MenuOutcome::Launch);
    }

    #[test]
    fn test_esc_does_not_close_menu() {
        let (outcome, _, source) = run_frames(vec![key_frame(0.0, 27), frame(0.1, vec![])]);
        assert_eq!(outcome, MenuOutcome::Closed);
        assert!(source.frames.is_empty());
    }
}
