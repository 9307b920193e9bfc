//! Pointer-control loop.

use std::time::Instant;

use anyhow::Context;
use tracing::info;

use super::{FrameLoop, PipelineSummary, Step, StopReason};
use crate::config::Config;
use crate::effector::{Dispatcher, Effector};
use crate::source::FrameSource;
use crate::tracking::PointerEngine;

/// Run the pointer pipeline until the stream ends, ESC is pressed, or a
/// shutdown signal arrives.
pub fn run<S, E>(
    source: &mut S,
    dispatcher: &mut Dispatcher<E>,
    config: &Config,
) -> anyhow::Result<PipelineSummary>
where
    S: FrameSource + ?Sized,
    E: Effector,
{
    let mut engine = PointerEngine::new(
        config.mapping.clone(),
        config.cursor.clone(),
        &config.channels,
    );
    let mut frame_loop = FrameLoop::new("pointer", config.pipeline.pointer_exit_key, &config.pipeline);
    info!("pointer pipeline running ({})", config.mapping.describe());

    let stop = loop {
        let (frame, now, waited) = match frame_loop.next(source).context("detector failed")? {
            Step::Frame { frame, now, waited } => (frame, now, waited),
            Step::Skipped => continue,
            Step::Stop(reason) => break reason,
        };

        let started = Instant::now();
        let events = engine.process(&frame.hands, frame.frame_size(), now);
        let processed = started.elapsed();

        let started = Instant::now();
        dispatcher
            .dispatch_all(&events)
            .context("effector failed")?;
        let dispatched = started.elapsed();

        frame_loop.finish_frame(waited, processed, dispatched, || engine.status_sexp());

        if frame_loop.exit_requested(&frame) {
            break StopReason::ExitKey;
        }
    };

    let summary = PipelineSummary {
        stop,
        frames: frame_loop.frames(),
        skipped: frame_loop.skipped(),
        dispatched: dispatcher.dispatched(),
        ignored: dispatcher.ignored(),
    };
    info!(
        "pointer pipeline stopped ({}): {} frame(s), {} skipped, {}",
        stop.as_str(),
        summary.frames,
        summary.skipped,
        dispatcher.status_sexp(),
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effector::{CallbackEffector, EffectorError};
    use crate::pipeline::testing::{frame, key_frame, ScriptedSource};
    use crate::source::DetectorFrame;
    use crate::tracking::engine::make_hand;
    use crate::tracking::ActionEvent;

    fn discrete(events: &[ActionEvent]) -> Vec<ActionEvent> {
        events
            .iter()
            .copied()
            .filter(|e| !matches!(e, ActionEvent::CursorMove { .. }))
            .collect()
    }

    #[test]
    fn test_click_reaches_effector() {
        let mut source = ScriptedSource::new(vec![
            Ok(frame(0.0, vec![make_hand("Right", [100.0, 100.0], [120.0, 100.0])])),
            Ok(frame(0.2, vec![make_hand("Right", [100.0, 100.0], [200.0, 100.0])])),
        ]);
        let mut seen = Vec::new();
        let summary = {
            let mut dispatcher = Dispatcher::new(CallbackEffector::new(|e: &ActionEvent| {
                seen.push(*e);
                Ok(())
            }));
            run(&mut source, &mut dispatcher, &Config::default()).unwrap()
        };

        assert_eq!(discrete(&seen), vec![ActionEvent::Click]);
        assert_eq!(summary.stop, StopReason::EndOfStream);
        assert_eq!(summary.frames, 2);
        assert_eq!(summary.dispatched, seen.len() as u64);
    }

    #[test]
    fn test_esc_frame_handled_then_stops() {
        let mut source = ScriptedSource::new(vec![
            Ok(frame(0.0, vec![make_hand("Right", [100.0, 100.0], [120.0, 100.0])])),
            // Release and ESC in the same frame: the click still goes out.
            Ok(DetectorFrame {
                key: Some(27),
                ..frame(0.2, vec![make_hand("Right", [100.0, 100.0], [200.0, 100.0])])
            }),
            Ok(frame(0.3, vec![make_hand("Right", [0.0, 0.0], [320.0, 240.0])])),
        ]);
        let mut seen = Vec::new();
        let summary = {
            let mut dispatcher = Dispatcher::new(CallbackEffector::new(|e: &ActionEvent| {
                seen.push(*e);
                Ok(())
            }));
            run(&mut source, &mut dispatcher, &Config::default()).unwrap()
        };
        assert_eq!(summary.stop, StopReason::ExitKey);
        assert_eq!(summary.frames, 2);
        assert_eq!(discrete(&seen), vec![ActionEvent::Click]);
        assert_eq!(source.frames.len(), 1);
    }

    #[test]
    fn test_menu_exit_key_ignored_by_pointer() {
        let mut source = ScriptedSource::new(vec![Ok(key_frame(0.0, b'q' as i32))]);
        let mut dispatcher = Dispatcher::new(CallbackEffector::new(|_: &ActionEvent| Ok(())));
        let summary = run(&mut source, &mut dispatcher, &Config::default()).unwrap();
        assert_eq!(summary.stop, StopReason::EndOfStream);
        assert_eq!(summary.frames, 1);
    }

    #[test]
    fn test_disconnected_effector_ends_pipeline() {
        let mut source = ScriptedSource::new(vec![
            Ok(frame(0.0, vec![make_hand("Right", [0.0, 0.0], [320.0, 240.0])])),
            Ok(frame(0.1, vec![make_hand("Right", [0.0, 0.0], [320.0, 240.0])])),
        ]);
        let mut dispatcher = Dispatcher::new(CallbackEffector::new(|_: &ActionEvent| {
            Err(EffectorError::Disconnected("display gone".into()))
        }));
        let err = run(&mut source, &mut dispatcher, &Config::default()).unwrap_err();
        assert!(format!("{:#}", err).contains("display gone"));
        assert_eq!(source.frames.len(), 1);
    }

    #[test]
    fn test_rejected_events_keep_running() {
        let mut source = ScriptedSource::new(vec![
            Ok(frame(0.0, vec![make_hand("Left", [100.0, 100.0], [110.0, 100.0])])),
            Ok(frame(0.5, vec![make_hand("Left", [100.0, 100.0], [110.0, 100.0])])),
        ]);
        let mut dispatcher = Dispatcher::new(CallbackEffector::new(|e: &ActionEvent| match e {
            ActionEvent::RightClick => Err(EffectorError::Rejected("busy".into())),
            _ => Ok(()),
        }));
        let summary = run(&mut source, &mut dispatcher, &Config::default()).unwrap();
        assert_eq!(summary.frames, 2);
        assert_eq!(summary.ignored, 2);
    }
}
