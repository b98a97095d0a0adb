use crate::config::ReplaySettings;
use crate::input::Recording;
use crate::mapping::{MapError, PadError, PadMapper, VirtualPad};
use crate::replay::timing::wait_until;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

// Lateness above this is logged per event
const LATE_WARN: Duration = Duration::from_millis(5);

#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("Recording contains no events")]
    EmptyRecording,

    #[error("Event {index} has timestamp {timestamp}s, outside the replay clock range")]
    Timestamp { index: usize, timestamp: f64 },

    #[error("Cannot map event {index}: {source}")]
    Map {
        index: usize,
        #[source]
        source: MapError,
    },

    #[error("Virtual pad failed: {0}")]
    Pad(#[from] PadError),
}

/// Outcome of one pass over a recording
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ReplayReport {
    pub dispatched: usize,
    pub worst_lateness: Duration,
    pub elapsed: Duration,
    pub cancelled: bool,
}

/// Plays recordings onto a virtual pad with their original timing
pub struct Replayer<P: VirtualPad> {
    mapper: PadMapper,
    pad: P,
    spin_threshold: Duration,
    cancel: Option<CancellationToken>,
}

impl<P: VirtualPad> Replayer<P> {
    pub fn new(mapper: PadMapper, pad: P, settings: &ReplaySettings) -> Self {
        Self {
            mapper,
            pad,
            spin_threshold: settings.spin_threshold(),
            cancel: None,
        }
    }

    /// Stops a running pass before its next event once `token` is cancelled
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn into_pad(self) -> P {
        self.pad
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancellationToken::is_cancelled)
    }

    /// Replays `recording` from its first event.
    ///
    /// Every event fires at `start + timestamp`, where `start` is taken when
    /// this call begins. Deadlines are checked before anything is dispatched;
    /// an event the mapper rejects ends the pass with [`ReplayError::Map`].
    pub fn replay(&mut self, recording: &Recording) -> Result<ReplayReport, ReplayError> {
        if recording.is_empty() {
            return Err(ReplayError::EmptyRecording);
        }

        let offsets = recording
            .iter()
            .enumerate()
            .map(|(index, event)| {
                Duration::try_from_secs_f64(event.timestamp()).map_err(|_| {
                    ReplayError::Timestamp {
                        index,
                        timestamp: event.timestamp(),
                    }
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        self.mapper.reset();
        let mut report = ReplayReport::default();
        info!(
            "Replaying {} events over {:.3}s",
            recording.len(),
            recording.duration()
        );

        let start = Instant::now();
        for (index, (event, offset)) in recording.iter().zip(offsets).enumerate() {
            if self.is_cancelled() {
                info!("Replay cancelled after {} events", report.dispatched);
                report.cancelled = true;
                break;
            }

            let target = start.checked_add(offset).ok_or(ReplayError::Timestamp {
                index,
                timestamp: event.timestamp(),
            })?;
            let late = wait_until(target, self.spin_threshold);
            report.worst_lateness = report.worst_lateness.max(late);
            if late > LATE_WARN {
                warn!(
                    "Event at {:.4}s dispatched {:?} late",
                    event.timestamp(),
                    late
                );
            }

            let action = self.mapper.map(event).map_err(|source| {
                error!("Replay stopped at event {}: {}", index, source);
                ReplayError::Map { index, source }
            })?;
            action.apply(&mut self.pad)?;
            self.pad.commit()?;
            report.dispatched += 1;
            debug!("{:.4}s {:?}", event.timestamp(), action);
        }

        report.elapsed = start.elapsed();
        info!(
            "Replay finished: {} dispatched, worst lateness {:?}",
            report.dispatched, report.worst_lateness
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::{ButtonState, InputEvent};
    use crate::mapping::{Action, PadButton, Stick, Trigger};
    use crate::scheme::SchemeBook;
    use std::sync::{Arc, Mutex};

    /// Records every commit with its wall-clock offset from creation
    #[derive(Clone)]
    struct ClockPad {
        origin: Instant,
        staged: Vec<Action>,
        log: Arc<Mutex<Vec<(Duration, Vec<Action>)>>>,
    }

    impl ClockPad {
        fn new() -> Self {
            Self {
                origin: Instant::now(),
                staged: Vec::new(),
                log: Arc::new(Mutex::new(Vec::new())),
            }
        }

        fn commits(&self) -> Vec<(Duration, Vec<Action>)> {
            self.log.lock().unwrap().clone()
        }
    }

    impl VirtualPad for ClockPad {
        fn press(&mut self, button: PadButton) -> Result<(), PadError> {
            self.staged.push(Action::PressButton(button));
            Ok(())
        }

        fn release(&mut self, button: PadButton) -> Result<(), PadError> {
            self.staged.push(Action::ReleaseButton(button));
            Ok(())
        }

        fn set_stick(&mut self, stick: Stick, x: f64, y: f64) -> Result<(), PadError> {
            self.staged.push(Action::SetStick(stick, x, y));
            Ok(())
        }

        fn set_trigger(&mut self, trigger: Trigger, value: f64) -> Result<(), PadError> {
            self.staged.push(Action::SetTrigger(trigger, value));
            Ok(())
        }

        fn commit(&mut self) -> Result<(), PadError> {
            let actions = std::mem::take(&mut self.staged);
            self.log
                .lock()
                .unwrap()
                .push((self.origin.elapsed(), actions));
            Ok(())
        }
    }

    fn replayer(pad: ClockPad) -> Replayer<ClockPad> {
        let scheme = SchemeBook::builtin().unwrap().scheme("dualsense").unwrap();
        let mapper = PadMapper::new(Arc::new(scheme), 0.06);
        Replayer::new(mapper, pad, &ReplaySettings::default())
    }

    #[test]
    fn empty_recording_is_rejected() {
        let mut replayer = replayer(ClockPad::new());
        assert!(matches!(
            replayer.replay(&Recording::new()),
            Err(ReplayError::EmptyRecording)
        ));
    }

    #[test]
    fn event_fires_at_its_timestamp() {
        let pad = ClockPad::new();
        let mut replayer = replayer(pad.clone());
        let recording = Recording::from(vec![InputEvent::button(0, ButtonState::Pressed, 1.0)]);

        let report = replayer.replay(&recording).unwrap();
        let commits = pad.commits();
        assert_eq!(commits.len(), 1);
        assert_eq!(commits[0].1, vec![Action::PressButton(PadButton::A)]);

        let fired = commits[0].0;
        assert!(fired >= Duration::from_secs(1), "fired at {:?}", fired);
        assert!(fired < Duration::from_millis(1_002), "fired at {:?}", fired);
        assert!(report.worst_lateness < Duration::from_millis(2));
    }

    #[test]
    fn events_dispatch_in_order_one_commit_each() {
        let pad = ClockPad::new();
        let mut replayer = replayer(pad.clone());
        let recording = Recording::from(vec![
            InputEvent::button(1, ButtonState::Pressed, 0.0),
            InputEvent::axis(0, 0.5, 0.01),
            InputEvent::axis(1, 0.5, 0.01),
            InputEvent::button(1, ButtonState::Released, 0.03),
        ]);

        let report = replayer.replay(&recording).unwrap();
        assert_eq!(report.dispatched, 4);

        let actions: Vec<_> = pad.commits().into_iter().flat_map(|(_, a)| a).collect();
        assert_eq!(
            actions,
            vec![
                Action::PressButton(PadButton::B),
                Action::SetStick(Stick::Left, 0.5, 0.0),
                Action::SetStick(Stick::Left, 0.5, -0.5),
                Action::ReleaseButton(PadButton::B),
            ]
        );
    }

    #[test]
    fn replay_restarts_from_the_beginning() {
        let pad = ClockPad::new();
        let mut replayer = replayer(pad.clone());
        let recording = Recording::from(vec![
            InputEvent::axis(1, 1.0, 0.0),
            InputEvent::axis(0, 0.25, 0.005),
        ]);

        replayer.replay(&recording).unwrap();
        replayer.replay(&recording).unwrap();

        let commits = pad.commits();
        assert_eq!(commits.len(), 4);
        // Stick state does not leak from the first pass into the second
        assert_eq!(commits[2].1, vec![Action::SetStick(Stick::Left, 0.0, -1.0)]);
        assert_eq!(commits[0].1, commits[2].1);
        assert_eq!(commits[1].1, commits[3].1);
    }

    #[test]
    fn unmapped_event_ends_the_pass() {
        let pad = ClockPad::new();
        let mut replayer = replayer(pad.clone());
        let recording = Recording::from(vec![
            InputEvent::button(2, ButtonState::Pressed, 0.0),
            InputEvent::button(99, ButtonState::Pressed, 0.0),
            InputEvent::button(2, ButtonState::Released, 0.0),
        ]);

        let err = replayer.replay(&recording).unwrap_err();
        assert!(matches!(
            err,
            ReplayError::Map {
                index: 1,
                source: MapError::UnmappedButton { id: 99 }
            }
        ));
        // Only the event before the failure reached the pad
        assert_eq!(pad.commits().len(), 1);
    }

    #[test]
    fn unreachable_deadline_is_rejected_before_dispatch() {
        let pad = ClockPad::new();
        let mut replayer = replayer(pad.clone());
        let recording = Recording::from(vec![
            InputEvent::button(0, ButtonState::Pressed, 0.0),
            InputEvent::button(0, ButtonState::Released, 1e20),
        ]);

        assert!(matches!(
            replayer.replay(&recording),
            Err(ReplayError::Timestamp { index: 1, .. })
        ));
        assert!(pad.commits().is_empty());
    }

    #[test]
    fn cancelled_token_stops_before_next_event() {
        let token = CancellationToken::new();
        let pad = ClockPad::new();
        let mut replayer = replayer(pad.clone()).with_cancellation(token.clone());
        token.cancel();

        let recording = Recording::from(vec![InputEvent::button(0, ButtonState::Pressed, 0.0)]);
        let report = replayer.replay(&recording).unwrap();
        assert!(report.cancelled);
        assert_eq!(report.dispatched, 0);
        assert!(pad.commits().is_empty());
    }
}
