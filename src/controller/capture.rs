//! Capture engine
//!
//! While recording, two threads feed one shared sink:
//!
//! ```text
//!             ┌─ button loop ── blocking edge wait ──────────────┐
//! InputSource ┤                                                  ├─► RecordingSink ─► Recording
//!             └─ AxisState ── axis loop ── dead zone + debounce ─┘
//!                             (fixed period, 125Hz by default)
//! ```
//!
//! Both loops poll one session flag and leave within one polling period of
//! `stop()`. The sink stamps events with the session clock under its lock,
//! so the recording is in timestamp order no matter which thread appended.
//!
//! A source failure clears the session flag as well. The session then stays
//! in place until `stop()` collects it and reports the failure alongside the
//! partial recording.

use crate::config::Settings;
use crate::controller::axis_filter::AxisFilter;
use crate::controller::source::{AxisState, DeviceInfo, InputSource, SourceError};
use crate::input::{InputEvent, Recording};
use crate::persistence::{self, StoreError};
use crate::scheme::{AxisChannel, RoleClassifier, Scheme};
use statum::{machine, state};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

const STATS_INTERVAL: Duration = Duration::from_secs(10);

#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("Cannot start recording: another recording is already in progress")]
    AlreadyRecording,

    #[error("Cannot stop recording: no recording in progress")]
    NotRecording,

    #[error("Cannot start recording: no controller connected")]
    NoDeviceConnected,

    #[error("Input source error: {0}")]
    Source(SourceError),

    #[error(
        "Recording interrupted: {source}; partial recording saved to {}",
        .outcome.path.display()
    )]
    Interrupted {
        outcome: Box<CaptureOutcome>,
        #[source]
        source: SourceError,
    },

    #[error("Input source was lost when a previous session failed")]
    SourceUnavailable,

    #[error("Failed to spawn capture thread: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("Failed to save recording to {}: {source}", .path.display())]
    Store {
        recording: Box<Recording>,
        path: PathBuf,
        #[source]
        source: StoreError,
    },
}

impl From<SourceError> for CaptureError {
    fn from(error: SourceError) -> Self {
        match error {
            SourceError::NoDevice => CaptureError::NoDeviceConnected,
            other => CaptureError::Source(other),
        }
    }
}

/// Append-only event list shared by the capture threads
#[derive(Clone, Debug)]
pub struct RecordingSink {
    inner: Arc<Mutex<SinkInner>>,
}

#[derive(Debug)]
struct SinkInner {
    origin: Instant,
    events: Vec<InputEvent>,
}

impl RecordingSink {
    /// Empty sink whose clock starts at `origin`
    pub fn new(origin: Instant) -> Self {
        Self {
            inner: Arc::new(Mutex::new(SinkInner {
                origin,
                events: Vec::new(),
            })),
        }
    }

    /// Reads the session clock and appends whatever `make` builds from it,
    /// both under the sink lock
    pub fn stamp<F>(&self, make: F) -> Option<InputEvent>
    where
        F: FnOnce(Duration) -> Option<InputEvent>,
    {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let elapsed = inner.origin.elapsed();
        let event = make(elapsed)?;
        inner.events.push(event);
        Some(event)
    }

    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .events
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Moves the collected events out into a recording
    pub fn take(&self) -> Recording {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        Recording::from(std::mem::take(&mut inner.events))
    }
}

/// Counters reported by the axis loop when it exits
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct AxisLoopStats {
    pub iterations: u64,
    pub accepted: u64,
    pub debounced: u64,
    pub overruns: u64,
}

type ButtonWorker = JoinHandle<(Box<dyn InputSource>, Result<u64, SourceError>)>;

// Capture session states
#[state]
#[derive(Debug, Clone)]
pub enum SessionState {
    Armed,
    Running,
}

#[machine]
pub struct CaptureSession<S: SessionState> {
    source: Option<Box<dyn InputSource>>,
    classifier: Arc<dyn RoleClassifier>,
    settings: Settings,
    device: DeviceInfo,

    // Session flag polled by both loops
    active: Arc<AtomicBool>,

    sink: RecordingSink,
    button_worker: Option<ButtonWorker>,
    axis_worker: Option<JoinHandle<AxisLoopStats>>,
}

impl CaptureSession<Armed> {
    /// Session for an already connected source
    pub fn arm(
        source: Box<dyn InputSource>,
        device: DeviceInfo,
        classifier: Arc<dyn RoleClassifier>,
        settings: Settings,
    ) -> Self {
        debug!("Arming capture session for '{}'", device.name);
        Self::new(
            Some(source),
            classifier,
            settings,
            device,
            Arc::new(AtomicBool::new(false)),
            RecordingSink::new(Instant::now()),
            None, // button_worker
            None, // axis_worker
        )
    }

    /// Starts the session clock and both capture loops
    pub fn launch(mut self) -> Result<CaptureSession<Running>, CaptureError> {
        let source = self.source.take().ok_or(CaptureError::SourceUnavailable)?;
        let period = self.settings.capture.poll_interval();

        self.sink = RecordingSink::new(Instant::now());
        self.active.store(true, Ordering::Release);

        let axis_loop = AxisLoop {
            axes: source.axis_state(),
            classifier: self.classifier.clone(),
            filter: AxisFilter::new(
                self.settings.gamepad.dead_zone,
                self.settings.capture.debounce_offset(),
            ),
            period,
            active: self.active.clone(),
            sink: self.sink.clone(),
        };
        let axis_worker = match thread::Builder::new()
            .name("capture-axes".into())
            .spawn(move || axis_loop.run())
        {
            Ok(handle) => handle,
            Err(e) => {
                error!("Failed to spawn axis loop: {}", e);
                self.active.store(false, Ordering::Release);
                return Err(e.into());
            }
        };

        let button_loop = ButtonLoop {
            source,
            wait: period,
            active: self.active.clone(),
            sink: self.sink.clone(),
        };
        let button_worker = match thread::Builder::new()
            .name("capture-buttons".into())
            .spawn(move || button_loop.run())
        {
            Ok(handle) => handle,
            Err(e) => {
                error!("Failed to spawn button loop: {}", e);
                self.active.store(false, Ordering::Release);
                let _ = axis_worker.join();
                return Err(e.into());
            }
        };

        self.axis_worker = Some(axis_worker);
        self.button_worker = Some(button_worker);

        info!("Recording started on '{}'", self.device.name);
        Ok(self.transition())
    }
}

/// What is left of a session once both loops have exited
pub struct FinishedSession {
    pub source: Option<Box<dyn InputSource>>,
    pub recording: Recording,
    pub stats: AxisLoopStats,
    pub failure: Option<SourceError>,
}

impl CaptureSession<Running> {
    pub fn events_captured(&self) -> usize {
        self.sink.len()
    }

    /// False once `finish` has begun or a loop has given up on the source
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Clears the session flag, joins both loops and collects the recording
    pub fn finish(mut self) -> FinishedSession {
        self.active.store(false, Ordering::Release);

        let mut failure = None;
        let source = match self.button_worker.take().map(JoinHandle::join) {
            Some(Ok((source, result))) => {
                match result {
                    Ok(count) => debug!("Button loop exited after {} edges", count),
                    Err(e) => failure = Some(e),
                }
                Some(source)
            }
            Some(Err(_)) => {
                error!("Button loop panicked, input source lost");
                None
            }
            None => None,
        };

        let stats = match self.axis_worker.take().map(JoinHandle::join) {
            Some(Ok(stats)) => stats,
            Some(Err(_)) => {
                error!("Axis loop panicked");
                AxisLoopStats::default()
            }
            None => AxisLoopStats::default(),
        };

        let recording = self.sink.take();
        info!(
            "Recording stopped: {} events over {:.3}s ({} axis samples debounced, {} overruns)",
            recording.len(),
            recording.duration(),
            stats.debounced,
            stats.overruns
        );

        FinishedSession {
            source,
            recording,
            stats,
            failure,
        }
    }
}

struct ButtonLoop {
    source: Box<dyn InputSource>,
    wait: Duration,
    active: Arc<AtomicBool>,
    sink: RecordingSink,
}

impl ButtonLoop {
    fn run(mut self) -> (Box<dyn InputSource>, Result<u64, SourceError>) {
        debug!("Button loop started");
        let mut captured = 0u64;

        let result = loop {
            if !self.active.load(Ordering::Acquire) {
                break Ok(captured);
            }

            match self.source.next_button(self.wait) {
                Ok(Some(edge)) => {
                    let event = self.sink.stamp(|elapsed| {
                        Some(InputEvent::button(
                            edge.id,
                            edge.state,
                            elapsed.as_secs_f64(),
                        ))
                    });
                    if let Some(event) = event {
                        debug!(
                            "Button {} {:?} at {:.4}s",
                            edge.id,
                            edge.state,
                            event.timestamp()
                        );
                    }
                    captured += 1;
                }
                Ok(None) => {}
                Err(e) => {
                    error!("Button loop stopped: {}", e);
                    self.active.store(false, Ordering::Release);
                    break Err(e);
                }
            }
        };

        (self.source, result)
    }
}

struct AxisLoop {
    axes: AxisState,
    classifier: Arc<dyn RoleClassifier>,
    filter: AxisFilter,
    period: Duration,
    active: Arc<AtomicBool>,
    sink: RecordingSink,
}

impl AxisLoop {
    fn run(mut self) -> AxisLoopStats {
        debug!("Axis loop started, polling every {:?}", self.period);
        let mut stats = AxisLoopStats::default();
        let mut last_log = Instant::now();
        let mut window_accepted = 0u64;

        while self.active.load(Ordering::Acquire) {
            let tick = Instant::now();

            // Stick components share a debounce slot: longest-waiting channel first
            let mut samples: Vec<(u32, AxisChannel, f32)> = self
                .axes
                .snapshot()
                .into_iter()
                .filter_map(|(id, raw)| {
                    self.classifier
                        .classify_axis(id)
                        .map(|channel| (id, channel, raw))
                })
                .collect();
            samples.sort_by_key(|(id, _, _)| self.filter.last_recorded(*id));

            for (id, channel, raw) in samples {
                let filter = &mut self.filter;
                let accepted = self.sink.stamp(|elapsed| {
                    filter
                        .accept(id, channel.role(), raw, elapsed)
                        .map(|value| {
                            InputEvent::axis(id, f64::from(value), elapsed.as_secs_f64())
                        })
                });
                if let Some(event) = accepted {
                    debug!(
                        "Axis {} = {:.4} at {:.4}s",
                        id,
                        event.value(),
                        event.timestamp()
                    );
                    stats.accepted += 1;
                    window_accepted += 1;
                }
            }
            stats.iterations += 1;

            if last_log.elapsed() >= STATS_INTERVAL {
                info!(
                    "Axis loop stats: {} samples accepted in last {}s, {} debounced, {} overruns",
                    window_accepted,
                    STATS_INTERVAL.as_secs(),
                    self.filter.debounced(),
                    stats.overruns
                );
                window_accepted = 0;
                last_log = Instant::now();
            }

            // Over budget: skip the sleep rather than drop the next sample
            let spent = tick.elapsed();
            match self.period.checked_sub(spent) {
                Some(rest) if !rest.is_zero() => thread::sleep(rest),
                _ => {
                    stats.overruns += 1;
                    debug!("Axis poll took {:?}, period is {:?}", spent, self.period);
                }
            }
        }

        stats.debounced = self.filter.debounced();
        stats
    }
}

/// Result of a successful `stop()`
#[derive(Debug)]
pub struct CaptureOutcome {
    pub recording: Recording,
    pub path: PathBuf,
    pub stats: AxisLoopStats,
}

/// Idle/Recording front-end over capture sessions
pub struct CaptureEngine {
    source: Option<Box<dyn InputSource>>,
    scheme: Arc<Scheme>,
    settings: Settings,
    output: Option<PathBuf>,
    session: Option<CaptureSession<Running>>,
}

impl CaptureEngine {
    pub fn new(source: Box<dyn InputSource>, scheme: Arc<Scheme>, settings: Settings) -> Self {
        Self {
            source: Some(source),
            scheme,
            settings,
            output: None,
            session: None,
        }
    }

    /// Saves recordings to `path` instead of a timestamped file in the
    /// recordings directory
    pub fn with_output(mut self, path: PathBuf) -> Self {
        self.output = Some(path);
        self
    }

    pub fn is_recording(&self) -> bool {
        self.session.is_some()
    }

    /// True when the running session lost its input source and is waiting
    /// for `stop()` to collect it
    pub fn is_interrupted(&self) -> bool {
        self.session.as_ref().is_some_and(|s| !s.is_active())
    }

    pub fn events_captured(&self) -> usize {
        self.session.as_ref().map_or(0, |s| s.events_captured())
    }

    /// Idle → Recording
    pub fn start(&mut self) -> Result<DeviceInfo, CaptureError> {
        if self.session.is_some() {
            warn!("start() called while already recording");
            return Err(CaptureError::AlreadyRecording);
        }

        let mut source = self.source.take().ok_or(CaptureError::SourceUnavailable)?;
        let device = match source.connect() {
            Ok(device) => device,
            Err(e) => {
                self.source = Some(source);
                return Err(e.into());
            }
        };
        info!(
            "Connected to '{}': {} axes, {} buttons",
            device.name, device.axes, device.buttons
        );

        let classifier: Arc<dyn RoleClassifier> = self.scheme.clone();
        let session = CaptureSession::arm(source, device.clone(), classifier, self.settings.clone())
        .launch()?;
        self.session = Some(session);
        Ok(device)
    }

    /// Recording → Idle; finalizes and saves the recording.
    ///
    /// The engine is idle afterwards whatever the result. A recording that
    /// could not be saved is handed back in [`CaptureError::Store`]; a session
    /// cut short by the source is saved and reported as
    /// [`CaptureError::Interrupted`].
    pub fn stop(&mut self) -> Result<CaptureOutcome, CaptureError> {
        let Some(session) = self.session.take() else {
            warn!("stop() called while idle");
            return Err(CaptureError::NotRecording);
        };

        let finished = session.finish();
        self.source = finished.source;

        let path = self.output.clone().unwrap_or_else(|| {
            let dir = &self.settings.paths.recordings_dir;
            persistence::recording_path(dir, self.scheme.device())
        });
        if let Err(source) = persistence::save(&finished.recording, &path) {
            error!(
                "Could not save {} events to {}: {}",
                finished.recording.len(),
                path.display(),
                source
            );
            return Err(CaptureError::Store {
                recording: Box::new(finished.recording),
                path,
                source,
            });
        }

        let outcome = CaptureOutcome {
            recording: finished.recording,
            path,
            stats: finished.stats,
        };
        match finished.failure {
            None => Ok(outcome),
            Some(source) => {
                warn!(
                    "Session ended by input failure, kept {} events",
                    outcome.recording.len()
                );
                Err(CaptureError::Interrupted {
                    outcome: Box::new(outcome),
                    source,
                })
            }
        }
    }
}

impl Drop for CaptureEngine {
    fn drop(&mut self) {
        if let Some(session) = self.session.take() {
            warn!("Capture engine dropped while recording, discarding session");
            session.finish();
        }
    }
}
