//! Device input layer as seen by the capture engine
//!
//! A source delivers discrete button edges through a blocking call and
//! publishes the instantaneous value of every axis channel into a shared
//! [`AxisState`]. The button loop owns the source for the whole session; the
//! axis loop only ever touches the `AxisState`.

use crate::input::ButtonState;
use std::collections::HashMap;
use std::sync::mpsc;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("No gamepad connected")]
    NoDevice,

    #[error("Gamepad disconnected during capture")]
    Disconnected,

    #[error("Input backend failed: {0}")]
    Backend(String),
}

/// A discrete press or release of one raw button
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ButtonEdge {
    pub id: u32,
    pub state: ButtonState,
}

/// Description of the connected controller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub name: String,
    pub axes: usize,
    pub buttons: usize,
}

/// Latest normalized value of every axis channel, shared between the thread
/// pumping the device and the axis poller
#[derive(Clone, Debug, Default)]
pub struct AxisState {
    values: Arc<RwLock<HashMap<u32, f32>>>,
}

impl AxisState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, id: u32, value: f32) {
        self.values
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, value);
    }

    /// Every reported channel ordered by id; channels never reported are at
    /// rest (0) and left out
    pub fn snapshot(&self) -> Vec<(u32, f32)> {
        let mut values: Vec<_> = self
            .values
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(id, value)| (*id, *value))
            .collect();
        values.sort_by_key(|(id, _)| *id);
        values
    }

    pub fn clear(&self) {
        self.values
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

/// Physical controller feeding the capture engine
pub trait InputSource: Send + 'static {
    /// Finds and opens exactly one controller.
    ///
    /// Fails with [`SourceError::NoDevice`] when none is present.
    fn connect(&mut self) -> Result<DeviceInfo, SourceError>;

    /// Handle to the axis values this source keeps up to date
    fn axis_state(&self) -> AxisState;

    /// Waits up to `timeout` for the next button edge.
    ///
    /// Returns `Ok(None)` when the timeout elapses without an edge. Axis
    /// updates that arrive while waiting are written to the `AxisState`.
    fn next_button(&mut self, timeout: Duration) -> Result<Option<ButtonEdge>, SourceError>;
}

/// Input source fed through a channel.
///
/// Lets another input layer (or a test) drive the capture engine: button
/// edges and failures are sent through the [`SourceFeed`], axis values are
/// written straight into the shared state.
pub struct ChannelSource {
    device: Option<DeviceInfo>,
    edges: mpsc::Receiver<Result<ButtonEdge, SourceError>>,
    axes: AxisState,
}

/// Sending half of a [`ChannelSource`]
#[derive(Clone)]
pub struct SourceFeed {
    edges: mpsc::Sender<Result<ButtonEdge, SourceError>>,
    axes: AxisState,
}

impl ChannelSource {
    /// Source that reports `device` as connected
    pub fn new(device: DeviceInfo) -> (Self, SourceFeed) {
        Self::build(Some(device))
    }

    /// Source without a controller; `connect` fails
    pub fn disconnected() -> (Self, SourceFeed) {
        Self::build(None)
    }

    fn build(device: Option<DeviceInfo>) -> (Self, SourceFeed) {
        let (tx, rx) = mpsc::channel();
        let axes = AxisState::new();
        (
            Self {
                device,
                edges: rx,
                axes: axes.clone(),
            },
            SourceFeed { edges: tx, axes },
        )
    }
}

impl SourceFeed {
    pub fn press(&self, id: u32) {
        self.send(ButtonEdge {
            id,
            state: ButtonState::Pressed,
        });
    }

    pub fn release(&self, id: u32) {
        self.send(ButtonEdge {
            id,
            state: ButtonState::Released,
        });
    }

    pub fn send(&self, edge: ButtonEdge) {
        // Receiver gone means the source was dropped, nothing left to feed.
        let _ = self.edges.send(Ok(edge));
    }

    /// Makes the source report `error` once the edges sent before it are read
    pub fn fail(&self, error: SourceError) {
        let _ = self.edges.send(Err(error));
    }

    pub fn set_axis(&self, id: u32, value: f32) {
        self.axes.set(id, value);
    }
}

impl InputSource for ChannelSource {
    fn connect(&mut self) -> Result<DeviceInfo, SourceError> {
        self.device.clone().ok_or(SourceError::NoDevice)
    }

    fn axis_state(&self) -> AxisState {
        self.axes.clone()
    }

    fn next_button(&mut self, timeout: Duration) -> Result<Option<ButtonEdge>, SourceError> {
        match self.edges.recv_timeout(timeout) {
            Ok(Ok(edge)) => Ok(Some(edge)),
            Ok(Err(e)) => Err(e),
            Err(mpsc::RecvTimeoutError::Timeout) => Ok(None),
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                std::thread::sleep(timeout);
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pad() -> DeviceInfo {
        DeviceInfo {
            name: "test pad".into(),
            axes: 6,
            buttons: 16,
        }
    }

    #[test]
    fn snapshot_holds_reported_axes_only() {
        let axes = AxisState::new();
        assert!(axes.snapshot().is_empty());
        axes.set(3, -0.25);
        axes.set(0, 0.5);
        assert_eq!(axes.snapshot(), vec![(0, 0.5), (3, -0.25)]);
        axes.clear();
        assert!(axes.snapshot().is_empty());
    }

    #[test]
    fn channel_source_delivers_edges_in_order() {
        let (mut source, feed) = ChannelSource::new(pad());
        assert_eq!(source.connect().unwrap(), pad());

        feed.press(3);
        feed.release(3);
        let timeout = Duration::from_millis(10);
        assert_eq!(
            source.next_button(timeout).unwrap(),
            Some(ButtonEdge {
                id: 3,
                state: ButtonState::Pressed
            })
        );
        assert_eq!(
            source.next_button(timeout).unwrap().map(|e| e.state),
            Some(ButtonState::Released)
        );
        assert_eq!(source.next_button(timeout).unwrap(), None);
    }

    #[test]
    fn reported_failure_follows_queued_edges() {
        let (mut source, feed) = ChannelSource::new(pad());
        feed.press(1);
        feed.fail(SourceError::Disconnected);

        let timeout = Duration::from_millis(10);
        assert_eq!(source.next_button(timeout).unwrap().map(|e| e.id), Some(1));
        assert!(matches!(
            source.next_button(timeout),
            Err(SourceError::Disconnected)
        ));
        assert_eq!(source.next_button(timeout).unwrap(), None);
    }

    #[test]
    fn feed_writes_shared_axis_state() {
        let (source, feed) = ChannelSource::new(pad());
        feed.set_axis(0, 0.5);
        assert_eq!(source.axis_state().snapshot(), vec![(0, 0.5)]);
    }

    #[test]
    fn disconnected_source_refuses_to_connect() {
        let (mut source, _feed) = ChannelSource::disconnected();
        assert!(matches!(source.connect(), Err(SourceError::NoDevice)));
    }
}
