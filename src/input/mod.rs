//! Input events and recordings
//!
//! An [`InputEvent`] is one timestamped sample of one raw channel. A
//! [`Recording`] is the ordered sequence produced by a capture session and
//! consumed by replay; its order is chronological and is never changed.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Recorded value of a button going down
pub const BUTTON_DOWN: f64 = 0.0;
/// Recorded value of a button coming back up
pub const BUTTON_UP: f64 = 1.0;
/// Largest timestamp a stored event may carry, in seconds
pub const MAX_TIMESTAMP: f64 = 1.0e9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputKind {
    Button,
    Axis,
}

impl fmt::Display for InputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputKind::Button => write!(f, "button"),
            InputKind::Axis => write!(f, "axis"),
        }
    }
}

// Button state
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ButtonState {
    Pressed,
    Released,
}

impl ButtonState {
    pub fn value(self) -> f64 {
        match self {
            ButtonState::Pressed => BUTTON_DOWN,
            ButtonState::Released => BUTTON_UP,
        }
    }
}

/// One captured sample
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "EventRecord", into = "EventRecord")]
pub struct InputEvent {
    id: u32,
    kind: InputKind,
    value: f64,
    timestamp: f64,
}

impl InputEvent {
    pub fn button(id: u32, state: ButtonState, timestamp: f64) -> Self {
        Self {
            id,
            kind: InputKind::Button,
            value: state.value(),
            timestamp,
        }
    }

    pub fn axis(id: u32, value: f64, timestamp: f64) -> Self {
        Self {
            id,
            kind: InputKind::Axis,
            value,
            timestamp,
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn kind(&self) -> InputKind {
        self.kind
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    /// Seconds since the start of the session that produced the event
    pub fn timestamp(&self) -> f64 {
        self.timestamp
    }

    /// Button state, `None` for axis events
    pub fn button_state(&self) -> Option<ButtonState> {
        match self.kind {
            InputKind::Button if self.value == BUTTON_DOWN => Some(ButtonState::Pressed),
            InputKind::Button => Some(ButtonState::Released),
            InputKind::Axis => None,
        }
    }
}

/// On-disk shape of an event. Validated before it becomes an [`InputEvent`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRecord {
    pub id: u32,
    #[serde(rename = "type")]
    pub kind: InputKind,
    pub value: f64,
    pub timestamp: f64,
}

impl TryFrom<EventRecord> for InputEvent {
    type Error = String;

    fn try_from(record: EventRecord) -> Result<Self, Self::Error> {
        if !(0.0..=MAX_TIMESTAMP).contains(&record.timestamp) {
            return Err(format!(
                "event {} has invalid timestamp {}",
                record.id, record.timestamp
            ));
        }
        match record.kind {
            InputKind::Button if record.value != BUTTON_DOWN && record.value != BUTTON_UP => {
                Err(format!(
                    "button {} has value {}, expected {} or {}",
                    record.id, record.value, BUTTON_DOWN, BUTTON_UP
                ))
            }
            InputKind::Axis if !(-1.0..=1.0).contains(&record.value) => Err(format!(
                "axis {} has value {} outside [-1, 1]",
                record.id, record.value
            )),
            _ => Ok(Self {
                id: record.id,
                kind: record.kind,
                value: record.value,
                timestamp: record.timestamp,
            }),
        }
    }
}

impl From<InputEvent> for EventRecord {
    fn from(event: InputEvent) -> Self {
        Self {
            id: event.id,
            kind: event.kind,
            value: event.value,
            timestamp: event.timestamp,
        }
    }
}

/// Ordered sequence of events; insertion order is replay order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Recording {
    events: Vec<InputEvent>,
}

impl Recording {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: InputEvent) {
        self.events.push(event);
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// A fresh iterator, always starting at the first event
    pub fn iter(&self) -> std::slice::Iter<'_, InputEvent> {
        self.events.iter()
    }

    pub fn get(&self, index: usize) -> Option<&InputEvent> {
        self.events.get(index)
    }

    /// Timestamp of the last event, 0 for an empty recording
    pub fn duration(&self) -> f64 {
        self.events.last().map_or(0.0, InputEvent::timestamp)
    }

    /// Index of the first event whose timestamp is earlier than its predecessor
    pub fn first_out_of_order(&self) -> Option<usize> {
        self.events
            .windows(2)
            .position(|pair| pair[1].timestamp < pair[0].timestamp)
            .map(|i| i + 1)
    }
}

impl From<Vec<InputEvent>> for Recording {
    fn from(events: Vec<InputEvent>) -> Self {
        Self { events }
    }
}

impl<'a> IntoIterator for &'a Recording {
    type Item = &'a InputEvent;
    type IntoIter = std::slice::Iter<'a, InputEvent>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn button_constructor_encodes_state() {
        let down = InputEvent::button(3, ButtonState::Pressed, 0.1);
        let up = InputEvent::button(3, ButtonState::Released, 0.2);
        assert_eq!(down.value(), BUTTON_DOWN);
        assert_eq!(up.value(), BUTTON_UP);
        assert_eq!(down.button_state(), Some(ButtonState::Pressed));
        assert_eq!(up.button_state(), Some(ButtonState::Released));
        assert_eq!(InputEvent::axis(0, 0.5, 0.0).button_state(), None);
    }

    #[test]
    fn record_validation_rejects_bad_values() {
        let record = |kind, value, timestamp| EventRecord {
            id: 1,
            kind,
            value,
            timestamp,
        };
        assert!(InputEvent::try_from(record(InputKind::Button, 0.5, 0.0)).is_err());
        assert!(InputEvent::try_from(record(InputKind::Axis, 1.5, 0.0)).is_err());
        assert!(InputEvent::try_from(record(InputKind::Axis, 0.5, -0.1)).is_err());
        assert!(InputEvent::try_from(record(InputKind::Axis, 0.5, f64::NAN)).is_err());
        assert!(InputEvent::try_from(record(InputKind::Button, 0.0, 1e20)).is_err());
        assert!(InputEvent::try_from(record(InputKind::Button, 0.0, MAX_TIMESTAMP)).is_ok());
        assert!(InputEvent::try_from(record(InputKind::Axis, -1.0, 2.0)).is_ok());
        assert!(InputEvent::try_from(record(InputKind::Button, 1.0, 2.0)).is_ok());
    }

    #[test]
    fn iteration_restarts_from_first_event() {
        let recording = Recording::from(vec![
            InputEvent::button(0, ButtonState::Pressed, 0.0),
            InputEvent::axis(1, 0.25, 0.5),
        ]);

        let mut first = recording.iter();
        first.next();
        let ids: Vec<u32> = recording.iter().map(InputEvent::id).collect();
        assert_eq!(ids, vec![0, 1]);
        assert_eq!(recording.duration(), 0.5);
    }

    #[test]
    fn detects_out_of_order_timestamps() {
        let ordered = Recording::from(vec![
            InputEvent::axis(0, 0.1, 0.0),
            InputEvent::axis(0, 0.2, 0.0),
            InputEvent::axis(0, 0.3, 0.4),
        ]);
        assert_eq!(ordered.first_out_of_order(), None);

        let shuffled = Recording::from(vec![
            InputEvent::axis(0, 0.1, 0.3),
            InputEvent::axis(0, 0.2, 0.1),
        ]);
        assert_eq!(shuffled.first_out_of_order(), Some(1));
    }
}
