//! gilrs backed input source
//!
//! gilrs identifies controls by its own mapped enums; the collector turns
//! them into stable SDL game controller channel numbers so scheme files read
//! the same on every platform:
//!
//! | axis id | control        | button id | control        |
//! |---------|----------------|-----------|----------------|
//! | 0       | left stick x   | 0–3       | south/east/west/north |
//! | 1       | left stick y   | 4, 5, 6   | select, guide, start |
//! | 2       | right stick x  | 7, 8      | left/right thumb |
//! | 3       | right stick y  | 9, 10     | left/right shoulder |
//! | 4       | left trigger   | 11–14     | dpad up/down/left/right |
//! | 5       | right trigger  |           |                |
//!
//! Stick Y axes are reported "down positive" and analog triggers span
//! [-1, 1] with -1 at rest, matching the SDL joystick convention recordings
//! are stored in.

use crate::controller::source::{AxisState, ButtonEdge, DeviceInfo, InputSource, SourceError};
use crate::input::ButtonState;
use gilrs::{Axis, Button, Event, EventType, GamepadId, Gilrs};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

const PUMP_SLEEP: Duration = Duration::from_micros(500);

const AXES: [(Axis, u32); 6] = [
    (Axis::LeftStickX, 0),
    (Axis::LeftStickY, 1),
    (Axis::RightStickX, 2),
    (Axis::RightStickY, 3),
    (Axis::LeftZ, 4),
    (Axis::RightZ, 5),
];

const TRIGGER_AXES: [(Button, u32); 2] = [(Button::LeftTrigger2, 4), (Button::RightTrigger2, 5)];

const BUTTONS: [(Button, u32); 15] = [
    (Button::South, 0),
    (Button::East, 1),
    (Button::West, 2),
    (Button::North, 3),
    (Button::Select, 4),
    (Button::Mode, 5),
    (Button::Start, 6),
    (Button::LeftThumb, 7),
    (Button::RightThumb, 8),
    (Button::LeftTrigger, 9),
    (Button::RightTrigger, 10),
    (Button::DPadUp, 11),
    (Button::DPadDown, 12),
    (Button::DPadLeft, 13),
    (Button::DPadRight, 14),
];

pub struct GilrsCollector {
    // Gilrs context
    gilrs: Gilrs,

    // Active gamepad
    active_gamepad: Option<GamepadId>,

    axes: AxisState,
}

impl GilrsCollector {
    pub fn create() -> Result<Self, SourceError> {
        info!("Initializing gilrs controller interface");
        let gilrs = match Gilrs::new() {
            Ok(g) => {
                info!("Successfully initialized gilrs");
                g
            }
            Err(e) => {
                error!("Failed to initialize gilrs: {}", e);
                return Err(SourceError::Backend(e.to_string()));
            }
        };

        Ok(Self {
            gilrs,
            active_gamepad: None,
            axes: AxisState::new(),
        })
    }

    fn handle_event(&mut self, event: EventType) -> Result<Option<ButtonEdge>, SourceError> {
        match event {
            EventType::AxisChanged(axis, value, _) => {
                if let Some(id) = axis_id(axis) {
                    let value = match axis {
                        Axis::LeftStickY | Axis::RightStickY => -value,
                        _ => value,
                    };
                    self.axes.set(id, value);
                } else {
                    debug!("Ignoring unsupported axis: {:?}", axis);
                }
                Ok(None)
            }
            EventType::ButtonChanged(button, value, _) => {
                if let Some(id) = trigger_axis_id(button) {
                    self.axes.set(id, value * 2.0 - 1.0);
                }
                Ok(None)
            }
            EventType::ButtonPressed(button, _) => Ok(edge(button, ButtonState::Pressed)),
            EventType::ButtonReleased(button, _) => Ok(edge(button, ButtonState::Released)),
            EventType::ButtonRepeated(button, _) => {
                debug!("Button repeat ignored: {:?}", button);
                Ok(None)
            }
            EventType::Disconnected => {
                warn!("Controller disconnected event detected");
                self.active_gamepad = None;
                self.axes.clear();
                Err(SourceError::Disconnected)
            }
            _ => {
                debug!("Unhandled event type: {:?}", event);
                Ok(None)
            }
        }
    }
}

impl InputSource for GilrsCollector {
    fn connect(&mut self) -> Result<DeviceInfo, SourceError> {
        // Drain queued connection events so the gamepad list is current
        while self.gilrs.next_event().is_some() {}

        let Some((id, gamepad)) = self.gilrs.gamepads().find(|(_, g)| g.is_connected()) else {
            warn!("No gamepad connected");
            return Err(SourceError::NoDevice);
        };

        let info = DeviceInfo {
            name: gamepad.name().to_string(),
            axes: AXES
                .iter()
                .filter(|(axis, _)| gamepad.axis_code(*axis).is_some())
                .count(),
            buttons: BUTTONS
                .iter()
                .filter(|(button, _)| gamepad.button_code(*button).is_some())
                .count(),
        };
        info!(
            "Selected gamepad: {} ({}), UUID: {:?}",
            info.name,
            id,
            gamepad.uuid()
        );

        self.active_gamepad = Some(id);
        self.axes.clear();
        Ok(info)
    }

    fn axis_state(&self) -> AxisState {
        self.axes.clone()
    }

    fn next_button(&mut self, timeout: Duration) -> Result<Option<ButtonEdge>, SourceError> {
        let deadline = Instant::now() + timeout;

        loop {
            while let Some(Event { id, event, .. }) = self.gilrs.next_event() {
                if self.active_gamepad.is_some_and(|active| active != id) {
                    debug!("Skipping event from non-active gamepad: {:?}", id);
                    continue;
                }
                if let Some(edge) = self.handle_event(event)? {
                    return Ok(Some(edge));
                }
            }

            if Instant::now() >= deadline {
                return Ok(None);
            }
            std::thread::sleep(PUMP_SLEEP);
        }
    }
}

fn axis_id(axis: Axis) -> Option<u32> {
    AXES.iter().find(|(a, _)| *a == axis).map(|(_, id)| *id)
}

fn trigger_axis_id(button: Button) -> Option<u32> {
    TRIGGER_AXES
        .iter()
        .find(|(b, _)| *b == button)
        .map(|(_, id)| *id)
}

fn button_id(button: Button) -> Option<u32> {
    BUTTONS.iter().find(|(b, _)| *b == button).map(|(_, id)| *id)
}

fn edge(button: Button, state: ButtonState) -> Option<ButtonEdge> {
    // Analog triggers are recorded as axes, not as button edges
    if trigger_axis_id(button).is_some() {
        return None;
    }
    match button_id(button) {
        Some(id) => Some(ButtonEdge { id, state }),
        None => {
            debug!("Ignoring unmapped gilrs button: {:?}", button);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_numbers_are_unique() {
        let mut axis_ids: Vec<u32> = AXES.iter().map(|(_, id)| *id).collect();
        axis_ids.sort();
        axis_ids.dedup();
        assert_eq!(axis_ids.len(), AXES.len());

        let mut button_ids: Vec<u32> = BUTTONS.iter().map(|(_, id)| *id).collect();
        button_ids.sort();
        button_ids.dedup();
        assert_eq!(button_ids.len(), BUTTONS.len());
    }

    #[test]
    fn analog_triggers_share_trigger_axes() {
        assert_eq!(trigger_axis_id(Button::LeftTrigger2), axis_id(Axis::LeftZ));
        assert_eq!(trigger_axis_id(Button::RightTrigger2), axis_id(Axis::RightZ));
        assert_eq!(edge(Button::LeftTrigger2, ButtonState::Pressed), None);
    }

    #[test]
    fn buttons_map_to_sdl_numbers() {
        assert_eq!(
            edge(Button::South, ButtonState::Pressed),
            Some(ButtonEdge {
                id: 0,
                state: ButtonState::Pressed
            })
        );
        assert_eq!(button_id(Button::DPadRight), Some(14));
        assert_eq!(button_id(Button::Unknown), None);
    }
}
