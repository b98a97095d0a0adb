//! Physical event → virtual pad action

use crate::input::{ButtonState, InputEvent, InputKind};
use crate::mapping::{Action, MapError, PadButton, Stick, Trigger};
use crate::scheme::{
    AxisChannel, ButtonRole, JoystickType, RoleClassifier, StickComponent, TriggerType,
};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

// Button role → virtual pad button
const BUTTON_TABLE: [(ButtonRole, PadButton); 16] = [
    (ButtonRole::ActionSouth, PadButton::A),
    (ButtonRole::ActionEast, PadButton::B),
    (ButtonRole::ActionWest, PadButton::X),
    (ButtonRole::ActionNorth, PadButton::Y),
    (ButtonRole::Select, PadButton::Back),
    (ButtonRole::Guide, PadButton::Guide),
    (ButtonRole::Start, PadButton::Start),
    (ButtonRole::LeftThumb, PadButton::LeftThumb),
    (ButtonRole::RightThumb, PadButton::RightThumb),
    (ButtonRole::LeftShoulder, PadButton::LeftShoulder),
    (ButtonRole::RightShoulder, PadButton::RightShoulder),
    (ButtonRole::DpadUp, PadButton::DpadUp),
    (ButtonRole::DpadDown, PadButton::DpadDown),
    (ButtonRole::DpadLeft, PadButton::DpadLeft),
    (ButtonRole::DpadRight, PadButton::DpadRight),
    // The pad has no touchpad
    (ButtonRole::Touchpad, PadButton::Back),
];

/// Last reported components of one stick
#[derive(Debug, Default, Clone, Copy, PartialEq)]
struct StickPosition {
    x: f64,
    y: f64,
}

pub struct PadMapper {
    classifier: Arc<dyn RoleClassifier>,
    buttons: HashMap<ButtonRole, PadButton>,
    dead_zone: f64,

    // Stick reconstruction state
    left: StickPosition,
    right: StickPosition,
}

impl PadMapper {
    pub fn new(classifier: Arc<dyn RoleClassifier>, dead_zone: f32) -> Self {
        Self {
            classifier,
            buttons: BUTTON_TABLE.into_iter().collect(),
            dead_zone: f64::from(dead_zone),
            left: StickPosition::default(),
            right: StickPosition::default(),
        }
    }

    /// Forgets both stick positions
    pub fn reset(&mut self) {
        self.left = StickPosition::default();
        self.right = StickPosition::default();
    }

    pub fn map(&mut self, event: &InputEvent) -> Result<Action, MapError> {
        match event.kind() {
            InputKind::Button => self.map_button(event),
            InputKind::Axis => self.map_axis(event),
        }
    }

    fn map_button(&self, event: &InputEvent) -> Result<Action, MapError> {
        let id = event.id();
        let button = self
            .classifier
            .classify_button(id)
            .and_then(|role| self.buttons.get(&role).copied())
            .ok_or(MapError::UnmappedButton { id })?;

        match event.button_state() {
            Some(ButtonState::Pressed) => Ok(Action::PressButton(button)),
            _ => Ok(Action::ReleaseButton(button)),
        }
    }

    fn map_axis(&mut self, event: &InputEvent) -> Result<Action, MapError> {
        let id = event.id();
        let channel = self
            .classifier
            .classify_axis(id)
            .ok_or(MapError::UnmappedAxis { id })?;

        let action = match channel {
            AxisChannel::Stick { stick, component } => {
                let value = self.apply_deadzone(event.value());
                let (target, position) = match stick {
                    JoystickType::Left => (Stick::Left, &mut self.left),
                    JoystickType::Right => (Stick::Right, &mut self.right),
                };
                match component {
                    StickComponent::X => position.x = value,
                    // Recorded down positive, the pad expects up positive
                    StickComponent::Y => position.y = -value,
                }
                Action::SetStick(target, position.x, position.y)
            }
            AxisChannel::Trigger(trigger) => {
                let target = match trigger {
                    TriggerType::Left => Trigger::Left,
                    TriggerType::Right => Trigger::Right,
                };
                Action::SetTrigger(target, (event.value() + 1.0) / 2.0)
            }
        };

        debug!("Axis {} ({:?}) -> {:?}", id, channel, action);
        Ok(action)
    }

    fn apply_deadzone(&self, value: f64) -> f64 {
        if value.abs() < self.dead_zone {
            0.0
        } else {
            value
        }
    }
}
