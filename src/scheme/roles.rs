use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// Joystick type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JoystickType {
    Left,
    Right,
}

// Trigger type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TriggerType {
    Left,
    Right,
}

/// Which scalar of a stick a raw axis id carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StickComponent {
    X,
    Y,
}

/// Axis roles, also the key of the capture debounce table.
///
/// Both components of a stick share one role, so an x and a y sample of the
/// same stick are debounced against each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AxisRole {
    LeftStick,
    RightStick,
    LeftTrigger,
    RightTrigger,
}

/// Logical channel a raw axis id belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AxisChannel {
    Stick {
        stick: JoystickType,
        component: StickComponent,
    },
    Trigger(TriggerType),
}

impl AxisChannel {
    pub fn role(&self) -> AxisRole {
        match self {
            AxisChannel::Stick {
                stick: JoystickType::Left,
                ..
            } => AxisRole::LeftStick,
            AxisChannel::Stick {
                stick: JoystickType::Right,
                ..
            } => AxisRole::RightStick,
            AxisChannel::Trigger(TriggerType::Left) => AxisRole::LeftTrigger,
            AxisChannel::Trigger(TriggerType::Right) => AxisRole::RightTrigger,
        }
    }
}

/// Semantic button roles, named after their position on the pad rather than
/// the glyph printed on a specific controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ButtonRole {
    ActionSouth,
    ActionEast,
    ActionWest,
    ActionNorth,
    Select,
    Guide,
    Start,
    LeftThumb,
    RightThumb,
    LeftShoulder,
    RightShoulder,
    DpadUp,
    DpadDown,
    DpadLeft,
    DpadRight,
    Touchpad,
}

impl ButtonRole {
    pub const ALL: [ButtonRole; 16] = [
        ButtonRole::ActionSouth,
        ButtonRole::ActionEast,
        ButtonRole::ActionWest,
        ButtonRole::ActionNorth,
        ButtonRole::Select,
        ButtonRole::Guide,
        ButtonRole::Start,
        ButtonRole::LeftThumb,
        ButtonRole::RightThumb,
        ButtonRole::LeftShoulder,
        ButtonRole::RightShoulder,
        ButtonRole::DpadUp,
        ButtonRole::DpadDown,
        ButtonRole::DpadLeft,
        ButtonRole::DpadRight,
        ButtonRole::Touchpad,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ButtonRole::ActionSouth => "action_south",
            ButtonRole::ActionEast => "action_east",
            ButtonRole::ActionWest => "action_west",
            ButtonRole::ActionNorth => "action_north",
            ButtonRole::Select => "select",
            ButtonRole::Guide => "guide",
            ButtonRole::Start => "start",
            ButtonRole::LeftThumb => "left_thumb",
            ButtonRole::RightThumb => "right_thumb",
            ButtonRole::LeftShoulder => "left_shoulder",
            ButtonRole::RightShoulder => "right_shoulder",
            ButtonRole::DpadUp => "dpad_up",
            ButtonRole::DpadDown => "dpad_down",
            ButtonRole::DpadLeft => "dpad_left",
            ButtonRole::DpadRight => "dpad_right",
            ButtonRole::Touchpad => "touchpad",
        }
    }
}

impl FromStr for ButtonRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ButtonRole::ALL
            .iter()
            .copied()
            .find(|role| role.as_str() == s)
            .ok_or_else(|| format!("unknown button role '{}'", s))
    }
}

impl fmt::Display for ButtonRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A semantic control, independent of device specific raw ids
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    LeftStick,
    RightStick,
    LeftTrigger,
    RightTrigger,
    Button(ButtonRole),
}

impl From<AxisRole> for Role {
    fn from(role: AxisRole) -> Self {
        match role {
            AxisRole::LeftStick => Role::LeftStick,
            AxisRole::RightStick => Role::RightStick,
            AxisRole::LeftTrigger => Role::LeftTrigger,
            AxisRole::RightTrigger => Role::RightTrigger,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::LeftStick => write!(f, "left_stick"),
            Role::RightStick => write!(f, "right_stick"),
            Role::LeftTrigger => write!(f, "left_trigger"),
            Role::RightTrigger => write!(f, "right_trigger"),
            Role::Button(button) => write!(f, "button.{}", button),
        }
    }
}

/// Raw ids behind a role
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleIds {
    Single(u32),
    Pair { x: u32, y: u32 },
}

/// Classifies raw channel ids into roles.
///
/// Implemented once by [`super::Scheme`] and shared by the capture engine and
/// the virtual-device mapper.
pub trait RoleClassifier: Send + Sync {
    fn classify_axis(&self, raw_id: u32) -> Option<AxisChannel>;

    fn classify_button(&self, raw_id: u32) -> Option<ButtonRole>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn button_role_names_round_trip() {
        for role in ButtonRole::ALL {
            assert_eq!(role.as_str().parse::<ButtonRole>(), Ok(role));
        }
        assert!("cross".parse::<ButtonRole>().is_err());
    }

    #[test]
    fn stick_components_share_a_role() {
        let x = AxisChannel::Stick {
            stick: JoystickType::Left,
            component: StickComponent::X,
        };
        let y = AxisChannel::Stick {
            stick: JoystickType::Left,
            component: StickComponent::Y,
        };
        assert_eq!(x.role(), y.role());
        assert_ne!(x.role(), AxisChannel::Trigger(TriggerType::Left).role());
    }
}
