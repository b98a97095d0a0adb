//! Translation of recorded physical-device events into virtual controller
//! actions.
//!
//! The virtual device is an Xbox 360 style pad: fifteen digital buttons, two
//! analog sticks and two analog triggers. [`PadMapper`] turns one
//! [`InputEvent`](crate::input::InputEvent) into one [`Action`]; the action is
//! then applied to any [`VirtualPad`] backend.

pub mod mapper;
pub mod pad;
#[cfg(all(feature = "uinput", target_os = "linux"))]
pub mod uinput;

pub use mapper::PadMapper;
pub use pad::{PadError, PadState, TracePad, VirtualPad};
#[cfg(all(feature = "uinput", target_os = "linux"))]
pub use uinput::UinputPad;

use std::fmt;
use thiserror::Error;

/// Buttons of the virtual pad
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PadButton {
    A,
    B,
    X,
    Y,
    Back,
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
}

impl fmt::Display for PadButton {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PadButton::A => "XUSB_GAMEPAD_A",
            PadButton::B => "XUSB_GAMEPAD_B",
            PadButton::X => "XUSB_GAMEPAD_X",
            PadButton::Y => "XUSB_GAMEPAD_Y",
            PadButton::Back => "XUSB_GAMEPAD_BACK",
            PadButton::Guide => "XUSB_GAMEPAD_GUIDE",
            PadButton::Start => "XUSB_GAMEPAD_START",
            PadButton::LeftThumb => "XUSB_GAMEPAD_LEFT_THUMB",
            PadButton::RightThumb => "XUSB_GAMEPAD_RIGHT_THUMB",
            PadButton::LeftShoulder => "XUSB_GAMEPAD_LEFT_SHOULDER",
            PadButton::RightShoulder => "XUSB_GAMEPAD_RIGHT_SHOULDER",
            PadButton::DpadUp => "XUSB_GAMEPAD_DPAD_UP",
            PadButton::DpadDown => "XUSB_GAMEPAD_DPAD_DOWN",
            PadButton::DpadLeft => "XUSB_GAMEPAD_DPAD_LEFT",
            PadButton::DpadRight => "XUSB_GAMEPAD_DPAD_RIGHT",
        };
        f.write_str(name)
    }
}

// Stick type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stick {
    Left,
    Right,
}

// Trigger type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Trigger {
    Left,
    Right,
}

/// One state change of the virtual pad
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Action {
    PressButton(PadButton),
    ReleaseButton(PadButton),
    /// Both components in [-1, 1], y up positive
    SetStick(Stick, f64, f64),
    /// Pull in [0, 1]
    SetTrigger(Trigger, f64),
}

impl Action {
    /// Routes the action to the matching pad call. Does not commit.
    pub fn apply<P: VirtualPad + ?Sized>(&self, pad: &mut P) -> Result<(), PadError> {
        match *self {
            Action::PressButton(button) => pad.press(button),
            Action::ReleaseButton(button) => pad.release(button),
            Action::SetStick(stick, x, y) => pad.set_stick(stick, x, y),
            Action::SetTrigger(trigger, value) => pad.set_trigger(trigger, value),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MapError {
    #[error("Button {id} has no virtual pad button")]
    UnmappedButton { id: u32 },

    #[error("Axis {id} is not part of the controller scheme")]
    UnmappedAxis { id: u32 },
}
