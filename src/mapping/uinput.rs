//! Linux uinput backend presenting an Xbox 360 compatible gamepad

use crate::mapping::pad::{PadError, VirtualPad};
use crate::mapping::{PadButton, Stick, Trigger};
use evdev::uinput::VirtualDevice;
use evdev::{
    AbsInfo, AbsoluteAxisCode, AttributeSet, BusType, EventType, InputEvent, InputId, KeyCode,
    UinputAbsSetup,
};
use tracing::{debug, info};

const DEVICE_NAME: &str = "padecho virtual Xbox 360 pad";

// Microsoft X-Box 360 pad
const VENDOR_ID: u16 = 0x045e;
const PRODUCT_ID: u16 = 0x028e;

const STICK_MIN: i32 = -32_768;
const STICK_MAX: i32 = 32_767;
const TRIGGER_MAX: i32 = 255;

const STICK_AXES: [AbsoluteAxisCode; 4] = [
    AbsoluteAxisCode::ABS_X,
    AbsoluteAxisCode::ABS_Y,
    AbsoluteAxisCode::ABS_RX,
    AbsoluteAxisCode::ABS_RY,
];

const TRIGGER_AXES: [AbsoluteAxisCode; 2] = [AbsoluteAxisCode::ABS_Z, AbsoluteAxisCode::ABS_RZ];

fn key_code(button: PadButton) -> KeyCode {
    match button {
        PadButton::A => KeyCode::BTN_SOUTH,
        PadButton::B => KeyCode::BTN_EAST,
        PadButton::X => KeyCode::BTN_WEST,
        PadButton::Y => KeyCode::BTN_NORTH,
        PadButton::Back => KeyCode::BTN_SELECT,
        PadButton::Guide => KeyCode::BTN_MODE,
        PadButton::Start => KeyCode::BTN_START,
        PadButton::LeftThumb => KeyCode::BTN_THUMBL,
        PadButton::RightThumb => KeyCode::BTN_THUMBR,
        PadButton::LeftShoulder => KeyCode::BTN_TL,
        PadButton::RightShoulder => KeyCode::BTN_TR,
        PadButton::DpadUp => KeyCode::BTN_DPAD_UP,
        PadButton::DpadDown => KeyCode::BTN_DPAD_DOWN,
        PadButton::DpadLeft => KeyCode::BTN_DPAD_LEFT,
        PadButton::DpadRight => KeyCode::BTN_DPAD_RIGHT,
    }
}

const ALL_BUTTONS: [PadButton; 15] = [
    PadButton::A,
    PadButton::B,
    PadButton::X,
    PadButton::Y,
    PadButton::Back,
    PadButton::Guide,
    PadButton::Start,
    PadButton::LeftThumb,
    PadButton::RightThumb,
    PadButton::LeftShoulder,
    PadButton::RightShoulder,
    PadButton::DpadUp,
    PadButton::DpadDown,
    PadButton::DpadLeft,
    PadButton::DpadRight,
];

fn stick_value(v: f64) -> i32 {
    let v = v.clamp(-1.0, 1.0);
    if v >= 0.0 {
        (v * f64::from(STICK_MAX)).round() as i32
    } else {
        (-v * f64::from(STICK_MIN)).round() as i32
    }
}

fn trigger_value(v: f64) -> i32 {
    (v.clamp(0.0, 1.0) * f64::from(TRIGGER_MAX)).round() as i32
}

pub struct UinputPad {
    device: VirtualDevice,
    pending: Vec<InputEvent>,
}

impl UinputPad {
    pub fn create() -> Result<Self, PadError> {
        let mut keys = AttributeSet::<KeyCode>::new();
        for button in ALL_BUTTONS {
            keys.insert(key_code(button));
        }

        let mut builder = VirtualDevice::builder()?
            .name(DEVICE_NAME)
            .input_id(InputId::new(BusType::BUS_USB, VENDOR_ID, PRODUCT_ID, 0x0110))
            .with_keys(&keys)?;
        for axis in STICK_AXES {
            let info = AbsInfo::new(0, STICK_MIN, STICK_MAX, 16, 128, 0);
            builder = builder.with_absolute_axis(&UinputAbsSetup::new(axis, info))?;
        }
        for axis in TRIGGER_AXES {
            let info = AbsInfo::new(0, 0, TRIGGER_MAX, 0, 0, 0);
            builder = builder.with_absolute_axis(&UinputAbsSetup::new(axis, info))?;
        }
        let device = builder.build()?;

        info!("Created uinput device '{}'", DEVICE_NAME);
        Ok(Self {
            device,
            pending: Vec::new(),
        })
    }

    fn stage_key(&mut self, button: PadButton, value: i32) {
        self.pending
            .push(InputEvent::new(EventType::KEY.0, key_code(button).0, value));
    }

    fn stage_abs(&mut self, axis: AbsoluteAxisCode, value: i32) {
        self.pending
            .push(InputEvent::new(EventType::ABSOLUTE.0, axis.0, value));
    }
}

impl VirtualPad for UinputPad {
    fn press(&mut self, button: PadButton) -> Result<(), PadError> {
        self.stage_key(button, 1);
        Ok(())
    }

    fn release(&mut self, button: PadButton) -> Result<(), PadError> {
        self.stage_key(button, 0);
        Ok(())
    }

    fn set_stick(&mut self, stick: Stick, x: f64, y: f64) -> Result<(), PadError> {
        let (x_axis, y_axis) = match stick {
            Stick::Left => (AbsoluteAxisCode::ABS_X, AbsoluteAxisCode::ABS_Y),
            Stick::Right => (AbsoluteAxisCode::ABS_RX, AbsoluteAxisCode::ABS_RY),
        };
        self.stage_abs(x_axis, stick_value(x));
        // evdev reports Y down positive
        self.stage_abs(y_axis, stick_value(-y));
        Ok(())
    }

    fn set_trigger(&mut self, trigger: Trigger, value: f64) -> Result<(), PadError> {
        let axis = match trigger {
            Trigger::Left => AbsoluteAxisCode::ABS_Z,
            Trigger::Right => AbsoluteAxisCode::ABS_RZ,
        };
        self.stage_abs(axis, trigger_value(value));
        Ok(())
    }

    fn commit(&mut self) -> Result<(), PadError> {
        if self.pending.is_empty() {
            return Ok(());
        }
        // emit appends the SYN_REPORT
        self.device.emit(&self.pending)?;
        debug!("Emitted {} uinput events", self.pending.len());
        self.pending.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stick_values_span_the_full_range() {
        assert_eq!(stick_value(1.0), STICK_MAX);
        assert_eq!(stick_value(-1.0), STICK_MIN);
        assert_eq!(stick_value(0.0), 0);
        assert_eq!(stick_value(2.0), STICK_MAX);
    }

    #[test]
    fn trigger_values_span_a_byte() {
        assert_eq!(trigger_value(0.0), 0);
        assert_eq!(trigger_value(0.5), 128);
        assert_eq!(trigger_value(1.0), TRIGGER_MAX);
    }
}
