//! Virtual controller backends

use crate::mapping::{PadButton, Stick, Trigger};
use std::collections::BTreeSet;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum PadError {
    #[error("Virtual device I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Driver of a virtual Xbox 360 style controller.
///
/// Setters stage state; `commit` publishes everything staged since the last
/// commit as one report.
pub trait VirtualPad: Send {
    fn press(&mut self, button: PadButton) -> Result<(), PadError>;

    fn release(&mut self, button: PadButton) -> Result<(), PadError>;

    /// `x` and `y` in [-1, 1], y up positive
    fn set_stick(&mut self, stick: Stick, x: f64, y: f64) -> Result<(), PadError>;

    /// `value` in [0, 1]
    fn set_trigger(&mut self, trigger: Trigger, value: f64) -> Result<(), PadError>;

    fn commit(&mut self) -> Result<(), PadError>;
}

impl<P: VirtualPad + ?Sized> VirtualPad for Box<P> {
    fn press(&mut self, button: PadButton) -> Result<(), PadError> {
        (**self).press(button)
    }

    fn release(&mut self, button: PadButton) -> Result<(), PadError> {
        (**self).release(button)
    }

    fn set_stick(&mut self, stick: Stick, x: f64, y: f64) -> Result<(), PadError> {
        (**self).set_stick(stick, x, y)
    }

    fn set_trigger(&mut self, trigger: Trigger, value: f64) -> Result<(), PadError> {
        (**self).set_trigger(trigger, value)
    }

    fn commit(&mut self) -> Result<(), PadError> {
        (**self).commit()
    }
}

/// Complete state of the virtual pad
#[derive(Debug, Default, Clone, PartialEq)]
pub struct PadState {
    pub buttons: BTreeSet<PadButton>,
    pub left_stick: (f64, f64),
    pub right_stick: (f64, f64),
    pub left_trigger: f64,
    pub right_trigger: f64,
}

/// Pad that only logs its committed state, used when no virtual device
/// driver is available
#[derive(Debug, Default)]
pub struct TracePad {
    staged: PadState,
    committed: PadState,
    commits: u64,
}

impl TracePad {
    pub fn new() -> Self {
        info!("Using trace pad, replayed input is logged only");
        Self::default()
    }

    /// State as of the last commit
    pub fn state(&self) -> &PadState {
        &self.committed
    }

    pub fn commits(&self) -> u64 {
        self.commits
    }
}

impl VirtualPad for TracePad {
    fn press(&mut self, button: PadButton) -> Result<(), PadError> {
        self.staged.buttons.insert(button);
        Ok(())
    }

    fn release(&mut self, button: PadButton) -> Result<(), PadError> {
        self.staged.buttons.remove(&button);
        Ok(())
    }

    fn set_stick(&mut self, stick: Stick, x: f64, y: f64) -> Result<(), PadError> {
        match stick {
            Stick::Left => self.staged.left_stick = (x, y),
            Stick::Right => self.staged.right_stick = (x, y),
        }
        Ok(())
    }

    fn set_trigger(&mut self, trigger: Trigger, value: f64) -> Result<(), PadError> {
        match trigger {
            Trigger::Left => self.staged.left_trigger = value,
            Trigger::Right => self.staged.right_trigger = value,
        }
        Ok(())
    }

    fn commit(&mut self) -> Result<(), PadError> {
        self.committed = self.staged.clone();
        self.commits += 1;
        debug!(
            "pad #{}: buttons {:?} L({:+.3}, {:+.3}) R({:+.3}, {:+.3}) LT {:.3} RT {:.3}",
            self.commits,
            self.committed.buttons,
            self.committed.left_stick.0,
            self.committed.left_stick.1,
            self.committed.right_stick.0,
            self.committed.right_stick.1,
            self.committed.left_trigger,
            self.committed.right_trigger
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::Action;

    #[test]
    fn state_is_published_on_commit() {
        let mut pad = TracePad::new();
        Action::PressButton(PadButton::A).apply(&mut pad).unwrap();
        Action::SetStick(Stick::Left, 0.5, -0.5).apply(&mut pad).unwrap();
        assert_eq!(pad.state(), &PadState::default());

        pad.commit().unwrap();
        assert!(pad.state().buttons.contains(&PadButton::A));
        assert_eq!(pad.state().left_stick, (0.5, -0.5));
        assert_eq!(pad.commits(), 1);
    }

    #[test]
    fn release_clears_button() {
        let mut pad = TracePad::new();
        Action::PressButton(PadButton::Start).apply(&mut pad).unwrap();
        Action::SetTrigger(Trigger::Right, 1.0).apply(&mut pad).unwrap();
        pad.commit().unwrap();
        Action::ReleaseButton(PadButton::Start).apply(&mut pad).unwrap();
        pad.commit().unwrap();

        assert!(pad.state().buttons.is_empty());
        assert_eq!(pad.state().right_trigger, 1.0);
    }
}
