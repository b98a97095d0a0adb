//! Axis sample filtering for the capture path
//!
//! Two stages decide whether a polled axis value is worth recording:
//!
//! 1. **Dead zone**: magnitudes below the threshold snap to exactly 0.
//! 2. **Debounce**: a sample is accepted only if its role has not accepted
//!    one within the last `debounce_offset`. Both components of a stick share
//!    a role.
//!
//! Samples equal to the last value recorded for their channel are dropped
//! before either check, so an idle axis does not produce events. Callers that
//! poll several channels of one role should offer the channel with the oldest
//! [`AxisFilter::last_recorded`] first.

use crate::scheme::AxisRole;
use std::collections::HashMap;
use std::time::Duration;

/// Snaps `value` to 0 when `|value| < dead_zone`, otherwise returns it as is
pub fn apply_deadzone(value: f32, dead_zone: f32) -> f32 {
    if value.abs() < dead_zone {
        0.0
    } else {
        value
    }
}

/// Per-session axis filter state, owned by the axis loop
#[derive(Debug, Clone)]
pub struct AxisFilter {
    dead_zone: f32,
    debounce_offset: Duration,
    last_accepted: HashMap<AxisRole, Duration>,
    last_value: HashMap<u32, f32>,
    last_recorded: HashMap<u32, Duration>,
    debounced: u64,
}

impl AxisFilter {
    pub fn new(dead_zone: f32, debounce_offset: Duration) -> Self {
        Self {
            dead_zone,
            debounce_offset,
            last_accepted: HashMap::new(),
            last_value: HashMap::new(),
            last_recorded: HashMap::new(),
            debounced: 0,
        }
    }

    /// Filters one sample of channel `id` taken `elapsed` after session start.
    ///
    /// Returns the value to record, or `None` if the sample is dropped.
    pub fn accept(
        &mut self,
        id: u32,
        role: AxisRole,
        raw: f32,
        elapsed: Duration,
    ) -> Option<f32> {
        let value = apply_deadzone(raw, self.dead_zone);

        let previous = self.last_value.get(&id).copied().unwrap_or(0.0);
        if value == previous {
            return None;
        }

        if let Some(last) = self.last_accepted.get(&role) {
            if elapsed.saturating_sub(*last) < self.debounce_offset {
                self.debounced += 1;
                return None;
            }
        }

        self.last_accepted.insert(role, elapsed);
        self.last_value.insert(id, value);
        self.last_recorded.insert(id, elapsed);
        Some(value)
    }

    /// When channel `id` last had a sample accepted; `None` if never
    pub fn last_recorded(&self, id: u32) -> Option<Duration> {
        self.last_recorded.get(&id).copied()
    }

    /// Number of changed samples dropped by the debounce check
    pub fn debounced(&self) -> u64 {
        self.debounced
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OFFSET: Duration = Duration::from_millis(8);

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    #[test]
    fn deadzone_within_threshold() {
        assert_eq!(apply_deadzone(0.05, 0.06), 0.0);
        assert_eq!(apply_deadzone(-0.059, 0.06), 0.0);
    }

    #[test]
    fn deadzone_outside_threshold_is_untouched() {
        assert_eq!(apply_deadzone(0.06, 0.06), 0.06);
        assert_eq!(apply_deadzone(-0.7, 0.06), -0.7);
    }

    #[test]
    fn samples_inside_deadzone_record_as_zero() {
        let mut filter = AxisFilter::new(0.1, OFFSET);
        assert_eq!(filter.accept(0, AxisRole::LeftStick, 0.5, ms(0)), Some(0.5));
        assert_eq!(filter.accept(0, AxisRole::LeftStick, 0.04, ms(20)), Some(0.0));
        // Further jitter inside the dead zone is the same value: dropped
        assert_eq!(filter.accept(0, AxisRole::LeftStick, -0.09, ms(40)), None);
    }

    #[test]
    fn resting_axes_produce_nothing() {
        let mut filter = AxisFilter::new(0.06, OFFSET);
        for t in 0..10 {
            assert_eq!(filter.accept(2, AxisRole::RightStick, 0.01, ms(t * 8)), None);
        }
        assert_eq!(filter.debounced(), 0);
    }

    #[test]
    fn samples_closer_than_offset_are_debounced() {
        let mut filter = AxisFilter::new(0.06, OFFSET);
        assert_eq!(filter.accept(0, AxisRole::LeftStick, 0.3, ms(100)), Some(0.3));
        assert_eq!(filter.accept(0, AxisRole::LeftStick, 0.4, ms(107)), None);
        assert_eq!(filter.debounced(), 1);
    }

    #[test]
    fn samples_at_least_offset_apart_are_both_kept() {
        let mut filter = AxisFilter::new(0.06, OFFSET);
        assert_eq!(filter.accept(0, AxisRole::LeftStick, 0.3, ms(100)), Some(0.3));
        assert_eq!(filter.accept(0, AxisRole::LeftStick, 0.4, ms(108)), Some(0.4));
        assert_eq!(filter.accept(0, AxisRole::LeftStick, 0.5, ms(130)), Some(0.5));
    }

    #[test]
    fn debounce_is_shared_by_stick_components() {
        let mut filter = AxisFilter::new(0.06, OFFSET);
        assert_eq!(filter.accept(0, AxisRole::LeftStick, 0.3, ms(0)), Some(0.3));
        // y of the same stick within the offset is dropped...
        assert_eq!(filter.accept(1, AxisRole::LeftStick, 0.6, ms(4)), None);
        // ...and picked up once the offset has passed, since it still differs
        assert_eq!(filter.accept(1, AxisRole::LeftStick, 0.6, ms(8)), Some(0.6));
    }

    #[test]
    fn oldest_component_first_keeps_both_moving() {
        let mut filter = AxisFilter::new(0.06, OFFSET);
        let mut recorded = [0u32; 2];

        // x changes on every poll, y holds a deflection
        for tick in 0..10u64 {
            let x = 0.1 + tick as f32 * 0.05;
            let mut order = [(0u32, x), (1u32, 0.8)];
            order.sort_by_key(|(id, _)| filter.last_recorded(*id));
            for (id, raw) in order {
                if filter
                    .accept(id, AxisRole::LeftStick, raw, ms(tick * 8))
                    .is_some()
                {
                    recorded[id as usize] += 1;
                }
            }
        }

        assert_eq!(filter.last_recorded(1), Some(ms(8)));
        assert!(recorded[0] >= 4, "x recorded {} times", recorded[0]);
        assert_eq!(recorded[1], 1);
    }

    #[test]
    fn roles_are_debounced_independently() {
        let mut filter = AxisFilter::new(0.06, OFFSET);
        assert_eq!(filter.accept(0, AxisRole::LeftStick, 0.3, ms(0)), Some(0.3));
        assert_eq!(filter.accept(2, AxisRole::RightStick, 0.3, ms(1)), Some(0.3));
        assert_eq!(filter.accept(4, AxisRole::LeftTrigger, -1.0, ms(2)), Some(-1.0));
    }
}
