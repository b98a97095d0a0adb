//! Raw input probe for authoring scheme files

use crate::controller::capture::CaptureError;
use crate::controller::source::{DeviceInfo, InputSource};
use crate::input::{ButtonState, InputKind};
use crate::scheme::Scheme;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::{debug, info};

const PROBE_WAIT: Duration = Duration::from_millis(20);

// Axis movement smaller than this is not reported
const PROBE_AXIS_STEP: f32 = 0.25;

/// One line of probe output
#[derive(Debug, Clone, PartialEq)]
pub enum ProbeEvent {
    Button { id: u32, pressed: bool, role: Option<String> },
    Axis { id: u32, value: f32, role: Option<String> },
}

/// Connects `source` and reports every raw button edge and every
/// significant axis movement for `duration`, with the role `scheme` gives it
pub fn probe(
    source: &mut dyn InputSource,
    scheme: &Scheme,
    duration: Duration,
) -> Result<(DeviceInfo, Vec<ProbeEvent>), CaptureError> {
    let device = source.connect()?;
    info!(
        "Probing '{}' ({} axes, {} buttons) for {:?}",
        device.name, device.axes, device.buttons, duration
    );
    info!(
        "Scheme '{}' expects axes {:?} and buttons {:?}",
        scheme.device(),
        scheme
            .axis_channels()
            .iter()
            .map(|(id, _)| *id)
            .collect::<Vec<_>>(),
        scheme.buttons().iter().map(|(id, _)| *id).collect::<Vec<_>>()
    );
    for (id, channel) in scheme.axis_channels() {
        debug!("scheme axis   {:>2} -> {:?}", id, channel);
    }
    for (id, button) in scheme.buttons() {
        debug!("scheme button {:>2} -> {}", id, button);
    }

    let axes = source.axis_state();
    let mut reported: HashMap<u32, f32> = HashMap::new();
    let mut seen = Vec::new();
    let deadline = Instant::now() + duration;

    while Instant::now() < deadline {
        if let Some(edge) = source.next_button(PROBE_WAIT)? {
            let role = scheme
                .resolve_role(edge.id, InputKind::Button)
                .map(|r| r.to_string());
            info!(
                "button {:>2} {:<8} -> {}",
                edge.id,
                format!("{:?}", edge.state),
                role.as_deref().unwrap_or("unmapped")
            );
            seen.push(ProbeEvent::Button {
                id: edge.id,
                pressed: edge.state == ButtonState::Pressed,
                role,
            });
        }

        for (id, value) in axes.snapshot() {
            let last = reported.get(&id).copied().unwrap_or(0.0);
            if (value - last).abs() < PROBE_AXIS_STEP {
                continue;
            }
            reported.insert(id, value);

            let role = scheme
                .resolve_role(id, InputKind::Axis)
                .map(|r| r.to_string());
            info!(
                "axis   {:>2} {:>+8.3} -> {}",
                id,
                value,
                role.as_deref().unwrap_or("unmapped")
            );
            seen.push(ProbeEvent::Axis { id, value, role });
        }
    }

    Ok((device, seen))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::source::ChannelSource;
    use crate::scheme::SchemeBook;

    #[test]
    fn probe_reports_roles() {
        let scheme = SchemeBook::builtin().unwrap().scheme("dualsense").unwrap();
        let (mut source, feed) = ChannelSource::new(DeviceInfo {
            name: "probe pad".into(),
            axes: 6,
            buttons: 16,
        });
        feed.press(15);
        feed.press(42);
        feed.set_axis(5, 0.9);
        feed.set_axis(1, 0.1);

        let (device, seen) = probe(&mut source, &scheme, Duration::from_millis(80)).unwrap();
        assert_eq!(device.name, "probe pad");
        assert!(seen.contains(&ProbeEvent::Button {
            id: 15,
            pressed: true,
            role: Some("button.touchpad".into())
        }));
        assert!(seen.contains(&ProbeEvent::Button {
            id: 42,
            pressed: true,
            role: None
        }));
        assert!(seen.contains(&ProbeEvent::Axis {
            id: 5,
            value: 0.9,
            role: Some("right_trigger".into())
        }));
        // Below the reporting step
        assert!(!seen.iter().any(|e| matches!(e, ProbeEvent::Axis { id: 1, .. })));
    }

    #[test]
    fn probe_without_device_fails() {
        let scheme = SchemeBook::builtin().unwrap().scheme("dualsense").unwrap();
        let (mut source, _feed) = ChannelSource::disconnected();
        assert!(matches!(
            probe(&mut source, &scheme, Duration::from_millis(10)),
            Err(CaptureError::NoDeviceConnected)
        ));
    }
}
