//! Controller schemes
//!
//! A scheme maps the raw channel ids a physical device reports to semantic
//! roles. Schemes are declared per device name in TOML files:
//!
//! ```toml
//! [axis.left_stick]
//! x = 0
//! y = 1
//!
//! [axis.triggers]
//! left = 4
//!
//! [button]
//! action_south = 0
//! ```
//!
//! A [`SchemeBook`] holds the tables of every known device; [`Scheme`] is the
//! resolved, read-only view used for one capture or replay session.

pub mod roles;

pub use roles::{
    AxisChannel, AxisRole, ButtonRole, JoystickType, Role, RoleClassifier, RoleIds,
    StickComponent, TriggerType,
};

use crate::input::InputKind;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const BUILTIN_SCHEMES: [(&str, &str); 2] = [
    ("dualsense", include_str!("../../schemes/dualsense.toml")),
    ("xbox360", include_str!("../../schemes/xbox360.toml")),
];

#[derive(Debug, thiserror::Error)]
pub enum SchemeError {
    #[error("No controller scheme for device '{0}'")]
    UnknownDevice(String),

    #[error("Scheme '{device}' has no entry for role {role}")]
    MissingRole { device: String, role: Role },

    #[error("Scheme '{device}' names unknown button role: {reason}")]
    UnknownButtonRole { device: String, reason: String },

    #[error("Scheme '{device}' assigns raw {kind} id {id} twice")]
    DuplicateId {
        device: String,
        kind: InputKind,
        id: u32,
    },

    #[error("Failed to read scheme file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed scheme '{device}': {source}")]
    Parse {
        device: String,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct StickIds {
    pub x: u32,
    pub y: u32,
}

#[derive(Deserialize, Serialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TriggerIds {
    pub left: Option<u32>,
    pub right: Option<u32>,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct AxisTable {
    pub left_stick: Option<StickIds>,
    pub right_stick: Option<StickIds>,
    #[serde(default)]
    pub triggers: TriggerIds,
}

/// Declarative description of one device, as found in a scheme file
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct SchemeTable {
    #[serde(default)]
    pub axis: AxisTable,
    /// Button role name to raw button id
    #[serde(default)]
    pub button: BTreeMap<String, u32>,
}

impl SchemeTable {
    pub fn parse(device: &str, text: &str) -> Result<Self, SchemeError> {
        toml::from_str(text).map_err(|source| SchemeError::Parse {
            device: device.to_string(),
            source,
        })
    }
}

/// Device name to scheme table
#[derive(Clone, Debug, Default)]
pub struct SchemeBook {
    tables: BTreeMap<String, SchemeTable>,
}

impl SchemeBook {
    /// Book with the schemes bundled into the binary
    pub fn builtin() -> Result<Self, SchemeError> {
        let mut book = Self::default();
        for (device, text) in BUILTIN_SCHEMES {
            book.insert(device, SchemeTable::parse(device, text)?);
        }
        Ok(book)
    }

    /// Builtin schemes overlaid with every `*.toml` file in `dir`.
    ///
    /// The file stem is the device name. A missing directory is not an error.
    pub fn load_dir(dir: &Path) -> Result<Self, SchemeError> {
        let mut book = Self::builtin()?;

        if !dir.is_dir() {
            debug!("Scheme directory {} does not exist, using builtins", dir.display());
            return Ok(book);
        }

        let entries = fs::read_dir(dir).map_err(|source| SchemeError::Io {
            path: dir.to_path_buf(),
            source,
        })?;

        for entry in entries {
            let path = entry
                .map_err(|source| SchemeError::Io {
                    path: dir.to_path_buf(),
                    source,
                })?
                .path();
            if path.extension().and_then(|e| e.to_str()) != Some("toml") {
                continue;
            }
            let Some(device) = path.file_stem().and_then(|s| s.to_str()) else {
                warn!("Skipping scheme file with unusable name: {}", path.display());
                continue;
            };
            let text = fs::read_to_string(&path).map_err(|source| SchemeError::Io {
                path: path.clone(),
                source,
            })?;
            info!("Loaded controller scheme '{}' from {}", device, path.display());
            book.insert(device, SchemeTable::parse(device, &text)?);
        }

        Ok(book)
    }

    pub fn insert(&mut self, device: &str, table: SchemeTable) {
        self.tables.insert(device.to_string(), table);
    }

    pub fn devices(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    /// Resolves the scheme for `device`
    pub fn scheme(&self, device: &str) -> Result<Scheme, SchemeError> {
        let table = self
            .tables
            .get(device)
            .ok_or_else(|| SchemeError::UnknownDevice(device.to_string()))?;
        Scheme::from_table(device, table.clone())
    }
}

/// Resolved scheme of one device. Read-only once built.
#[derive(Clone, Debug)]
pub struct Scheme {
    device: String,
    table: SchemeTable,
    axes: HashMap<u32, AxisChannel>,
    buttons: HashMap<u32, ButtonRole>,
}

impl Scheme {
    pub fn from_table(device: &str, table: SchemeTable) -> Result<Self, SchemeError> {
        let mut axes = HashMap::new();
        let mut insert_axis = |id: u32, channel: AxisChannel| {
            if axes.insert(id, channel).is_some() {
                return Err(SchemeError::DuplicateId {
                    device: device.to_string(),
                    kind: InputKind::Axis,
                    id,
                });
            }
            Ok(())
        };

        for (stick, ids) in [
            (JoystickType::Left, table.axis.left_stick),
            (JoystickType::Right, table.axis.right_stick),
        ] {
            if let Some(StickIds { x, y }) = ids {
                insert_axis(
                    x,
                    AxisChannel::Stick {
                        stick,
                        component: StickComponent::X,
                    },
                )?;
                insert_axis(
                    y,
                    AxisChannel::Stick {
                        stick,
                        component: StickComponent::Y,
                    },
                )?;
            }
        }
        for (trigger, id) in [
            (TriggerType::Left, table.axis.triggers.left),
            (TriggerType::Right, table.axis.triggers.right),
        ] {
            if let Some(id) = id {
                insert_axis(id, AxisChannel::Trigger(trigger))?;
            }
        }

        let mut buttons = HashMap::new();
        for (name, &id) in &table.button {
            let role: ButtonRole =
                name.parse()
                    .map_err(|reason| SchemeError::UnknownButtonRole {
                        device: device.to_string(),
                        reason,
                    })?;
            if buttons.insert(id, role).is_some() {
                return Err(SchemeError::DuplicateId {
                    device: device.to_string(),
                    kind: InputKind::Button,
                    id,
                });
            }
        }

        debug!(
            "Scheme '{}' resolved: {} axis channels, {} buttons",
            device,
            axes.len(),
            buttons.len()
        );

        Ok(Self {
            device: device.to_string(),
            table,
            axes,
            buttons,
        })
    }

    pub fn device(&self) -> &str {
        &self.device
    }

    pub fn resolve_role(&self, raw_id: u32, kind: InputKind) -> Option<Role> {
        match kind {
            InputKind::Button => self.classify_button(raw_id).map(Role::Button),
            InputKind::Axis => self
                .classify_axis(raw_id)
                .map(|channel| Role::from(channel.role())),
        }
    }

    pub fn role_ids(&self, role: Role) -> Result<RoleIds, SchemeError> {
        let ids = match role {
            Role::LeftStick => self
                .table
                .axis
                .left_stick
                .map(|StickIds { x, y }| RoleIds::Pair { x, y }),
            Role::RightStick => self
                .table
                .axis
                .right_stick
                .map(|StickIds { x, y }| RoleIds::Pair { x, y }),
            Role::LeftTrigger => self.table.axis.triggers.left.map(RoleIds::Single),
            Role::RightTrigger => self.table.axis.triggers.right.map(RoleIds::Single),
            Role::Button(button) => self
                .table
                .button
                .get(button.as_str())
                .copied()
                .map(RoleIds::Single),
        };

        ids.ok_or_else(|| SchemeError::MissingRole {
            device: self.device.clone(),
            role,
        })
    }

    /// Every axis channel of the device, ordered by raw id
    pub fn axis_channels(&self) -> Vec<(u32, AxisChannel)> {
        let mut channels: Vec<_> = self.axes.iter().map(|(id, ch)| (*id, *ch)).collect();
        channels.sort_by_key(|(id, _)| *id);
        channels
    }

    /// Every button of the device, ordered by raw id
    pub fn buttons(&self) -> Vec<(u32, ButtonRole)> {
        let mut buttons: Vec<_> = self.buttons.iter().map(|(id, b)| (*id, *b)).collect();
        buttons.sort_by_key(|(id, _)| *id);
        buttons
    }
}

impl RoleClassifier for Scheme {
    fn classify_axis(&self, raw_id: u32) -> Option<AxisChannel> {
        self.axes.get(&raw_id).copied()
    }

    fn classify_button(&self, raw_id: u32) -> Option<ButtonRole> {
        self.buttons.get(&raw_id).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dualsense() -> Scheme {
        SchemeBook::builtin().unwrap().scheme("dualsense").unwrap()
    }

    #[test]
    fn builtin_book_knows_bundled_devices() {
        let book = SchemeBook::builtin().unwrap();
        let devices: Vec<_> = book.devices().collect();
        assert_eq!(devices, vec!["dualsense", "xbox360"]);
    }

    #[test]
    fn unknown_device_is_reported() {
        let err = SchemeBook::builtin().unwrap().scheme("n64").unwrap_err();
        assert!(matches!(err, SchemeError::UnknownDevice(name) if name == "n64"));
    }

    #[test]
    fn resolves_roles_by_kind() {
        let scheme = dualsense();
        assert_eq!(scheme.resolve_role(0, InputKind::Axis), Some(Role::LeftStick));
        assert_eq!(scheme.resolve_role(1, InputKind::Axis), Some(Role::LeftStick));
        assert_eq!(scheme.resolve_role(5, InputKind::Axis), Some(Role::RightTrigger));
        assert_eq!(
            scheme.resolve_role(0, InputKind::Button),
            Some(Role::Button(ButtonRole::ActionSouth))
        );
        assert_eq!(scheme.resolve_role(42, InputKind::Button), None);
        assert_eq!(scheme.resolve_role(42, InputKind::Axis), None);
    }

    #[test]
    fn role_ids_returns_pairs_for_sticks() {
        let scheme = dualsense();
        assert_eq!(
            scheme.role_ids(Role::RightStick).unwrap(),
            RoleIds::Pair { x: 2, y: 3 }
        );
        assert_eq!(
            scheme.role_ids(Role::LeftTrigger).unwrap(),
            RoleIds::Single(4)
        );
        assert_eq!(
            scheme.role_ids(Role::Button(ButtonRole::Touchpad)).unwrap(),
            RoleIds::Single(15)
        );
    }

    #[test]
    fn absent_role_is_a_missing_role_error() {
        let scheme = SchemeBook::builtin().unwrap().scheme("xbox360").unwrap();
        let err = scheme
            .role_ids(Role::Button(ButtonRole::Touchpad))
            .unwrap_err();
        assert!(matches!(err, SchemeError::MissingRole { .. }));
    }

    #[test]
    fn duplicate_axis_ids_are_rejected() {
        let table = SchemeTable::parse(
            "broken",
            "[axis.left_stick]\nx = 0\ny = 0\n",
        )
        .unwrap();
        let err = Scheme::from_table("broken", table).unwrap_err();
        assert!(matches!(
            err,
            SchemeError::DuplicateId {
                kind: InputKind::Axis,
                id: 0,
                ..
            }
        ));
    }

    #[test]
    fn unknown_button_names_are_rejected() {
        let table = SchemeTable::parse("broken", "[button]\ncross = 0\n").unwrap();
        let err = Scheme::from_table("broken", table).unwrap_err();
        assert!(matches!(err, SchemeError::UnknownButtonRole { .. }));
    }

    #[test]
    fn directory_schemes_override_builtins() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("arcade.toml"),
            "[button]\naction_south = 7\n",
        )
        .unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let book = SchemeBook::load_dir(dir.path()).unwrap();
        let arcade = book.scheme("arcade").unwrap();
        assert_eq!(
            arcade.resolve_role(7, InputKind::Button),
            Some(Role::Button(ButtonRole::ActionSouth))
        );
        assert!(arcade.axis_channels().is_empty());
        assert!(book.scheme("dualsense").is_ok());
    }

    #[test]
    fn axis_channels_are_sorted_by_id() {
        let ids: Vec<u32> = dualsense().axis_channels().iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn buttons_cover_every_role_once() {
        let buttons = dualsense().buttons();
        assert_eq!(buttons.len(), ButtonRole::ALL.len());
        assert_eq!(buttons[0], (0, ButtonRole::ActionSouth));
        assert_eq!(buttons[15], (15, ButtonRole::Touchpad));
    }
}
