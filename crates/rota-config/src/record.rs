use serde::{Deserialize, Serialize};

/// One `[rotations.<name>]` section of the rotations file.
///
/// Every field is optional on disk; a missing `enabled` means disabled.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RotationRecord {
    #[serde(default)]
    pub enabled: bool,
    /// Minimum number of online players for the rotation to be eligible.
    #[serde(default)]
    pub players: u32,
    #[serde(default)]
    pub maps: Vec<String>,
    /// Map the rotation will serve next, as of the last write-back.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_map: Option<String>,
}

/// A single field write against a rotation section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RotationField {
    Enabled(bool),
    Players(u32),
    Maps(Vec<String>),
    NextMap(String),
}

impl RotationField {
    /// Key under which the field is stored.
    pub fn key(&self) -> &'static str {
        match self {
            Self::Enabled(_) => "enabled",
            Self::Players(_) => "players",
            Self::Maps(_) => "maps",
            Self::NextMap(_) => "next_map",
        }
    }

    pub fn to_value(&self) -> toml::Value {
        match self {
            Self::Enabled(enabled) => toml::Value::Boolean(*enabled),
            Self::Players(players) => toml::Value::Integer(i64::from(*players)),
            Self::Maps(maps) => toml::Value::Array(
                maps.iter()
                    .map(|m| toml::Value::String(m.clone()))
                    .collect(),
            ),
            Self::NextMap(map) => toml::Value::String(map.clone()),
        }
    }

    /// Apply the write to an in-memory record.
    pub fn apply(self, record: &mut RotationRecord) {
        match self {
            Self::Enabled(enabled) => record.enabled = enabled,
            Self::Players(players) => record.players = players,
            Self::Maps(maps) => record.maps = maps,
            Self::NextMap(map) => record.next_map = Some(map),
        }
    }
}
