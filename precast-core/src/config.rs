//! Plugin configuration: load/save of the user-editable toggle file, and
//! deserialization of the class-data files the catalog is built from.
//!
//! Grounded on `relay-server`'s `lobby::reload_config` (read-to-string +
//! `serde_json::from_str`, reloaded rather than watched), adapted to the
//! host's async filesystem instead of a long-lived server process.

use std::collections::HashMap;

use precast_protocol::SkillId;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::action_tracker::WiggleRoomMode;
use crate::catalog::{SkillRecord, SupportTable};
use crate::error::PrecastError;

/// The user-editable runtime toggles, round-tripping unknown fields
/// through `extra` so a config file written by a newer plugin version
/// doesn't lose data when an older version re-saves it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub block: bool,
    #[serde(default)]
    pub jaunt: bool,
    #[serde(default)]
    pub debug: bool,
    #[serde(default = "default_dash_delay")]
    pub dash_delay_ms: u32,
    #[serde(default)]
    pub delay_ms: u32,
    #[serde(default)]
    pub wiggle_room_mode: ConfiguredWiggleRoomMode,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum ConfiguredWiggleRoomMode {
    #[default]
    JitterOnly,
    JitterPlus80,
}

impl From<ConfiguredWiggleRoomMode> for WiggleRoomMode {
    fn from(value: ConfiguredWiggleRoomMode) -> Self {
        match value {
            ConfiguredWiggleRoomMode::JitterOnly => WiggleRoomMode::JitterOnly,
            ConfiguredWiggleRoomMode::JitterPlus80 => WiggleRoomMode::JitterPlus80,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_dash_delay() -> u32 {
    0
}

impl Default for ProxyConfig {
    fn default() -> Self {
        ProxyConfig {
            enabled: true,
            block: false,
            jaunt: false,
            debug: false,
            dash_delay_ms: default_dash_delay(),
            delay_ms: 0,
            wiggle_room_mode: ConfiguredWiggleRoomMode::default(),
            extra: Map::new(),
        }
    }
}

impl ProxyConfig {
    pub async fn load(path: &str) -> Result<Self, PrecastError> {
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| PrecastError::Io { path: path.to_string(), source })?;
        serde_json::from_str(&text).map_err(|source| PrecastError::Parse { path: path.to_string(), source })
    }

    pub async fn save(&self, path: &str) -> Result<(), PrecastError> {
        let text = serde_json::to_string_pretty(self)
            .map_err(|source| PrecastError::Parse { path: path.to_string(), source })?;
        tokio::fs::write(path, text)
            .await
            .map_err(|source| PrecastError::Io { path: path.to_string(), source })
    }
}

/// Shape of a per-class skill-data file: a flat map from the packed
/// `SkillId` integer to its record.
#[derive(Debug, Deserialize)]
pub struct SkillCatalogFile {
    #[serde(flatten)]
    pub skills: HashMap<SkillIdKey, SkillRecord>,
}

/// `serde_json` map keys are always strings; this newtype parses them back
/// into the packed integer `SkillId` on load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SkillIdKey(pub SkillId);

impl<'de> Deserialize<'de> for SkillIdKey {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse::<u64>()
            .map(|v| SkillIdKey(SkillId(v)))
            .map_err(serde::de::Error::custom)
    }
}

impl SkillCatalogFile {
    pub fn into_records(self) -> HashMap<SkillId, SkillRecord> {
        self.skills.into_iter().map(|(key, record)| (key.0, record)).collect()
    }
}

/// Shape of `skills.json`, the per-class `isSupported` override table.
#[derive(Debug, Deserialize)]
pub struct SkillSupportFile {
    #[serde(flatten)]
    pub table: SupportTable,
}

pub async fn load_catalog_file(path: &str) -> Result<HashMap<SkillId, SkillRecord>, PrecastError> {
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| PrecastError::Io { path: path.to_string(), source })?;
    let file: SkillCatalogFile =
        serde_json::from_str(&text).map_err(|source| PrecastError::Parse { path: path.to_string(), source })?;
    Ok(file.into_records())
}

pub async fn load_support_file(path: &str) -> Result<SupportTable, PrecastError> {
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| PrecastError::Io { path: path.to_string(), source })?;
    let file: SkillSupportFile =
        serde_json::from_str(&text).map_err(|source| PrecastError::Parse { path: path.to_string(), source })?;
    Ok(file.table)
}
