//! Save document codec.
//!
//! Versioning:
//! - `SAVE_VERSION` is the format written today. Bump it when fields are added.
//! - `MIN_COMPATIBLE_VERSION` only moves on breaking changes (a field removed
//!   or its meaning changed). Anything at or above it loads, with absent
//!   fields filled from defaults and unknown fields ignored.
//!
//! Live boosts and open events are never written; a reload starts without them.
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::SaveError;
use crate::ledger::BASE_CLICK_POWER;
use crate::progression::{AchievementId, LifetimeStats};

pub const SAVE_VERSION: u32 = 2;
pub const MIN_COMPATIBLE_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedResources {
    #[serde(default)]
    pub balance: f64,
    #[serde(default = "SavedResources::default_click_power")]
    pub click_power: f64,
    #[serde(default)]
    pub total_earned: f64,
}

impl SavedResources {
    const fn default_click_power() -> f64 {
        BASE_CLICK_POWER
    }
}

impl Default for SavedResources {
    fn default() -> Self {
        Self {
            balance: 0.0,
            click_power: Self::default_click_power(),
            total_earned: 0.0,
        }
    }
}

/// Persisted state of one purchasable. A missing cost restarts at the base cost.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedPurchasable {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_cost: Option<f64>,
    #[serde(default)]
    pub count: u32,
}

/// Plain snapshot written to storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveDocument {
    #[serde(default = "SaveDocument::default_version")]
    pub version: u32,
    #[serde(default)]
    pub resources: SavedResources,
    #[serde(default)]
    pub purchasables: BTreeMap<String, SavedPurchasable>,
    #[serde(default)]
    pub achievements: BTreeMap<AchievementId, bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_chance: Option<f64>,
    #[serde(default = "SaveDocument::default_sound_on")]
    pub sound_on: bool,
    #[serde(default)]
    pub stats: LifetimeStats,
}

impl Default for SaveDocument {
    fn default() -> Self {
        Self {
            version: SAVE_VERSION,
            resources: SavedResources::default(),
            purchasables: BTreeMap::new(),
            achievements: BTreeMap::new(),
            event_chance: None,
            sound_on: Self::default_sound_on(),
            stats: LifetimeStats::default(),
        }
    }
}

impl SaveDocument {
    /// Documents without a version field predate versioning.
    const fn default_version() -> u32 {
        MIN_COMPATIBLE_VERSION
    }

    const fn default_sound_on() -> bool {
        true
    }

    /// Parse a stored document.
    ///
    /// # Errors
    ///
    /// Returns [`SaveError::MalformedSaveDocument`] when the JSON does not
    /// parse or the document predates [`MIN_COMPATIBLE_VERSION`].
    pub fn from_json(json: &str) -> Result<Self, SaveError> {
        let doc: Self = serde_json::from_str(json)?;
        if doc.version < MIN_COMPATIBLE_VERSION {
            return Err(SaveError::MalformedSaveDocument(format!(
                "save version {} is older than the minimum supported {}",
                doc.version, MIN_COMPATIBLE_VERSION
            )));
        }
        if doc.version > SAVE_VERSION {
            log::warn!(
                "save version {} is newer than {}; unknown fields ignored",
                doc.version,
                SAVE_VERSION
            );
        }
        Ok(doc)
    }

    /// Parse a stored document, falling back to defaults on any failure.
    #[must_use]
    pub fn load_or_default(json: &str) -> Self {
        Self::from_json(json).unwrap_or_else(|err| {
            log::warn!("{err}; starting from defaults");
            Self::default()
        })
    }

    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String, SaveError> {
        Ok(serde_json::to_string(self)?)
    }

    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json_pretty(&self) -> Result<String, SaveError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_loads_defaults() {
        let doc = SaveDocument::from_json("{}").unwrap();
        assert_eq!(doc.version, MIN_COMPATIBLE_VERSION);
        assert!((doc.resources.click_power - 1.0).abs() < f64::EPSILON);
        assert!(doc.achievements.is_empty());
        assert!(doc.sound_on);
        assert!(doc.event_chance.is_none());
    }

    #[test]
    fn unknown_fields_are_ignored() {
        let json = r#"{
            "version": 2,
            "resources": {"balance": 12.5, "clickPower": 3, "prestige": 9},
            "purchasables": {"cursor": {"currentCost": 17, "count": 1, "glow": true}},
            "eventChance": 0.2,
            "soundOn": false,
            "futureFeature": [1, 2, 3]
        }"#;
        let doc = SaveDocument::from_json(json).unwrap();
        assert!((doc.resources.balance - 12.5).abs() < f64::EPSILON);
        assert_eq!(doc.purchasables["cursor"].count, 1);
        assert_eq!(doc.purchasables["cursor"].current_cost, Some(17.0));
        assert!(!doc.sound_on);
    }

    #[test]
    fn pre_versioning_documents_are_rejected_below_minimum() {
        assert!(matches!(
            SaveDocument::from_json(r#"{"version": 0}"#),
            Err(SaveError::MalformedSaveDocument(_))
        ));
        let doc = SaveDocument::load_or_default("not json at all");
        assert_eq!(doc, SaveDocument::default());
    }

    #[test]
    fn json_uses_camel_case_keys() {
        let mut doc = SaveDocument::default();
        doc.event_chance = Some(0.15);
        doc.stats.total_clicks = 4;
        let json = doc.to_json().unwrap();
        assert!(json.contains("\"clickPower\""));
        assert!(json.contains("\"eventChance\":0.15"));
        assert!(json.contains("\"totalClicks\":4"));
        assert_eq!(SaveDocument::from_json(&json).unwrap(), doc);
    }
}
