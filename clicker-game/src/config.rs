//! Engine tunables and the embedded data assets.
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::OnceLock;

use crate::boosts::DURATION_PER_COST_UNIT;
use crate::catalog::{PurchasableDefinition, PurchasableKind};
use crate::error::ConfigError;
use crate::progression::AchievementDefinition;

/// Fixed-tick driver settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickConfig {
    #[serde(default = "TickConfig::default_rate_hz")]
    pub rate_hz: f64,
    /// Largest delta a single tick call may simulate; longer gaps are clamped.
    #[serde(default = "TickConfig::default_max_catch_up_seconds")]
    pub max_catch_up_seconds: f64,
}

impl TickConfig {
    const fn default_rate_hz() -> f64 {
        10.0
    }

    const fn default_max_catch_up_seconds() -> f64 {
        3_600.0
    }

    #[must_use]
    pub fn interval_seconds(&self) -> f64 {
        1.0 / self.rate_hz
    }
}

impl Default for TickConfig {
    fn default() -> Self {
        Self {
            rate_hz: Self::default_rate_hz(),
            max_catch_up_seconds: Self::default_max_catch_up_seconds(),
        }
    }
}

/// Lucky purchase payout tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LuckyConfig {
    #[serde(default = "LuckyConfig::default_base_seconds")]
    pub base_seconds: f64,
    #[serde(default = "LuckyConfig::default_seconds_spread")]
    pub seconds_spread: f64,
    #[serde(default = "LuckyConfig::default_min_bonus")]
    pub min_bonus: f64,
    #[serde(default = "LuckyConfig::default_cap_floor")]
    pub cap_floor: f64,
    #[serde(default = "LuckyConfig::default_cap_base")]
    pub cap_base: f64,
    /// Adaptive cap grows by `cap_balance_factor` per `cap_balance_divisor` banked.
    #[serde(default = "LuckyConfig::default_cap_balance_divisor")]
    pub cap_balance_divisor: f64,
    #[serde(default = "LuckyConfig::default_cap_balance_factor")]
    pub cap_balance_factor: f64,
    #[serde(default = "LuckyConfig::default_crit_chance")]
    pub crit_chance: f64,
    #[serde(default = "LuckyConfig::default_crit_base")]
    pub crit_base: f64,
    #[serde(default = "LuckyConfig::default_normal_base")]
    pub normal_base: f64,
    #[serde(default = "LuckyConfig::default_normal_spread")]
    pub normal_spread: f64,
}

impl LuckyConfig {
    const fn default_base_seconds() -> f64 {
        30.0
    }
    const fn default_seconds_spread() -> f64 {
        60.0
    }
    const fn default_min_bonus() -> f64 {
        100.0
    }
    const fn default_cap_floor() -> f64 {
        1_000.0
    }
    const fn default_cap_base() -> f64 {
        2_000.0
    }
    const fn default_cap_balance_divisor() -> f64 {
        500.0
    }
    const fn default_cap_balance_factor() -> f64 {
        2.0
    }
    const fn default_crit_chance() -> f64 {
        0.3
    }
    const fn default_crit_base() -> f64 {
        2.5
    }
    const fn default_normal_base() -> f64 {
        0.8
    }
    const fn default_normal_spread() -> f64 {
        0.6
    }
}

impl Default for LuckyConfig {
    fn default() -> Self {
        Self {
            base_seconds: Self::default_base_seconds(),
            seconds_spread: Self::default_seconds_spread(),
            min_bonus: Self::default_min_bonus(),
            cap_floor: Self::default_cap_floor(),
            cap_base: Self::default_cap_base(),
            cap_balance_divisor: Self::default_cap_balance_divisor(),
            cap_balance_factor: Self::default_cap_balance_factor(),
            crit_chance: Self::default_crit_chance(),
            crit_base: Self::default_crit_base(),
            normal_base: Self::default_normal_base(),
            normal_spread: Self::default_normal_spread(),
        }
    }
}

/// A timed reward granted by a resolved event.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimedReward {
    pub value: f64,
    pub duration: f64,
}

/// Random event ("golden cookie") scheduler tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventConfig {
    #[serde(default = "EventConfig::default_poll_interval")]
    pub poll_interval: f64,
    #[serde(default = "EventConfig::default_cooldown")]
    pub cooldown: f64,
    #[serde(default = "EventConfig::default_timeout")]
    pub timeout: f64,
    #[serde(default = "EventConfig::default_base_chance")]
    pub base_chance: f64,
    #[serde(default = "EventConfig::default_max_chance")]
    pub max_chance: f64,
    #[serde(default = "EventConfig::default_frenzy_weight")]
    pub frenzy_weight: f64,
    #[serde(default = "EventConfig::default_frenzy")]
    pub frenzy: TimedReward,
    #[serde(default = "EventConfig::default_production")]
    pub production: TimedReward,
    /// Click bonus expressed as a fraction of current click power.
    #[serde(default = "EventConfig::default_click_bonus")]
    pub click_bonus: TimedReward,
    #[serde(default = "EventConfig::default_grant_seconds")]
    pub grant_seconds: f64,
    #[serde(default = "EventConfig::default_min_grant")]
    pub min_grant: f64,
}

impl EventConfig {
    const fn default_poll_interval() -> f64 {
        3.0
    }
    const fn default_cooldown() -> f64 {
        30.0
    }
    const fn default_timeout() -> f64 {
        15.0
    }
    const fn default_base_chance() -> f64 {
        0.10
    }
    const fn default_max_chance() -> f64 {
        0.50
    }
    const fn default_frenzy_weight() -> f64 {
        0.10
    }
    const fn default_frenzy() -> TimedReward {
        TimedReward {
            value: 7.0,
            duration: 15.0,
        }
    }
    const fn default_production() -> TimedReward {
        TimedReward {
            value: 2.5,
            duration: 30.0,
        }
    }
    const fn default_click_bonus() -> TimedReward {
        TimedReward {
            value: 0.4,
            duration: 30.0,
        }
    }
    const fn default_grant_seconds() -> f64 {
        60.0
    }
    const fn default_min_grant() -> f64 {
        100.0
    }
}

impl Default for EventConfig {
    fn default() -> Self {
        Self {
            poll_interval: Self::default_poll_interval(),
            cooldown: Self::default_cooldown(),
            timeout: Self::default_timeout(),
            base_chance: Self::default_base_chance(),
            max_chance: Self::default_max_chance(),
            frenzy_weight: Self::default_frenzy_weight(),
            frenzy: Self::default_frenzy(),
            production: Self::default_production(),
            click_bonus: Self::default_click_bonus(),
            grant_seconds: Self::default_grant_seconds(),
            min_grant: Self::default_min_grant(),
        }
    }
}

/// Shop-boost tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoostConfig {
    /// Extra seconds granted per unit of price escalation on shop boosts.
    #[serde(default = "BoostConfig::default_duration_per_cost_unit")]
    pub duration_per_cost_unit: f64,
}

impl BoostConfig {
    const fn default_duration_per_cost_unit() -> f64 {
        DURATION_PER_COST_UNIT
    }
}

impl Default for BoostConfig {
    fn default() -> Self {
        Self {
            duration_per_cost_unit: Self::default_duration_per_cost_unit(),
        }
    }
}

/// Complete engine tuning.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub tick: TickConfig,
    #[serde(default)]
    pub lucky: LuckyConfig,
    #[serde(default)]
    pub events: EventConfig,
    #[serde(default)]
    pub boosts: BoostConfig,
}

fn ensure_min(field: &'static str, value: f64, min: f64) -> Result<(), ConfigError> {
    if value.is_nan() || value < min {
        return Err(ConfigError::MinViolation { field, min, value });
    }
    Ok(())
}

fn ensure_range(field: &'static str, value: f64, min: f64, max: f64) -> Result<(), ConfigError> {
    if value.is_nan() || value < min || value > max {
        return Err(ConfigError::RangeViolation {
            field,
            min,
            max,
            value,
        });
    }
    Ok(())
}

impl EngineConfig {
    /// Parse tunables from JSON; absent fields take defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed or violates validation rules.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let cfg: Self = serde_json::from_str(json)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Validate invariants the engine relies on.
    ///
    /// # Errors
    ///
    /// Returns the first violated invariant.
    pub fn validate(&self) -> Result<(), ConfigError> {
        ensure_min("tick.rate_hz", self.tick.rate_hz, 1.0)?;
        ensure_min("tick.max_catch_up_seconds", self.tick.max_catch_up_seconds, 0.0)?;

        let lucky = &self.lucky;
        ensure_min("lucky.base_seconds", lucky.base_seconds, 0.0)?;
        ensure_min("lucky.min_bonus", lucky.min_bonus, 0.0)?;
        ensure_min("lucky.cap_balance_divisor", lucky.cap_balance_divisor, f64::EPSILON)?;
        ensure_range("lucky.crit_chance", lucky.crit_chance, 0.0, 1.0)?;

        let events = &self.events;
        ensure_min("events.poll_interval", events.poll_interval, f64::EPSILON)?;
        ensure_min("events.cooldown", events.cooldown, 0.0)?;
        ensure_min("events.timeout", events.timeout, f64::EPSILON)?;
        ensure_range("events.base_chance", events.base_chance, 0.0, 1.0)?;
        ensure_range("events.max_chance", events.max_chance, 0.0, 1.0)?;
        ensure_range("events.frenzy_weight", events.frenzy_weight, 0.0, 1.0)?;
        ensure_min(
            "boosts.duration_per_cost_unit",
            self.boosts.duration_per_cost_unit,
            0.0,
        )?;
        if events.base_chance > events.max_chance {
            return Err(ConfigError::MinExceedsMax {
                field: "events.chance",
                min: events.base_chance,
                max: events.max_chance,
            });
        }
        Ok(())
    }
}

/// Validate a catalog: unique ids, growth above one, sane costs and durations.
///
/// # Errors
///
/// Returns the first definition that violates an invariant.
pub fn validate_catalog(definitions: &[PurchasableDefinition]) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();
    for def in definitions {
        if !seen.insert(def.id.as_str()) {
            return Err(ConfigError::DuplicateId(def.id.clone()));
        }
        if def.cost_growth.is_nan() || def.cost_growth <= 1.0 {
            return Err(ConfigError::CostGrowth {
                id: def.id.clone(),
                growth: def.cost_growth,
            });
        }
        ensure_min("base_cost", def.base_cost, 0.0)?;
        if let PurchasableKind::ShopTimed {
            min_duration,
            max_duration,
            ..
        } = def.kind
            && min_duration > max_duration
        {
            return Err(ConfigError::MinExceedsMax {
                field: "shop_timed.duration",
                min: min_duration,
                max: max_duration,
            });
        }
    }
    Ok(())
}

/// Validate achievement definitions: ids must be unique.
///
/// # Errors
///
/// Returns the duplicated id.
pub fn validate_achievements(definitions: &[AchievementDefinition]) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();
    for def in definitions {
        if !seen.insert(def.id.as_str()) {
            return Err(ConfigError::DuplicateId(def.id.clone()));
        }
    }
    Ok(())
}

/// Purchasable and achievement definitions an engine is built from.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GameDefinitions {
    #[serde(default)]
    pub purchasables: Vec<PurchasableDefinition>,
    #[serde(default)]
    pub achievements: Vec<AchievementDefinition>,
}

impl GameDefinitions {
    /// Definitions compiled into the crate.
    #[must_use]
    pub fn embedded() -> Self {
        Self {
            purchasables: default_catalog().to_vec(),
            achievements: default_achievements().to_vec(),
        }
    }

    /// Load and validate definitions through a host loader.
    ///
    /// # Errors
    ///
    /// Returns the loader's error, or a validation failure converted into it.
    pub fn from_loader<L>(loader: &L) -> Result<Self, L::Error>
    where
        L: DataLoader,
        L::Error: From<ConfigError>,
    {
        let purchasables = loader.load_catalog()?;
        validate_catalog(&purchasables)?;
        let achievements = loader.load_achievements()?;
        validate_achievements(&achievements)?;
        Ok(Self {
            purchasables,
            achievements,
        })
    }
}

/// Source of engine data. Hosts may supply their own catalogs and tunables.
pub trait DataLoader {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Load the purchasable catalog.
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog cannot be loaded or parsed.
    fn load_catalog(&self) -> Result<Vec<PurchasableDefinition>, Self::Error>;

    /// Load achievement definitions.
    ///
    /// # Errors
    ///
    /// Returns an error if the definitions cannot be loaded or parsed.
    fn load_achievements(&self) -> Result<Vec<AchievementDefinition>, Self::Error>;

    /// Load engine tunables.
    ///
    /// # Errors
    ///
    /// Returns an error if the tunables cannot be loaded or fail validation.
    fn load_config(&self) -> Result<EngineConfig, Self::Error>;
}

/// Loader backed by the JSON assets compiled into the crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticDataLoader;

impl DataLoader for StaticDataLoader {
    type Error = ConfigError;

    fn load_catalog(&self) -> Result<Vec<PurchasableDefinition>, Self::Error> {
        Ok(default_catalog().to_vec())
    }

    fn load_achievements(&self) -> Result<Vec<AchievementDefinition>, Self::Error> {
        Ok(default_achievements().to_vec())
    }

    fn load_config(&self) -> Result<EngineConfig, Self::Error> {
        Ok(default_config().clone())
    }
}

/// Embedded purchasable catalog.
pub fn default_catalog() -> &'static [PurchasableDefinition] {
    static CATALOG: OnceLock<Vec<PurchasableDefinition>> = OnceLock::new();
    CATALOG.get_or_init(|| {
        let defs: Vec<PurchasableDefinition> =
            serde_json::from_str(include_str!("../assets/catalog.json")).expect("valid catalog");
        validate_catalog(&defs).expect("embedded catalog satisfies invariants");
        defs
    })
}

/// Embedded achievement definitions.
pub fn default_achievements() -> &'static [AchievementDefinition] {
    static ACHIEVEMENTS: OnceLock<Vec<AchievementDefinition>> = OnceLock::new();
    ACHIEVEMENTS.get_or_init(|| {
        let defs: Vec<AchievementDefinition> =
            serde_json::from_str(include_str!("../assets/achievements.json"))
                .expect("valid achievements");
        validate_achievements(&defs).expect("embedded achievements have unique ids");
        defs
    })
}

/// Embedded engine tunables.
pub fn default_config() -> &'static EngineConfig {
    static CONFIG: OnceLock<EngineConfig> = OnceLock::new();
    CONFIG.get_or_init(|| {
        EngineConfig::from_json(include_str!("../assets/engine.json"))
            .expect("valid engine config")
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_json_yields_defaults() {
        let cfg = EngineConfig::from_json("{}").unwrap();
        assert_eq!(cfg, EngineConfig::default());
        assert!((cfg.tick.interval_seconds() - 0.1).abs() < f64::EPSILON);
    }

    #[test]
    fn partial_json_overrides_only_named_fields() {
        let cfg = EngineConfig::from_json(r#"{"events": {"cooldown": 45.0}}"#).unwrap();
        assert!((cfg.events.cooldown - 45.0).abs() < f64::EPSILON);
        assert!((cfg.events.timeout - 15.0).abs() < f64::EPSILON);
    }

    #[test]
    fn validation_rejects_inverted_chance_window() {
        let mut cfg = EngineConfig::default();
        cfg.events.base_chance = 0.6;
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::MinExceedsMax { .. })
        ));
        cfg.events.base_chance = 1.5;
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::RangeViolation { .. })
        ));
    }

    #[test]
    fn embedded_assets_load() {
        assert!(!default_catalog().is_empty());
        assert!(!default_achievements().is_empty());
        assert_eq!(default_config().events.poll_interval, 3.0);
        let loader = StaticDataLoader;
        assert_eq!(loader.load_catalog().unwrap().len(), default_catalog().len());
    }

    #[test]
    fn catalog_validation_flags_flat_growth_and_duplicates() {
        let mut defs = default_catalog().to_vec();
        defs[0].cost_growth = 1.0;
        assert!(matches!(
            validate_catalog(&defs),
            Err(ConfigError::CostGrowth { .. })
        ));

        let mut defs = default_catalog().to_vec();
        let dup = defs[0].clone();
        defs.push(dup);
        assert!(matches!(validate_catalog(&defs), Err(ConfigError::DuplicateId(_))));
    }
}
