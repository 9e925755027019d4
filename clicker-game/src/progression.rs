//! Progression tracker: declarative achievements, lifetime stats, unlock reporting.
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::catalog::Catalog;
use crate::ledger::ResourceLedger;
use crate::numbers::u64_to_f64;

pub type AchievementId = String;

/// Display rarity, ordered rarest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rarity {
    Legendary,
    Epic,
    Rare,
    Uncommon,
    Common,
}

/// Threshold an achievement waits for. Thresholds are inclusive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AchievementCondition {
    TotalEarned { amount: f64 },
    Balance { amount: f64 },
    ClickPower { amount: f64 },
    Cps { amount: f64 },
    Clicks { count: u64 },
    Purchases { count: u64 },
    GeneratorsOwned { count: u32 },
    Owns { id: String, count: u32 },
    LuckyStreak { streak: u32 },
    EventsResolved { count: u64 },
    EventChance { chance: f64 },
    All { conditions: Vec<AchievementCondition> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AchievementDefinition {
    pub id: AchievementId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub rarity: Rarity,
    #[serde(default)]
    pub category: String,
    pub condition: AchievementCondition,
}

/// Lifetime counters kept alongside the economy.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LifetimeStats {
    pub total_clicks: u64,
    pub purchases: u64,
    pub events_resolved: u64,
    pub events_missed: u64,
    pub best_cps: f64,
}

impl LifetimeStats {
    pub fn observe_cps(&mut self, cps: f64) {
        if cps.is_finite() && cps > self.best_cps {
            self.best_cps = cps;
        }
    }
}

/// Read-only engine view handed to achievement conditions.
#[derive(Debug, Clone, Copy)]
pub struct ProgressView<'a> {
    pub ledger: &'a ResourceLedger,
    pub catalog: &'a Catalog,
    pub stats: &'a LifetimeStats,
    pub cps: f64,
    pub event_chance: f64,
}

impl AchievementCondition {
    #[must_use]
    pub fn is_met(&self, view: &ProgressView<'_>) -> bool {
        match self {
            Self::TotalEarned { amount } => view.ledger.total_earned() >= *amount,
            Self::Balance { amount } => view.ledger.balance() >= *amount,
            Self::ClickPower { amount } => view.ledger.click_power() >= *amount,
            Self::Cps { amount } => view.cps >= *amount,
            Self::Clicks { count } => view.stats.total_clicks >= *count,
            Self::Purchases { count } => view.stats.purchases >= *count,
            Self::GeneratorsOwned { count } => view.catalog.generators_owned() >= *count,
            Self::Owns { id, count } => view.catalog.count(id) >= *count,
            Self::LuckyStreak { streak } => view.catalog.lucky_streak() >= *streak,
            Self::EventsResolved { count } => view.stats.events_resolved >= *count,
            Self::EventChance { chance } => view.event_chance + 1e-9 >= *chance,
            Self::All { conditions } => conditions.iter().all(|c| c.is_met(view)),
        }
    }

    /// Fraction of the way to the threshold, for progress bars.
    #[must_use]
    pub fn progress(&self, view: &ProgressView<'_>) -> f64 {
        let ratio = |have: f64, want: f64| {
            if want <= 0.0 { 1.0 } else { (have / want).clamp(0.0, 1.0) }
        };
        match self {
            Self::TotalEarned { amount } => ratio(view.ledger.total_earned(), *amount),
            Self::Balance { amount } => ratio(view.ledger.balance(), *amount),
            Self::ClickPower { amount } => ratio(view.ledger.click_power(), *amount),
            Self::Cps { amount } => ratio(view.cps, *amount),
            Self::Clicks { count } => ratio(u64_to_f64(view.stats.total_clicks), u64_to_f64(*count)),
            Self::Purchases { count } => ratio(u64_to_f64(view.stats.purchases), u64_to_f64(*count)),
            Self::GeneratorsOwned { count } => ratio(
                f64::from(view.catalog.generators_owned()),
                f64::from(*count),
            ),
            Self::Owns { id, count } => ratio(f64::from(view.catalog.count(id)), f64::from(*count)),
            Self::LuckyStreak { streak } => {
                ratio(f64::from(view.catalog.lucky_streak()), f64::from(*streak))
            }
            Self::EventsResolved { count } => {
                ratio(u64_to_f64(view.stats.events_resolved), u64_to_f64(*count))
            }
            Self::EventChance { chance } => ratio(view.event_chance, *chance),
            Self::All { conditions } => {
                if conditions.is_empty() {
                    return 1.0;
                }
                let sum: f64 = conditions.iter().map(|c| c.progress(view)).sum();
                sum / u64_to_f64(u64::try_from(conditions.len()).unwrap_or(u64::MAX))
            }
        }
    }
}

/// Earned flags in definition order plus the queue of unreported unlocks.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressionTracker {
    definitions: Vec<AchievementDefinition>,
    earned: Vec<bool>,
    pending: Vec<AchievementId>,
}

impl ProgressionTracker {
    #[must_use]
    pub fn new(definitions: Vec<AchievementDefinition>) -> Self {
        let earned = vec![false; definitions.len()];
        Self {
            definitions,
            earned,
            pending: Vec::new(),
        }
    }

    #[must_use]
    pub fn definitions(&self) -> &[AchievementDefinition] {
        &self.definitions
    }

    #[must_use]
    pub fn is_earned(&self, id: &str) -> bool {
        self.definitions
            .iter()
            .zip(&self.earned)
            .any(|(def, earned)| *earned && def.id == id)
    }

    #[must_use]
    pub fn earned_count(&self) -> usize {
        self.earned.iter().filter(|e| **e).count()
    }

    /// Mark every unearned achievement whose condition now holds. Returns the
    /// ids unlocked by this pass, in definition order.
    pub fn evaluate(&mut self, view: &ProgressView<'_>) -> Vec<AchievementId> {
        let mut unlocked = Vec::new();
        for (def, earned) in self.definitions.iter().zip(self.earned.iter_mut()) {
            if !*earned && def.condition.is_met(view) {
                *earned = true;
                log::debug!("achievement {} unlocked", def.id);
                unlocked.push(def.id.clone());
            }
        }
        self.pending.extend(unlocked.iter().cloned());
        unlocked
    }

    /// Drain unlocks not yet reported to the host. Each id is reported once.
    pub fn take_newly_earned(&mut self) -> Vec<AchievementId> {
        std::mem::take(&mut self.pending)
    }

    /// Earned flags keyed by id.
    #[must_use]
    pub fn earned_map(&self) -> BTreeMap<AchievementId, bool> {
        self.definitions
            .iter()
            .zip(&self.earned)
            .map(|(def, earned)| (def.id.clone(), *earned))
            .collect()
    }

    /// Apply saved flags. Only `true` sticks; restored unlocks are not reported.
    pub fn restore(&mut self, saved: &BTreeMap<AchievementId, bool>) {
        for (def, earned) in self.definitions.iter().zip(self.earned.iter_mut()) {
            *earned = saved.get(&def.id).copied().unwrap_or(false);
        }
        self.pending.clear();
    }

    /// Definitions sorted by rarity, rarest first, stable within a rarity.
    #[must_use]
    pub fn by_rarity(&self) -> Vec<(&AchievementDefinition, bool)> {
        let mut rows: Vec<_> = self
            .definitions
            .iter()
            .zip(self.earned.iter().copied())
            .collect();
        rows.sort_by_key(|(def, _)| def.rarity);
        rows
    }

    pub fn reset(&mut self) {
        self.earned.iter_mut().for_each(|e| *e = false);
        self.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn def(id: &str, rarity: Rarity, condition: AchievementCondition) -> AchievementDefinition {
        AchievementDefinition {
            id: id.to_string(),
            name: id.to_string(),
            description: String::new(),
            rarity,
            category: "test".to_string(),
            condition,
        }
    }

    fn view<'a>(
        ledger: &'a ResourceLedger,
        catalog: &'a Catalog,
        stats: &'a LifetimeStats,
    ) -> ProgressView<'a> {
        ProgressView {
            ledger,
            catalog,
            stats,
            cps: 0.0,
            event_chance: 0.1,
        }
    }

    fn tracker() -> ProgressionTracker {
        ProgressionTracker::new(vec![
            def("first", Rarity::Common, AchievementCondition::Clicks { count: 1 }),
            def("rich", Rarity::Legendary, AchievementCondition::TotalEarned { amount: 100.0 }),
            def(
                "both",
                Rarity::Rare,
                AchievementCondition::All {
                    conditions: vec![
                        AchievementCondition::Clicks { count: 1 },
                        AchievementCondition::Balance { amount: 50.0 },
                    ],
                },
            ),
        ])
    }

    #[test]
    fn unlocks_are_reported_once_in_definition_order() {
        let mut tracker = tracker();
        let catalog = Catalog::new(Vec::new());
        let mut ledger = ResourceLedger::new();
        ledger.credit(100.0);
        let stats = LifetimeStats {
            total_clicks: 1,
            ..LifetimeStats::default()
        };
        let view = view(&ledger, &catalog, &stats);
        assert_eq!(tracker.evaluate(&view), vec!["first", "rich", "both"]);
        assert!(tracker.evaluate(&view).is_empty());
        assert_eq!(tracker.take_newly_earned().len(), 3);
        assert!(tracker.take_newly_earned().is_empty());
    }

    #[test]
    fn earned_flags_survive_spending() {
        let mut tracker = tracker();
        let catalog = Catalog::new(Vec::new());
        let mut ledger = ResourceLedger::new();
        ledger.credit(100.0);
        let stats = LifetimeStats::default();
        tracker.evaluate(&view(&ledger, &catalog, &stats));
        assert!(tracker.is_earned("rich"));

        ledger.debit(100.0);
        tracker.evaluate(&view(&ledger, &catalog, &stats));
        assert!(tracker.is_earned("rich"));
        assert_eq!(tracker.earned_count(), 1);
    }

    #[test]
    fn restore_ignores_unknown_ids_and_skips_reporting() {
        let mut tracker = tracker();
        let saved = BTreeMap::from([("rich".to_string(), true), ("ghost".to_string(), true)]);
        tracker.restore(&saved);
        assert!(tracker.is_earned("rich"));
        assert!(tracker.take_newly_earned().is_empty());
        assert_eq!(tracker.earned_map().len(), 3);
    }

    #[test]
    fn rarity_sorts_rarest_first() {
        let tracker = tracker();
        let ids: Vec<_> = tracker.by_rarity().iter().map(|(d, _)| d.id.as_str()).collect();
        assert_eq!(ids, vec!["rich", "both", "first"]);
        assert!(Rarity::Legendary < Rarity::Common);
    }

    #[test]
    fn progress_is_clamped() {
        let catalog = Catalog::new(Vec::new());
        let mut ledger = ResourceLedger::new();
        ledger.credit(25.0);
        let stats = LifetimeStats::default();
        let view = view(&ledger, &catalog, &stats);
        let cond = AchievementCondition::Balance { amount: 100.0 };
        assert!((cond.progress(&view) - 0.25).abs() < f64::EPSILON);
        let done = AchievementCondition::Balance { amount: 10.0 };
        assert!((done.progress(&view) - 1.0).abs() < f64::EPSILON);
    }
}
