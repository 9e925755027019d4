//! Purchasable catalog: definitions, mutable per-entry state, and the purchase flow.
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::boosts::{BoostEngine, BoostHandle, BoostKind, grow_click_power, timed_boost_duration};
use crate::config::{EngineConfig, LuckyConfig};
use crate::error::PurchaseError;
use crate::events::EventScheduler;
use crate::ledger::ResourceLedger;
use crate::numbers::{floor_currency, u32_to_f64};
use crate::rng::RandomSource;

/// Output model of a generator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeneratorYield {
    /// Fixed currency per second per unit owned.
    Flat { cps_per_unit: f64 },
    /// Fraction of the pre-tick balance per second per unit owned.
    Interest { rate_per_unit: f64 },
}

/// Kind-specific purchase semantics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PurchasableKind {
    ClickMultiplier {
        ratio: f64,
    },
    Generator {
        #[serde(rename = "yield")]
        output: GeneratorYield,
    },
    Lucky,
    ShopTimed {
        boost: BoostKind,
        value: f64,
        min_duration: f64,
        max_duration: f64,
    },
    EventChance {
        step: f64,
    },
}

impl PurchasableKind {
    #[must_use]
    pub const fn key(&self) -> &'static str {
        match self {
            Self::ClickMultiplier { .. } => "click_multiplier",
            Self::Generator { .. } => "generator",
            Self::Lucky => "lucky",
            Self::ShopTimed { .. } => "shop_timed",
            Self::EventChance { .. } => "event_chance",
        }
    }
}

/// Immutable catalog entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchasableDefinition {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub base_cost: f64,
    pub cost_growth: f64,
    pub kind: PurchasableKind,
}

/// Mutable state of one catalog entry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchasableState {
    pub current_cost: f64,
    #[serde(default)]
    pub count: u32,
}

impl PurchasableState {
    #[must_use]
    pub fn fresh(definition: &PurchasableDefinition) -> Self {
        Self {
            current_cost: floor_currency(definition.base_cost),
            count: 0,
        }
    }
}

/// Result of one lucky payout.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LuckyOutcome {
    pub bonus: f64,
    pub critical: bool,
    pub production_seconds: f64,
    pub base_bonus: f64,
    pub capped_bonus: f64,
    #[serde(default)]
    pub streak: u32,
}

/// Kind-specific effect of a completed purchase.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PurchaseOutcome {
    ClickPower { click_power: f64 },
    Generator { count: u32 },
    Lucky(LuckyOutcome),
    Boost {
        handle: BoostHandle,
        kind: BoostKind,
        duration: f64,
    },
    EventChance { chance: f64 },
}

/// Receipt handed back to the presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchaseReceipt {
    pub id: String,
    pub price: f64,
    pub next_cost: f64,
    pub outcome: PurchaseOutcome,
}

/// Engine state a purchase may touch.
pub struct PurchaseContext<'a> {
    pub ledger: &'a mut ResourceLedger,
    pub boosts: &'a mut BoostEngine,
    pub events: &'a mut EventScheduler,
    pub rng: &'a mut dyn RandomSource,
    pub config: &'a EngineConfig,
    pub now: f64,
}

#[derive(Debug, Clone, PartialEq)]
struct CatalogEntry {
    definition: PurchasableDefinition,
    state: PurchasableState,
}

/// Ordered catalog of purchasables with their live state.
#[derive(Debug, Clone, PartialEq)]
pub struct Catalog {
    entries: Vec<CatalogEntry>,
    index: HashMap<String, usize>,
    lucky_streak: u32,
    last_was_lucky: bool,
}

/// Lucky payout from three draws: production seconds, critical check, magnitude.
///
/// The final bonus is never below `min_bonus`, and a non-critical bonus never
/// exceeds the uncapped base bonus.
pub fn lucky_bonus<R: RandomSource + ?Sized>(
    cfg: &LuckyConfig,
    base_cps: f64,
    balance: f64,
    rolls: &mut R,
) -> LuckyOutcome {
    let production_seconds = cfg.base_seconds + (rolls.roll() * cfg.seconds_spread).floor();
    let base_bonus = (base_cps * production_seconds).max(cfg.min_bonus);
    let adaptive_cap =
        (cfg.cap_base + (balance / cfg.cap_balance_divisor) * cfg.cap_balance_factor).max(cfg.cap_floor);
    let capped_bonus = base_bonus.min(adaptive_cap);

    let critical = rolls.roll() < cfg.crit_chance;
    let magnitude = rolls.roll();
    let bonus = if critical {
        floor_currency(capped_bonus * (cfg.crit_base + magnitude))
    } else {
        floor_currency(capped_bonus * (cfg.normal_base + magnitude * cfg.normal_spread))
            .min(base_bonus)
    }
    .max(cfg.min_bonus);

    LuckyOutcome {
        bonus,
        critical,
        production_seconds,
        base_bonus,
        capped_bonus,
        streak: 0,
    }
}

impl Catalog {
    #[must_use]
    pub fn new(definitions: Vec<PurchasableDefinition>) -> Self {
        let mut entries = Vec::with_capacity(definitions.len());
        let mut index = HashMap::with_capacity(definitions.len());
        for definition in definitions {
            if index.contains_key(&definition.id) {
                log::warn!("duplicate purchasable id {} ignored", definition.id);
                continue;
            }
            index.insert(definition.id.clone(), entries.len());
            entries.push(CatalogEntry {
                state: PurchasableState::fresh(&definition),
                definition,
            });
        }
        Self {
            entries,
            index,
            lucky_streak: 0,
            last_was_lucky: false,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn definition(&self, id: &str) -> Option<&PurchasableDefinition> {
        self.index.get(id).map(|&idx| &self.entries[idx].definition)
    }

    #[must_use]
    pub fn state(&self, id: &str) -> Option<&PurchasableState> {
        self.index.get(id).map(|&idx| &self.entries[idx].state)
    }

    /// Entries in catalog order.
    pub fn iter(&self) -> impl Iterator<Item = (&PurchasableDefinition, &PurchasableState)> {
        self.entries.iter().map(|e| (&e.definition, &e.state))
    }

    /// Consecutive lucky purchases after the first one in a run.
    #[must_use]
    pub const fn lucky_streak(&self) -> u32 {
        self.lucky_streak
    }

    /// Flat production before multipliers.
    #[must_use]
    pub fn flat_cps(&self) -> f64 {
        self.entries
            .iter()
            .map(|e| match e.definition.kind {
                PurchasableKind::Generator {
                    output: GeneratorYield::Flat { cps_per_unit },
                } => u32_to_f64(e.state.count) * cps_per_unit,
                _ => 0.0,
            })
            .sum()
    }

    /// Combined interest rate per second across owned interest generators.
    #[must_use]
    pub fn interest_rate(&self) -> f64 {
        self.entries
            .iter()
            .map(|e| match e.definition.kind {
                PurchasableKind::Generator {
                    output: GeneratorYield::Interest { rate_per_unit },
                } => u32_to_f64(e.state.count) * rate_per_unit,
                _ => 0.0,
            })
            .sum()
    }

    /// Total generator units owned.
    #[must_use]
    pub fn generators_owned(&self) -> u32 {
        self.entries
            .iter()
            .filter(|e| matches!(e.definition.kind, PurchasableKind::Generator { .. }))
            .map(|e| e.state.count)
            .fold(0, u32::saturating_add)
    }

    #[must_use]
    pub fn count(&self, id: &str) -> u32 {
        self.state(id).map_or(0, |s| s.count)
    }

    /// Buy one unit of `id`. Declined purchases leave every piece of state untouched.
    ///
    /// # Errors
    ///
    /// Returns [`PurchaseError::UnknownPurchasableId`] for ids outside the
    /// catalog and [`PurchaseError::InsufficientFunds`] when the balance does
    /// not cover the current cost.
    pub fn purchase(
        &mut self,
        id: &str,
        ctx: PurchaseContext<'_>,
    ) -> Result<PurchaseReceipt, PurchaseError> {
        let Some(&idx) = self.index.get(id) else {
            log::warn!("purchase requested for unknown id {id}");
            return Err(PurchaseError::UnknownPurchasableId(id.to_string()));
        };
        let price = self.entries[idx].state.current_cost;
        if !ctx.ledger.affordable(price) || !ctx.ledger.debit(price) {
            return Err(PurchaseError::InsufficientFunds {
                id: id.to_string(),
                cost: price,
                balance: ctx.ledger.balance(),
            });
        }

        let kind = self.entries[idx].definition.kind;
        let base_cost = self.entries[idx].definition.base_cost;
        let is_lucky = matches!(kind, PurchasableKind::Lucky);
        self.lucky_streak = if is_lucky && self.last_was_lucky {
            self.lucky_streak.saturating_add(1)
        } else {
            0
        };
        self.last_was_lucky = is_lucky;

        let outcome = match kind {
            PurchasableKind::ClickMultiplier { ratio } => {
                ctx.boosts
                    .rebase_click_power(ctx.ledger, |cp| grow_click_power(cp, ratio));
                PurchaseOutcome::ClickPower {
                    click_power: ctx.boosts.base_click_power(ctx.ledger),
                }
            }
            PurchasableKind::Generator { .. } => {
                let state = &mut self.entries[idx].state;
                state.count = state.count.saturating_add(1);
                PurchaseOutcome::Generator { count: state.count }
            }
            PurchasableKind::Lucky => {
                let base_cps = self.flat_cps() * ctx.boosts.cookie_multiplier(ctx.now);
                let mut outcome =
                    lucky_bonus(&ctx.config.lucky, base_cps, ctx.ledger.balance(), ctx.rng);
                outcome.bonus = ctx.ledger.credit(outcome.bonus);
                outcome.streak = self.lucky_streak;
                PurchaseOutcome::Lucky(outcome)
            }
            PurchasableKind::ShopTimed {
                boost,
                value,
                min_duration,
                max_duration,
            } => {
                let duration = timed_boost_duration(
                    min_duration,
                    max_duration,
                    price,
                    base_cost,
                    ctx.config.boosts.duration_per_cost_unit,
                );
                let handle = ctx.boosts.activate(boost, value, duration, ctx.now, ctx.ledger);
                PurchaseOutcome::Boost {
                    handle,
                    kind: boost,
                    duration,
                }
            }
            PurchasableKind::EventChance { step } => PurchaseOutcome::EventChance {
                chance: ctx.events.raise_chance(step),
            },
        };

        let entry = &mut self.entries[idx];
        let grown = entry.state.current_cost * entry.definition.cost_growth;
        entry.state.current_cost = if grown.is_finite() {
            grown.floor()
        } else {
            log::warn!("cost of {id} overflowed; pinned to f64::MAX");
            f64::MAX
        };
        log::debug!(
            "purchased {id} ({}) for {price}; next cost {}",
            kind.key(),
            entry.state.current_cost
        );

        Ok(PurchaseReceipt {
            id: id.to_string(),
            price,
            next_cost: entry.state.current_cost,
            outcome,
        })
    }

    /// States keyed by id, for persistence.
    #[must_use]
    pub fn states(&self) -> BTreeMap<String, PurchasableState> {
        self.entries
            .iter()
            .map(|e| (e.definition.id.clone(), e.state))
            .collect()
    }

    /// Overwrite one entry's state from a save. Unknown ids are ignored and
    /// corrupt costs fall back to the definition's base cost.
    pub fn restore_state(&mut self, id: &str, state: PurchasableState) {
        let Some(&idx) = self.index.get(id) else {
            log::debug!("save references unknown purchasable {id}; skipped");
            return;
        };
        let entry = &mut self.entries[idx];
        let cost = if state.current_cost.is_finite() && state.current_cost >= 0.0 {
            state.current_cost.floor()
        } else {
            log::warn!("invalid saved cost {} for {id}; reset", state.current_cost);
            PurchasableState::fresh(&entry.definition).current_cost
        };
        entry.state = PurchasableState {
            current_cost: cost,
            count: state.count,
        };
    }

    /// Return every entry to its initial state.
    pub fn reset(&mut self) {
        for entry in &mut self.entries {
            entry.state = PurchasableState::fresh(&entry.definition);
        }
        self.lucky_streak = 0;
        self.last_was_lucky = false;
    }
}
