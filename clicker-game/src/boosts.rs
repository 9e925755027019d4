//! Boost engine: time-bounded modifiers with snapshot-and-restore semantics.
//!
//! Each boost kind targets one slot. A slot holds at most one instance, and
//! activating into an occupied slot force-expires the old instance first so the
//! snapshotted original value is always the un-boosted one. Expiry writes the
//! snapshot back verbatim instead of recomputing it.
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::ledger::ResourceLedger;
use crate::numbers::floor_currency;

/// Default seconds of extra duration granted per unit of price escalation.
pub const DURATION_PER_COST_UNIT: f64 = 0.05;

/// Modifier kinds the engine knows how to apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoostKind {
    /// Multiplies the running production multiplier.
    ProductionMultiplier,
    /// Adds a flat amount to click power.
    ClickPowerAdditive,
    /// Multiplies click power.
    ClickPowerMultiplier,
    /// Multiplies total production per tick on top of the production multiplier.
    GlobalRateAccelerant,
}

impl BoostKind {
    /// Slot this kind occupies. Both click kinds share one slot.
    #[must_use]
    pub const fn slot(self) -> BoostSlot {
        match self {
            Self::ProductionMultiplier => BoostSlot::Production,
            Self::ClickPowerAdditive | Self::ClickPowerMultiplier => BoostSlot::ClickPower,
            Self::GlobalRateAccelerant => BoostSlot::Accelerant,
        }
    }

    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::ProductionMultiplier => "production_multiplier",
            Self::ClickPowerAdditive => "click_power_additive",
            Self::ClickPowerMultiplier => "click_power_multiplier",
            Self::GlobalRateAccelerant => "global_rate_accelerant",
        }
    }
}

/// Storage slot for a boost; one live instance per slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoostSlot {
    Production,
    ClickPower,
    Accelerant,
}

impl BoostSlot {
    pub const ALL: [Self; 3] = [Self::Production, Self::ClickPower, Self::Accelerant];
}

/// A single activated modifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoostInstance {
    pub id: u64,
    pub kind: BoostKind,
    /// Target field value captured at activation; restored on expiry.
    pub original_value: f64,
    /// Multiplier or flat delta applied on top of `original_value`.
    pub applied_value: f64,
    pub start_time: f64,
    pub end_time: f64,
    pub active: bool,
}

impl BoostInstance {
    /// Active only while the flag is set and the deadline is in the future.
    #[must_use]
    pub fn is_live(&self, now: f64) -> bool {
        self.active && now < self.end_time
    }

    #[must_use]
    pub fn remaining(&self, now: f64) -> f64 {
        if self.is_live(now) {
            self.end_time - now
        } else {
            0.0
        }
    }
}

/// Reference to an activation, valid only within the epoch it was issued in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoostHandle {
    pub slot: BoostSlot,
    pub id: u64,
    pub epoch: u64,
}

/// Record of a boost that ended, for presentation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExpiredBoost {
    pub kind: BoostKind,
    pub restored_value: f64,
    pub forced: bool,
}

/// Read-only view of a live boost.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ActiveBoostView {
    pub kind: BoostKind,
    pub applied_value: f64,
    pub remaining_seconds: f64,
}

pub type ExpiredBoosts = SmallVec<[ExpiredBoost; 3]>;

/// Owns the production multiplier and accelerant factor, and the boost slots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoostEngine {
    cookie_multiplier: f64,
    accelerant_factor: f64,
    production: Option<BoostInstance>,
    click_power: Option<BoostInstance>,
    accelerant: Option<BoostInstance>,
    epoch: u64,
    next_id: u64,
}

impl Default for BoostEngine {
    fn default() -> Self {
        Self {
            cookie_multiplier: 1.0,
            accelerant_factor: 1.0,
            production: None,
            click_power: None,
            accelerant: None,
            epoch: 0,
            next_id: 1,
        }
    }
}

/// Duration of a shop-purchased boost: grows with price escalation, clamped.
#[must_use]
pub fn timed_boost_duration(
    min_duration: f64,
    max_duration: f64,
    current_cost: f64,
    base_cost: f64,
    per_cost_unit: f64,
) -> f64 {
    let raw = min_duration + (current_cost - base_cost) * per_cost_unit;
    if raw.is_nan() {
        return min_duration;
    }
    raw.clamp(min_duration, max_duration.max(min_duration))
}

impl BoostEngine {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn epoch(&self) -> u64 {
        self.epoch
    }

    fn slot_ref(&self, slot: BoostSlot) -> Option<&BoostInstance> {
        match slot {
            BoostSlot::Production => self.production.as_ref(),
            BoostSlot::ClickPower => self.click_power.as_ref(),
            BoostSlot::Accelerant => self.accelerant.as_ref(),
        }
    }

    fn slot_mut(&mut self, slot: BoostSlot) -> &mut Option<BoostInstance> {
        match slot {
            BoostSlot::Production => &mut self.production,
            BoostSlot::ClickPower => &mut self.click_power,
            BoostSlot::Accelerant => &mut self.accelerant,
        }
    }

    #[must_use]
    pub fn is_active(&self, kind: BoostKind, now: f64) -> bool {
        self.slot_ref(kind.slot())
            .is_some_and(|b| b.kind == kind && b.is_live(now))
    }

    #[must_use]
    pub fn slot_active(&self, slot: BoostSlot, now: f64) -> bool {
        self.slot_ref(slot).is_some_and(|b| b.is_live(now))
    }

    /// Production multiplier as of `now`. A boost whose deadline passed but
    /// has not been housekept yet reads as its snapshot.
    #[must_use]
    pub fn cookie_multiplier(&self, now: f64) -> f64 {
        match &self.production {
            Some(b) if !b.is_live(now) => b.original_value,
            _ => self.cookie_multiplier,
        }
    }

    /// Accelerant factor as of `now` (1.0 when none is live).
    #[must_use]
    pub fn accelerant_factor(&self, now: f64) -> f64 {
        match &self.accelerant {
            Some(b) if !b.is_live(now) => b.original_value,
            _ => self.accelerant_factor,
        }
    }

    /// Click power as of `now`, honouring stale click boosts.
    #[must_use]
    pub fn effective_click_power(&self, ledger: &ResourceLedger, now: f64) -> f64 {
        match &self.click_power {
            Some(b) if !b.is_live(now) => b.original_value,
            _ => ledger.click_power(),
        }
    }

    /// Click power with any click boost removed.
    #[must_use]
    pub fn base_click_power(&self, ledger: &ResourceLedger) -> f64 {
        self.click_power
            .as_ref()
            .filter(|b| b.active)
            .map_or(ledger.click_power(), |b| b.original_value)
    }

    fn live_value(&self, slot: BoostSlot, ledger: &ResourceLedger) -> f64 {
        match slot {
            BoostSlot::Production => self.cookie_multiplier,
            BoostSlot::ClickPower => ledger.click_power(),
            BoostSlot::Accelerant => self.accelerant_factor,
        }
    }

    fn write_value(&mut self, slot: BoostSlot, value: f64, ledger: &mut ResourceLedger) {
        match slot {
            BoostSlot::Production => self.cookie_multiplier = value,
            BoostSlot::ClickPower => ledger.set_click_power(value),
            BoostSlot::Accelerant => self.accelerant_factor = value,
        }
    }

    /// Activate a boost for `duration` seconds starting at `now`.
    ///
    /// An instance already occupying the slot is force-expired first so the
    /// new snapshot captures the un-boosted value.
    pub fn activate(
        &mut self,
        kind: BoostKind,
        value: f64,
        duration: f64,
        now: f64,
        ledger: &mut ResourceLedger,
    ) -> BoostHandle {
        let slot = kind.slot();
        if self.slot_ref(slot).is_some_and(|b| b.active) {
            self.expire_slot(slot, ledger, true);
        }

        let original_value = self.live_value(slot, ledger);
        let boosted = match kind {
            BoostKind::ClickPowerAdditive => original_value + value,
            BoostKind::ProductionMultiplier
            | BoostKind::ClickPowerMultiplier
            | BoostKind::GlobalRateAccelerant => original_value * value,
        };
        self.write_value(slot, boosted, ledger);

        let id = self.next_id;
        self.next_id = self.next_id.saturating_add(1);
        *self.slot_mut(slot) = Some(BoostInstance {
            id,
            kind,
            original_value,
            applied_value: value,
            start_time: now,
            end_time: now + duration.max(0.0),
            active: true,
        });
        log::debug!(
            "boost {} activated: {original_value} -> {boosted} for {duration:.1}s",
            kind.key()
        );
        BoostHandle {
            slot,
            id,
            epoch: self.epoch,
        }
    }

    fn expire_slot(
        &mut self,
        slot: BoostSlot,
        ledger: &mut ResourceLedger,
        forced: bool,
    ) -> Option<ExpiredBoost> {
        let instance = self.slot_mut(slot).take()?;
        if !instance.active {
            return None;
        }
        self.write_value(slot, instance.original_value, ledger);
        log::debug!(
            "boost {} expired (forced: {forced}); restored {}",
            instance.kind.key(),
            instance.original_value
        );
        Some(ExpiredBoost {
            kind: instance.kind,
            restored_value: instance.original_value,
            forced,
        })
    }

    /// Housekeeping pass: restore every slot whose deadline has passed.
    pub fn expire_due(&mut self, now: f64, ledger: &mut ResourceLedger) -> ExpiredBoosts {
        let mut expired = ExpiredBoosts::new();
        for slot in BoostSlot::ALL {
            let due = self.slot_ref(slot).is_some_and(|b| !b.is_live(now));
            if due && let Some(record) = self.expire_slot(slot, ledger, false) {
                expired.push(record);
            }
        }
        expired
    }

    /// End a boost early. Stale handles (reset epoch or replaced instance) are no-ops.
    pub fn force_expire(
        &mut self,
        handle: BoostHandle,
        ledger: &mut ResourceLedger,
    ) -> Option<ExpiredBoost> {
        if handle.epoch != self.epoch {
            return None;
        }
        if self.slot_ref(handle.slot).is_none_or(|b| b.id != handle.id) {
            return None;
        }
        self.expire_slot(handle.slot, ledger, true)
    }

    /// Apply a permanent click-power ratio, keeping any live click boost's
    /// snapshot in step so its expiry does not discard the upgrade.
    pub fn rebase_click_power(&mut self, ledger: &mut ResourceLedger, grow: impl Fn(f64) -> f64) {
        if let Some(instance) = self.click_power.as_mut().filter(|b| b.active) {
            instance.original_value = grow(instance.original_value);
        }
        let live = grow(ledger.click_power());
        ledger.set_click_power(live);
    }

    /// Deadlines of live boosts falling strictly inside `(start, end)`, ascending.
    #[must_use]
    pub fn deadlines_within(&self, start: f64, end: f64) -> SmallVec<[f64; 3]> {
        let mut cuts: SmallVec<[f64; 3]> = BoostSlot::ALL
            .iter()
            .filter_map(|slot| self.slot_ref(*slot))
            .filter(|b| b.is_live(start) && b.end_time < end)
            .map(|b| b.end_time)
            .collect();
        cuts.sort_by(f64::total_cmp);
        cuts
    }

    /// Views of boosts live at `now`.
    #[must_use]
    pub fn active_boosts(&self, now: f64) -> Vec<ActiveBoostView> {
        BoostSlot::ALL
            .iter()
            .filter_map(|slot| self.slot_ref(*slot))
            .filter(|b| b.is_live(now))
            .map(|b| ActiveBoostView {
                kind: b.kind,
                applied_value: b.applied_value,
                remaining_seconds: b.remaining(now),
            })
            .collect()
    }

    /// Drop every boost without restoring targets and advance the epoch so
    /// outstanding handles become no-ops. Callers reset the ledger themselves.
    pub fn reset(&mut self) {
        let epoch = self.epoch.saturating_add(1);
        let next_id = self.next_id;
        *self = Self {
            epoch,
            next_id,
            ..Self::default()
        };
    }
}

/// Click-multiplier growth: scale, then floor. Ratios too small to clear the
/// next whole unit leave click power unchanged.
#[must_use]
pub fn grow_click_power(current: f64, ratio: f64) -> f64 {
    floor_currency(current * ratio)
}
