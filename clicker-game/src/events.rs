//! Random event scheduler ("golden cookie").
//!
//! Phases:
//! - `Dormant`: cooling down after the last event; no rolls until `until`.
//! - `Armed`: every poll draws once against the current chance.
//! - `Triggered`: an event is on screen awaiting resolution; no rolls.
//!
//! All transitions compare timestamps, so large or irregular deltas are safe.
use serde::{Deserialize, Serialize};

use crate::boosts::{BoostEngine, BoostHandle, BoostKind};
use crate::config::EventConfig;
use crate::ledger::ResourceLedger;
use crate::numbers::{clamp_unit, floor_currency};
use crate::rng::RandomSource;

/// An event currently offered to the player.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EventDescriptor {
    pub id: u64,
    pub triggered_at: f64,
    pub expires_at: f64,
}

impl EventDescriptor {
    #[must_use]
    pub fn is_open(&self, now: f64) -> bool {
        now < self.expires_at
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum EventPhase {
    Dormant { until: f64 },
    Armed,
    Triggered { event: EventDescriptor },
}

/// Reward families an event may pay out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RewardKind {
    Frenzy,
    FlatGrant,
    ProductionBoost,
    ClickBoost,
}

impl RewardKind {
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Frenzy => "frenzy",
            Self::FlatGrant => "flat_grant",
            Self::ProductionBoost => "production_boost",
            Self::ClickBoost => "click_boost",
        }
    }
}

/// What a resolved event paid out.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RewardDescriptor {
    pub event_id: u64,
    pub kind: RewardKind,
    /// Currency granted, or the boost's applied value.
    pub amount: f64,
    #[serde(default)]
    pub duration: f64,
    #[serde(default)]
    pub boost: Option<BoostHandle>,
}

/// Scheduler activity observed while advancing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SchedulerNotice {
    Triggered { event: EventDescriptor },
    Expired { event_id: u64 },
}

/// Map a single roll onto a reward family: the frenzy weight first, the rest
/// split evenly across the other three.
#[must_use]
pub fn select_reward(roll: f64, frenzy_weight: f64) -> RewardKind {
    if roll < frenzy_weight {
        return RewardKind::Frenzy;
    }
    let rest = (1.0 - frenzy_weight).max(f64::EPSILON);
    let bucket = ((roll - frenzy_weight) / rest * 3.0).floor();
    if bucket < 1.0 {
        RewardKind::FlatGrant
    } else if bucket < 2.0 {
        RewardKind::ProductionBoost
    } else {
        RewardKind::ClickBoost
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EventScheduler {
    config: EventConfig,
    phase: EventPhase,
    current_chance: f64,
    next_poll_at: f64,
    next_event_id: u64,
    epoch: u64,
}

impl EventScheduler {
    /// Armed scheduler whose first poll lands one interval after `now`.
    #[must_use]
    pub fn new(config: EventConfig, now: f64) -> Self {
        let current_chance = clamp_unit(config.base_chance).min(config.max_chance);
        let next_poll_at = now + config.poll_interval;
        Self {
            config,
            phase: EventPhase::Armed,
            current_chance,
            next_poll_at,
            next_event_id: 1,
            epoch: 0,
        }
    }

    #[must_use]
    pub const fn phase(&self) -> EventPhase {
        self.phase
    }

    #[must_use]
    pub const fn current_chance(&self) -> f64 {
        self.current_chance
    }

    #[must_use]
    pub const fn epoch(&self) -> u64 {
        self.epoch
    }

    #[must_use]
    pub const fn config(&self) -> &EventConfig {
        &self.config
    }

    /// Permanently raise the trigger chance, bounded by the configured max.
    pub fn raise_chance(&mut self, step: f64) -> f64 {
        let step = if step.is_finite() { step.max(0.0) } else { 0.0 };
        self.current_chance = (self.current_chance + step).min(self.config.max_chance);
        self.current_chance
    }

    /// Overwrite the chance from a save, clamped into `[0, max_chance]`.
    pub fn set_chance(&mut self, chance: f64) {
        self.current_chance = clamp_unit(chance).min(self.config.max_chance);
    }

    /// Event on screen at `now`, if any.
    #[must_use]
    pub fn triggerable(&self, now: f64) -> Option<EventDescriptor> {
        match self.phase {
            EventPhase::Triggered { event } if event.is_open(now) => Some(event),
            _ => None,
        }
    }

    fn close(&mut self, event: &EventDescriptor) {
        self.phase = EventPhase::Dormant {
            until: event.triggered_at + self.config.cooldown,
        };
    }

    /// Advance to `now`, performing every poll that fell due. A non-positive
    /// poll interval disables polling; open events still expire.
    pub fn advance<R: RandomSource + ?Sized>(
        &mut self,
        now: f64,
        rng: &mut R,
    ) -> Vec<SchedulerNotice> {
        let mut notices = Vec::new();
        if !(self.config.poll_interval > 0.0 && self.config.poll_interval.is_finite()) {
            log::warn!(
                "event poll interval {} is not positive; polling skipped",
                self.config.poll_interval
            );
            self.expire_if_due(now, &mut notices);
            return notices;
        }
        while self.next_poll_at <= now {
            let at = self.next_poll_at;
            self.next_poll_at += self.config.poll_interval;
            self.expire_if_due(at, &mut notices);
            if let EventPhase::Dormant { until } = self.phase
                && at >= until
            {
                self.phase = EventPhase::Armed;
            }
            if self.phase == EventPhase::Armed && rng.roll() < self.current_chance {
                let event = EventDescriptor {
                    id: self.next_event_id,
                    triggered_at: at,
                    expires_at: at + self.config.timeout,
                };
                self.next_event_id = self.next_event_id.saturating_add(1);
                self.phase = EventPhase::Triggered { event };
                log::debug!("event {} triggered at {at:.1}", event.id);
                notices.push(SchedulerNotice::Triggered { event });
            }
        }
        self.expire_if_due(now, &mut notices);
        notices
    }

    fn expire_if_due(&mut self, now: f64, notices: &mut Vec<SchedulerNotice>) {
        if let EventPhase::Triggered { event } = self.phase
            && !event.is_open(now)
        {
            self.close(&event);
            log::debug!("event {} expired unresolved", event.id);
            notices.push(SchedulerNotice::Expired { event_id: event.id });
        }
    }

    /// Claim the open event. Only the first matching call inside the window
    /// wins; anything else returns `None` and changes nothing.
    pub fn resolve<R: RandomSource + ?Sized>(
        &mut self,
        event_id: u64,
        now: f64,
        rng: &mut R,
    ) -> Option<RewardKind> {
        let EventPhase::Triggered { event } = self.phase else {
            return None;
        };
        if event.id != event_id || !event.is_open(now) {
            return None;
        }
        self.close(&event);
        let kind = select_reward(rng.roll(), self.config.frenzy_weight);
        log::debug!("event {event_id} resolved: {}", kind.key());
        Some(kind)
    }

    /// Back to an armed scheduler at base chance. Event ids keep counting so
    /// ids issued before the reset never match again.
    pub fn reset(&mut self, now: f64) {
        let next_event_id = self.next_event_id;
        let epoch = self.epoch.saturating_add(1);
        *self = Self {
            next_event_id,
            epoch,
            ..Self::new(self.config.clone(), now)
        };
    }
}

/// Apply a chosen reward to the ledger and boost engine.
pub fn apply_reward(
    config: &EventConfig,
    event_id: u64,
    kind: RewardKind,
    cps: f64,
    now: f64,
    ledger: &mut ResourceLedger,
    boosts: &mut BoostEngine,
) -> RewardDescriptor {
    let (amount, duration, boost) = match kind {
        RewardKind::Frenzy => {
            let handle = boosts.activate(
                BoostKind::ClickPowerMultiplier,
                config.frenzy.value,
                config.frenzy.duration,
                now,
                ledger,
            );
            (config.frenzy.value, config.frenzy.duration, Some(handle))
        }
        RewardKind::FlatGrant => {
            let grant = floor_currency((cps * config.grant_seconds).max(config.min_grant));
            (ledger.credit(grant), 0.0, None)
        }
        RewardKind::ProductionBoost => {
            let handle = boosts.activate(
                BoostKind::ProductionMultiplier,
                config.production.value,
                config.production.duration,
                now,
                ledger,
            );
            (config.production.value, config.production.duration, Some(handle))
        }
        RewardKind::ClickBoost => {
            let delta = boosts.base_click_power(ledger) * config.click_bonus.value;
            let handle = boosts.activate(
                BoostKind::ClickPowerAdditive,
                delta,
                config.click_bonus.duration,
                now,
                ledger,
            );
            (delta, config.click_bonus.duration, Some(handle))
        }
    };
    RewardDescriptor {
        event_id,
        kind,
        amount,
        duration,
        boost,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::ScriptedRolls;

    fn scheduler() -> EventScheduler {
        EventScheduler::new(EventConfig::default(), 0.0)
    }

    #[test]
    fn polls_only_on_interval_and_triggers_below_chance() {
        let mut events = scheduler();
        let mut rolls = ScriptedRolls::new([0.9, 0.05]);
        assert!(events.advance(2.9, &mut rolls).is_empty());
        assert_eq!(rolls.remaining(), 2);

        assert!(events.advance(3.0, &mut rolls).is_empty());
        let notices = events.advance(6.0, &mut rolls);
        assert_eq!(notices.len(), 1);
        let event = events.triggerable(6.0).unwrap();
        assert!((event.expires_at - 21.0).abs() < f64::EPSILON);
    }

    #[test]
    fn zero_poll_interval_never_rolls() {
        let config = EventConfig {
            poll_interval: 0.0,
            ..EventConfig::default()
        };
        let mut events = EventScheduler::new(config, 0.0);
        let mut rolls = ScriptedRolls::new([0.0]).with_fallback(0.0);
        assert!(events.advance(10.0, &mut rolls).is_empty());
        assert_eq!(rolls.remaining(), 1);
        assert!(events.triggerable(10.0).is_none());
    }

    #[test]
    fn no_rolls_while_triggered_and_timeout_returns_to_cooldown() {
        let mut events = scheduler();
        let mut rolls = ScriptedRolls::new([0.0]).with_fallback(0.0);
        events.advance(3.0, &mut rolls);
        assert!(events.triggerable(3.0).is_some());

        let notices = events.advance(18.0, &mut rolls);
        assert_eq!(notices, vec![SchedulerNotice::Expired { event_id: 1 }]);
        assert_eq!(events.phase(), EventPhase::Dormant { until: 33.0 });

        // Cooldown is measured from the trigger, so the 33 s poll re-arms and rolls.
        let notices = events.advance(33.0, &mut rolls);
        assert!(matches!(notices.as_slice(), [SchedulerNotice::Triggered { .. }]));
    }

    #[test]
    fn resolve_pays_exactly_once() {
        let mut events = scheduler();
        let mut rolls = ScriptedRolls::new([0.0]).with_fallback(0.5);
        events.advance(3.0, &mut rolls);
        let id = events.triggerable(3.0).unwrap().id;
        assert!(events.resolve(id, 5.0, &mut rolls).is_some());
        assert!(events.resolve(id, 5.0, &mut rolls).is_none());
        assert!(events.triggerable(5.0).is_none());
    }

    #[test]
    fn resolve_rejects_wrong_id_and_late_calls() {
        let mut events = scheduler();
        let mut rolls = ScriptedRolls::new([0.0]).with_fallback(0.5);
        events.advance(3.0, &mut rolls);
        let id = events.triggerable(3.0).unwrap().id;
        assert!(events.resolve(id + 1, 4.0, &mut rolls).is_none());
        assert!(events.resolve(id, 18.0, &mut rolls).is_none());
    }

    #[test]
    fn reward_selection_weights() {
        assert_eq!(select_reward(0.05, 0.1), RewardKind::Frenzy);
        assert_eq!(select_reward(0.15, 0.1), RewardKind::FlatGrant);
        assert_eq!(select_reward(0.5, 0.1), RewardKind::ProductionBoost);
        assert_eq!(select_reward(0.99, 0.1), RewardKind::ClickBoost);
    }

    #[test]
    fn chance_raises_are_bounded() {
        let mut events = scheduler();
        assert!((events.raise_chance(0.25) - 0.35).abs() < 1e-12);
        assert!((events.raise_chance(1.0) - 0.5).abs() < f64::EPSILON);
        events.set_chance(f64::NAN);
        assert!(events.current_chance().abs() < f64::EPSILON);
    }

    #[test]
    fn reset_invalidates_open_events() {
        let mut events = scheduler();
        let mut rolls = ScriptedRolls::new([0.0]).with_fallback(0.5);
        events.advance(3.0, &mut rolls);
        let id = events.triggerable(3.0).unwrap().id;
        events.reset(4.0);
        assert_eq!(events.epoch(), 1);
        assert!(events.resolve(id, 4.5, &mut rolls).is_none());
    }

    #[test]
    fn click_reward_adds_forty_percent_of_base_click_power() {
        let cfg = EventConfig::default();
        let mut ledger = ResourceLedger::new();
        ledger.set_click_power(10.0);
        let mut boosts = BoostEngine::new();
        let reward = apply_reward(&cfg, 1, RewardKind::ClickBoost, 0.0, 0.0, &mut ledger, &mut boosts);
        assert!((reward.amount - 4.0).abs() < 1e-12);
        assert!((ledger.click_power() - 14.0).abs() < 1e-12);

        let grant = apply_reward(&cfg, 2, RewardKind::FlatGrant, 0.5, 0.0, &mut ledger, &mut boosts);
        assert!((grant.amount - 100.0).abs() < f64::EPSILON);
    }
}
