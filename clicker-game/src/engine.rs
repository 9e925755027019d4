//! The engine controller: owns all economy state and exposes the host-facing operations.
use serde::{Deserialize, Serialize};
use std::cell::{Cell, RefCell};

use crate::boosts::{ActiveBoostView, BoostEngine, BoostHandle, ExpiredBoost, ExpiredBoosts};
use crate::catalog::{Catalog, PurchasableState, PurchaseContext, PurchaseReceipt};
use crate::config::{DataLoader, EngineConfig, GameDefinitions, StaticDataLoader, default_config};
use crate::error::{ConfigError, PurchaseError, SaveError};
use crate::events::{EventDescriptor, EventScheduler, RewardDescriptor, SchedulerNotice, apply_reward};
use crate::ledger::ResourceLedger;
use crate::numbers::finite_or_zero;
use crate::persistence::{SAVE_VERSION, SaveDocument, SavedPurchasable, SavedResources};
use crate::production::{ProductionRate, accrue, production_rate};
use crate::progression::{AchievementId, LifetimeStats, ProgressView, ProgressionTracker};
use crate::rng::RngBundle;

/// Monotonic time source in seconds.
pub trait Clock {
    fn now(&self) -> f64;
}

/// Clock advanced by hand; used by tests and the headless tester.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Cell<f64>,
}

impl ManualClock {
    #[must_use]
    pub const fn new(start: f64) -> Self {
        Self {
            now: Cell::new(start),
        }
    }

    pub fn advance(&self, seconds: f64) {
        self.now.set(self.now.get() + seconds);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> f64 {
        self.now.get()
    }
}

/// Host storage for save documents.
pub trait SaveStorage {
    type Error: std::error::Error + Send + Sync + 'static;

    /// # Errors
    ///
    /// Returns an error if the stored document cannot be read or decoded.
    fn load(&self) -> Result<Option<SaveDocument>, Self::Error>;

    /// # Errors
    ///
    /// Returns an error if the document cannot be encoded or written.
    fn save(&self, document: &SaveDocument) -> Result<(), Self::Error>;
}

/// In-memory storage that keeps the encoded JSON text.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    slot: RefCell<Option<String>>,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Storage pre-filled with raw text, valid or not.
    #[must_use]
    pub fn with_raw(raw: impl Into<String>) -> Self {
        Self {
            slot: RefCell::new(Some(raw.into())),
        }
    }

    #[must_use]
    pub fn raw(&self) -> Option<String> {
        self.slot.borrow().clone()
    }
}

impl SaveStorage for MemoryStorage {
    type Error = SaveError;

    fn load(&self) -> Result<Option<SaveDocument>, Self::Error> {
        self.slot
            .borrow()
            .as_deref()
            .map(SaveDocument::from_json)
            .transpose()
    }

    fn save(&self, document: &SaveDocument) -> Result<(), Self::Error> {
        let json = document.to_json()?;
        *self.slot.borrow_mut() = Some(json);
        Ok(())
    }
}

/// Everything one tick changed.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TickReport {
    /// Seconds actually simulated after clamping.
    pub delta: f64,
    pub credited: f64,
    pub cps: f64,
    pub expired_boosts: ExpiredBoosts,
    pub notices: Vec<SchedulerNotice>,
    pub unlocked: Vec<AchievementId>,
}

/// One row of the shop as the presentation layer sees it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchasableView {
    pub id: String,
    pub name: String,
    pub kind: String,
    pub current_cost: f64,
    pub count: u32,
    pub affordable: bool,
}

/// Read-only view of the whole engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineSnapshot {
    pub now: f64,
    pub balance: f64,
    pub display_balance: f64,
    pub click_power: f64,
    pub base_click_power: f64,
    pub production: ProductionRate,
    pub purchasables: Vec<PurchasableView>,
    pub active_boosts: Vec<ActiveBoostView>,
    pub event: Option<EventDescriptor>,
    pub event_chance: f64,
    pub achievements_earned: usize,
    pub achievements_total: usize,
    pub lucky_streak: u32,
    pub stats: LifetimeStats,
    pub total_earned: f64,
    pub sound_on: bool,
    pub epoch: u64,
}

/// Single owner of the economy. Hosts drive it with ticks and player actions
/// and read it back through snapshots.
#[derive(Debug, Clone)]
pub struct ClickerEngine {
    config: EngineConfig,
    ledger: ResourceLedger,
    boosts: BoostEngine,
    catalog: Catalog,
    events: EventScheduler,
    tracker: ProgressionTracker,
    stats: LifetimeStats,
    rng: RngBundle,
    now: f64,
    last_clock: Option<f64>,
    sound_on: bool,
    epoch: u64,
}

impl ClickerEngine {
    /// Tunables that fail validation are replaced by the defaults.
    #[must_use]
    pub fn new(config: EngineConfig, definitions: GameDefinitions, seed: u64) -> Self {
        let config = match config.validate() {
            Ok(()) => config,
            Err(err) => {
                log::warn!("{err}; engine falls back to default tunables");
                EngineConfig::default()
            }
        };
        let events = EventScheduler::new(config.events.clone(), 0.0);
        Self {
            ledger: ResourceLedger::new(),
            boosts: BoostEngine::new(),
            catalog: Catalog::new(definitions.purchasables),
            tracker: ProgressionTracker::new(definitions.achievements),
            stats: LifetimeStats::default(),
            rng: RngBundle::from_user_seed(seed),
            now: 0.0,
            last_clock: None,
            sound_on: true,
            epoch: 0,
            events,
            config,
        }
    }

    /// Engine over the embedded catalog, achievements, and tunables.
    #[must_use]
    pub fn with_defaults(seed: u64) -> Self {
        Self::new(default_config().clone(), GameDefinitions::embedded(), seed)
    }

    /// Engine over data supplied by a host loader.
    ///
    /// # Errors
    ///
    /// Returns the loader's error when any data set fails to load or validate.
    pub fn from_loader<L>(loader: &L, seed: u64) -> Result<Self, L::Error>
    where
        L: DataLoader,
        L::Error: From<ConfigError>,
    {
        let config = loader.load_config()?;
        config.validate()?;
        let definitions = GameDefinitions::from_loader(loader)?;
        Ok(Self::new(config, definitions, seed))
    }

    #[must_use]
    pub const fn now(&self) -> f64 {
        self.now
    }

    #[must_use]
    pub const fn seed(&self) -> u64 {
        self.rng.seed()
    }

    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[must_use]
    pub const fn ledger(&self) -> &ResourceLedger {
        &self.ledger
    }

    #[must_use]
    pub const fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    #[must_use]
    pub const fn boosts(&self) -> &BoostEngine {
        &self.boosts
    }

    #[must_use]
    pub const fn events(&self) -> &EventScheduler {
        &self.events
    }

    #[must_use]
    pub const fn tracker(&self) -> &ProgressionTracker {
        &self.tracker
    }

    #[must_use]
    pub const fn stats(&self) -> &LifetimeStats {
        &self.stats
    }

    #[must_use]
    pub const fn sound_on(&self) -> bool {
        self.sound_on
    }

    pub fn set_sound(&mut self, on: bool) {
        self.sound_on = on;
    }

    /// Generation counter bumped by every reset and load.
    #[must_use]
    pub const fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Random draws consumed so far across all streams.
    #[must_use]
    pub const fn rng_draws(&self) -> u64 {
        self.rng.total_draws()
    }

    /// Production rate at the current instant.
    #[must_use]
    pub fn production(&self) -> ProductionRate {
        production_rate(&self.catalog, &self.boosts, self.ledger.balance(), self.now)
    }

    fn evaluate_achievements(&mut self) -> Vec<AchievementId> {
        let cps = self.production().total;
        self.stats.observe_cps(cps);
        let view = ProgressView {
            ledger: &self.ledger,
            catalog: &self.catalog,
            stats: &self.stats,
            cps,
            event_chance: self.events.current_chance(),
        };
        self.tracker.evaluate(&view)
    }

    /// Advance simulated time. Non-finite and negative deltas simulate nothing;
    /// deltas above the catch-up limit are clamped.
    pub fn tick(&mut self, delta_seconds: f64) -> TickReport {
        let max_delta = self.config.tick.max_catch_up_seconds.max(0.0);
        let delta = finite_or_zero(delta_seconds, "tick delta").clamp(0.0, max_delta);
        if delta < delta_seconds {
            log::debug!("tick delta {delta_seconds} clamped to {delta}");
        }

        let credited = accrue(&self.catalog, &self.boosts, &mut self.ledger, self.now, delta);
        self.now += delta;
        let expired_boosts = self.boosts.expire_due(self.now, &mut self.ledger);
        let notices = self.events.advance(self.now, self.rng.events());
        for notice in &notices {
            if matches!(notice, SchedulerNotice::Expired { .. }) {
                self.stats.events_missed = self.stats.events_missed.saturating_add(1);
            }
        }
        let unlocked = self.evaluate_achievements();

        TickReport {
            delta,
            credited,
            cps: self.production().total,
            expired_boosts,
            notices,
            unlocked,
        }
    }

    /// Tick by the time elapsed on `clock` since the previous call. The first
    /// call only records the reading.
    pub fn tick_from_clock(&mut self, clock: &impl Clock) -> TickReport {
        let reading = clock.now();
        let delta = self.last_clock.map_or(0.0, |prev| reading - prev);
        self.last_clock = Some(reading);
        self.tick(delta)
    }

    /// Manual click. Returns the amount credited.
    pub fn click(&mut self) -> f64 {
        let power = self.boosts.effective_click_power(&self.ledger, self.now);
        let credited = self.ledger.credit(power);
        self.stats.total_clicks = self.stats.total_clicks.saturating_add(1);
        self.evaluate_achievements();
        credited
    }

    /// Credit currency from outside the simulation (offline earnings, debug grants).
    pub fn grant(&mut self, amount: f64) -> f64 {
        let credited = self.ledger.credit(amount);
        self.evaluate_achievements();
        credited
    }

    /// Buy one unit of a purchasable.
    ///
    /// # Errors
    ///
    /// Returns [`PurchaseError`] when the id is unknown or the balance is short;
    /// no state changes in either case.
    pub fn purchase(&mut self, id: &str) -> Result<PurchaseReceipt, PurchaseError> {
        let receipt = self.catalog.purchase(
            id,
            PurchaseContext {
                ledger: &mut self.ledger,
                boosts: &mut self.boosts,
                events: &mut self.events,
                rng: self.rng.lucky(),
                config: &self.config,
                now: self.now,
            },
        )?;
        self.stats.purchases = self.stats.purchases.saturating_add(1);
        self.evaluate_achievements();
        Ok(receipt)
    }

    /// End a boost early. Stale handles are ignored.
    pub fn end_boost(&mut self, handle: BoostHandle) -> Option<ExpiredBoost> {
        self.boosts.force_expire(handle, &mut self.ledger)
    }

    #[must_use]
    pub fn triggerable_event(&self) -> Option<EventDescriptor> {
        self.events.triggerable(self.now)
    }

    /// Claim the open event. Repeated, late, or mismatched calls return `None`.
    pub fn resolve_event(&mut self, event_id: u64) -> Option<RewardDescriptor> {
        let kind = self.events.resolve(event_id, self.now, self.rng.events())?;
        let cps = self.production().total;
        let reward = apply_reward(
            self.events.config(),
            event_id,
            kind,
            cps,
            self.now,
            &mut self.ledger,
            &mut self.boosts,
        );
        self.stats.events_resolved = self.stats.events_resolved.saturating_add(1);
        self.evaluate_achievements();
        Some(reward)
    }

    /// Unlocks not yet handed to the host, in unlock order.
    pub fn newly_earned_achievements(&mut self) -> Vec<AchievementId> {
        self.tracker.take_newly_earned()
    }

    #[must_use]
    pub fn snapshot(&self) -> EngineSnapshot {
        let purchasables = self
            .catalog
            .iter()
            .map(|(def, state)| PurchasableView {
                id: def.id.clone(),
                name: def.name.clone(),
                kind: def.kind.key().to_string(),
                current_cost: state.current_cost,
                count: state.count,
                affordable: self.ledger.affordable(state.current_cost),
            })
            .collect();
        EngineSnapshot {
            now: self.now,
            balance: self.ledger.balance(),
            display_balance: self.ledger.display_balance(),
            click_power: self.boosts.effective_click_power(&self.ledger, self.now),
            base_click_power: self.boosts.base_click_power(&self.ledger),
            production: self.production(),
            purchasables,
            active_boosts: self.boosts.active_boosts(self.now),
            event: self.triggerable_event(),
            event_chance: self.events.current_chance(),
            achievements_earned: self.tracker.earned_count(),
            achievements_total: self.tracker.definitions().len(),
            lucky_streak: self.catalog.lucky_streak(),
            stats: self.stats.clone(),
            total_earned: self.ledger.total_earned(),
            sound_on: self.sound_on,
            epoch: self.epoch,
        }
    }

    /// Persistable snapshot. Click power is written without any live boost.
    #[must_use]
    pub fn serialize(&self) -> SaveDocument {
        SaveDocument {
            version: SAVE_VERSION,
            resources: SavedResources {
                balance: self.ledger.balance(),
                click_power: self.boosts.base_click_power(&self.ledger),
                total_earned: self.ledger.total_earned(),
            },
            purchasables: self
                .catalog
                .states()
                .into_iter()
                .map(|(id, state)| {
                    (
                        id,
                        SavedPurchasable {
                            current_cost: Some(state.current_cost),
                            count: state.count,
                        },
                    )
                })
                .collect(),
            achievements: self.tracker.earned_map(),
            event_chance: Some(self.events.current_chance()),
            sound_on: self.sound_on,
            stats: self.stats.clone(),
        }
    }

    /// Replace the economy with a saved document. Boosts and open events are
    /// dropped; absent fields take defaults.
    pub fn load(&mut self, document: SaveDocument) {
        self.reset();
        self.ledger = ResourceLedger::restore(
            document.resources.balance,
            document.resources.click_power,
            document.resources.total_earned,
        );
        for (id, saved) in &document.purchasables {
            let Some(fresh) = self.catalog.state(id).copied() else {
                log::debug!("save references unknown purchasable {id}; skipped");
                continue;
            };
            self.catalog.restore_state(
                id,
                PurchasableState {
                    current_cost: saved.current_cost.unwrap_or(fresh.current_cost),
                    count: saved.count,
                },
            );
        }
        if let Some(chance) = document.event_chance {
            self.events.set_chance(chance);
        }
        self.tracker.restore(&document.achievements);
        self.stats = document.stats;
        self.sound_on = document.sound_on;
    }

    /// Decode and load a JSON save. A malformed document resets the engine to
    /// defaults and reports why.
    ///
    /// # Errors
    ///
    /// Returns [`SaveError::MalformedSaveDocument`] when the text cannot be used.
    pub fn load_json(&mut self, json: &str) -> Result<(), SaveError> {
        match SaveDocument::from_json(json) {
            Ok(document) => {
                self.load(document);
                Ok(())
            }
            Err(err) => {
                log::warn!("{err}; engine reset to defaults");
                self.reset();
                Err(err)
            }
        }
    }

    /// Write the current state to host storage.
    ///
    /// # Errors
    ///
    /// Returns the storage error if the write fails.
    pub fn autosave<S: SaveStorage>(&self, storage: &S) -> Result<(), S::Error> {
        storage.save(&self.serialize())
    }

    /// Load from host storage. Returns `false` when nothing was stored. An
    /// unreadable document resets the engine before the error is returned.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage read or decode fails.
    pub fn restore<S>(&mut self, storage: &S) -> Result<bool, anyhow::Error>
    where
        S: SaveStorage,
        S::Error: Into<anyhow::Error>,
    {
        match storage.load() {
            Ok(Some(document)) => {
                self.load(document);
                Ok(true)
            }
            Ok(None) => Ok(false),
            Err(err) => {
                self.reset();
                Err(err.into())
            }
        }
    }

    /// Back to a fresh game. Live boosts and open events are dropped, their
    /// handles go stale, and pending unlock reports are discarded. Simulated
    /// time and the sound preference carry over.
    pub fn reset(&mut self) {
        self.ledger = ResourceLedger::new();
        self.boosts.reset();
        self.catalog.reset();
        self.events.reset(self.now);
        self.tracker.reset();
        self.stats = LifetimeStats::default();
        self.epoch = self.epoch.saturating_add(1);
        log::debug!("engine reset; epoch {}", self.epoch);
    }
}

impl Default for ClickerEngine {
    fn default() -> Self {
        Self::with_defaults(0)
    }
}

/// Build an engine from the embedded data through the [`DataLoader`] seam.
///
/// # Errors
///
/// Returns an error if the embedded data fails validation.
pub fn embedded_engine(seed: u64) -> Result<ClickerEngine, ConfigError> {
    ClickerEngine::from_loader(&StaticDataLoader, seed)
}
