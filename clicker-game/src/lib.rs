//! Clicker Game Engine
//!
//! Platform-agnostic economy core for an incremental clicker game: currency
//! ledger, purchasable catalog, timed boosts, production, random events,
//! achievements, and save documents. No UI or platform dependencies.

pub mod boosts;
pub mod catalog;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod ledger;
pub mod numbers;
pub mod persistence;
pub mod production;
pub mod progression;
pub mod rng;

// Re-export commonly used types
pub use boosts::{
    ActiveBoostView, BoostEngine, BoostHandle, BoostInstance, BoostKind, BoostSlot, ExpiredBoost,
    timed_boost_duration,
};
pub use catalog::{
    Catalog, GeneratorYield, LuckyOutcome, PurchasableDefinition, PurchasableKind,
    PurchasableState, PurchaseOutcome, PurchaseReceipt, lucky_bonus,
};
pub use config::{
    BoostConfig, DataLoader, EngineConfig, EventConfig, GameDefinitions, LuckyConfig,
    StaticDataLoader, TickConfig, TimedReward,
};
pub use engine::{
    ClickerEngine, Clock, EngineSnapshot, ManualClock, MemoryStorage, PurchasableView,
    SaveStorage, TickReport, embedded_engine,
};
pub use error::{ConfigError, PurchaseError, SaveError};
pub use events::{EventDescriptor, EventPhase, RewardDescriptor, RewardKind, SchedulerNotice};
pub use ledger::ResourceLedger;
pub use persistence::{MIN_COMPATIBLE_VERSION, SAVE_VERSION, SaveDocument};
pub use production::ProductionRate;
pub use progression::{
    AchievementCondition, AchievementDefinition, AchievementId, LifetimeStats, Rarity,
};
pub use rng::{RandomSource, RngBundle, ScriptedRolls};
