use anyhow::{Context, Result};
use clicker_game::{
    AchievementId, ClickerEngine, EngineSnapshot, LuckyOutcome, PurchaseOutcome, RewardDescriptor,
    SchedulerNotice,
};
use std::sync::Arc;
use twox_hash::XxHash64;

use super::policy::GameplayStrategy;

/// Hash seed for save fingerprints. Changing it invalidates recorded fingerprints.
pub const FINGERPRINT_SEED: u64 = 0xC11C_4E55;

/// Upper bound on purchases a policy may make between two ticks.
const MAX_PURCHASES_PER_STEP: usize = 16;

/// Declarative plan for running a headless session.
#[derive(Debug, Clone)]
pub struct SessionPlan {
    pub strategy: GameplayStrategy,
    pub steps: u32,
    pub step_seconds: f64,
    pub clicks_per_step: u32,
    pub resolve_events: bool,
    pub setup: Option<fn(&mut ClickerEngine)>,
    pub expectations: Vec<SessionExpectation>,
}

impl SessionPlan {
    #[must_use]
    pub fn new(strategy: GameplayStrategy) -> Self {
        Self {
            strategy,
            steps: 120,
            step_seconds: 1.0,
            clicks_per_step: 5,
            resolve_events: true,
            setup: None,
            expectations: Vec::new(),
        }
    }

    #[must_use]
    pub const fn with_steps(mut self, steps: u32) -> Self {
        self.steps = steps;
        self
    }

    #[must_use]
    pub const fn with_step_seconds(mut self, seconds: f64) -> Self {
        self.step_seconds = seconds;
        self
    }

    #[must_use]
    pub const fn with_clicks(mut self, clicks_per_step: u32) -> Self {
        self.clicks_per_step = clicks_per_step;
        self
    }

    #[must_use]
    pub const fn ignoring_events(mut self) -> Self {
        self.resolve_events = false;
        self
    }

    #[must_use]
    pub fn with_setup(mut self, setup: fn(&mut ClickerEngine)) -> Self {
        self.setup = Some(setup);
        self
    }

    #[must_use]
    pub fn with_expectation(mut self, expectation: impl Into<SessionExpectation>) -> Self {
        self.expectations.push(expectation.into());
        self
    }
}

/// Assertion hook run after a session completes.
type SessionExpectationFn = Arc<dyn Fn(&SessionSummary) -> Result<()> + Send + Sync + 'static>;

#[derive(Clone)]
pub struct SessionExpectation(SessionExpectationFn);

impl std::fmt::Debug for SessionExpectation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionExpectation").finish()
    }
}

impl SessionExpectation {
    pub fn evaluate(&self, summary: &SessionSummary) -> Result<()> {
        (self.0)(summary)
    }
}

impl<F> From<F> for SessionExpectation
where
    F: Fn(&SessionSummary) -> Result<()> + Send + Sync + 'static,
{
    fn from(f: F) -> Self {
        Self(Arc::new(f))
    }
}

/// One purchase made by the policy.
#[derive(Debug, Clone)]
pub struct DecisionRecord {
    pub step: u32,
    pub policy_name: &'static str,
    pub purchasable_id: String,
    pub price: f64,
    pub rationale: Option<String>,
}

/// Complete record of a session.
#[derive(Debug, Clone)]
pub struct SessionSummary {
    pub seed: u64,
    pub strategy: GameplayStrategy,
    pub steps_run: u32,
    pub final_state: EngineSnapshot,
    pub decisions: Vec<DecisionRecord>,
    pub declined_purchases: u32,
    pub lucky_outcomes: Vec<LuckyOutcome>,
    pub rewards: Vec<RewardDescriptor>,
    pub events_triggered: usize,
    pub events_expired: usize,
    pub unlocked: Vec<AchievementId>,
    pub min_balance: f64,
    pub rng_draws: u64,
    pub save_json: String,
    pub fingerprint: u64,
}

/// xxhash64 of a serialized save document.
#[must_use]
pub fn fingerprint(save_json: &str) -> u64 {
    XxHash64::oneshot(FINGERPRINT_SEED, save_json.as_bytes())
}

/// Headless deterministic runner for the economy engine.
#[derive(Debug, Clone, Copy)]
pub struct SessionRunner {
    verbose: bool,
}

impl SessionRunner {
    pub const fn new(verbose: bool) -> Self {
        Self { verbose }
    }

    /// Play `plan` against a fresh engine seeded with `seed`.
    ///
    /// # Errors
    ///
    /// Returns an error if the final save document cannot be serialized.
    pub fn run_plan(&self, plan: &SessionPlan, seed: u64) -> Result<SessionSummary> {
        let mut engine = ClickerEngine::with_defaults(seed);
        if let Some(setup) = plan.setup {
            setup(&mut engine);
        }
        let mut policy = plan.strategy.create_policy(seed);

        let mut decisions = Vec::new();
        let mut declined_purchases = 0_u32;
        let mut lucky_outcomes = Vec::new();
        let mut rewards = Vec::new();
        let mut events_triggered = 0_usize;
        let mut events_expired = 0_usize;
        let mut unlocked = engine.newly_earned_achievements();
        let mut min_balance = engine.ledger().balance();

        for step in 0..plan.steps {
            for _ in 0..plan.clicks_per_step {
                engine.click();
            }

            for _ in 0..MAX_PURCHASES_PER_STEP {
                let Some(decision) = policy.pick_purchase(&engine) else {
                    break;
                };
                match engine.purchase(&decision.purchasable_id) {
                    Ok(receipt) => {
                        if let PurchaseOutcome::Lucky(outcome) = receipt.outcome {
                            lucky_outcomes.push(outcome);
                        }
                        decisions.push(DecisionRecord {
                            step,
                            policy_name: policy.name(),
                            purchasable_id: receipt.id,
                            price: receipt.price,
                            rationale: decision.rationale,
                        });
                    }
                    Err(err) => {
                        log::debug!("{} declined at step {step}: {err}", policy.name());
                        declined_purchases += 1;
                        break;
                    }
                }
                min_balance = min_balance.min(engine.ledger().balance());
            }

            let report = engine.tick(plan.step_seconds);
            for notice in &report.notices {
                match notice {
                    SchedulerNotice::Triggered { .. } => events_triggered += 1,
                    SchedulerNotice::Expired { .. } => events_expired += 1,
                }
            }

            if plan.resolve_events
                && let Some(event) = engine.triggerable_event()
                && let Some(reward) = engine.resolve_event(event.id)
            {
                if self.verbose {
                    println!(
                        "  ✨ step {step}: event {} paid {} ({:.1})",
                        event.id,
                        reward.kind.key(),
                        reward.amount
                    );
                }
                rewards.push(reward);
            }

            unlocked.extend(engine.newly_earned_achievements());
            min_balance = min_balance.min(engine.ledger().balance());
        }

        let save_json = engine
            .serialize()
            .to_json()
            .context("serializing final save document")?;

        Ok(SessionSummary {
            seed,
            strategy: plan.strategy,
            steps_run: plan.steps,
            final_state: engine.snapshot(),
            decisions,
            declined_purchases,
            lucky_outcomes,
            rewards,
            events_triggered,
            events_expired,
            unlocked,
            min_balance,
            rng_draws: engine.rng_draws(),
            fingerprint: fingerprint(&save_json),
            save_json,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn greedy_session_buys_and_earns() {
        let plan = SessionPlan::new(GameplayStrategy::Greedy).with_steps(90);
        let summary = SessionRunner::new(false).run_plan(&plan, 7).unwrap();
        assert_eq!(summary.steps_run, 90);
        assert_eq!(summary.final_state.stats.total_clicks, 450);
        assert!(!summary.decisions.is_empty());
        assert!(summary.min_balance >= 0.0);
        assert!(summary.unlocked.iter().any(|id| id == "first_click"));
    }

    #[test]
    fn same_seed_same_fingerprint() {
        let plan = SessionPlan::new(GameplayStrategy::Random).with_steps(60);
        let runner = SessionRunner::new(false);
        let a = runner.run_plan(&plan, 21).unwrap();
        let b = runner.run_plan(&plan, 21).unwrap();
        assert_eq!(a.fingerprint, b.fingerprint);
        assert_eq!(a.save_json, b.save_json);
        assert_eq!(a.rng_draws, b.rng_draws);
    }

    #[test]
    fn fingerprint_tracks_content() {
        assert_eq!(fingerprint("{}"), fingerprint("{}"));
        assert_ne!(fingerprint("{}"), fingerprint("{\"version\":2}"));
    }

    #[test]
    fn idle_session_without_clicks_earns_nothing() {
        let plan = SessionPlan::new(GameplayStrategy::Idle)
            .with_clicks(0)
            .ignoring_events()
            .with_steps(30);
        let summary = SessionRunner::new(false).run_plan(&plan, 1).unwrap();
        assert!(summary.final_state.balance.abs() < f64::EPSILON);
        assert!(summary.decisions.is_empty());
        assert!(summary.rewards.is_empty());
    }
}
