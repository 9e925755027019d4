use anyhow::{Result, ensure};
use clicker_game::{ClickerEngine, config::default_config};

use super::policy::GameplayStrategy;
use super::simulation::{SessionPlan, SessionRunner, SessionSummary};

/// Named plan the logic tester runs per seed.
#[derive(Debug, Clone)]
pub struct TestScenario {
    pub name: String,
    pub plan: SessionPlan,
}

impl TestScenario {
    #[must_use]
    pub fn session(name: impl Into<String>, plan: SessionPlan) -> Self {
        Self {
            name: name.into(),
            plan,
        }
    }
}

#[must_use]
pub fn get_scenario(name: &str) -> Option<TestScenario> {
    match name.to_lowercase().as_str() {
        "smoke" => Some(smoke_scenario()),
        "idle-accrual" | "idle" => Some(idle_accrual_scenario()),
        "lucky-streak" | "lucky" => Some(lucky_streak_scenario()),
        "golden-events" | "events" => Some(golden_events_scenario()),
        "save-roundtrip" | "save" => Some(save_roundtrip_scenario()),
        "deterministic-replay" | "deterministic" => Some(deterministic_replay_scenario()),
        "long-run" => Some(long_run_scenario()),
        _ => None,
    }
}

#[must_use]
pub fn list_scenarios() -> Vec<(&'static str, &'static str)> {
    vec![
        ("smoke", "Smoke Test"),
        ("idle-accrual", "Idle Generator Accrual"),
        ("lucky-streak", "Lucky Purchase Bounds"),
        ("golden-events", "Golden Event Claims"),
        ("save-roundtrip", "Save Document Round Trip"),
        ("deterministic-replay", "Deterministic Replay Fingerprint"),
        ("long-run", "Long Greedy Session"),
    ]
}

fn smoke_expectation(summary: &SessionSummary) -> Result<()> {
    let state = &summary.final_state;
    ensure!(
        state.stats.total_clicks == u64::from(summary.steps_run) * 5,
        "expected every click to register, saw {}",
        state.stats.total_clicks
    );
    ensure!(summary.min_balance >= 0.0, "balance dipped to {}", summary.min_balance);
    ensure!(!summary.decisions.is_empty(), "greedy policy never bought anything");
    ensure!(
        summary.unlocked.iter().any(|id| id == "first_click"),
        "first click achievement was not reported"
    );
    Ok(())
}

fn smoke_scenario() -> TestScenario {
    TestScenario::session(
        "Smoke Test",
        SessionPlan::new(GameplayStrategy::Greedy)
            .with_steps(120)
            .with_clicks(5)
            .with_expectation(smoke_expectation),
    )
}

const IDLE_SECONDS: u32 = 60;

/// Buy one cursor and one grandma with an exact grant.
fn idle_setup(engine: &mut ClickerEngine) {
    engine.grant(75.0);
    for id in ["cursor", "grandma"] {
        if let Err(err) = engine.purchase(id) {
            log::warn!("idle setup could not buy {id}: {err}");
        }
    }
}

fn idle_expectation(summary: &SessionSummary) -> Result<()> {
    let state = &summary.final_state;
    let expected = 1.1 * f64::from(IDLE_SECONDS);
    ensure!(
        (state.production.total - 1.1).abs() < 1e-9,
        "expected 1.1 cps, saw {}",
        state.production.total
    );
    ensure!(
        (state.balance - expected).abs() < 1e-6,
        "expected {expected} after {IDLE_SECONDS}s idle, saw {}",
        state.balance
    );
    ensure!(
        (state.display_balance - state.balance.floor()).abs() < f64::EPSILON,
        "display balance {} is not the floored balance",
        state.display_balance
    );
    Ok(())
}

fn idle_accrual_scenario() -> TestScenario {
    TestScenario::session(
        "Idle Generator Accrual",
        SessionPlan::new(GameplayStrategy::Idle)
            .with_steps(IDLE_SECONDS)
            .with_clicks(0)
            .ignoring_events()
            .with_setup(idle_setup)
            .with_expectation(idle_expectation),
    )
}

fn lucky_setup(engine: &mut ClickerEngine) {
    engine.grant(50_000.0);
}

fn lucky_expectation(summary: &SessionSummary) -> Result<()> {
    let min_bonus = default_config().lucky.min_bonus;
    ensure!(
        !summary.lucky_outcomes.is_empty(),
        "gambler never bought a lucky purchase"
    );
    ensure!(
        summary.lucky_outcomes[0].streak == 0,
        "first lucky purchase started a streak of {}",
        summary.lucky_outcomes[0].streak
    );
    for (n, outcome) in summary.lucky_outcomes.iter().enumerate() {
        ensure!(outcome.bonus.is_finite(), "lucky #{n} paid {}", outcome.bonus);
        ensure!(
            outcome.bonus >= min_bonus,
            "lucky #{n} paid {} under the floor {min_bonus}",
            outcome.bonus
        );
        ensure!(
            outcome.critical || outcome.bonus <= outcome.base_bonus.max(min_bonus),
            "non-critical lucky #{n} paid {} above base {}",
            outcome.bonus,
            outcome.base_bonus
        );
    }
    Ok(())
}

fn lucky_streak_scenario() -> TestScenario {
    TestScenario::session(
        "Lucky Purchase Bounds",
        SessionPlan::new(GameplayStrategy::Gambler)
            .with_steps(40)
            .with_clicks(10)
            .with_setup(lucky_setup)
            .with_expectation(lucky_expectation),
    )
}

fn events_expectation(summary: &SessionSummary) -> Result<()> {
    ensure!(summary.events_triggered > 0, "no golden event triggered");
    ensure!(
        summary.rewards.len() <= summary.events_triggered,
        "{} rewards paid for {} events",
        summary.rewards.len(),
        summary.events_triggered
    );
    let mut ids: Vec<u64> = summary.rewards.iter().map(|r| r.event_id).collect();
    ids.sort_unstable();
    ids.dedup();
    ensure!(
        ids.len() == summary.rewards.len(),
        "an event paid out more than once"
    );
    ensure!(
        usize::try_from(summary.final_state.stats.events_resolved).ok()
            == Some(summary.rewards.len()),
        "resolved counter {} disagrees with {} rewards",
        summary.final_state.stats.events_resolved,
        summary.rewards.len()
    );
    ensure!(
        summary.rewards.iter().all(|r| r.amount.is_finite() && r.amount > 0.0),
        "event reward with a non-positive amount"
    );
    Ok(())
}

fn golden_events_scenario() -> TestScenario {
    TestScenario::session(
        "Golden Event Claims",
        SessionPlan::new(GameplayStrategy::Greedy)
            .with_steps(600)
            .with_clicks(2)
            .with_expectation(events_expectation),
    )
}

fn save_roundtrip_expectation(summary: &SessionSummary) -> Result<()> {
    let mut restored = ClickerEngine::with_defaults(summary.seed);
    restored.load_json(&summary.save_json)?;
    let reserialized = restored.serialize().to_json()?;
    ensure!(
        reserialized == summary.save_json,
        "reloaded save differs from the original"
    );
    ensure!(
        restored.newly_earned_achievements().is_empty(),
        "loading re-reported achievements"
    );
    ensure!(
        (restored.ledger().balance() - summary.final_state.balance).abs() < 1e-9,
        "balance changed across reload"
    );
    Ok(())
}

fn save_roundtrip_scenario() -> TestScenario {
    TestScenario::session(
        "Save Document Round Trip",
        SessionPlan::new(GameplayStrategy::Random)
            .with_steps(200)
            .with_expectation(save_roundtrip_expectation),
    )
}

fn replay_plan() -> SessionPlan {
    SessionPlan::new(GameplayStrategy::Random)
        .with_steps(240)
        .with_step_seconds(0.5)
        .with_clicks(3)
}

fn replay_expectation(summary: &SessionSummary) -> Result<()> {
    let replay = SessionRunner::new(false).run_plan(&replay_plan(), summary.seed)?;
    ensure!(
        replay.fingerprint == summary.fingerprint,
        "fingerprint {:016x} != {:016x} on replay",
        replay.fingerprint,
        summary.fingerprint
    );
    ensure!(
        replay.rng_draws == summary.rng_draws,
        "replay drew {} random numbers, original drew {}",
        replay.rng_draws,
        summary.rng_draws
    );
    Ok(())
}

fn deterministic_replay_scenario() -> TestScenario {
    TestScenario::session(
        "Deterministic Replay Fingerprint",
        replay_plan().with_expectation(replay_expectation),
    )
}

fn long_run_expectation(summary: &SessionSummary) -> Result<()> {
    let state = &summary.final_state;
    ensure!(
        state.balance.is_finite() && state.balance >= 0.0,
        "final balance {}",
        state.balance
    );
    ensure!(summary.min_balance >= 0.0, "balance dipped to {}", summary.min_balance);
    ensure!(
        state.production.total.is_finite(),
        "production rate went non-finite"
    );
    ensure!(
        state.purchasables.iter().all(|p| p.current_cost.is_finite()),
        "a purchasable cost overflowed"
    );
    ensure!(
        summary.decisions.len() >= 20,
        "only {} purchases in a long session",
        summary.decisions.len()
    );
    Ok(())
}

fn long_run_scenario() -> TestScenario {
    TestScenario::session(
        "Long Greedy Session",
        SessionPlan::new(GameplayStrategy::Greedy)
            .with_steps(2_000)
            .with_step_seconds(30.0)
            .with_clicks(5)
            .with_expectation(long_run_expectation),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_listed_scenario_resolves() {
        for (key, description) in list_scenarios() {
            let scenario = get_scenario(key).unwrap_or_else(|| panic!("{key} missing"));
            assert_eq!(scenario.name, description);
            assert!(!scenario.plan.expectations.is_empty());
        }
        assert!(get_scenario("browser-only").is_none());
    }

    #[test]
    fn idle_accrual_passes_for_a_seed() {
        let scenario = get_scenario("idle-accrual").unwrap();
        let summary = SessionRunner::new(false).run_plan(&scenario.plan, 1337).unwrap();
        for expectation in &scenario.plan.expectations {
            expectation.evaluate(&summary).unwrap();
        }
    }

    #[test]
    fn save_roundtrip_passes_for_a_seed() {
        let scenario = get_scenario("save").unwrap();
        let summary = SessionRunner::new(false).run_plan(&scenario.plan, 99).unwrap();
        for expectation in &scenario.plan.expectations {
            expectation.evaluate(&summary).unwrap();
        }
    }
}
