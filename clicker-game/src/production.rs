//! Production calculator: currency per second and per-tick accrual.
use serde::{Deserialize, Serialize};

use crate::boosts::BoostEngine;
use crate::catalog::Catalog;
use crate::ledger::ResourceLedger;
use crate::numbers::finite_or_zero;

/// Components of the production rate at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ProductionRate {
    pub flat: f64,
    pub interest: f64,
    pub cookie_multiplier: f64,
    pub accelerant: f64,
    pub total: f64,
}

/// Rate at `now`, with the interest term taken from `balance`.
#[must_use]
pub fn production_rate(
    catalog: &Catalog,
    boosts: &BoostEngine,
    balance: f64,
    now: f64,
) -> ProductionRate {
    let flat = catalog.flat_cps();
    let interest = catalog.interest_rate() * balance.max(0.0);
    let cookie_multiplier = boosts.cookie_multiplier(now);
    let accelerant = boosts.accelerant_factor(now);
    let total = finite_or_zero((flat + interest) * cookie_multiplier * accelerant, "production rate");
    ProductionRate {
        flat,
        interest,
        cookie_multiplier,
        accelerant,
        total,
    }
}

/// Credit production for `[start, start + delta)`.
///
/// The span is cut at every boost deadline inside it so an expiring boost
/// only covers its own share. The interest term uses the opening balance for
/// the whole span.
pub fn accrue(
    catalog: &Catalog,
    boosts: &BoostEngine,
    ledger: &mut ResourceLedger,
    start: f64,
    delta: f64,
) -> f64 {
    if delta <= 0.0 {
        return 0.0;
    }
    let opening_balance = ledger.balance();
    let end = start + delta;
    let mut cuts = boosts.deadlines_within(start, end);
    cuts.push(end);

    let mut cursor = start;
    let mut earned = 0.0;
    for cut in cuts {
        if cut <= cursor {
            continue;
        }
        let rate = production_rate(catalog, boosts, opening_balance, cursor);
        earned += rate.total * (cut - cursor);
        cursor = cut;
    }
    ledger.credit(earned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boosts::BoostKind;
    use crate::catalog::{GeneratorYield, PurchasableDefinition, PurchasableKind, PurchasableState};

    fn catalog(flat: u32, interest: u32) -> Catalog {
        let mut catalog = Catalog::new(vec![
            PurchasableDefinition {
                id: "grandma".into(),
                name: "Grandma".into(),
                description: String::new(),
                base_cost: 60.0,
                cost_growth: 1.15,
                kind: PurchasableKind::Generator {
                    output: GeneratorYield::Flat { cps_per_unit: 1.0 },
                },
            },
            PurchasableDefinition {
                id: "bank".into(),
                name: "Bank".into(),
                description: String::new(),
                base_cost: 1_000.0,
                cost_growth: 1.15,
                kind: PurchasableKind::Generator {
                    output: GeneratorYield::Interest { rate_per_unit: 0.01 },
                },
            },
        ]);
        catalog.restore_state("grandma", PurchasableState { current_cost: 60.0, count: flat });
        catalog.restore_state("bank", PurchasableState { current_cost: 1_000.0, count: interest });
        catalog
    }

    #[test]
    fn single_generator_accrues_exactly() {
        let catalog = catalog(1, 0);
        let boosts = BoostEngine::new();
        let mut ledger = ResourceLedger::new();
        let credited = accrue(&catalog, &boosts, &mut ledger, 0.0, 10.0);
        assert!((credited - 10.0).abs() < f64::EPSILON);
        assert!((ledger.balance() - 10.0).abs() < f64::EPSILON);
    }

    #[test]
    fn interest_uses_opening_balance() {
        let catalog = catalog(0, 2);
        let boosts = BoostEngine::new();
        let mut ledger = ResourceLedger::new();
        ledger.credit(1_000.0);
        // 2 units * 1 % * 1000 = 20 per second, not compounded within the tick.
        let credited = accrue(&catalog, &boosts, &mut ledger, 0.0, 5.0);
        assert!((credited - 100.0).abs() < 1e-9);
    }

    #[test]
    fn multipliers_compose_and_expire_mid_span() {
        let catalog = catalog(1, 0);
        let mut boosts = BoostEngine::new();
        let mut ledger = ResourceLedger::new();
        boosts.activate(BoostKind::ProductionMultiplier, 2.0, 5.0, 0.0, &mut ledger);
        boosts.activate(BoostKind::GlobalRateAccelerant, 4.0, 2.0, 0.0, &mut ledger);
        let rate = production_rate(&catalog, &boosts, 0.0, 1.0);
        assert!((rate.total - 8.0).abs() < f64::EPSILON);

        // 2 s at 8, 3 s at 2, 5 s at 1.
        let credited = accrue(&catalog, &boosts, &mut ledger, 0.0, 10.0);
        assert!((credited - 27.0).abs() < 1e-9);
    }

    #[test]
    fn non_positive_delta_is_a_no_op() {
        let catalog = catalog(3, 0);
        let boosts = BoostEngine::new();
        let mut ledger = ResourceLedger::new();
        assert!(accrue(&catalog, &boosts, &mut ledger, 0.0, 0.0).abs() < f64::EPSILON);
        assert!(accrue(&catalog, &boosts, &mut ledger, 0.0, -4.0).abs() < f64::EPSILON);
    }
}
