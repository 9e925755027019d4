//! Resource ledger: the single currency balance and the click-power scalar.
use serde::{Deserialize, Serialize};

use crate::numbers::{finite_or_zero, floor_currency};

/// Currency granted per manual click before any upgrade.
pub const BASE_CLICK_POWER: f64 = 1.0;

/// Balance and click power. The balance is never committed negative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceLedger {
    balance: f64,
    click_power: f64,
    #[serde(default)]
    total_earned: f64,
}

impl Default for ResourceLedger {
    fn default() -> Self {
        Self {
            balance: 0.0,
            click_power: BASE_CLICK_POWER,
            total_earned: 0.0,
        }
    }
}

impl ResourceLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a ledger from persisted values, clamping anything unusable.
    #[must_use]
    pub fn restore(balance: f64, click_power: f64, total_earned: f64) -> Self {
        let balance = finite_or_zero(balance, "restored balance").max(0.0);
        let click_power = finite_or_zero(click_power, "restored click power");
        Self {
            balance,
            click_power: if click_power > 0.0 {
                click_power
            } else {
                BASE_CLICK_POWER
            },
            total_earned: finite_or_zero(total_earned, "restored total earned").max(balance),
        }
    }

    #[must_use]
    pub const fn balance(&self) -> f64 {
        self.balance
    }

    /// Balance floored for display; accrual keeps the fractional part.
    #[must_use]
    pub fn display_balance(&self) -> f64 {
        floor_currency(self.balance)
    }

    #[must_use]
    pub const fn click_power(&self) -> f64 {
        self.click_power
    }

    /// Lifetime currency credited, including currency already spent.
    #[must_use]
    pub const fn total_earned(&self) -> f64 {
        self.total_earned
    }

    /// Add currency. Non-finite amounts are coerced to zero and negative
    /// amounts are ignored. Returns the amount actually credited.
    pub fn credit(&mut self, amount: f64) -> f64 {
        let amount = finite_or_zero(amount, "credit");
        if amount <= 0.0 {
            return 0.0;
        }
        self.balance += amount;
        self.total_earned += amount;
        amount
    }

    /// Subtract currency if the balance covers it. Declines without mutating
    /// when the amount is unaffordable or unusable.
    pub fn debit(&mut self, amount: f64) -> bool {
        if !amount.is_finite() || amount < 0.0 {
            log::warn!("invalid numeric input {amount} for debit; declined");
            return false;
        }
        if !self.affordable(amount) {
            return false;
        }
        self.balance = (self.balance - amount).max(0.0);
        true
    }

    #[must_use]
    pub fn affordable(&self, amount: f64) -> bool {
        amount.is_finite() && amount >= 0.0 && amount <= self.balance
    }

    /// Replace the live click power. Used by upgrades and boost restoration.
    pub fn set_click_power(&mut self, value: f64) {
        let value = finite_or_zero(value, "click power");
        self.click_power = if value > 0.0 { value } else { BASE_CLICK_POWER };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credit_and_debit_keep_balance_non_negative() {
        let mut ledger = ResourceLedger::new();
        assert!((ledger.credit(10.5) - 10.5).abs() < f64::EPSILON);
        assert!(!ledger.debit(11.0));
        assert!((ledger.balance() - 10.5).abs() < f64::EPSILON);
        assert!(ledger.debit(10.5));
        assert!(ledger.balance().abs() < f64::EPSILON);
        assert!((ledger.total_earned() - 10.5).abs() < f64::EPSILON);
    }

    #[test]
    fn non_finite_credit_is_coerced_to_zero() {
        let mut ledger = ResourceLedger::new();
        ledger.credit(5.0);
        assert!(ledger.credit(f64::NAN).abs() < f64::EPSILON);
        assert!(ledger.credit(f64::INFINITY).abs() < f64::EPSILON);
        assert!(ledger.credit(-3.0).abs() < f64::EPSILON);
        assert!((ledger.balance() - 5.0).abs() < f64::EPSILON);
    }

    #[test]
    fn invalid_debits_are_declined() {
        let mut ledger = ResourceLedger::new();
        ledger.credit(100.0);
        assert!(!ledger.debit(f64::NAN));
        assert!(!ledger.debit(-1.0));
        assert!(!ledger.affordable(f64::INFINITY));
        assert!((ledger.balance() - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn display_floors_fractional_accrual() {
        let mut ledger = ResourceLedger::new();
        ledger.credit(41.97);
        assert!((ledger.display_balance() - 41.0).abs() < f64::EPSILON);
    }

    #[test]
    fn restore_clamps_corrupt_values() {
        let ledger = ResourceLedger::restore(-20.0, f64::NAN, 3.0);
        assert!(ledger.balance().abs() < f64::EPSILON);
        assert!((ledger.click_power() - BASE_CLICK_POWER).abs() < f64::EPSILON);
    }
}
