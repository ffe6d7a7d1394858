//! The Impact Wallet: a per-user capped donation budget.
//!
//! Cap evaluation order is fixed: month rollover first, then the monthly
//! limit, then the daily cap, then commit. Rollover is lazy -- there is no
//! background resetter; the month counter resets the first time a donation
//! is evaluated in a new calendar month.
//!
//! A cap rejection is a normal outcome, not an error: callers receive
//! [`CapCheck::Denied`] and simply skip creating the donation.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::clock::month_start;
use crate::money::Money;

/// Per-user wallet row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImpactWallet {
    pub user_id: String,
    pub monthly_limit: Money,
    pub daily_cap: Money,
    pub current_month_spent: Money,
    pub month_start_date: NaiveDate,
    pub lifetime_donated: Money,
}

/// Outcome of a cap evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "result")]
pub enum CapCheck {
    Allowed,
    Denied { reason: String },
}

impl CapCheck {
    pub fn is_allowed(&self) -> bool {
        matches!(self, CapCheck::Allowed)
    }
}

impl ImpactWallet {
    pub fn new(
        user_id: impl Into<String>,
        monthly_limit: Money,
        daily_cap: Money,
        month_start_date: NaiveDate,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            monthly_limit,
            daily_cap,
            current_month_spent: Money::ZERO,
            month_start_date,
            lifetime_donated: Money::ZERO,
        }
    }

    /// Reset the month counter if `today` falls in a later calendar month
    /// than `month_start_date`. Returns whether a rollover happened, so the
    /// caller knows to persist. Idempotent within a month.
    pub fn roll_over_if_needed(&mut self, today: NaiveDate) -> bool {
        let current = month_start(today);
        if current > month_start(self.month_start_date) {
            self.current_month_spent = Money::ZERO;
            self.month_start_date = current;
            true
        } else {
            false
        }
    }

    /// Evaluate the monthly limit and daily cap for `amount`.
    ///
    /// Assumes rollover has already been applied for the current instant.
    /// `today_total` is the sum of every donation already committed today
    /// in the user's timezone, across all donation types.
    pub fn check_caps(&self, amount: Money, today_total: Money) -> CapCheck {
        if self.current_month_spent + amount > self.monthly_limit {
            return CapCheck::Denied {
                reason: format!("Monthly limit reached ({})", self.monthly_limit),
            };
        }
        if today_total + amount > self.daily_cap {
            return CapCheck::Denied {
                reason: format!("Daily cap reached ({})", self.daily_cap),
            };
        }
        CapCheck::Allowed
    }

    /// Commit a cap-gated donation: counts against the month and lifetime.
    pub fn commit(&mut self, amount: Money) {
        self.current_month_spent = self.current_month_spent + amount;
        self.lifetime_donated = self.lifetime_donated.saturating_add(amount);
    }

    /// Record an out-of-band donation (milestone bonus or admin manual):
    /// lifetime only, never the month counter, so the monthly invariant
    /// `current_month_spent <= monthly_limit` holds unconditionally.
    pub fn record_out_of_band(&mut self, amount: Money) {
        self.lifetime_donated = self.lifetime_donated.saturating_add(amount);
    }

    pub fn month_remaining(&self) -> Money {
        self.monthly_limit - self.current_month_spent
    }
}

/// Read projection of a wallet with the computed remaining budgets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletView {
    pub monthly_limit: Money,
    pub daily_cap: Money,
    pub current_month_spent: Money,
    pub month_start_date: NaiveDate,
    pub lifetime_donated: Money,
    pub month_donated: Money,
    pub month_donation_count: u32,
    pub month_remaining: Money,
    pub today_donated: Money,
    pub today_donation_count: u32,
    pub today_remaining: Money,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wallet() -> ImpactWallet {
        ImpactWallet::new(
            "u1",
            Money::from_pence(2000),
            Money::from_pence(300),
            NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
        )
    }

    #[test]
    fn monthly_limit_rejects_overflow() {
        let mut w = wallet();
        w.current_month_spent = Money::from_pence(1900);
        let check = w.check_caps(Money::from_pence(150), Money::ZERO);
        assert!(!check.is_allowed());
        match check {
            CapCheck::Denied { reason } => assert!(reason.contains("Monthly limit")),
            CapCheck::Allowed => unreachable!(),
        }
    }

    #[test]
    fn daily_cap_counts_existing_donations() {
        let w = wallet();
        assert!(w
            .check_caps(Money::from_pence(150), Money::from_pence(100))
            .is_allowed());
        let check = w.check_caps(Money::from_pence(150), Money::from_pence(200));
        assert!(!check.is_allowed());
    }

    #[test]
    fn exact_cap_is_allowed() {
        let mut w = wallet();
        w.current_month_spent = Money::from_pence(1850);
        assert!(w
            .check_caps(Money::from_pence(150), Money::from_pence(150))
            .is_allowed());
    }

    #[test]
    fn rollover_resets_once_per_month() {
        let mut w = wallet();
        w.current_month_spent = Money::from_pence(1700);

        let april_3 = NaiveDate::from_ymd_opt(2026, 4, 3).unwrap();
        assert!(w.roll_over_if_needed(april_3));
        assert_eq!(w.current_month_spent, Money::ZERO);
        assert_eq!(
            w.month_start_date,
            NaiveDate::from_ymd_opt(2026, 4, 1).unwrap()
        );

        // Second call in the same month is a no-op.
        w.current_month_spent = Money::from_pence(500);
        assert!(!w.roll_over_if_needed(NaiveDate::from_ymd_opt(2026, 4, 20).unwrap()));
        assert_eq!(w.current_month_spent, Money::from_pence(500));
    }

    #[test]
    fn rollover_ignores_same_month() {
        let mut w = wallet();
        w.current_month_spent = Money::from_pence(900);
        assert!(!w.roll_over_if_needed(NaiveDate::from_ymd_opt(2026, 3, 31).unwrap()));
        assert_eq!(w.current_month_spent, Money::from_pence(900));
    }

    #[test]
    fn commit_updates_month_and_lifetime() {
        let mut w = wallet();
        w.commit(Money::from_pence(150));
        assert_eq!(w.current_month_spent, Money::from_pence(150));
        assert_eq!(w.lifetime_donated, Money::from_pence(150));
        assert_eq!(w.month_remaining(), Money::from_pence(1850));
    }

    #[test]
    fn out_of_band_updates_lifetime_only() {
        let mut w = wallet();
        w.record_out_of_band(Money::from_pence(300));
        assert_eq!(w.current_month_spent, Money::ZERO);
        assert_eq!(w.lifetime_donated, Money::from_pence(300));
    }
}
