//! Donation records and the tier/milestone amount model.
//!
//! Donations are append-only: once created a row is never mutated or
//! deleted. The ledger is fed by three paths -- per-completion awards
//! (cap-gated), one-time streak milestone bonuses (cap-exempt), and the
//! admin manual path (cap-exempt).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;
use crate::money::Money;

/// Why a donation was created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DonationType {
    Completion,
    Streak7Day,
    Streak30Day,
    Streak90Day,
    Manual,
}

impl DonationType {
    pub fn as_str(self) -> &'static str {
        match self {
            DonationType::Completion => "COMPLETION",
            DonationType::Streak7Day => "STREAK_7_DAY",
            DonationType::Streak30Day => "STREAK_30_DAY",
            DonationType::Streak90Day => "STREAK_90_DAY",
            DonationType::Manual => "MANUAL",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "COMPLETION" => Some(DonationType::Completion),
            "STREAK_7_DAY" => Some(DonationType::Streak7Day),
            "STREAK_30_DAY" => Some(DonationType::Streak30Day),
            "STREAK_90_DAY" => Some(DonationType::Streak90Day),
            "MANUAL" => Some(DonationType::Manual),
            _ => None,
        }
    }

    pub fn for_milestone(days: u32) -> Option<Self> {
        match days {
            7 => Some(DonationType::Streak7Day),
            30 => Some(DonationType::Streak30Day),
            90 => Some(DonationType::Streak90Day),
            _ => None,
        }
    }
}

/// An immutable ledger entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Donation {
    pub id: String,
    pub user_id: String,
    pub charity_id: String,
    pub amount: Money,
    pub currency: String,
    pub donation_type: DonationType,
    pub workout_id: Option<String>,
    pub streak_days: Option<u32>,
    pub created_at: DateTime<Utc>,
}

impl Donation {
    pub fn new(
        user_id: impl Into<String>,
        charity_id: impl Into<String>,
        amount: Money,
        donation_type: DonationType,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            charity_id: charity_id.into(),
            amount,
            currency: crate::money::CURRENCY.to_string(),
            donation_type,
            workout_id: None,
            streak_days: None,
            created_at,
        }
    }

    pub fn with_workout(mut self, workout_id: impl Into<String>) -> Self {
        self.workout_id = Some(workout_id.into());
        self
    }

    pub fn with_streak_days(mut self, days: u32) -> Self {
        self.streak_days = Some(days);
        self
    }
}

/// Subscription tiers, which drive the per-completion donation amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubscriptionTier {
    Free,
    Pro,
    Elite,
    Concierge,
    B2b,
}

impl SubscriptionTier {
    pub fn as_str(self) -> &'static str {
        match self {
            SubscriptionTier::Free => "FREE",
            SubscriptionTier::Pro => "PRO",
            SubscriptionTier::Elite => "ELITE",
            SubscriptionTier::Concierge => "CONCIERGE",
            SubscriptionTier::B2b => "B2B",
        }
    }

    /// Unknown tier strings fall back to FREE rather than failing the
    /// donation path.
    pub fn from_str(s: &str) -> Self {
        match s {
            "PRO" => SubscriptionTier::Pro,
            "ELITE" => SubscriptionTier::Elite,
            "CONCIERGE" => SubscriptionTier::Concierge,
            "B2B" => SubscriptionTier::B2b,
            _ => SubscriptionTier::Free,
        }
    }
}

/// Read-only view of the subscription system. The engine only ever needs
/// the tier, so that is all the seam exposes.
pub trait TierSource {
    fn subscription_tier(&self, user_id: &str) -> Result<SubscriptionTier>;
}

/// Read-only view of the charity directory: the user's preferred charity,
/// if they have chosen one that is still active.
pub trait CharityDirectory {
    fn preferred_charity(&self, user_id: &str) -> Result<Option<String>>;
}

/// Aggregate totals for one donation type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DonationTypeStats {
    pub donation_type: DonationType,
    pub amount: Money,
    pub count: u32,
}

/// Per-user donation statistics projection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DonationStats {
    pub total_amount: Money,
    pub total_count: u32,
    pub by_type: Vec<DonationTypeStats>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn donation_type_round_trips_db_strings() {
        for t in [
            DonationType::Completion,
            DonationType::Streak7Day,
            DonationType::Streak30Day,
            DonationType::Streak90Day,
            DonationType::Manual,
        ] {
            assert_eq!(DonationType::from_str(t.as_str()), Some(t));
        }
        assert_eq!(DonationType::from_str("SOMETHING_ELSE"), None);
    }

    #[test]
    fn milestone_types_map_from_days() {
        assert_eq!(DonationType::for_milestone(7), Some(DonationType::Streak7Day));
        assert_eq!(DonationType::for_milestone(30), Some(DonationType::Streak30Day));
        assert_eq!(DonationType::for_milestone(90), Some(DonationType::Streak90Day));
        assert_eq!(DonationType::for_milestone(14), None);
    }

    #[test]
    fn unknown_tier_falls_back_to_free() {
        assert_eq!(SubscriptionTier::from_str("ELITE"), SubscriptionTier::Elite);
        assert_eq!(SubscriptionTier::from_str("legacy"), SubscriptionTier::Free);
    }

    #[test]
    fn builder_attaches_workout_and_streak() {
        let d = Donation::new(
            "u1",
            "c1",
            Money::from_pence(300),
            DonationType::Streak7Day,
            Utc::now(),
        )
        .with_streak_days(7);
        assert_eq!(d.streak_days, Some(7));
        assert_eq!(d.currency, "GBP");
        assert!(d.workout_id.is_none());
    }
}
