//! TOML-based engine configuration.
//!
//! Holds the donation amount tables, default wallet caps and the call
//! retry policy. Stored at `~/.config/sweatpledge/config.toml`; every
//! field has a default so a missing or partial file still yields a
//! working configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::data_dir;
use crate::donation::SubscriptionTier;
use crate::error::{ConfigError, Result};
use crate::money::Money;

/// Donation amount tables, in pence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DonationsConfig {
    #[serde(default = "default_100")]
    pub free_pence: i64,
    #[serde(default = "default_100")]
    pub pro_pence: i64,
    #[serde(default = "default_150")]
    pub elite_pence: i64,
    #[serde(default = "default_200")]
    pub concierge_pence: i64,
    #[serde(default = "default_100")]
    pub b2b_pence: i64,
    #[serde(default = "default_300")]
    pub bonus_7_day_pence: i64,
    #[serde(default = "default_1000")]
    pub bonus_30_day_pence: i64,
    #[serde(default = "default_2500")]
    pub bonus_90_day_pence: i64,
}

impl DonationsConfig {
    /// Per-completion donation amount for a subscription tier.
    pub fn completion_amount(&self, tier: SubscriptionTier) -> Money {
        let pence = match tier {
            SubscriptionTier::Free => self.free_pence,
            SubscriptionTier::Pro => self.pro_pence,
            SubscriptionTier::Elite => self.elite_pence,
            SubscriptionTier::Concierge => self.concierge_pence,
            SubscriptionTier::B2b => self.b2b_pence,
        };
        Money::from_pence(pence)
    }

    /// One-time bonus for a streak milestone, if `days` is one.
    pub fn bonus_amount(&self, days: u32) -> Option<Money> {
        let pence = match days {
            7 => self.bonus_7_day_pence,
            30 => self.bonus_30_day_pence,
            90 => self.bonus_90_day_pence,
            _ => return None,
        };
        Some(Money::from_pence(pence))
    }
}

impl Default for DonationsConfig {
    fn default() -> Self {
        Self {
            free_pence: default_100(),
            pro_pence: default_100(),
            elite_pence: default_150(),
            concierge_pence: default_200(),
            b2b_pence: default_100(),
            bonus_7_day_pence: default_300(),
            bonus_30_day_pence: default_1000(),
            bonus_90_day_pence: default_2500(),
        }
    }
}

/// Default caps applied when a wallet is created for a user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletConfig {
    #[serde(default = "default_2000")]
    pub monthly_limit_pence: i64,
    #[serde(default = "default_300")]
    pub daily_cap_pence: i64,
}

impl WalletConfig {
    pub fn monthly_limit(&self) -> Money {
        Money::from_pence(self.monthly_limit_pence)
    }

    pub fn daily_cap(&self) -> Money {
        Money::from_pence(self.daily_cap_pence)
    }
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            monthly_limit_pence: default_2000(),
            daily_cap_pence: default_300(),
        }
    }
}

/// Missed-call retry policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallsConfig {
    /// Minutes between a no-answer and its retry call.
    #[serde(default = "default_15")]
    pub retry_delay_min: i64,
    /// Maximum retries per original call before giving up.
    #[serde(default = "default_2")]
    pub max_retries: u32,
}

impl Default for CallsConfig {
    fn default() -> Self {
        Self {
            retry_delay_min: default_15(),
            max_retries: default_2(),
        }
    }
}

/// Engine configuration.
///
/// Serialized to/from TOML at `~/.config/sweatpledge/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub donations: DonationsConfig,
    #[serde(default)]
    pub wallet: WalletConfig,
    #[serde(default)]
    pub calls: CallsConfig,
}

impl Config {
    fn path() -> Result<PathBuf> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load from disk, falling back to defaults when no file exists.
    pub fn load() -> Result<Self> {
        let path = Self::path()?;
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(&path)?;
        let config = toml::from_str(&raw).map_err(|e| ConfigError::LoadFailed {
            path,
            message: e.to_string(),
        })?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::path()?;
        let raw = toml::to_string_pretty(self).map_err(|e| ConfigError::SaveFailed {
            path: path.clone(),
            message: e.to_string(),
        })?;
        std::fs::write(&path, raw)?;
        Ok(())
    }
}

// Default functions
fn default_100() -> i64 {
    100
}
fn default_150() -> i64 {
    150
}
fn default_200() -> i64 {
    200
}
fn default_300() -> i64 {
    300
}
fn default_1000() -> i64 {
    1000
}
fn default_2000() -> i64 {
    2000
}
fn default_2500() -> i64 {
    2500
}
fn default_15() -> i64 {
    15
}
fn default_2() -> u32 {
    2
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_table_matches_product_amounts() {
        let config = DonationsConfig::default();
        assert_eq!(
            config.completion_amount(SubscriptionTier::Free),
            Money::from_pence(100)
        );
        assert_eq!(
            config.completion_amount(SubscriptionTier::Elite),
            Money::from_pence(150)
        );
        assert_eq!(
            config.completion_amount(SubscriptionTier::Concierge),
            Money::from_pence(200)
        );
    }

    #[test]
    fn bonus_table_matches_milestones() {
        let config = DonationsConfig::default();
        assert_eq!(config.bonus_amount(7), Some(Money::from_pence(300)));
        assert_eq!(config.bonus_amount(30), Some(Money::from_pence(1000)));
        assert_eq!(config.bonus_amount(90), Some(Money::from_pence(2500)));
        assert_eq!(config.bonus_amount(10), None);
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let config: Config = toml::from_str(
            r#"
            [calls]
            max_retries = 5
            "#,
        )
        .unwrap();
        assert_eq!(config.calls.max_retries, 5);
        assert_eq!(config.calls.retry_delay_min, 15);
        assert_eq!(config.wallet.monthly_limit_pence, 2000);
        assert_eq!(config.donations.elite_pence, 150);
    }
}
