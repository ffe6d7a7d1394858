//! Point-in-time user context captured when a call is scheduled.

use serde::{Deserialize, Serialize};

use crate::money::Money;

/// What the coaching agent knows about the user going into a call.
///
/// Built once at scheduling time from the live streak, ledger and profile,
/// then frozen into the call row. A retry call carries the original
/// snapshot forward unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContextSnapshot {
    pub name: Option<String>,
    pub track: Option<String>,
    pub goal: Option<String>,
    pub current_streak: u32,
    pub longest_streak: u32,
    pub workouts_this_week: u32,
    pub total_donated: Money,
    pub charity: Option<String>,
}

impl ContextSnapshot {
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }

    pub fn from_value(value: &serde_json::Value) -> Option<Self> {
        serde_json::from_value(value.clone()).ok()
    }
}
