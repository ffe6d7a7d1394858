//! Scheduled coaching calls and their lifecycle state machine.
//!
//! ## State Transitions
//!
//! ```text
//! Scheduled -> InProgress -> (Completed | Failed)
//! Scheduled -> NoAnswer -> (retry as a new call)
//! Scheduled -> Cancelled
//! ```
//!
//! `Completed`, `Failed` and `Cancelled` are terminal. Webhooks deliver
//! status updates at least once, so a transition attempted out of a
//! terminal state is logged and ignored rather than treated as an error.
//! The one sanctioned re-entry is `Completed -> Completed`: a late
//! analysis webhook attaching transcript and sentiment to an ended call.

mod context;
mod scheduler;

pub use context::ContextSnapshot;
pub use scheduler::CallScheduler;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The kind of coaching call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CallType {
    MorningPlanning,
    EveningReview,
    Rescue,
    WeeklyPlanning,
    MonthlyCheckin,
    Onboarding,
}

impl CallType {
    pub fn as_str(self) -> &'static str {
        match self {
            CallType::MorningPlanning => "MORNING_PLANNING",
            CallType::EveningReview => "EVENING_REVIEW",
            CallType::Rescue => "RESCUE",
            CallType::WeeklyPlanning => "WEEKLY_PLANNING",
            CallType::MonthlyCheckin => "MONTHLY_CHECKIN",
            CallType::Onboarding => "ONBOARDING",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "MORNING_PLANNING" => Some(CallType::MorningPlanning),
            "EVENING_REVIEW" => Some(CallType::EveningReview),
            "RESCUE" => Some(CallType::Rescue),
            "WEEKLY_PLANNING" => Some(CallType::WeeklyPlanning),
            "MONTHLY_CHECKIN" => Some(CallType::MonthlyCheckin),
            "ONBOARDING" => Some(CallType::Onboarding),
            _ => None,
        }
    }

    /// Daily cadence calls are deduplicated per (user, type, local date);
    /// everything else dedupes on the call id.
    pub fn is_daily(self) -> bool {
        matches!(self, CallType::MorningPlanning | CallType::EveningReview)
    }
}

/// Call lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CallStatus {
    Scheduled,
    InProgress,
    Completed,
    NoAnswer,
    Failed,
    Cancelled,
}

impl CallStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            CallStatus::Scheduled => "SCHEDULED",
            CallStatus::InProgress => "IN_PROGRESS",
            CallStatus::Completed => "COMPLETED",
            CallStatus::NoAnswer => "NO_ANSWER",
            CallStatus::Failed => "FAILED",
            CallStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "SCHEDULED" => Some(CallStatus::Scheduled),
            "IN_PROGRESS" => Some(CallStatus::InProgress),
            "COMPLETED" => Some(CallStatus::Completed),
            "NO_ANSWER" => Some(CallStatus::NoAnswer),
            "FAILED" => Some(CallStatus::Failed),
            "CANCELLED" => Some(CallStatus::Cancelled),
            _ => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            CallStatus::Completed | CallStatus::Failed | CallStatus::Cancelled
        )
    }

    /// The closed transition table.
    pub fn can_transition_to(self, next: CallStatus) -> bool {
        use CallStatus::*;
        match self {
            Scheduled => matches!(next, InProgress | NoAnswer | Cancelled | Failed),
            InProgress => matches!(next, Completed | Failed | NoAnswer),
            NoAnswer => matches!(next, Cancelled),
            // Late analysis webhooks enrich an already-completed call.
            Completed => matches!(next, Completed),
            Failed | Cancelled => false,
        }
    }
}

/// One scheduled call. The context snapshot is captured at scheduling time
/// and is never refreshed -- the call executes against a point-in-time view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Call {
    pub id: String,
    pub user_id: String,
    pub call_type: CallType,
    pub status: CallStatus,
    pub scheduled_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub duration_secs: Option<u32>,
    pub outcome: Option<String>,
    pub sentiment: Option<String>,
    pub transcript: Option<String>,
    pub provider_call_id: Option<String>,
    /// 1 for the original call, incremented for each no-answer retry.
    pub attempt: u32,
    pub context_snapshot: Option<serde_json::Value>,
}

impl Call {
    pub fn new(
        user_id: impl Into<String>,
        call_type: CallType,
        scheduled_at: DateTime<Utc>,
        context_snapshot: Option<serde_json::Value>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            call_type,
            status: CallStatus::Scheduled,
            scheduled_at,
            started_at: None,
            ended_at: None,
            duration_secs: None,
            outcome: None,
            sentiment: None,
            transcript: None,
            provider_call_id: None,
            attempt: 1,
            context_snapshot,
        }
    }
}

/// Fields a webhook-driven status update may carry. Absent fields leave
/// the stored value untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CallUpdate {
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub duration_secs: Option<u32>,
    pub outcome: Option<String>,
    pub sentiment: Option<String>,
    pub transcript: Option<String>,
    pub provider_call_id: Option<String>,
}
