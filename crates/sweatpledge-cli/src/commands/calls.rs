use chrono::{DateTime, NaiveDate, Utc};
use clap::Subcommand;
use sweatpledge_core::{CallStatus, CallType, CallUpdate, Database};

use super::open_engine;

#[derive(Subcommand)]
pub enum CallsAction {
    /// Schedule the morning/evening calls for a date
    ScheduleDaily {
        user: String,
        /// YYYY-MM-DD
        date: NaiveDate,
    },
    /// Schedule a one-off call
    Schedule {
        user: String,
        /// MORNING_PLANNING | EVENING_REVIEW | RESCUE | WEEKLY_PLANNING |
        /// MONTHLY_CHECKIN | ONBOARDING
        call_type: String,
        /// RFC 3339 timestamp
        at: DateTime<Utc>,
    },
    /// Scheduled calls still ahead of now
    Upcoming {
        #[arg(long, default_value_t = 50)]
        limit: u32,
    },
    /// Record a no-answer and schedule the retry
    Missed { call: String },
    /// Apply a status update (webhook stand-in)
    Status {
        call: String,
        /// SCHEDULED | IN_PROGRESS | COMPLETED | NO_ANSWER | FAILED | CANCELLED
        status: String,
        #[arg(long)]
        outcome: Option<String>,
    },
    /// Cancel a scheduled call
    Cancel { call: String },
    /// Call history for a user
    List {
        user: String,
        #[arg(long, default_value_t = 20)]
        limit: u32,
    },
}

pub fn run(action: CallsAction) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        CallsAction::ScheduleDaily { user, date } => {
            let engine = open_engine()?;
            let calls = engine.schedule_daily_calls(&user, date)?;
            println!("{}", serde_json::to_string_pretty(&calls)?);
        }
        CallsAction::Schedule {
            user,
            call_type,
            at,
        } => {
            let call_type = CallType::from_str(&call_type)
                .ok_or_else(|| format!("unknown call type: {call_type}"))?;
            let engine = open_engine()?;
            let call = engine.schedule_call(&user, call_type, at, None)?;
            println!("{}", serde_json::to_string_pretty(&call)?);
        }
        CallsAction::Upcoming { limit } => {
            let engine = open_engine()?;
            let calls = engine.upcoming_calls(limit)?;
            println!("{}", serde_json::to_string_pretty(&calls)?);
        }
        CallsAction::Missed { call } => {
            let engine = open_engine()?;
            match engine.handle_missed_call(&call)? {
                Some(retry) => println!("{}", serde_json::to_string_pretty(&retry)?),
                None => eprintln!("retry budget exhausted, no retry scheduled"),
            }
        }
        CallsAction::Status {
            call,
            status,
            outcome,
        } => {
            let status = CallStatus::from_str(&status)
                .ok_or_else(|| format!("unknown call status: {status}"))?;
            let engine = open_engine()?;
            let updated = engine.update_call_status(
                &call,
                status,
                CallUpdate {
                    outcome,
                    ..Default::default()
                },
            )?;
            println!("{}", serde_json::to_string_pretty(&updated)?);
        }
        CallsAction::Cancel { call } => {
            let engine = open_engine()?;
            let cancelled = engine.cancel_call(&call)?;
            println!("{}", serde_json::to_string_pretty(&cancelled)?);
        }
        CallsAction::List { user, limit } => {
            let db = Database::open()?;
            let calls = db.list_calls(&user, limit)?;
            println!("{}", serde_json::to_string_pretty(&calls)?);
        }
    }
    Ok(())
}
