use chrono::NaiveDate;
use clap::Subcommand;
use sweatpledge_core::{Database, WorkoutOutcome};

use super::open_engine;

#[derive(Subcommand)]
pub enum WorkoutAction {
    /// Plan a workout
    Plan {
        user: String,
        /// YYYY-MM-DD
        date: NaiveDate,
        activity: String,
        /// Duration in minutes
        #[arg(default_value_t = 30)]
        duration: u32,
    },
    /// Mark a workout complete (or partially complete)
    Complete {
        user: String,
        workout: String,
        #[arg(long)]
        partial: bool,
    },
    /// Skip a workout; resets the current streak
    Skip {
        user: String,
        workout: String,
        #[arg(long)]
        reason: Option<String>,
    },
    /// Recent workouts for a user
    List {
        user: String,
        #[arg(long, default_value_t = 20)]
        limit: u32,
    },
}

pub fn run(action: WorkoutAction) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        WorkoutAction::Plan {
            user,
            date,
            activity,
            duration,
        } => {
            let engine = open_engine()?;
            let workout = engine.plan_workout(&user, date, &activity, duration)?;
            println!("{}", serde_json::to_string_pretty(&workout)?);
        }
        WorkoutAction::Complete {
            user,
            workout,
            partial,
        } => {
            let outcome = if partial {
                WorkoutOutcome::Partial
            } else {
                WorkoutOutcome::Completed
            };
            let engine = open_engine()?;
            let result = engine.complete_workout(&user, &workout, outcome, None)?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        WorkoutAction::Skip {
            user,
            workout,
            reason,
        } => {
            let engine = open_engine()?;
            let result =
                engine.complete_workout(&user, &workout, WorkoutOutcome::Skipped, reason.as_deref())?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        WorkoutAction::List { user, limit } => {
            let db = Database::open()?;
            let workouts = db.list_workouts(&user, limit)?;
            println!("{}", serde_json::to_string_pretty(&workouts)?);
        }
    }
    Ok(())
}
