use chrono::Utc;
use clap::Subcommand;
use sweatpledge_core::{Database, SubscriptionTier, User};
use uuid::Uuid;

use super::open_engine;

#[derive(Subcommand)]
pub enum UserAction {
    /// Register a new user (and their impact wallet)
    Add {
        /// Explicit user id; generated when omitted
        #[arg(long)]
        id: Option<String>,
        #[arg(long)]
        name: String,
        #[arg(long)]
        phone: Option<String>,
        /// UTC offset in whole hours
        #[arg(long, default_value_t = 0)]
        tz_offset: i32,
        /// FREE | PRO | ELITE | CONCIERGE | B2B
        #[arg(long, default_value = "FREE")]
        tier: String,
        #[arg(long)]
        charity: Option<String>,
        #[arg(long)]
        goal: Option<String>,
        #[arg(long)]
        track: Option<String>,
        /// Morning call time, HH:MM
        #[arg(long)]
        morning: Option<String>,
        /// Evening call time, HH:MM
        #[arg(long)]
        evening: Option<String>,
    },
    /// Show a user profile
    Show { id: String },
}

pub fn run(action: UserAction) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        UserAction::Add {
            id,
            name,
            phone,
            tz_offset,
            tier,
            charity,
            goal,
            track,
            morning,
            evening,
        } => {
            let engine = open_engine()?;
            let user = engine.register_user(User {
                id: id.unwrap_or_else(|| Uuid::new_v4().to_string()),
                first_name: name,
                phone,
                timezone_offset_hours: tz_offset,
                subscription_tier: SubscriptionTier::from_str(&tier),
                preferred_charity_id: charity,
                goal,
                track,
                morning_call_time: morning,
                evening_call_time: evening,
                is_active: true,
                created_at: Utc::now(),
            })?;
            println!("{}", serde_json::to_string_pretty(&user)?);
        }
        UserAction::Show { id } => {
            let db = Database::open()?;
            match db.get_user(&id)? {
                Some(user) => println!("{}", serde_json::to_string_pretty(&user)?),
                None => eprintln!("user not found: {id}"),
            }
        }
    }
    Ok(())
}
