use clap::Subcommand;
use sweatpledge_core::{Database, Money};

use super::open_engine;

#[derive(Subcommand)]
pub enum DonationAction {
    /// Recent donations for a user
    List {
        user: String,
        #[arg(long, default_value_t = 20)]
        limit: u32,
    },
    /// Totals and per-type breakdown
    Stats { user: String },
    /// Admin: create a manual donation outside the cap gates
    Manual {
        user: String,
        /// Decimal pounds, e.g. "5" or "2.50"
        amount: String,
        #[arg(long)]
        charity: Option<String>,
    },
}

pub fn run(action: DonationAction) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        DonationAction::List { user, limit } => {
            let db = Database::open()?;
            let donations = db.list_donations(&user, limit)?;
            println!("{}", serde_json::to_string_pretty(&donations)?);
        }
        DonationAction::Stats { user } => {
            let db = Database::open()?;
            let stats = db.donation_stats(&user)?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        DonationAction::Manual {
            user,
            amount,
            charity,
        } => {
            let amount = Money::parse(&amount)?;
            let engine = open_engine()?;
            let donation = engine.award_manual(&user, charity.as_deref(), amount)?;
            println!("{}", serde_json::to_string_pretty(&donation)?);
        }
    }
    Ok(())
}
