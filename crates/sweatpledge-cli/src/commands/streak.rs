use clap::Subcommand;

use super::open_engine;

#[derive(Subcommand)]
pub enum StreakAction {
    /// Current and longest streak for a user
    Show { user: String },
}

pub fn run(action: StreakAction) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        StreakAction::Show { user } => {
            let engine = open_engine()?;
            let streak = engine.get_streak(&user)?;
            println!("{}", serde_json::to_string_pretty(&streak)?);
        }
    }
    Ok(())
}
