use clap::Subcommand;

use super::open_engine;

#[derive(Subcommand)]
pub enum WalletAction {
    /// Wallet state with remaining daily and monthly budgets
    Show { user: String },
}

pub fn run(action: WalletAction) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        WalletAction::Show { user } => {
            let engine = open_engine()?;
            let view = engine.get_impact_wallet(&user)?;
            println!("{}", serde_json::to_string_pretty(&view)?);
        }
    }
    Ok(())
}
