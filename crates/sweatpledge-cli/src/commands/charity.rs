use clap::Subcommand;
use sweatpledge_core::{Charity, Database};

#[derive(Subcommand)]
pub enum CharityAction {
    /// Add a charity to the directory
    Add {
        name: String,
        /// e.g. "meals provided per pound"
        #[arg(long)]
        impact_metric: Option<String>,
    },
    /// List active charities
    List,
}

pub fn run(action: CharityAction) -> Result<(), Box<dyn std::error::Error>> {
    let db = Database::open()?;

    match action {
        CharityAction::Add {
            name,
            impact_metric,
        } => {
            let mut charity = Charity::new(name);
            charity.impact_metric = impact_metric;
            db.insert_charity(&charity)?;
            println!("{}", serde_json::to_string_pretty(&charity)?);
        }
        CharityAction::List => {
            let charities = db.list_charities()?;
            println!("{}", serde_json::to_string_pretty(&charities)?);
        }
    }
    Ok(())
}
