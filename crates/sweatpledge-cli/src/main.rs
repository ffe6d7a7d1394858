use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "sweatpledge-cli", version, about = "Sweatpledge CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// User management
    User {
        #[command(subcommand)]
        action: commands::user::UserAction,
    },
    /// Charity directory
    Charity {
        #[command(subcommand)]
        action: commands::charity::CharityAction,
    },
    /// Workout planning and completion
    Workout {
        #[command(subcommand)]
        action: commands::workout::WorkoutAction,
    },
    /// Streak inspection
    Streak {
        #[command(subcommand)]
        action: commands::streak::StreakAction,
    },
    /// Impact wallet inspection
    Wallet {
        #[command(subcommand)]
        action: commands::wallet::WalletAction,
    },
    /// Donation ledger
    Donation {
        #[command(subcommand)]
        action: commands::donation::DonationAction,
    },
    /// Call scheduling
    Calls {
        #[command(subcommand)]
        action: commands::calls::CallsAction,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::User { action } => commands::user::run(action),
        Commands::Charity { action } => commands::charity::run(action),
        Commands::Workout { action } => commands::workout::run(action),
        Commands::Streak { action } => commands::streak::run(action),
        Commands::Wallet { action } => commands::wallet::run(action),
        Commands::Donation { action } => commands::donation::run(action),
        Commands::Calls { action } => commands::calls::run(action),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
