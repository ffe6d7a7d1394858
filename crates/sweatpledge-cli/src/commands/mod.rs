pub mod calls;
pub mod charity;
pub mod donation;
pub mod streak;
pub mod user;
pub mod wallet;
pub mod workout;

use std::sync::Arc;

use sweatpledge_core::{
    AccountabilityEngine, Config, Database, InMemoryJobRunner, SystemClock,
};

/// Engine over the on-disk database. The in-memory job runner stands in
/// for the external call queue when running locally.
pub(crate) fn open_engine() -> Result<AccountabilityEngine, Box<dyn std::error::Error>> {
    let db = Database::open()?;
    let config = Config::load()?;
    Ok(AccountabilityEngine::new(
        db,
        Arc::new(SystemClock),
        Arc::new(InMemoryJobRunner::new()),
        config,
    ))
}
