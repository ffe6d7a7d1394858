//! # Sweatpledge Core Library
//!
//! This library provides the accountability engine behind Sweatpledge:
//! users plan and complete workouts, earn capped charitable donations, and
//! receive scheduled coaching calls. The CLI binary is a thin layer over
//! this crate; the HTTP surface, messaging transports and payment flows
//! live elsewhere and talk to the engine through its facade.
//!
//! ## Architecture
//!
//! - **Streak Tracker**: a pure consecutive-day state machine driven by
//!   workout completions and skips
//! - **Impact Wallet**: a per-user capped donation ledger with lazy
//!   monthly rollover
//! - **Call Scheduler**: schedules coaching calls through an external job
//!   runner and walks each call through a closed lifecycle state machine
//! - **Accountability Engine**: the facade sequencing streak update ->
//!   donation award -> milestone bonuses under a per-user lock
//! - **Storage**: SQLite persistence and TOML-based configuration
//!
//! ## Key Components
//!
//! - [`AccountabilityEngine`]: the orchestrating facade
//! - [`Streak`]: streak state and milestone claim flags
//! - [`ImpactWallet`]: cap checks and monthly rollover
//! - [`CallScheduler`]: daily scheduling and no-answer retry
//! - [`Database`]: record persistence

pub mod call;
pub mod clock;
pub mod donation;
pub mod engine;
pub mod error;
pub mod jobs;
pub mod money;
pub mod storage;
pub mod streak;
pub mod wallet;

pub use call::{Call, CallScheduler, CallStatus, CallType, CallUpdate, ContextSnapshot};
pub use clock::{Clock, FixedClock, SystemClock, UserTz};
pub use donation::{
    CharityDirectory, Donation, DonationStats, DonationType, SubscriptionTier, TierSource,
};
pub use engine::{AccountabilityEngine, WorkoutOutcome, WorkoutResult};
pub use error::{ConfigError, CoreError, Result, StorageError, ValidationError};
pub use jobs::{CallJob, Enqueued, InMemoryJobRunner, JobRunner};
pub use money::Money;
pub use storage::{Charity, Config, Database, User, Workout, WorkoutStatus};
pub use streak::{Streak, StreakChange, MILESTONES};
pub use wallet::{CapCheck, ImpactWallet, WalletView};
