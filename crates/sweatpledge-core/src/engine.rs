//! The accountability engine: the facade invoked when a workout is
//! completed or skipped.
//!
//! One completion runs streak update -> completion award -> milestone
//! check as a single logical unit under a per-user lock; two concurrent
//! completions for the same user cannot both pass the same milestone or
//! cap check. A failed donation award never rolls back the streak or the
//! workout mutation -- the completion is the user's record, the donation
//! is best-effort and reconcilable.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Months, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::call::{Call, CallScheduler, CallStatus, CallType, CallUpdate, ContextSnapshot};
use crate::clock::{lock, month_start, Clock, UserTz};
use crate::donation::{CharityDirectory, Donation, DonationType, TierSource};
use crate::error::{CoreError, Result, ValidationError};
use crate::jobs::JobRunner;
use crate::money::Money;
use crate::storage::{Config, Database, User, Workout, WorkoutStatus};
use crate::streak::Streak;
use crate::wallet::{CapCheck, ImpactWallet, WalletView};

/// How a workout ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkoutOutcome {
    Completed,
    Partial,
    Skipped,
}

impl WorkoutOutcome {
    fn status(self) -> WorkoutStatus {
        match self {
            WorkoutOutcome::Completed => WorkoutStatus::Completed,
            WorkoutOutcome::Partial => WorkoutStatus::Partial,
            WorkoutOutcome::Skipped => WorkoutStatus::Skipped,
        }
    }

    /// Partial completions still count toward the streak.
    fn counts_for_streak(self) -> bool {
        matches!(self, WorkoutOutcome::Completed | WorkoutOutcome::Partial)
    }
}

/// Everything a completion produced: the updated workout and streak, plus
/// zero, one or two donations (completion + at most one milestone bonus).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkoutResult {
    pub workout: Workout,
    pub streak: Streak,
    pub donations: Vec<Donation>,
}

/// Orchestrator over storage, clock, job runner and config.
pub struct AccountabilityEngine {
    db: Mutex<Database>,
    clock: Arc<dyn Clock>,
    jobs: Arc<dyn JobRunner>,
    config: Config,
    user_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl AccountabilityEngine {
    pub fn new(
        db: Database,
        clock: Arc<dyn Clock>,
        jobs: Arc<dyn JobRunner>,
        config: Config,
    ) -> Self {
        Self {
            db: Mutex::new(db),
            clock,
            jobs,
            config,
            user_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Serialization point for all per-user mutations.
    fn user_lock(&self, user_id: &str) -> Arc<Mutex<()>> {
        let mut locks = lock(&self.user_locks);
        locks
            .entry(user_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    // ── Users & workouts ─────────────────────────────────────────────

    /// Create a user together with their impact wallet.
    pub fn register_user(&self, user: User) -> Result<User> {
        let db = lock(&self.db);
        db.insert_user(&user)?;

        let tz = UserTz::new(user.timezone_offset_hours);
        let today = tz.local_date(self.clock.now());
        let wallet = ImpactWallet::new(
            &user.id,
            self.config.wallet.monthly_limit(),
            self.config.wallet.daily_cap(),
            month_start(today),
        );
        db.upsert_wallet(&wallet)?;

        info!(user_id = %user.id, "user registered");
        Ok(user)
    }

    /// Plan a workout for a future (or past) date.
    pub fn plan_workout(
        &self,
        user_id: &str,
        planned_date: NaiveDate,
        activity: &str,
        duration_min: u32,
    ) -> Result<Workout> {
        let db = lock(&self.db);
        self.require_user(&db, user_id)?;
        let workout = Workout::new(user_id, planned_date, activity, duration_min, self.clock.now());
        db.insert_workout(&workout)?;
        info!(workout_id = %workout.id, user_id, "workout planned");
        Ok(workout)
    }

    /// Complete, partially complete or skip a workout.
    ///
    /// Completion and partial completion advance the streak and evaluate
    /// donations; a skip resets the current streak and evaluates nothing.
    pub fn complete_workout(
        &self,
        user_id: &str,
        workout_id: &str,
        outcome: WorkoutOutcome,
        reason: Option<&str>,
    ) -> Result<WorkoutResult> {
        let user_lock = self.user_lock(user_id);
        let _guard = lock(&user_lock);
        let db = lock(&self.db);

        let user = self.require_user(&db, user_id)?;
        let mut workout = db
            .get_workout(workout_id)?
            .ok_or_else(|| CoreError::not_found("Workout", workout_id))?;
        if workout.user_id != user_id {
            return Err(ValidationError::WrongOwner {
                kind: "Workout",
                id: workout_id.to_string(),
                user_id: user_id.to_string(),
            }
            .into());
        }

        let now = self.clock.now();
        let status = outcome.status();
        let completed_at = outcome.counts_for_streak().then_some(now);
        db.update_workout_status(workout_id, status, completed_at, reason)?;
        workout.status = status;
        workout.completed_at = completed_at;
        workout.skipped_reason = reason.map(str::to_string);
        info!(workout_id, status = status.as_str(), "workout status updated");

        let mut streak = db
            .get_streak(user_id)?
            .unwrap_or_else(|| Streak::new(user_id));
        let mut donations = Vec::new();

        if outcome.counts_for_streak() {
            let change = streak.apply_completion(workout.planned_date);
            db.upsert_streak(&streak)?;
            info!(
                user_id,
                current_streak = streak.current_streak,
                change = ?change,
                "streak updated"
            );

            // Donation failures are logged, never propagated: the recorded
            // completion must survive a broken award path.
            match self.award_completion(&db, &user, &workout, now) {
                Ok(Some(donation)) => donations.push(donation),
                Ok(None) => {}
                Err(e) => warn!(user_id, error = %e, "completion donation failed"),
            }

            if let Some(milestone) = streak.unclaimed_milestone_reached() {
                match self.award_streak_bonus(&db, &user, milestone, now) {
                    Ok(Some(donation)) => {
                        streak.claim_milestone(milestone);
                        db.upsert_streak(&streak)?;
                        donations.push(donation);
                    }
                    Ok(None) => {}
                    Err(e) => warn!(user_id, milestone, error = %e, "streak bonus failed"),
                }
            }
        } else {
            streak.apply_skip();
            db.upsert_streak(&streak)?;
            info!(user_id, "streak reset on skip");
        }

        Ok(WorkoutResult {
            workout,
            streak,
            donations,
        })
    }

    // ── Donations ────────────────────────────────────────────────────

    /// Cap-gated per-completion donation. `None` means no donation: the
    /// user has no charity, or a cap said no.
    fn award_completion(
        &self,
        db: &Database,
        user: &User,
        workout: &Workout,
        now: DateTime<Utc>,
    ) -> Result<Option<Donation>> {
        let Some(charity_id) = db.preferred_charity(&user.id)? else {
            info!(user_id = %user.id, "no preferred charity, skipping donation");
            return Ok(None);
        };

        let tier = db.subscription_tier(&user.id)?;
        let amount = self.config.donations.completion_amount(tier);

        let tz = UserTz::new(user.timezone_offset_hours);
        let today = tz.local_date(now);
        let mut wallet = self.load_or_new_wallet(db, &user.id, today)?;
        if wallet.roll_over_if_needed(today) {
            db.upsert_wallet(&wallet)?;
            info!(user_id = %user.id, "wallet month rolled over");
        }

        let (day_start, day_end) = tz.day_bounds(today);
        let (today_total, _) = db.donations_between(&user.id, day_start, day_end)?;

        match wallet.check_caps(amount, today_total) {
            CapCheck::Denied { reason } => {
                info!(user_id = %user.id, %reason, "donation capped, skipping");
                return Ok(None);
            }
            CapCheck::Allowed => {}
        }

        let donation = Donation::new(&user.id, &charity_id, amount, DonationType::Completion, now)
            .with_workout(&workout.id);
        db.insert_donation(&donation)?;
        wallet.commit(amount);
        db.upsert_wallet(&wallet)?;

        info!(
            donation_id = %donation.id,
            user_id = %user.id,
            amount = %amount,
            "completion donation created"
        );
        Ok(Some(donation))
    }

    /// One-time milestone bonus. Cap-exempt by design: bonuses always pay
    /// when a charity is resolvable.
    fn award_streak_bonus(
        &self,
        db: &Database,
        user: &User,
        milestone: u32,
        now: DateTime<Utc>,
    ) -> Result<Option<Donation>> {
        let Some(amount) = self.config.donations.bonus_amount(milestone) else {
            return Ok(None);
        };
        let Some(donation_type) = DonationType::for_milestone(milestone) else {
            return Ok(None);
        };
        let Some(charity_id) = db.preferred_charity(&user.id)? else {
            info!(user_id = %user.id, milestone, "no preferred charity, skipping streak bonus");
            return Ok(None);
        };

        let donation = Donation::new(&user.id, &charity_id, amount, donation_type, now)
            .with_streak_days(milestone);
        db.insert_donation(&donation)?;

        let tz = UserTz::new(user.timezone_offset_hours);
        let mut wallet = self.load_or_new_wallet(db, &user.id, tz.local_date(now))?;
        wallet.record_out_of_band(amount);
        db.upsert_wallet(&wallet)?;

        info!(
            user_id = %user.id,
            milestone,
            amount = %amount,
            "streak bonus awarded"
        );
        Ok(Some(donation))
    }

    /// Admin path: create a donation outside the cap gates.
    pub fn award_manual(
        &self,
        user_id: &str,
        charity_id: Option<&str>,
        amount: Money,
    ) -> Result<Donation> {
        if !amount.is_positive() {
            return Err(ValidationError::InvalidAmount(amount.to_string()).into());
        }

        let user_lock = self.user_lock(user_id);
        let _guard = lock(&user_lock);
        let db = lock(&self.db);

        let user = self.require_user(&db, user_id)?;
        let charity_id = match charity_id {
            Some(id) => id.to_string(),
            None => db.preferred_charity(user_id)?.ok_or_else(|| {
                CoreError::Validation(ValidationError::InvalidValue {
                    field: "charity".to_string(),
                    message: "not specified and no preferred charity set".to_string(),
                })
            })?,
        };
        let charity = db
            .get_charity(&charity_id)?
            .filter(|c| c.is_active)
            .ok_or_else(|| CoreError::not_found("Charity", charity_id.clone()))?;

        let now = self.clock.now();
        let donation = Donation::new(user_id, &charity.id, amount, DonationType::Manual, now);
        db.insert_donation(&donation)?;

        let tz = UserTz::new(user.timezone_offset_hours);
        let mut wallet = self.load_or_new_wallet(&db, user_id, tz.local_date(now))?;
        wallet.record_out_of_band(amount);
        db.upsert_wallet(&wallet)?;

        info!(donation_id = %donation.id, user_id, amount = %amount, "manual donation created");
        Ok(donation)
    }

    // ── Read projections ─────────────────────────────────────────────

    pub fn get_streak(&self, user_id: &str) -> Result<Streak> {
        let db = lock(&self.db);
        self.require_user(&db, user_id)?;
        Ok(db
            .get_streak(user_id)?
            .unwrap_or_else(|| Streak::new(user_id)))
    }

    /// Wallet projection with the computed remaining budgets.
    pub fn get_impact_wallet(&self, user_id: &str) -> Result<WalletView> {
        let db = lock(&self.db);
        let user = self.require_user(&db, user_id)?;
        let wallet = db
            .get_wallet(user_id)?
            .ok_or_else(|| CoreError::not_found("ImpactWallet", user_id))?;

        let tz = UserTz::new(user.timezone_offset_hours);
        let now = self.clock.now();
        let today = tz.local_date(now);

        let (day_start, day_end) = tz.day_bounds(today);
        let (today_donated, today_count) = db.donations_between(user_id, day_start, day_end)?;

        let month_first = month_start(today);
        let next_month = month_first
            .checked_add_months(Months::new(1))
            .unwrap_or(month_first);
        let (month_begin, _) = tz.day_bounds(month_first);
        let (month_end, _) = tz.day_bounds(next_month);
        let (month_donated, month_count) = db.donations_between(user_id, month_begin, month_end)?;

        Ok(WalletView {
            monthly_limit: wallet.monthly_limit,
            daily_cap: wallet.daily_cap,
            current_month_spent: wallet.current_month_spent,
            month_start_date: wallet.month_start_date,
            lifetime_donated: wallet.lifetime_donated,
            month_donated,
            month_donation_count: month_count,
            month_remaining: wallet.month_remaining(),
            today_donated,
            today_donation_count: today_count,
            today_remaining: wallet.daily_cap - today_donated,
        })
    }

    // ── Call scheduling pass-throughs ────────────────────────────────

    pub fn schedule_call(
        &self,
        user_id: &str,
        call_type: CallType,
        at: DateTime<Utc>,
        context: Option<ContextSnapshot>,
    ) -> Result<Call> {
        let db = lock(&self.db);
        self.scheduler(&db).schedule_call(user_id, call_type, at, context)
    }

    pub fn schedule_daily_calls(&self, user_id: &str, date: NaiveDate) -> Result<Vec<Call>> {
        let db = lock(&self.db);
        self.scheduler(&db).schedule_daily_calls(user_id, date)
    }

    pub fn handle_missed_call(&self, call_id: &str) -> Result<Option<Call>> {
        let db = lock(&self.db);
        self.scheduler(&db).handle_missed_call(call_id)
    }

    pub fn update_call_status(
        &self,
        call_id: &str,
        status: CallStatus,
        update: CallUpdate,
    ) -> Result<Call> {
        let db = lock(&self.db);
        self.scheduler(&db).update_call_status(call_id, status, update)
    }

    pub fn cancel_call(&self, call_id: &str) -> Result<Call> {
        let db = lock(&self.db);
        self.scheduler(&db).cancel_call(call_id)
    }

    pub fn upcoming_calls(&self, limit: u32) -> Result<Vec<Call>> {
        let db = lock(&self.db);
        self.scheduler(&db).upcoming_calls(limit)
    }

    // ── Internals ────────────────────────────────────────────────────

    fn scheduler<'a>(&'a self, db: &'a Database) -> CallScheduler<'a> {
        CallScheduler::new(db, self.clock.as_ref(), self.jobs.as_ref(), &self.config.calls)
    }

    fn require_user(&self, db: &Database, user_id: &str) -> Result<User> {
        db.get_user(user_id)?
            .ok_or_else(|| CoreError::not_found("User", user_id))
    }

    fn load_or_new_wallet(
        &self,
        db: &Database,
        user_id: &str,
        today: NaiveDate,
    ) -> Result<ImpactWallet> {
        Ok(db.get_wallet(user_id)?.unwrap_or_else(|| {
            ImpactWallet::new(
                user_id,
                self.config.wallet.monthly_limit(),
                self.config.wallet.daily_cap(),
                month_start(today),
            )
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::donation::SubscriptionTier;
    use crate::jobs::InMemoryJobRunner;
    use crate::storage::Charity;

    fn at(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    fn engine(now: &str) -> AccountabilityEngine {
        AccountabilityEngine::new(
            Database::open_memory().unwrap(),
            Arc::new(FixedClock::new(at(now))),
            Arc::new(InMemoryJobRunner::new()),
            Config::default(),
        )
    }

    fn seed(engine: &AccountabilityEngine, tier: SubscriptionTier) -> (String, String) {
        let charity = Charity::new("Mind");
        {
            let db = lock(&engine.db);
            db.insert_charity(&charity).unwrap();
        }
        let user = User {
            id: "u1".to_string(),
            first_name: "Sarah".to_string(),
            phone: None,
            timezone_offset_hours: 0,
            subscription_tier: tier,
            preferred_charity_id: Some(charity.id.clone()),
            goal: None,
            track: None,
            morning_call_time: None,
            evening_call_time: None,
            is_active: true,
            created_at: at("2026-01-01T00:00:00Z"),
        };
        engine.register_user(user).unwrap();
        ("u1".to_string(), charity.id)
    }

    #[test]
    fn completion_awards_tiered_donation() {
        let engine = engine("2026-03-10T08:00:00Z");
        let (user_id, _) = seed(&engine, SubscriptionTier::Elite);
        let workout = engine
            .plan_workout(&user_id, "2026-03-10".parse().unwrap(), "run", 30)
            .unwrap();

        let result = engine
            .complete_workout(&user_id, &workout.id, WorkoutOutcome::Completed, None)
            .unwrap();

        assert_eq!(result.streak.current_streak, 1);
        assert_eq!(result.donations.len(), 1);
        assert_eq!(result.donations[0].amount, Money::from_pence(150));
        assert_eq!(result.donations[0].donation_type, DonationType::Completion);
        assert_eq!(result.workout.status, WorkoutStatus::Completed);
    }

    #[test]
    fn skip_resets_streak_without_donations() {
        let engine = engine("2026-03-10T08:00:00Z");
        let (user_id, _) = seed(&engine, SubscriptionTier::Pro);
        let w1 = engine
            .plan_workout(&user_id, "2026-03-09".parse().unwrap(), "run", 30)
            .unwrap();
        engine
            .complete_workout(&user_id, &w1.id, WorkoutOutcome::Completed, None)
            .unwrap();

        let w2 = engine
            .plan_workout(&user_id, "2026-03-10".parse().unwrap(), "run", 30)
            .unwrap();
        let result = engine
            .complete_workout(&user_id, &w2.id, WorkoutOutcome::Skipped, Some("ill"))
            .unwrap();

        assert_eq!(result.streak.current_streak, 0);
        assert_eq!(result.streak.longest_streak, 1);
        assert!(result.donations.is_empty());
        assert_eq!(result.workout.skipped_reason.as_deref(), Some("ill"));
    }

    #[test]
    fn missing_charity_skips_donation_but_updates_streak() {
        let engine = engine("2026-03-10T08:00:00Z");
        let user = User {
            id: "u2".to_string(),
            first_name: "Tom".to_string(),
            phone: None,
            timezone_offset_hours: 0,
            subscription_tier: SubscriptionTier::Free,
            preferred_charity_id: None,
            goal: None,
            track: None,
            morning_call_time: None,
            evening_call_time: None,
            is_active: true,
            created_at: at("2026-01-01T00:00:00Z"),
        };
        engine.register_user(user).unwrap();
        let workout = engine
            .plan_workout("u2", "2026-03-10".parse().unwrap(), "yoga", 20)
            .unwrap();

        let result = engine
            .complete_workout("u2", &workout.id, WorkoutOutcome::Completed, None)
            .unwrap();
        assert_eq!(result.streak.current_streak, 1);
        assert!(result.donations.is_empty());
    }

    #[test]
    fn wrong_owner_is_rejected() {
        let engine = engine("2026-03-10T08:00:00Z");
        let (user_id, _) = seed(&engine, SubscriptionTier::Pro);
        let workout = engine
            .plan_workout(&user_id, "2026-03-10".parse().unwrap(), "run", 30)
            .unwrap();

        let user2 = User {
            id: "intruder".to_string(),
            first_name: "Eve".to_string(),
            phone: None,
            timezone_offset_hours: 0,
            subscription_tier: SubscriptionTier::Free,
            preferred_charity_id: None,
            goal: None,
            track: None,
            morning_call_time: None,
            evening_call_time: None,
            is_active: true,
            created_at: at("2026-01-01T00:00:00Z"),
        };
        engine.register_user(user2).unwrap();

        let result =
            engine.complete_workout("intruder", &workout.id, WorkoutOutcome::Completed, None);
        assert!(matches!(
            result,
            Err(CoreError::Validation(ValidationError::WrongOwner { .. }))
        ));
    }

    #[test]
    fn manual_donation_bypasses_caps() {
        let engine = engine("2026-03-10T08:00:00Z");
        let (user_id, charity_id) = seed(&engine, SubscriptionTier::Free);

        // Far beyond both caps.
        let donation = engine
            .award_manual(&user_id, Some(&charity_id), Money::from_pence(5000))
            .unwrap();
        assert_eq!(donation.donation_type, DonationType::Manual);

        let view = engine.get_impact_wallet(&user_id).unwrap();
        assert_eq!(view.lifetime_donated, Money::from_pence(5000));
        assert_eq!(view.current_month_spent, Money::ZERO);
    }

    #[test]
    fn wallet_view_computes_remaining() {
        let engine = engine("2026-03-10T08:00:00Z");
        let (user_id, _) = seed(&engine, SubscriptionTier::Concierge);
        let workout = engine
            .plan_workout(&user_id, "2026-03-10".parse().unwrap(), "run", 30)
            .unwrap();
        engine
            .complete_workout(&user_id, &workout.id, WorkoutOutcome::Completed, None)
            .unwrap();

        let view = engine.get_impact_wallet(&user_id).unwrap();
        assert_eq!(view.today_donated, Money::from_pence(200));
        assert_eq!(view.today_remaining, Money::from_pence(100));
        assert_eq!(view.month_remaining, Money::from_pence(1800));
        assert_eq!(view.month_donation_count, 1);
    }
}
