//! SQLite persistence for the accountability engine.
//!
//! One table per record type: users, charities, workouts, streaks,
//! impact_wallets, donations, calls. Timestamps are stored as UTC RFC 3339
//! text (string comparison orders chronologically); dates as `YYYY-MM-DD`;
//! money as integer pence.

use std::path::Path;

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::data_dir;
use crate::call::{Call, CallStatus, CallType};
use crate::donation::{
    CharityDirectory, Donation, DonationStats, DonationType, DonationTypeStats, SubscriptionTier,
    TierSource,
};
use crate::error::{CoreError, Result, StorageError};
use crate::money::Money;
use crate::streak::Streak;
use crate::wallet::ImpactWallet;

/// A user profile, as much of it as the engine reads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub first_name: String,
    pub phone: Option<String>,
    pub timezone_offset_hours: i32,
    pub subscription_tier: SubscriptionTier,
    pub preferred_charity_id: Option<String>,
    pub goal: Option<String>,
    pub track: Option<String>,
    /// HH:MM in the user's timezone.
    pub morning_call_time: Option<String>,
    /// HH:MM in the user's timezone.
    pub evening_call_time: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// A charity receiving donations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Charity {
    pub id: String,
    pub name: String,
    pub impact_metric: Option<String>,
    pub is_active: bool,
}

impl Charity {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            impact_metric: None,
            is_active: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkoutStatus {
    Planned,
    Completed,
    Partial,
    Skipped,
}

impl WorkoutStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            WorkoutStatus::Planned => "PLANNED",
            WorkoutStatus::Completed => "COMPLETED",
            WorkoutStatus::Partial => "PARTIAL",
            WorkoutStatus::Skipped => "SKIPPED",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "PLANNED" => Some(WorkoutStatus::Planned),
            "COMPLETED" => Some(WorkoutStatus::Completed),
            "PARTIAL" => Some(WorkoutStatus::Partial),
            "SKIPPED" => Some(WorkoutStatus::Skipped),
            _ => None,
        }
    }
}

/// A planned or finished workout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workout {
    pub id: String,
    pub user_id: String,
    pub planned_date: NaiveDate,
    pub planned_time: Option<String>,
    pub activity: String,
    pub duration_min: u32,
    pub status: WorkoutStatus,
    pub skipped_reason: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Workout {
    pub fn new(
        user_id: impl Into<String>,
        planned_date: NaiveDate,
        activity: impl Into<String>,
        duration_min: u32,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            planned_date,
            planned_time: None,
            activity: activity.into(),
            duration_min,
            status: WorkoutStatus::Planned,
            skipped_reason: None,
            completed_at: None,
            created_at,
        }
    }
}

/// SQLite database wrapper.
pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Open the database at `~/.config/sweatpledge/sweatpledge.db`,
    /// creating the file and schema if needed.
    pub fn open() -> Result<Self> {
        let path = data_dir()?.join("sweatpledge.db");
        Self::open_at(&path)
    }

    /// Open a database at an explicit path.
    pub fn open_at(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).map_err(|source| StorageError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    /// Open an in-memory database (tests and ephemeral runs).
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| CoreError::Storage(StorageError::QueryFailed(e.to_string())))?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<()> {
        self.conn
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS users (
                    id                    TEXT PRIMARY KEY,
                    first_name            TEXT NOT NULL,
                    phone                 TEXT,
                    timezone_offset_hours INTEGER NOT NULL DEFAULT 0,
                    subscription_tier     TEXT NOT NULL DEFAULT 'FREE',
                    preferred_charity_id  TEXT,
                    goal                  TEXT,
                    track                 TEXT,
                    morning_call_time     TEXT,
                    evening_call_time     TEXT,
                    is_active             INTEGER NOT NULL DEFAULT 1,
                    created_at            TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS charities (
                    id            TEXT PRIMARY KEY,
                    name          TEXT NOT NULL,
                    impact_metric TEXT,
                    is_active     INTEGER NOT NULL DEFAULT 1
                );

                CREATE TABLE IF NOT EXISTS workouts (
                    id             TEXT PRIMARY KEY,
                    user_id        TEXT NOT NULL,
                    planned_date   TEXT NOT NULL,
                    planned_time   TEXT,
                    activity       TEXT NOT NULL,
                    duration_min   INTEGER NOT NULL,
                    status         TEXT NOT NULL DEFAULT 'PLANNED',
                    skipped_reason TEXT,
                    completed_at   TEXT,
                    created_at     TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS streaks (
                    user_id              TEXT PRIMARY KEY,
                    current_streak       INTEGER NOT NULL DEFAULT 0,
                    current_streak_start TEXT,
                    longest_streak       INTEGER NOT NULL DEFAULT 0,
                    longest_streak_start TEXT,
                    longest_streak_end   TEXT,
                    last_workout_date    TEXT,
                    bonus_7_day_claimed  INTEGER NOT NULL DEFAULT 0,
                    bonus_30_day_claimed INTEGER NOT NULL DEFAULT 0,
                    bonus_90_day_claimed INTEGER NOT NULL DEFAULT 0
                );

                CREATE TABLE IF NOT EXISTS impact_wallets (
                    user_id                   TEXT PRIMARY KEY,
                    monthly_limit_pence       INTEGER NOT NULL,
                    daily_cap_pence           INTEGER NOT NULL,
                    current_month_spent_pence INTEGER NOT NULL DEFAULT 0,
                    month_start_date          TEXT NOT NULL,
                    lifetime_donated_pence    INTEGER NOT NULL DEFAULT 0
                );

                CREATE TABLE IF NOT EXISTS donations (
                    id            TEXT PRIMARY KEY,
                    user_id       TEXT NOT NULL,
                    charity_id    TEXT NOT NULL,
                    amount_pence  INTEGER NOT NULL,
                    currency      TEXT NOT NULL DEFAULT 'GBP',
                    donation_type TEXT NOT NULL,
                    workout_id    TEXT,
                    streak_days   INTEGER,
                    created_at    TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS calls (
                    id               TEXT PRIMARY KEY,
                    user_id          TEXT NOT NULL,
                    call_type        TEXT NOT NULL,
                    status           TEXT NOT NULL DEFAULT 'SCHEDULED',
                    scheduled_at     TEXT NOT NULL,
                    started_at       TEXT,
                    ended_at         TEXT,
                    duration_secs    INTEGER,
                    outcome          TEXT,
                    sentiment        TEXT,
                    transcript       TEXT,
                    provider_call_id TEXT,
                    attempt          INTEGER NOT NULL DEFAULT 1,
                    context_snapshot TEXT
                );

                -- Indexes for the engine's hot queries
                CREATE INDEX IF NOT EXISTS idx_donations_user_created ON donations(user_id, created_at);
                CREATE INDEX IF NOT EXISTS idx_calls_status_scheduled ON calls(status, scheduled_at);
                CREATE INDEX IF NOT EXISTS idx_calls_user ON calls(user_id);
                CREATE INDEX IF NOT EXISTS idx_workouts_user_created ON workouts(user_id, created_at);",
            )
            .map_err(|e| StorageError::MigrationFailed(e.to_string()))?;
        Ok(())
    }

    // ── Users ────────────────────────────────────────────────────────

    pub fn insert_user(&self, user: &User) -> Result<()> {
        self.conn.execute(
            "INSERT INTO users (id, first_name, phone, timezone_offset_hours, subscription_tier,
                                preferred_charity_id, goal, track, morning_call_time,
                                evening_call_time, is_active, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                user.id,
                user.first_name,
                user.phone,
                user.timezone_offset_hours,
                user.subscription_tier.as_str(),
                user.preferred_charity_id,
                user.goal,
                user.track,
                user.morning_call_time,
                user.evening_call_time,
                user.is_active,
                user.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn get_user(&self, user_id: &str) -> Result<Option<User>> {
        let user = self
            .conn
            .query_row(
                "SELECT id, first_name, phone, timezone_offset_hours, subscription_tier,
                        preferred_charity_id, goal, track, morning_call_time, evening_call_time,
                        is_active, created_at
                 FROM users WHERE id = ?1",
                params![user_id],
                |row| {
                    Ok(User {
                        id: row.get(0)?,
                        first_name: row.get(1)?,
                        phone: row.get(2)?,
                        timezone_offset_hours: row.get(3)?,
                        subscription_tier: SubscriptionTier::from_str(&row.get::<_, String>(4)?),
                        preferred_charity_id: row.get(5)?,
                        goal: row.get(6)?,
                        track: row.get(7)?,
                        morning_call_time: row.get(8)?,
                        evening_call_time: row.get(9)?,
                        is_active: row.get(10)?,
                        created_at: parse_dt(11, &row.get::<_, String>(11)?)?,
                    })
                },
            )
            .optional()?;
        Ok(user)
    }

    // ── Charities ────────────────────────────────────────────────────

    pub fn insert_charity(&self, charity: &Charity) -> Result<()> {
        self.conn.execute(
            "INSERT INTO charities (id, name, impact_metric, is_active) VALUES (?1, ?2, ?3, ?4)",
            params![
                charity.id,
                charity.name,
                charity.impact_metric,
                charity.is_active
            ],
        )?;
        Ok(())
    }

    pub fn get_charity(&self, charity_id: &str) -> Result<Option<Charity>> {
        let charity = self
            .conn
            .query_row(
                "SELECT id, name, impact_metric, is_active FROM charities WHERE id = ?1",
                params![charity_id],
                map_charity,
            )
            .optional()?;
        Ok(charity)
    }

    /// Active charities, alphabetical.
    pub fn list_charities(&self) -> Result<Vec<Charity>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, impact_metric, is_active FROM charities
             WHERE is_active = 1 ORDER BY name ASC",
        )?;
        let rows = stmt.query_map([], map_charity)?;
        collect(rows)
    }

    // ── Workouts ─────────────────────────────────────────────────────

    pub fn insert_workout(&self, workout: &Workout) -> Result<()> {
        self.conn.execute(
            "INSERT INTO workouts (id, user_id, planned_date, planned_time, activity,
                                   duration_min, status, skipped_reason, completed_at, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                workout.id,
                workout.user_id,
                workout.planned_date.to_string(),
                workout.planned_time,
                workout.activity,
                workout.duration_min,
                workout.status.as_str(),
                workout.skipped_reason,
                workout.completed_at.map(|dt| dt.to_rfc3339()),
                workout.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn get_workout(&self, workout_id: &str) -> Result<Option<Workout>> {
        let workout = self
            .conn
            .query_row(
                "SELECT id, user_id, planned_date, planned_time, activity, duration_min,
                        status, skipped_reason, completed_at, created_at
                 FROM workouts WHERE id = ?1",
                params![workout_id],
                map_workout,
            )
            .optional()?;
        Ok(workout)
    }

    pub fn update_workout_status(
        &self,
        workout_id: &str,
        status: WorkoutStatus,
        completed_at: Option<DateTime<Utc>>,
        skipped_reason: Option<&str>,
    ) -> Result<()> {
        self.conn.execute(
            "UPDATE workouts SET status = ?2, completed_at = ?3, skipped_reason = ?4
             WHERE id = ?1",
            params![
                workout_id,
                status.as_str(),
                completed_at.map(|dt| dt.to_rfc3339()),
                skipped_reason,
            ],
        )?;
        Ok(())
    }

    pub fn list_workouts(&self, user_id: &str, limit: u32) -> Result<Vec<Workout>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, user_id, planned_date, planned_time, activity, duration_min,
                    status, skipped_reason, completed_at, created_at
             FROM workouts WHERE user_id = ?1
             ORDER BY planned_date DESC LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![user_id, limit], map_workout)?;
        collect(rows)
    }

    /// Workouts completed or partially completed since `since`.
    pub fn count_workouts_completed_since(
        &self,
        user_id: &str,
        since: DateTime<Utc>,
    ) -> Result<u32> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM workouts
             WHERE user_id = ?1 AND status IN ('COMPLETED', 'PARTIAL') AND created_at >= ?2",
            params![user_id, since.to_rfc3339()],
            |row| row.get::<_, u32>(0),
        )?;
        Ok(count)
    }

    // ── Streaks ──────────────────────────────────────────────────────

    pub fn get_streak(&self, user_id: &str) -> Result<Option<Streak>> {
        let streak = self
            .conn
            .query_row(
                "SELECT user_id, current_streak, current_streak_start, longest_streak,
                        longest_streak_start, longest_streak_end, last_workout_date,
                        bonus_7_day_claimed, bonus_30_day_claimed, bonus_90_day_claimed
                 FROM streaks WHERE user_id = ?1",
                params![user_id],
                |row| {
                    Ok(Streak {
                        user_id: row.get(0)?,
                        current_streak: row.get(1)?,
                        current_streak_start: parse_date_opt(2, row.get(2)?)?,
                        longest_streak: row.get(3)?,
                        longest_streak_start: parse_date_opt(4, row.get(4)?)?,
                        longest_streak_end: parse_date_opt(5, row.get(5)?)?,
                        last_workout_date: parse_date_opt(6, row.get(6)?)?,
                        bonus_7_day_claimed: row.get(7)?,
                        bonus_30_day_claimed: row.get(8)?,
                        bonus_90_day_claimed: row.get(9)?,
                    })
                },
            )
            .optional()?;
        Ok(streak)
    }

    pub fn upsert_streak(&self, streak: &Streak) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO streaks
                 (user_id, current_streak, current_streak_start, longest_streak,
                  longest_streak_start, longest_streak_end, last_workout_date,
                  bonus_7_day_claimed, bonus_30_day_claimed, bonus_90_day_claimed)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                streak.user_id,
                streak.current_streak,
                streak.current_streak_start.map(|d| d.to_string()),
                streak.longest_streak,
                streak.longest_streak_start.map(|d| d.to_string()),
                streak.longest_streak_end.map(|d| d.to_string()),
                streak.last_workout_date.map(|d| d.to_string()),
                streak.bonus_7_day_claimed,
                streak.bonus_30_day_claimed,
                streak.bonus_90_day_claimed,
            ],
        )?;
        Ok(())
    }

    // ── Impact wallets ───────────────────────────────────────────────

    pub fn get_wallet(&self, user_id: &str) -> Result<Option<ImpactWallet>> {
        let wallet = self
            .conn
            .query_row(
                "SELECT user_id, monthly_limit_pence, daily_cap_pence,
                        current_month_spent_pence, month_start_date, lifetime_donated_pence
                 FROM impact_wallets WHERE user_id = ?1",
                params![user_id],
                |row| {
                    Ok(ImpactWallet {
                        user_id: row.get(0)?,
                        monthly_limit: Money::from_pence(row.get(1)?),
                        daily_cap: Money::from_pence(row.get(2)?),
                        current_month_spent: Money::from_pence(row.get(3)?),
                        month_start_date: parse_date(4, &row.get::<_, String>(4)?)?,
                        lifetime_donated: Money::from_pence(row.get(5)?),
                    })
                },
            )
            .optional()?;
        Ok(wallet)
    }

    pub fn upsert_wallet(&self, wallet: &ImpactWallet) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO impact_wallets
                 (user_id, monthly_limit_pence, daily_cap_pence, current_month_spent_pence,
                  month_start_date, lifetime_donated_pence)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                wallet.user_id,
                wallet.monthly_limit.pence(),
                wallet.daily_cap.pence(),
                wallet.current_month_spent.pence(),
                wallet.month_start_date.to_string(),
                wallet.lifetime_donated.pence(),
            ],
        )?;
        Ok(())
    }

    // ── Donations ────────────────────────────────────────────────────

    pub fn insert_donation(&self, donation: &Donation) -> Result<()> {
        self.conn.execute(
            "INSERT INTO donations (id, user_id, charity_id, amount_pence, currency,
                                    donation_type, workout_id, streak_days, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                donation.id,
                donation.user_id,
                donation.charity_id,
                donation.amount.pence(),
                donation.currency,
                donation.donation_type.as_str(),
                donation.workout_id,
                donation.streak_days,
                donation.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Sum and count of donations created in `[start, end)`, all types.
    pub fn donations_between(
        &self,
        user_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<(Money, u32)> {
        let (pence, count) = self.conn.query_row(
            "SELECT COALESCE(SUM(amount_pence), 0), COUNT(*) FROM donations
             WHERE user_id = ?1 AND created_at >= ?2 AND created_at < ?3",
            params![user_id, start.to_rfc3339(), end.to_rfc3339()],
            |row| Ok((row.get::<_, i64>(0)?, row.get::<_, u32>(1)?)),
        )?;
        Ok((Money::from_pence(pence), count))
    }

    /// Lifetime donation total from the ledger itself.
    pub fn donations_total(&self, user_id: &str) -> Result<Money> {
        let pence = self.conn.query_row(
            "SELECT COALESCE(SUM(amount_pence), 0) FROM donations WHERE user_id = ?1",
            params![user_id],
            |row| row.get::<_, i64>(0),
        )?;
        Ok(Money::from_pence(pence))
    }

    pub fn list_donations(&self, user_id: &str, limit: u32) -> Result<Vec<Donation>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, user_id, charity_id, amount_pence, currency, donation_type,
                    workout_id, streak_days, created_at
             FROM donations WHERE user_id = ?1
             ORDER BY created_at DESC LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![user_id, limit], map_donation)?;
        collect(rows)
    }

    pub fn donation_stats(&self, user_id: &str) -> Result<DonationStats> {
        let mut stmt = self.conn.prepare(
            "SELECT donation_type, COALESCE(SUM(amount_pence), 0), COUNT(*)
             FROM donations WHERE user_id = ?1
             GROUP BY donation_type ORDER BY donation_type",
        )?;
        let rows = stmt.query_map(params![user_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, u32>(2)?,
            ))
        })?;

        let mut stats = DonationStats {
            total_amount: Money::ZERO,
            total_count: 0,
            by_type: Vec::new(),
        };
        for row in rows {
            let (type_str, pence, count) = row?;
            let Some(donation_type) = DonationType::from_str(&type_str) else {
                continue;
            };
            stats.total_amount = stats.total_amount.saturating_add(Money::from_pence(pence));
            stats.total_count += count;
            stats.by_type.push(DonationTypeStats {
                donation_type,
                amount: Money::from_pence(pence),
                count,
            });
        }
        Ok(stats)
    }

    // ── Calls ────────────────────────────────────────────────────────

    pub fn insert_call(&self, call: &Call) -> Result<()> {
        self.conn.execute(
            "INSERT INTO calls (id, user_id, call_type, status, scheduled_at, started_at,
                                ended_at, duration_secs, outcome, sentiment, transcript,
                                provider_call_id, attempt, context_snapshot)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
            params![
                call.id,
                call.user_id,
                call.call_type.as_str(),
                call.status.as_str(),
                call.scheduled_at.to_rfc3339(),
                call.started_at.map(|dt| dt.to_rfc3339()),
                call.ended_at.map(|dt| dt.to_rfc3339()),
                call.duration_secs,
                call.outcome,
                call.sentiment,
                call.transcript,
                call.provider_call_id,
                call.attempt,
                call.context_snapshot
                    .as_ref()
                    .map(|v| v.to_string()),
            ],
        )?;
        Ok(())
    }

    pub fn get_call(&self, call_id: &str) -> Result<Option<Call>> {
        let call = self
            .conn
            .query_row(
                "SELECT id, user_id, call_type, status, scheduled_at, started_at, ended_at,
                        duration_secs, outcome, sentiment, transcript, provider_call_id,
                        attempt, context_snapshot
                 FROM calls WHERE id = ?1",
                params![call_id],
                map_call,
            )
            .optional()?;
        Ok(call)
    }

    /// Persist every mutable field of a call row.
    pub fn update_call(&self, call: &Call) -> Result<()> {
        self.conn.execute(
            "UPDATE calls SET status = ?2, started_at = ?3, ended_at = ?4, duration_secs = ?5,
                              outcome = ?6, sentiment = ?7, transcript = ?8,
                              provider_call_id = ?9
             WHERE id = ?1",
            params![
                call.id,
                call.status.as_str(),
                call.started_at.map(|dt| dt.to_rfc3339()),
                call.ended_at.map(|dt| dt.to_rfc3339()),
                call.duration_secs,
                call.outcome,
                call.sentiment,
                call.transcript,
                call.provider_call_id,
            ],
        )?;
        Ok(())
    }

    /// Scheduled calls due at or after `after`, soonest first.
    pub fn upcoming_calls(&self, after: DateTime<Utc>, limit: u32) -> Result<Vec<Call>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, user_id, call_type, status, scheduled_at, started_at, ended_at,
                    duration_secs, outcome, sentiment, transcript, provider_call_id,
                    attempt, context_snapshot
             FROM calls WHERE status = 'SCHEDULED' AND scheduled_at >= ?1
             ORDER BY scheduled_at ASC LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![after.to_rfc3339(), limit], map_call)?;
        collect(rows)
    }

    pub fn list_calls(&self, user_id: &str, limit: u32) -> Result<Vec<Call>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, user_id, call_type, status, scheduled_at, started_at, ended_at,
                    duration_secs, outcome, sentiment, transcript, provider_call_id,
                    attempt, context_snapshot
             FROM calls WHERE user_id = ?1
             ORDER BY scheduled_at DESC LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![user_id, limit], map_call)?;
        collect(rows)
    }
}

impl TierSource for Database {
    fn subscription_tier(&self, user_id: &str) -> Result<SubscriptionTier> {
        let user = self
            .get_user(user_id)?
            .ok_or_else(|| CoreError::not_found("User", user_id))?;
        Ok(user.subscription_tier)
    }
}

impl CharityDirectory for Database {
    /// The user's preferred charity id, if set and still active.
    fn preferred_charity(&self, user_id: &str) -> Result<Option<String>> {
        let user = self
            .get_user(user_id)?
            .ok_or_else(|| CoreError::not_found("User", user_id))?;
        let Some(charity_id) = user.preferred_charity_id else {
            return Ok(None);
        };
        match self.get_charity(&charity_id)? {
            Some(charity) if charity.is_active => Ok(Some(charity.id)),
            _ => Ok(None),
        }
    }
}

// ── Row mapping ──────────────────────────────────────────────────────

fn map_charity(row: &rusqlite::Row<'_>) -> rusqlite::Result<Charity> {
    Ok(Charity {
        id: row.get(0)?,
        name: row.get(1)?,
        impact_metric: row.get(2)?,
        is_active: row.get(3)?,
    })
}

fn map_workout(row: &rusqlite::Row<'_>) -> rusqlite::Result<Workout> {
    let status_str: String = row.get(6)?;
    Ok(Workout {
        id: row.get(0)?,
        user_id: row.get(1)?,
        planned_date: parse_date(2, &row.get::<_, String>(2)?)?,
        planned_time: row.get(3)?,
        activity: row.get(4)?,
        duration_min: row.get(5)?,
        status: WorkoutStatus::from_str(&status_str)
            .ok_or_else(|| bad_text(6, &status_str))?,
        skipped_reason: row.get(7)?,
        completed_at: parse_dt_opt(8, row.get(8)?)?,
        created_at: parse_dt(9, &row.get::<_, String>(9)?)?,
    })
}

fn map_donation(row: &rusqlite::Row<'_>) -> rusqlite::Result<Donation> {
    let type_str: String = row.get(5)?;
    Ok(Donation {
        id: row.get(0)?,
        user_id: row.get(1)?,
        charity_id: row.get(2)?,
        amount: Money::from_pence(row.get(3)?),
        currency: row.get(4)?,
        donation_type: DonationType::from_str(&type_str)
            .ok_or_else(|| bad_text(5, &type_str))?,
        workout_id: row.get(6)?,
        streak_days: row.get(7)?,
        created_at: parse_dt(8, &row.get::<_, String>(8)?)?,
    })
}

fn map_call(row: &rusqlite::Row<'_>) -> rusqlite::Result<Call> {
    let type_str: String = row.get(2)?;
    let status_str: String = row.get(3)?;
    let snapshot: Option<String> = row.get(13)?;
    Ok(Call {
        id: row.get(0)?,
        user_id: row.get(1)?,
        call_type: CallType::from_str(&type_str).ok_or_else(|| bad_text(2, &type_str))?,
        status: CallStatus::from_str(&status_str).ok_or_else(|| bad_text(3, &status_str))?,
        scheduled_at: parse_dt(4, &row.get::<_, String>(4)?)?,
        started_at: parse_dt_opt(5, row.get(5)?)?,
        ended_at: parse_dt_opt(6, row.get(6)?)?,
        duration_secs: row.get(7)?,
        outcome: row.get(8)?,
        sentiment: row.get(9)?,
        transcript: row.get(10)?,
        provider_call_id: row.get(11)?,
        attempt: row.get(12)?,
        context_snapshot: snapshot
            .map(|s| serde_json::from_str(&s).map_err(|e| conversion_err(13, e)))
            .transpose()?,
    })
}

fn parse_dt(idx: usize, s: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_err(idx, e))
}

fn parse_dt_opt(idx: usize, s: Option<String>) -> rusqlite::Result<Option<DateTime<Utc>>> {
    s.map(|s| parse_dt(idx, &s)).transpose()
}

fn parse_date(idx: usize, s: &str) -> rusqlite::Result<NaiveDate> {
    s.parse().map_err(|e| conversion_err(idx, e))
}

fn parse_date_opt(idx: usize, s: Option<String>) -> rusqlite::Result<Option<NaiveDate>> {
    s.map(|s| parse_date(idx, &s)).transpose()
}

fn conversion_err(
    idx: usize,
    e: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))
}

fn bad_text(idx: usize, value: &str) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        idx,
        Type::Text,
        format!("unrecognized value: {value}").into(),
    )
}

fn collect<T>(rows: impl Iterator<Item = rusqlite::Result<T>>) -> Result<Vec<T>> {
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}
