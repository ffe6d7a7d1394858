//! Call scheduling, retry and webhook-driven status updates.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use tracing::{debug, info, warn};

use super::{Call, CallStatus, CallType, CallUpdate, ContextSnapshot};
use crate::clock::{Clock, UserTz};
use crate::error::{CoreError, Result};
use crate::jobs::{CallJob, Enqueued, JobRunner};
use crate::storage::{CallsConfig, Database, User};
use crate::streak::Streak;

/// Schedules calls, retries no-answers and applies webhook status updates.
///
/// Borrowed views of the engine's collaborators; constructed per operation
/// inside the engine's per-user critical section.
pub struct CallScheduler<'a> {
    db: &'a Database,
    clock: &'a dyn Clock,
    jobs: &'a dyn JobRunner,
    config: &'a CallsConfig,
}

impl<'a> CallScheduler<'a> {
    pub fn new(
        db: &'a Database,
        clock: &'a dyn Clock,
        jobs: &'a dyn JobRunner,
        config: &'a CallsConfig,
    ) -> Self {
        Self {
            db,
            clock,
            jobs,
            config,
        }
    }

    /// Schedule one call and enqueue its execution job.
    pub fn schedule_call(
        &self,
        user_id: &str,
        call_type: CallType,
        at: DateTime<Utc>,
        context: Option<ContextSnapshot>,
    ) -> Result<Call> {
        let user = self.active_user(user_id)?;
        self.schedule_for_user(&user, call_type, at, context, 1)
    }

    fn schedule_for_user(
        &self,
        user: &User,
        call_type: CallType,
        at: DateTime<Utc>,
        context: Option<ContextSnapshot>,
        attempt: u32,
    ) -> Result<Call> {
        let mut call = Call::new(&user.id, call_type, at, context.map(|c| c.to_value()));
        call.attempt = attempt;
        self.db.insert_call(&call)?;
        self.enqueue(&call, UserTz::new(user.timezone_offset_hours));
        Ok(call)
    }

    fn enqueue(&self, call: &Call, tz: UserTz) {
        let delay = call.scheduled_at - self.clock.now();
        let key = dedupe_key(call, tz);
        let job = CallJob {
            call_id: call.id.clone(),
            user_id: call.user_id.clone(),
            call_type: call.call_type,
            scheduled_at: call.scheduled_at,
        };
        match self.jobs.enqueue(job, delay, &key) {
            Enqueued::Scheduled => {
                info!(
                    call_id = %call.id,
                    call_type = call.call_type.as_str(),
                    at = %call.scheduled_at,
                    "call scheduled"
                );
            }
            Enqueued::Immediate => {
                warn!(
                    call_id = %call.id,
                    "call scheduled in the past, dispatching immediately"
                );
            }
            Enqueued::AlreadyScheduled => {
                debug!(call_id = %call.id, dedupe_key = %key, "job already enqueued, skipping");
            }
        }
    }

    /// Schedule the user's morning and evening calls for `date`, skipping
    /// any call time that has already passed. A daily batch job running
    /// late must not schedule calls in the past.
    pub fn schedule_daily_calls(&self, user_id: &str, date: NaiveDate) -> Result<Vec<Call>> {
        let user = self.active_user(user_id)?;
        let tz = UserTz::new(user.timezone_offset_hours);
        let now = self.clock.now();

        let slots = [
            (user.morning_call_time.clone(), CallType::MorningPlanning),
            (user.evening_call_time.clone(), CallType::EveningReview),
        ];

        let mut calls = Vec::new();
        for (pref, call_type) in slots {
            let Some(pref) = pref else { continue };
            let Some((hour, minute)) = parse_call_time(&pref) else {
                warn!(user_id, call_time = %pref, "unparseable call time preference, skipping");
                continue;
            };
            let at = tz.local_datetime(date, hour, minute);
            if at <= now {
                debug!(
                    user_id,
                    call_type = call_type.as_str(),
                    at = %at,
                    "call time already passed, skipping"
                );
                continue;
            }
            let context = self.build_context(&user)?;
            calls.push(self.schedule_for_user(&user, call_type, at, Some(context), 1)?);
        }
        Ok(calls)
    }

    /// Snapshot of the user's live state, frozen into the call row.
    pub fn build_context(&self, user: &User) -> Result<ContextSnapshot> {
        let streak = self
            .db
            .get_streak(&user.id)?
            .unwrap_or_else(|| Streak::new(&user.id));
        let week_ago = self.clock.now() - Duration::days(7);
        let workouts_this_week = self.db.count_workouts_completed_since(&user.id, week_ago)?;
        let total_donated = self.db.donations_total(&user.id)?;
        let charity = match &user.preferred_charity_id {
            Some(id) => self.db.get_charity(id)?.filter(|c| c.is_active).map(|c| c.name),
            None => None,
        };

        Ok(ContextSnapshot {
            name: Some(user.first_name.clone()),
            track: user.track.clone(),
            goal: user.goal.clone(),
            current_streak: streak.current_streak,
            longest_streak: streak.longest_streak,
            workouts_this_week,
            total_donated,
            charity,
        })
    }

    /// Mark a call unanswered and schedule its retry, if the retry budget
    /// allows. Returns the retry call, or `None` when giving up.
    pub fn handle_missed_call(&self, call_id: &str) -> Result<Option<Call>> {
        let call = self
            .db
            .get_call(call_id)?
            .ok_or_else(|| CoreError::not_found("Call", call_id))?;

        let call = self.apply_status(
            call,
            CallStatus::NoAnswer,
            CallUpdate {
                outcome: Some("no_answer".to_string()),
                ..Default::default()
            },
        )?;

        if call.status != CallStatus::NoAnswer {
            // Duplicate or stale no-answer webhook; the transition was
            // rejected above, so there is nothing to retry.
            return Ok(None);
        }

        let retries_so_far = call.attempt.saturating_sub(1);
        if retries_so_far >= self.config.max_retries {
            warn!(
                call_id,
                attempts = call.attempt,
                "retry budget exhausted, not rescheduling"
            );
            return Ok(None);
        }

        let user = self.active_user(&call.user_id)?;
        let retry_at = self.clock.now() + Duration::minutes(self.config.retry_delay_min);
        info!(
            user_id = %call.user_id,
            call_type = call.call_type.as_str(),
            at = %retry_at,
            "scheduling retry call"
        );

        let context = call
            .context_snapshot
            .as_ref()
            .and_then(ContextSnapshot::from_value);
        let retry =
            self.schedule_for_user(&user, call.call_type, retry_at, context, call.attempt + 1)?;
        Ok(Some(retry))
    }

    /// Apply a webhook-driven status update. A transition the state
    /// machine forbids is logged and ignored -- webhooks arrive at least
    /// once and occasionally out of order.
    pub fn update_call_status(
        &self,
        call_id: &str,
        status: CallStatus,
        update: CallUpdate,
    ) -> Result<Call> {
        let call = self
            .db
            .get_call(call_id)?
            .ok_or_else(|| CoreError::not_found("Call", call_id))?;
        self.apply_status(call, status, update)
    }

    fn apply_status(&self, mut call: Call, status: CallStatus, update: CallUpdate) -> Result<Call> {
        if !call.status.can_transition_to(status) {
            warn!(
                call_id = %call.id,
                from = call.status.as_str(),
                to = status.as_str(),
                "invalid call status transition, ignoring"
            );
            return Ok(call);
        }

        call.status = status;
        if let Some(v) = update.started_at {
            call.started_at = Some(v);
        }
        if let Some(v) = update.ended_at {
            call.ended_at = Some(v);
        }
        if let Some(v) = update.duration_secs {
            call.duration_secs = Some(v);
        }
        if let Some(v) = update.outcome {
            call.outcome = Some(v);
        }
        if let Some(v) = update.sentiment {
            call.sentiment = Some(v);
        }
        if let Some(v) = update.transcript {
            call.transcript = Some(v);
        }
        if let Some(v) = update.provider_call_id {
            call.provider_call_id = Some(v);
        }

        self.db.update_call(&call)?;
        info!(call_id = %call.id, status = call.status.as_str(), "call status updated");
        Ok(call)
    }

    /// Cancel a scheduled call: remove the pending job, mark the row.
    /// If the call already left `Scheduled` the cancel is a logged no-op.
    pub fn cancel_call(&self, call_id: &str) -> Result<Call> {
        let call = self
            .db
            .get_call(call_id)?
            .ok_or_else(|| CoreError::not_found("Call", call_id))?;

        if call.status != CallStatus::Scheduled {
            warn!(
                call_id,
                status = call.status.as_str(),
                "cancel requested but call already progressed, ignoring"
            );
            return Ok(call);
        }

        let tz = self
            .db
            .get_user(&call.user_id)?
            .map(|u| UserTz::new(u.timezone_offset_hours))
            .unwrap_or(UserTz::UTC);
        self.jobs.cancel(&dedupe_key(&call, tz));
        let call = self.apply_status(call, CallStatus::Cancelled, CallUpdate::default())?;
        info!(call_id, "call cancelled");
        Ok(call)
    }

    /// Scheduled calls still ahead of now, soonest first.
    pub fn upcoming_calls(&self, limit: u32) -> Result<Vec<Call>> {
        self.db.upcoming_calls(self.clock.now(), limit)
    }

    fn active_user(&self, user_id: &str) -> Result<User> {
        let user = self
            .db
            .get_user(user_id)?
            .ok_or_else(|| CoreError::not_found("User", user_id))?;
        if !user.is_active {
            return Err(CoreError::not_found("User", user_id));
        }
        Ok(user)
    }
}

/// Stable job key: daily cadence calls collapse onto (user, type, local
/// date) so a re-run of the daily batch cannot double-book; retries and
/// one-off calls key on the call id.
fn dedupe_key(call: &Call, tz: UserTz) -> String {
    if call.call_type.is_daily() && call.attempt == 1 {
        format!(
            "daily:{}:{}:{}",
            call.user_id,
            call.call_type.as_str(),
            tz.local_date(call.scheduled_at)
        )
    } else {
        call.id.clone()
    }
}

fn parse_call_time(s: &str) -> Option<(u32, u32)> {
    let (h, m) = s.split_once(':')?;
    let hour: u32 = h.parse().ok()?;
    let minute: u32 = m.parse().ok()?;
    if hour > 23 || minute > 59 {
        return None;
    }
    Some((hour, minute))
}
