//! End-to-end scenarios for the accountability engine.
//!
//! These drive the public facade the way the daily product flows do:
//! plan -> complete -> streak -> donations, daily call scheduling, missed
//! call retries, and the wallet caps across days and months.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};

use sweatpledge_core::{
    AccountabilityEngine, CallStatus, CallType, Charity, Config, Database, DonationType,
    FixedClock, ImpactWallet, InMemoryJobRunner, Money, SubscriptionTier, User, WorkoutOutcome,
};

fn at(s: &str) -> DateTime<Utc> {
    s.parse().unwrap()
}

fn date(s: &str) -> NaiveDate {
    s.parse().unwrap()
}

struct Harness {
    engine: AccountabilityEngine,
    clock: Arc<FixedClock>,
    jobs: Arc<InMemoryJobRunner>,
    user_id: String,
    charity_id: String,
}

/// A seeded engine: one active user with a preferred charity and a fresh
/// wallet. `prepare` can adjust rows before the database moves into the
/// engine.
fn harness(
    now: &str,
    tier: SubscriptionTier,
    prepare: impl FnOnce(&Database, &str),
) -> Harness {
    let db = Database::open_memory().unwrap();

    let charity = Charity::new("Mind");
    db.insert_charity(&charity).unwrap();

    let user = User {
        id: "u1".to_string(),
        first_name: "Sarah".to_string(),
        phone: Some("+447700900123".to_string()),
        timezone_offset_hours: 0,
        subscription_tier: tier,
        preferred_charity_id: Some(charity.id.clone()),
        goal: Some("Run 5K without stopping".to_string()),
        track: Some("fitness".to_string()),
        morning_call_time: Some("07:00".to_string()),
        evening_call_time: Some("20:00".to_string()),
        is_active: true,
        created_at: at("2026-01-01T00:00:00Z"),
    };
    db.insert_user(&user).unwrap();
    db.upsert_wallet(&ImpactWallet::new(
        "u1",
        Money::from_pence(2000),
        Money::from_pence(300),
        date("2026-03-01"),
    ))
    .unwrap();

    prepare(&db, &user.id);

    let clock = Arc::new(FixedClock::new(at(now)));
    let jobs = Arc::new(InMemoryJobRunner::new());
    let engine = AccountabilityEngine::new(db, clock.clone(), jobs.clone(), Config::default());

    Harness {
        engine,
        clock,
        jobs,
        user_id: user.id,
        charity_id: charity.id,
    }
}

/// Plan and complete one workout on the given date, advancing the clock
/// to 08:00 of that day first.
fn complete_on(h: &Harness, day: &str) -> sweatpledge_core::WorkoutResult {
    h.clock.set(at(&format!("{day}T08:00:00Z")));
    let workout = h
        .engine
        .plan_workout(&h.user_id, date(day), "run", 30)
        .unwrap();
    h.engine
        .complete_workout(&h.user_id, &workout.id, WorkoutOutcome::Completed, None)
        .unwrap()
}

#[test]
fn elite_seven_day_run_pays_bonus_exactly_on_day_seven() {
    let h = harness("2026-03-01T08:00:00Z", SubscriptionTier::Elite, |_, _| {});

    let mut completion_total = Money::ZERO;
    for d in 1..=6 {
        let result = complete_on(&h, &format!("2026-03-0{d}"));
        assert_eq!(result.streak.current_streak, d);
        assert_eq!(result.donations.len(), 1, "day {d}: completion only");
        completion_total = completion_total + result.donations[0].amount;
    }
    assert_eq!(completion_total, Money::from_pence(900)); // 6 x 1.50

    let day7 = complete_on(&h, "2026-03-07");
    assert_eq!(day7.streak.current_streak, 7);
    assert!(day7.streak.bonus_7_day_claimed);
    assert_eq!(day7.donations.len(), 2);
    let bonus = &day7.donations[1];
    assert_eq!(bonus.donation_type, DonationType::Streak7Day);
    assert_eq!(bonus.amount, Money::from_pence(300));
    assert_eq!(bonus.streak_days, Some(7));
}

#[test]
fn milestone_pays_at_most_once_ever() {
    let h = harness("2026-03-01T08:00:00Z", SubscriptionTier::Free, |_, _| {});

    for d in 1..=7 {
        complete_on(&h, &format!("2026-03-{d:02}"));
    }
    assert!(h.engine.get_streak(&h.user_id).unwrap().bonus_7_day_claimed);

    // Break the streak, then climb back to seven.
    let skipped = h
        .engine
        .plan_workout(&h.user_id, date("2026-03-09"), "run", 30)
        .unwrap();
    h.engine
        .complete_workout(&h.user_id, &skipped.id, WorkoutOutcome::Skipped, None)
        .unwrap();

    let mut second_run_donations = Vec::new();
    for d in 10..=16 {
        let result = complete_on(&h, &format!("2026-03-{d}"));
        second_run_donations.extend(result.donations);
    }

    let streak = h.engine.get_streak(&h.user_id).unwrap();
    assert_eq!(streak.current_streak, 7);
    assert!(second_run_donations
        .iter()
        .all(|d| d.donation_type == DonationType::Completion));
}

#[test]
fn monthly_limit_blocks_donation_but_streak_advances() {
    let h = harness(
        "2026-03-10T08:00:00Z",
        SubscriptionTier::Elite,
        |db, user_id| {
            let mut wallet = db.get_wallet(user_id).unwrap().unwrap();
            wallet.current_month_spent = Money::from_pence(1900); // 19 of 20
            db.upsert_wallet(&wallet).unwrap();
        },
    );

    let result = complete_on(&h, "2026-03-10");

    // 19.00 + 1.50 > 20.00: no donation, streak still moves.
    assert!(result.donations.is_empty());
    assert_eq!(result.streak.current_streak, 1);

    let view = h.engine.get_impact_wallet(&h.user_id).unwrap();
    assert_eq!(view.current_month_spent, Money::from_pence(1900));
    assert_eq!(view.today_donation_count, 0);
}

#[test]
fn daily_cap_limits_same_day_completions() {
    let h = harness("2026-03-10T08:00:00Z", SubscriptionTier::Free, |_, _| {});

    let mut donation_count = 0;
    for _ in 0..4 {
        let workout = h
            .engine
            .plan_workout(&h.user_id, date("2026-03-10"), "run", 30)
            .unwrap();
        let result = h
            .engine
            .complete_workout(&h.user_id, &workout.id, WorkoutOutcome::Completed, None)
            .unwrap();
        donation_count += result.donations.len();
    }

    // 3.00 daily cap, 1.00 per completion: the fourth is refused.
    assert_eq!(donation_count, 3);
    let view = h.engine.get_impact_wallet(&h.user_id).unwrap();
    assert_eq!(view.today_donated, Money::from_pence(300));
    assert_eq!(view.today_remaining, Money::ZERO);
}

#[test]
fn month_rollover_resets_spent_on_next_donation() {
    let h = harness("2026-03-30T08:00:00Z", SubscriptionTier::Pro, |_, _| {});

    complete_on(&h, "2026-03-30");
    let march = h.engine.get_impact_wallet(&h.user_id).unwrap();
    assert_eq!(march.current_month_spent, Money::from_pence(100));

    let result = complete_on(&h, "2026-04-02");
    assert_eq!(result.donations.len(), 1);

    let april = h.engine.get_impact_wallet(&h.user_id).unwrap();
    assert_eq!(april.current_month_spent, Money::from_pence(100));
    assert_eq!(april.month_start_date, date("2026-04-01"));
    assert_eq!(april.lifetime_donated, Money::from_pence(200));
}

#[test]
fn partial_outcome_counts_like_completion() {
    let h = harness("2026-03-10T08:00:00Z", SubscriptionTier::Pro, |_, _| {});
    let workout = h
        .engine
        .plan_workout(&h.user_id, date("2026-03-10"), "swim", 20)
        .unwrap();
    let result = h
        .engine
        .complete_workout(&h.user_id, &workout.id, WorkoutOutcome::Partial, None)
        .unwrap();
    assert_eq!(result.streak.current_streak, 1);
    assert_eq!(result.donations.len(), 1);
}

#[test]
fn same_day_concurrent_completions_keep_streak_stable() {
    let h = harness("2026-03-10T08:00:00Z", SubscriptionTier::Free, |_, _| {});
    let w1 = h
        .engine
        .plan_workout(&h.user_id, date("2026-03-10"), "run", 30)
        .unwrap();
    let w2 = h
        .engine
        .plan_workout(&h.user_id, date("2026-03-10"), "yoga", 20)
        .unwrap();

    let engine = Arc::new(h.engine);
    let user_id = h.user_id.clone();
    let handles: Vec<_> = [w1.id.clone(), w2.id.clone()]
        .into_iter()
        .map(|workout_id| {
            let engine = engine.clone();
            let user_id = user_id.clone();
            std::thread::spawn(move || {
                engine
                    .complete_workout(&user_id, &workout_id, WorkoutOutcome::Completed, None)
                    .unwrap()
            })
        })
        .collect();
    let results: Vec<_> = handles.into_iter().map(|t| t.join().unwrap()).collect();

    // Same local day: neither call sees a streak above one.
    assert!(results.iter().all(|r| r.streak.current_streak == 1));
    let streak = engine.get_streak(&user_id).unwrap();
    assert_eq!(streak.current_streak, 1);

    // One donation per completed workout, both inside the daily cap.
    let view = engine.get_impact_wallet(&user_id).unwrap();
    assert_eq!(view.today_donation_count, 2);
    assert_eq!(view.today_donated, Money::from_pence(200));
}

#[test]
fn daily_calls_then_missed_evening_retry() {
    let h = harness("2026-03-10T05:00:00Z", SubscriptionTier::Pro, |_, _| {});

    // Build some context first.
    for d in 4..=9 {
        complete_on(&h, &format!("2026-03-0{d}"));
    }

    h.clock.set(at("2026-03-10T05:00:00Z"));
    let calls = h
        .engine
        .schedule_daily_calls(&h.user_id, date("2026-03-10"))
        .unwrap();
    assert_eq!(calls.len(), 2);
    assert_eq!(h.jobs.pending().len(), 2);

    let evening = calls
        .iter()
        .find(|c| c.call_type == CallType::EveningReview)
        .unwrap();
    assert_eq!(evening.scheduled_at, at("2026-03-10T20:00:00Z"));

    // The evening call fires and rings out at 20:00.
    h.clock.set(at("2026-03-10T20:00:00Z"));
    let fired = h.jobs.drain_due(at("2026-03-10T20:00:00Z"));
    assert!(fired.iter().any(|j| j.job.call_id == evening.id));

    let retry = h
        .engine
        .handle_missed_call(&evening.id)
        .unwrap()
        .expect("retry scheduled");
    assert_eq!(retry.call_type, CallType::EveningReview);
    assert_eq!(retry.scheduled_at, at("2026-03-10T20:15:00Z"));
    assert_eq!(retry.context_snapshot, evening.context_snapshot);

    // The retry is answered and completes.
    h.clock.set(at("2026-03-10T20:15:00Z"));
    h.engine
        .update_call_status(&retry.id, CallStatus::InProgress, Default::default())
        .unwrap();
    let done = h
        .engine
        .update_call_status(&retry.id, CallStatus::Completed, Default::default())
        .unwrap();
    assert_eq!(done.status, CallStatus::Completed);
}

#[test]
fn manual_donation_ignores_caps_and_feeds_lifetime() {
    let h = harness(
        "2026-03-10T08:00:00Z",
        SubscriptionTier::Free,
        |db, user_id| {
            let mut wallet = db.get_wallet(user_id).unwrap().unwrap();
            wallet.current_month_spent = Money::from_pence(2000); // limit exhausted
            db.upsert_wallet(&wallet).unwrap();
        },
    );

    let donation = h
        .engine
        .award_manual(&h.user_id, Some(&h.charity_id), Money::from_pence(1000))
        .unwrap();
    assert_eq!(donation.donation_type, DonationType::Manual);

    let view = h.engine.get_impact_wallet(&h.user_id).unwrap();
    assert_eq!(view.lifetime_donated, Money::from_pence(1000));
    assert_eq!(view.current_month_spent, Money::from_pence(2000));
}

#[test]
fn cancelled_call_leaves_no_pending_job() {
    let h = harness("2026-03-10T05:00:00Z", SubscriptionTier::Pro, |_, _| {});
    let call = h
        .engine
        .schedule_call(
            &h.user_id,
            CallType::WeeklyPlanning,
            at("2026-03-12T09:00:00Z"),
            None,
        )
        .unwrap();
    assert_eq!(h.jobs.pending().len(), 1);

    let cancelled = h.engine.cancel_call(&call.id).unwrap();
    assert_eq!(cancelled.status, CallStatus::Cancelled);
    assert!(h.jobs.pending().is_empty());
    assert!(h.engine.upcoming_calls(10).unwrap().is_empty());
}
