//! Consecutive-day workout streak tracking.
//!
//! The streak row is mutated only through [`Streak::apply_completion`] and
//! [`Streak::apply_skip`]; persistence wraps these pure transitions. The
//! longest streak is a high-water mark -- it never decreases, and it is only
//! rewritten when the current streak exceeds it.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Streak lengths that pay a one-time milestone bonus, ascending.
pub const MILESTONES: [u32; 3] = [7, 30, 90];

/// Per-user streak state. Created lazily on first completion, never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Streak {
    pub user_id: String,
    pub current_streak: u32,
    pub current_streak_start: Option<NaiveDate>,
    pub longest_streak: u32,
    pub longest_streak_start: Option<NaiveDate>,
    pub longest_streak_end: Option<NaiveDate>,
    pub last_workout_date: Option<NaiveDate>,
    pub bonus_7_day_claimed: bool,
    pub bonus_30_day_claimed: bool,
    pub bonus_90_day_claimed: bool,
}

/// What a completion did to the streak.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreakChange {
    /// First recorded completion for this user.
    Started,
    /// Repeat completion on an already-counted day; no increment.
    SameDay,
    /// Consecutive day; streak grew by one.
    Extended,
    /// Gap of two or more days (or a backdate); streak restarted at one.
    Reset,
}

impl Streak {
    /// Fresh zeroed row for a user with no workout history.
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            current_streak: 0,
            current_streak_start: None,
            longest_streak: 0,
            longest_streak_start: None,
            longest_streak_end: None,
            last_workout_date: None,
            bonus_7_day_claimed: false,
            bonus_30_day_claimed: false,
            bonus_90_day_claimed: false,
        }
    }

    /// Record a completion on `workout_day` (already day-truncated in the
    /// user's timezone).
    ///
    /// Same-day repeats are idempotent; a one-day step extends; anything
    /// else -- including a backdate before `last_workout_date` -- restarts
    /// the streak at one (most-recent-date-wins).
    pub fn apply_completion(&mut self, workout_day: NaiveDate) -> StreakChange {
        let change = match self.last_workout_date {
            None => {
                self.current_streak = 1;
                self.current_streak_start = Some(workout_day);
                StreakChange::Started
            }
            Some(last) => match (workout_day - last).num_days() {
                0 => StreakChange::SameDay,
                1 => {
                    self.current_streak += 1;
                    StreakChange::Extended
                }
                _ => {
                    self.current_streak = 1;
                    self.current_streak_start = Some(workout_day);
                    StreakChange::Reset
                }
            },
        };

        if self.current_streak > self.longest_streak {
            self.longest_streak = self.current_streak;
            self.longest_streak_start = self.current_streak_start;
            self.longest_streak_end = None;
        }

        self.last_workout_date = Some(workout_day);
        change
    }

    /// A skipped workout zeroes the current streak. The longest streak and
    /// `last_workout_date` are untouched.
    pub fn apply_skip(&mut self) {
        self.current_streak = 0;
        self.current_streak_start = None;
    }

    pub fn milestone_claimed(&self, days: u32) -> bool {
        match days {
            7 => self.bonus_7_day_claimed,
            30 => self.bonus_30_day_claimed,
            90 => self.bonus_90_day_claimed,
            _ => false,
        }
    }

    /// Claim flags are monotonic: set once, never cleared.
    pub fn claim_milestone(&mut self, days: u32) {
        match days {
            7 => self.bonus_7_day_claimed = true,
            30 => self.bonus_30_day_claimed = true,
            90 => self.bonus_90_day_claimed = true,
            _ => {}
        }
    }

    /// The milestone the current streak has just landed on, if its bonus is
    /// still unclaimed. Streaks grow one day at a time, so at most one
    /// threshold can be newly reached per completion.
    pub fn unclaimed_milestone_reached(&self) -> Option<u32> {
        MILESTONES
            .into_iter()
            .find(|&m| self.current_streak == m && !self.milestone_claimed(m))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, d).unwrap()
    }

    #[test]
    fn consecutive_days_count_run_length() {
        let mut streak = Streak::new("u1");
        for d in 1..=6 {
            streak.apply_completion(day(d));
        }
        assert_eq!(streak.current_streak, 6);
        assert_eq!(streak.current_streak_start, Some(day(1)));
        assert_eq!(streak.last_workout_date, Some(day(6)));
    }

    #[test]
    fn same_day_completion_is_idempotent() {
        let mut streak = Streak::new("u1");
        streak.apply_completion(day(1));
        streak.apply_completion(day(2));
        assert_eq!(streak.apply_completion(day(2)), StreakChange::SameDay);
        assert_eq!(streak.current_streak, 2);
    }

    #[test]
    fn gap_of_two_days_resets_to_one() {
        let mut streak = Streak::new("u1");
        streak.apply_completion(day(1));
        streak.apply_completion(day(2));
        assert_eq!(streak.apply_completion(day(5)), StreakChange::Reset);
        assert_eq!(streak.current_streak, 1);
        assert_eq!(streak.current_streak_start, Some(day(5)));
    }

    #[test]
    fn backdated_completion_resets() {
        // Most-recent-date-wins: a completion logged for an earlier date
        // restarts the streak from that date.
        let mut streak = Streak::new("u1");
        streak.apply_completion(day(10));
        assert_eq!(streak.apply_completion(day(8)), StreakChange::Reset);
        assert_eq!(streak.current_streak, 1);
        assert_eq!(streak.last_workout_date, Some(day(8)));
    }

    #[test]
    fn longest_streak_is_high_water_mark() {
        let mut streak = Streak::new("u1");
        for d in 1..=4 {
            streak.apply_completion(day(d));
        }
        assert_eq!(streak.longest_streak, 4);
        assert_eq!(streak.longest_streak_start, Some(day(1)));

        streak.apply_completion(day(10)); // reset to 1
        assert_eq!(streak.longest_streak, 4);
        assert_eq!(streak.longest_streak_start, Some(day(1)));

        for d in 11..=14 {
            streak.apply_completion(day(d));
        }
        assert_eq!(streak.current_streak, 5);
        assert_eq!(streak.longest_streak, 5);
        assert_eq!(streak.longest_streak_start, Some(day(10)));
    }

    #[test]
    fn skip_zeroes_current_but_not_longest() {
        let mut streak = Streak::new("u1");
        for d in 1..=3 {
            streak.apply_completion(day(d));
        }
        streak.apply_skip();
        assert_eq!(streak.current_streak, 0);
        assert_eq!(streak.current_streak_start, None);
        assert_eq!(streak.longest_streak, 3);
        assert_eq!(streak.last_workout_date, Some(day(3)));
    }

    #[test]
    fn milestone_reached_only_on_exact_threshold() {
        let mut streak = Streak::new("u1");
        for d in 1..=6 {
            streak.apply_completion(day(d));
        }
        assert_eq!(streak.unclaimed_milestone_reached(), None);

        streak.apply_completion(day(7));
        assert_eq!(streak.unclaimed_milestone_reached(), Some(7));

        streak.claim_milestone(7);
        assert_eq!(streak.unclaimed_milestone_reached(), None);
        assert!(streak.milestone_claimed(7));
        assert!(!streak.milestone_claimed(30));
    }

    #[test]
    fn claimed_milestone_does_not_retrigger_after_reset() {
        let mut streak = Streak::new("u1");
        for d in 1..=7 {
            streak.apply_completion(day(d));
        }
        streak.claim_milestone(7);

        streak.apply_skip();
        for d in 10..=16 {
            streak.apply_completion(day(d));
        }
        assert_eq!(streak.current_streak, 7);
        assert_eq!(streak.unclaimed_milestone_reached(), None);
    }
}
