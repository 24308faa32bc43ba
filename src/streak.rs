//! Daily practice streak with a weekly freeze credit.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A used freeze becomes available again after this many days
pub const FREEZE_COOLDOWN_DAYS: i64 = 7;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StreakRecord {
    pub current_streak: u32,
    pub longest_streak: u32,
    pub last_practice_date: Option<NaiveDate>,
    pub freeze_available: bool,
    pub last_freeze_used: Option<NaiveDate>,
    pub today_practice_minutes: u32,
    /// Calendar day `today_practice_minutes` belongs to
    pub last_active_date: Option<NaiveDate>,
}

impl Default for StreakRecord {
    fn default() -> Self {
        Self {
            current_streak: 0,
            longest_streak: 0,
            last_practice_date: None,
            freeze_available: true,
            last_freeze_used: None,
            today_practice_minutes: 0,
            last_active_date: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreakUpdate {
    /// Today was already counted
    AlreadyCounted,
    /// Yesterday was a practice day; streak grew to the given length
    Extended(u32),
    /// No recent practice; a new streak of 1 began
    Started,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciliation {
    Unchanged,
    /// A single missed day was forgiven with the freeze
    FreezeConsumed,
    /// The streak of the given length was lost
    Broken(u32),
}

fn days_between(earlier: NaiveDate, later: NaiveDate) -> i64 {
    (later - earlier).num_days()
}

impl StreakRecord {
    /// Resets today's minutes the first time a new calendar day is seen.
    /// Returns true when a new day started.
    pub fn roll_over(&mut self, today: NaiveDate) -> bool {
        if self.last_active_date == Some(today) {
            return false;
        }
        self.today_practice_minutes = 0;
        self.last_active_date = Some(today);
        true
    }

    pub fn add_minutes(&mut self, today: NaiveDate, minutes: u32) -> u32 {
        self.roll_over(today);
        self.today_practice_minutes = self.today_practice_minutes.saturating_add(minutes);
        self.today_practice_minutes
    }

    /// Counts `today` as a practice day.
    pub fn record_practice_day(&mut self, today: NaiveDate) -> StreakUpdate {
        let update = match self.last_practice_date {
            Some(last) if last == today => return StreakUpdate::AlreadyCounted,
            Some(last) if days_between(last, today) == 1 => {
                self.current_streak = self.current_streak.saturating_add(1);
                StreakUpdate::Extended(self.current_streak)
            }
            _ => {
                self.current_streak = 1;
                StreakUpdate::Started
            }
        };

        self.longest_streak = self.longest_streak.max(self.current_streak);
        self.last_practice_date = Some(today);
        update
    }

    /// Session-start check against the calendar. Replenishes the freeze,
    /// forgives one missed day if it can, otherwise breaks a lapsed streak.
    pub fn reconcile(&mut self, today: NaiveDate) -> Reconciliation {
        self.replenish_freeze(today);
        self.roll_over(today);

        let Some(last) = self.last_practice_date else {
            return Reconciliation::Unchanged;
        };

        let gap = days_between(last, today);
        if gap < 2 || self.current_streak == 0 {
            return Reconciliation::Unchanged;
        }

        if gap == 2 && self.freeze_available {
            self.freeze_available = false;
            self.last_freeze_used = Some(today);
            // the forgiven day counts as practiced so today's session continues the run
            self.last_practice_date = today.pred_opt();
            return Reconciliation::FreezeConsumed;
        }

        let lost = self.current_streak;
        self.current_streak = 0;
        self.today_practice_minutes = 0;
        Reconciliation::Broken(lost)
    }

    /// Manual freeze use. No-op when none is available.
    pub fn use_freeze(&mut self, today: NaiveDate) -> bool {
        if !self.freeze_available {
            return false;
        }
        self.freeze_available = false;
        self.last_freeze_used = Some(today);
        true
    }

    pub fn replenish_freeze(&mut self, today: NaiveDate) -> bool {
        match self.last_freeze_used {
            Some(used) if !self.freeze_available && days_between(used, today) >= FREEZE_COOLDOWN_DAYS => {
                self.freeze_available = true;
                true
            }
            _ => false,
        }
    }

    /// Restores invariants on data read back from storage.
    pub fn repair(&mut self) {
        self.longest_streak = self.longest_streak.max(self.current_streak);
    }
}
