//! Static achievement catalog and condition evaluation.

use chrono::{DateTime, Local, Timelike};
use serde::{Deserialize, Serialize};

use crate::progress::GamificationStats;
use crate::streak::StreakRecord;

/// Practice at or after this hour counts as night owl
const NIGHT_OWL_FROM_HOUR: u32 = 22;
/// Practice before this hour counts as early bird
const EARLY_BIRD_BEFORE_HOUR: u32 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum_macros::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AchievementCategory {
    Milestone,
    Streak,
    Speaking,
    Pronunciation,
    Practice,
    RolePlay,
    Level,
    Lessons,
    Special,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum AchievementCondition {
    FirstConversation,
    StreakLength(u32),
    WordsSpoken(u64),
    PerfectPronunciation(f64),
    PracticeTime(u64),
    RolePlayComplete(usize),
    Level(u32),
    LessonsCompleted(u64),
    NightOwl,
    EarlyBird,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Achievement {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub category: AchievementCategory,
    pub xp_reward: u64,
    pub condition: AchievementCondition,
}

macro_rules! achievement {
    ($id:literal, $name:literal, $desc:literal, $cat:ident, $xp:literal, $cond:expr) => {
        Achievement {
            id: $id,
            name: $name,
            description: $desc,
            category: AchievementCategory::$cat,
            xp_reward: $xp,
            condition: $cond,
        }
    };
}

use AchievementCondition as C;

pub static CATALOG: &[Achievement] = &[
    achievement!("first_conversation", "First Words", "Complete your first conversation", Milestone, 50, C::FirstConversation),
    achievement!("streak_3", "Warming Up", "Practice three days in a row", Streak, 50, C::StreakLength(3)),
    achievement!("streak_7", "Week Warrior", "Practice seven days in a row", Streak, 100, C::StreakLength(7)),
    achievement!("streak_30", "Unstoppable", "Practice thirty days in a row", Streak, 500, C::StreakLength(30)),
    achievement!("words_100", "Chatterbox", "Speak 100 words", Speaking, 50, C::WordsSpoken(100)),
    achievement!("words_1000", "Storyteller", "Speak 1,000 words", Speaking, 200, C::WordsSpoken(1_000)),
    achievement!("words_10000", "Orator", "Speak 10,000 words", Speaking, 1000, C::WordsSpoken(10_000)),
    achievement!("pronunciation_95", "Crystal Clear", "Score 95 or higher on pronunciation", Pronunciation, 150, C::PerfectPronunciation(95.0)),
    achievement!("pronunciation_100", "Native Ear", "Score a perfect 100 on pronunciation", Pronunciation, 300, C::PerfectPronunciation(100.0)),
    achievement!("practice_60", "Hour of Power", "Practice for 60 minutes in total", Practice, 100, C::PracticeTime(60)),
    achievement!("practice_600", "Dedicated Learner", "Practice for 10 hours in total", Practice, 500, C::PracticeTime(600)),
    achievement!("role_play_1", "Method Actor", "Complete a role-play scenario", RolePlay, 50, C::RolePlayComplete(1)),
    achievement!("role_play_5", "Many Faces", "Complete five different role-play scenarios", RolePlay, 200, C::RolePlayComplete(5)),
    achievement!("level_5", "Rising Voice", "Reach level 5", Level, 100, C::Level(5)),
    achievement!("level_10", "Fluent Speaker", "Reach level 10", Level, 300, C::Level(10)),
    achievement!("lessons_1", "First Lesson", "Complete a lesson", Lessons, 25, C::LessonsCompleted(1)),
    achievement!("lessons_10", "Study Habit", "Complete ten lessons", Lessons, 100, C::LessonsCompleted(10)),
    achievement!("lessons_50", "Scholar", "Complete fifty lessons", Lessons, 400, C::LessonsCompleted(50)),
    achievement!("night_owl", "Night Owl", "Practice after 10 PM", Special, 50, C::NightOwl),
    achievement!("early_bird", "Early Bird", "Practice before 7 AM", Special, 50, C::EarlyBird),
];

pub fn find(id: &str) -> Option<&'static Achievement> {
    CATALOG.iter().find(|a| a.id == id)
}

/// One-time unlock record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnlockedAchievement {
    pub achievement_id: String,
    pub unlocked_at: DateTime<Local>,
    pub xp_earned: u64,
}

/// Everything a condition may look at. `practiced_at` is the timestamp of the
/// practice event that triggered evaluation, if any.
#[derive(Debug, Clone, Copy)]
pub struct EvaluationContext<'a> {
    pub stats: &'a GamificationStats,
    pub streak: &'a StreakRecord,
    pub level: u32,
    pub practiced_at: Option<DateTime<Local>>,
}

impl AchievementCondition {
    pub fn is_met(&self, ctx: &EvaluationContext<'_>) -> bool {
        match *self {
            C::FirstConversation => ctx.stats.conversations_completed >= 1,
            C::StreakLength(days) => ctx.streak.current_streak >= days,
            C::WordsSpoken(words) => ctx.stats.total_words_spoken >= words,
            C::PerfectPronunciation(score) => ctx.stats.best_pronunciation_score >= score,
            C::PracticeTime(minutes) => ctx.stats.total_practice_minutes >= minutes,
            C::RolePlayComplete(count) => ctx.stats.role_plays_completed.len() >= count,
            C::Level(level) => ctx.level >= level,
            C::LessonsCompleted(count) => ctx.stats.lessons_completed >= count,
            C::NightOwl => ctx
                .practiced_at
                .is_some_and(|at| at.hour() >= NIGHT_OWL_FROM_HOUR),
            C::EarlyBird => ctx
                .practiced_at
                .is_some_and(|at| at.hour() < EARLY_BIRD_BEFORE_HOUR),
        }
    }

    /// `(current, target)` for conditions that count toward a number
    pub fn measure(&self, ctx: &EvaluationContext<'_>) -> Option<(f64, f64)> {
        match *self {
            C::FirstConversation => Some((ctx.stats.conversations_completed as f64, 1.0)),
            C::StreakLength(days) => Some((f64::from(ctx.streak.current_streak), f64::from(days))),
            C::WordsSpoken(words) => Some((ctx.stats.total_words_spoken as f64, words as f64)),
            C::PerfectPronunciation(score) => Some((ctx.stats.best_pronunciation_score, score)),
            C::PracticeTime(minutes) => {
                Some((ctx.stats.total_practice_minutes as f64, minutes as f64))
            }
            C::RolePlayComplete(count) => {
                Some((ctx.stats.role_plays_completed.len() as f64, count as f64))
            }
            C::Level(level) => Some((f64::from(ctx.level), f64::from(level))),
            C::LessonsCompleted(count) => Some((ctx.stats.lessons_completed as f64, count as f64)),
            C::NightOwl | C::EarlyBird => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AchievementProgress {
    pub achievement_id: &'static str,
    pub current_value: f64,
    pub target_value: f64,
    pub percentage: f64,
}

impl AchievementProgress {
    pub fn measure(achievement: &'static Achievement, ctx: &EvaluationContext<'_>) -> Option<Self> {
        let (current, target) = achievement.condition.measure(ctx)?;
        let percentage = if target > 0.0 {
            (current / target * 100.0).clamp(0.0, 100.0)
        } else {
            100.0
        };

        Some(Self {
            achievement_id: achievement.id,
            current_value: current,
            target_value: target,
            percentage,
        })
    }
}
