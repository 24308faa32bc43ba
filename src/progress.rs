//! Progression ledger: experience points, level, lifetime stats, streak and
//! achievement unlocks.
//!
//! Every mutation is a [`ProgressAction`] fed through [`apply`], a pure
//! function from the current [`ProgressState`] to the next one plus the side
//! effects the host cares about (new unlocks, XP grants). [`ProgressLedger`]
//! wraps that with the notification queue and logging.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, VecDeque};
use tracing::{debug, info};

use crate::achievements::{
    AchievementProgress, EvaluationContext, UnlockedAchievement, CATALOG,
};
use crate::streak::{Reconciliation, StreakRecord, StreakUpdate};

pub const LESSON_XP: u64 = 50;
pub const CONVERSATION_XP: u64 = 30;
pub const PERFECT_ANSWER_XP: u64 = 5;
pub const STREAK_BONUS_XP_PER_DAY: u64 = 10;
pub const DEFAULT_DAILY_MINIMUM_MINUTES: u32 = 5;

const XP_AUDIT_CAPACITY: usize = 50;

/// `floor(sqrt(xp / 100))`, exact over the whole `u64` range
pub fn level_for_xp(xp: u64) -> u32 {
    isqrt(xp / 100) as u32
}

/// XP at which `level` begins, saturating at `u64::MAX`
pub fn xp_for_level(level: u32) -> u64 {
    let level = u64::from(level);
    100u64.saturating_mul(level).saturating_mul(level)
}

fn isqrt(n: u64) -> u64 {
    // the float estimate is off by at most one near 2^64
    let mut root = (n as f64).sqrt() as u64;
    while u128::from(root) * u128::from(root) > u128::from(n) {
        root -= 1;
    }
    while u128::from(root + 1) * u128::from(root + 1) <= u128::from(n) {
        root += 1;
    }
    root
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GamificationStats {
    pub total_words_spoken: u64,
    pub total_practice_minutes: u64,
    pub lessons_completed: u64,
    pub conversations_completed: u64,
    pub role_plays_completed: BTreeSet<String>,
    pub best_pronunciation_score: f64,
    pub perfect_answers: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProgressState {
    pub xp: u64,
    pub level: u32,
    pub streak: StreakRecord,
    pub unlocked_achievements: Vec<UnlockedAchievement>,
    pub stats: GamificationStats,
}

impl ProgressState {
    pub fn is_unlocked(&self, achievement_id: &str) -> bool {
        self.unlocked_achievements
            .iter()
            .any(|u| u.achievement_id == achievement_id)
    }

    fn context(&self, practiced_at: Option<DateTime<Local>>) -> EvaluationContext<'_> {
        EvaluationContext {
            stats: &self.stats,
            streak: &self.streak,
            level: self.level,
            practiced_at,
        }
    }
}

/// Tunable rules for the ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerRules {
    /// Minutes of practice in a day before it counts toward the streak
    pub daily_minimum_minutes: u32,
}

impl Default for LedgerRules {
    fn default() -> Self {
        Self {
            daily_minimum_minutes: DEFAULT_DAILY_MINIMUM_MINUTES,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressAction {
    AddXp { amount: u64, source: String },
    RecordPracticeTime { minutes: u32 },
    CompleteLesson,
    CompleteConversation,
    RecordWordsSpoken { count: u64 },
    RecordPronunciationScore { score: u32 },
    CompleteRolePlay { scenario_id: String },
    RecordPerfectAnswer,
    UseStreakFreeze,
    CheckAchievements,
    /// Session start/resume calendar check
    ReconcileDay,
    Reset,
}

impl ProgressAction {
    /// Whether the action stands for the learner practicing at that moment
    fn is_practice(&self) -> bool {
        matches!(
            self,
            Self::RecordPracticeTime { .. }
                | Self::CompleteLesson
                | Self::CompleteConversation
                | Self::RecordWordsSpoken { .. }
                | Self::RecordPronunciationScore { .. }
                | Self::CompleteRolePlay { .. }
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct XpEvent {
    pub amount: u64,
    pub source: String,
    pub at: DateTime<Local>,
}

/// Result of one transition
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    pub state: ProgressState,
    pub newly_unlocked: Vec<UnlockedAchievement>,
    pub xp_events: Vec<XpEvent>,
    pub streak_update: Option<StreakUpdate>,
    pub reconciliation: Option<Reconciliation>,
}

struct Transition {
    state: ProgressState,
    at: DateTime<Local>,
    newly_unlocked: Vec<UnlockedAchievement>,
    xp_events: Vec<XpEvent>,
    streak_update: Option<StreakUpdate>,
    reconciliation: Option<Reconciliation>,
}

impl Transition {
    fn grant_xp(&mut self, amount: u64, source: impl Into<String>) {
        if amount == 0 {
            return;
        }
        self.state.xp = self.state.xp.saturating_add(amount);
        self.state.level = level_for_xp(self.state.xp);
        self.xp_events.push(XpEvent {
            amount,
            source: source.into(),
            at: self.at,
        });
    }

    /// Unlocks every satisfied catalog entry. Rewards can raise the level, so
    /// this repeats until nothing new qualifies.
    fn unlock_achievements(&mut self, practiced_at: Option<DateTime<Local>>) {
        loop {
            let ready: Vec<_> = {
                let ctx = self.state.context(practiced_at);
                CATALOG
                    .iter()
                    .filter(|a| !self.state.is_unlocked(a.id) && a.condition.is_met(&ctx))
                    .collect()
            };

            if ready.is_empty() {
                break;
            }

            for achievement in ready {
                let record = UnlockedAchievement {
                    achievement_id: achievement.id.to_string(),
                    unlocked_at: self.at,
                    xp_earned: achievement.xp_reward,
                };
                self.state.unlocked_achievements.push(record.clone());
                self.newly_unlocked.push(record);
                self.grant_xp(achievement.xp_reward, format!("achievement:{}", achievement.id));
            }
        }
    }

    fn record_practice_time(&mut self, minutes: u32, rules: &LedgerRules) {
        let today = self.at.date_naive();
        self.state.stats.total_practice_minutes = self
            .state
            .stats
            .total_practice_minutes
            .saturating_add(u64::from(minutes));
        let today_minutes = self.state.streak.add_minutes(today, minutes);

        if today_minutes >= rules.daily_minimum_minutes {
            let update = self.state.streak.record_practice_day(today);
            self.streak_update = Some(update);
            if update != StreakUpdate::AlreadyCounted {
                let bonus = STREAK_BONUS_XP_PER_DAY * u64::from(self.state.streak.current_streak);
                self.grant_xp(bonus, "streak_bonus");
            }
        }
    }

    fn finish(self) -> Outcome {
        Outcome {
            state: self.state,
            newly_unlocked: self.newly_unlocked,
            xp_events: self.xp_events,
            streak_update: self.streak_update,
            reconciliation: self.reconciliation,
        }
    }
}

/// Pure transition function for the ledger.
pub fn apply(
    state: &ProgressState,
    action: &ProgressAction,
    at: DateTime<Local>,
    rules: &LedgerRules,
) -> Outcome {
    let mut tx = Transition {
        state: state.clone(),
        at,
        newly_unlocked: Vec::new(),
        xp_events: Vec::new(),
        streak_update: None,
        reconciliation: None,
    };
    let practiced_at = action.is_practice().then_some(at);
    let today = at.date_naive();

    let evaluate = match action {
        ProgressAction::AddXp { amount, source } => {
            tx.grant_xp(*amount, source.as_str());
            false
        }
        ProgressAction::RecordPracticeTime { minutes } => {
            tx.record_practice_time(*minutes, rules);
            true
        }
        ProgressAction::CompleteLesson => {
            tx.state.stats.lessons_completed += 1;
            tx.grant_xp(LESSON_XP, "lesson");
            true
        }
        ProgressAction::CompleteConversation => {
            tx.state.stats.conversations_completed += 1;
            tx.grant_xp(CONVERSATION_XP, "conversation");
            true
        }
        ProgressAction::RecordWordsSpoken { count } => {
            let stats = &mut tx.state.stats;
            stats.total_words_spoken = stats.total_words_spoken.saturating_add(*count);
            true
        }
        ProgressAction::RecordPronunciationScore { score } => {
            let stats = &mut tx.state.stats;
            stats.best_pronunciation_score = stats.best_pronunciation_score.max(f64::from(*score));
            true
        }
        ProgressAction::CompleteRolePlay { scenario_id } => tx
            .state
            .stats
            .role_plays_completed
            .insert(scenario_id.clone()),
        ProgressAction::RecordPerfectAnswer => {
            tx.state.stats.perfect_answers += 1;
            tx.grant_xp(PERFECT_ANSWER_XP, "perfect_answer");
            false
        }
        ProgressAction::UseStreakFreeze => {
            tx.state.streak.use_freeze(today);
            false
        }
        ProgressAction::CheckAchievements => true,
        ProgressAction::ReconcileDay => {
            tx.reconciliation = Some(tx.state.streak.reconcile(today));
            false
        }
        ProgressAction::Reset => {
            tx.state = ProgressState::default();
            false
        }
    };

    if evaluate {
        tx.unlock_achievements(practiced_at);
    }

    tx.finish()
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelProgress {
    pub level: u32,
    pub xp_into_level: u64,
    pub xp_for_next_level: u64,
    pub fraction: f64,
}

impl LevelProgress {
    pub fn for_xp(xp: u64) -> Self {
        let level = level_for_xp(xp);
        let floor = xp_for_level(level);
        let span = xp_for_level(level + 1).saturating_sub(floor);
        let xp_into_level = xp.saturating_sub(floor);
        let fraction = if span == 0 {
            1.0
        } else {
            (xp_into_level as f64 / span as f64).min(1.0)
        };

        Self {
            level,
            xp_into_level,
            xp_for_next_level: span,
            fraction,
        }
    }
}

/// The ledger owned by a session
#[derive(Debug, Clone, Default)]
pub struct ProgressLedger {
    state: ProgressState,
    rules: LedgerRules,
    pending: Vec<UnlockedAchievement>,
    recent_xp: VecDeque<XpEvent>,
}

impl ProgressLedger {
    pub fn new(rules: LedgerRules) -> Self {
        Self {
            rules,
            ..Default::default()
        }
    }

    pub fn from_state(state: ProgressState, rules: LedgerRules) -> Self {
        Self {
            state,
            rules,
            ..Default::default()
        }
    }

    /// Applies `action` as of `at` and returns the achievements it unlocked.
    pub fn dispatch_at(
        &mut self,
        action: ProgressAction,
        at: DateTime<Local>,
    ) -> Vec<UnlockedAchievement> {
        let level_before = self.state.level;
        let streak_before = self.state.streak.current_streak;
        let outcome = apply(&self.state, &action, at, &self.rules);

        debug!(?action, xp = outcome.state.xp, level = outcome.state.level, "progress transition");

        if outcome.state.level > level_before {
            info!(from = level_before, to = outcome.state.level, "level up");
        }
        match outcome.reconciliation {
            Some(Reconciliation::FreezeConsumed) => {
                info!(streak = streak_before, "missed day covered by streak freeze")
            }
            Some(Reconciliation::Broken(lost)) => info!(lost, "streak broken"),
            _ => {}
        }
        if let Some(StreakUpdate::Extended(days)) = outcome.streak_update {
            info!(days, "streak extended");
        }
        for unlocked in &outcome.newly_unlocked {
            info!(
                achievement = %unlocked.achievement_id,
                xp = unlocked.xp_earned,
                "achievement unlocked"
            );
        }

        for event in outcome.xp_events {
            self.recent_xp.push_back(event);
            while self.recent_xp.len() > XP_AUDIT_CAPACITY {
                self.recent_xp.pop_front();
            }
        }

        if matches!(action, ProgressAction::Reset) {
            self.pending.clear();
            self.recent_xp.clear();
        }

        self.state = outcome.state;
        self.pending.extend(outcome.newly_unlocked.iter().cloned());
        outcome.newly_unlocked
    }

    pub fn dispatch(&mut self, action: ProgressAction) -> Vec<UnlockedAchievement> {
        self.dispatch_at(action, Local::now())
    }

    pub fn add_xp(&mut self, amount: u64, source: &str) {
        self.dispatch(ProgressAction::AddXp {
            amount,
            source: source.to_string(),
        });
    }

    pub fn record_practice_time(&mut self, minutes: u32) {
        self.dispatch(ProgressAction::RecordPracticeTime { minutes });
    }

    pub fn complete_lesson(&mut self) {
        self.dispatch(ProgressAction::CompleteLesson);
    }

    pub fn complete_conversation(&mut self) {
        self.dispatch(ProgressAction::CompleteConversation);
    }

    pub fn record_words_spoken(&mut self, count: u64) {
        self.dispatch(ProgressAction::RecordWordsSpoken { count });
    }

    pub fn record_pronunciation_score(&mut self, score: u32) {
        self.dispatch(ProgressAction::RecordPronunciationScore { score });
    }

    pub fn complete_role_play(&mut self, scenario_id: &str) {
        self.dispatch(ProgressAction::CompleteRolePlay {
            scenario_id: scenario_id.to_string(),
        });
    }

    pub fn record_perfect_answer(&mut self) {
        self.dispatch(ProgressAction::RecordPerfectAnswer);
    }

    pub fn use_streak_freeze(&mut self) {
        self.dispatch(ProgressAction::UseStreakFreeze);
    }

    pub fn check_and_unlock_achievements(&mut self) -> Vec<UnlockedAchievement> {
        self.dispatch(ProgressAction::CheckAchievements)
    }

    pub fn reconcile_day(&mut self) {
        self.dispatch(ProgressAction::ReconcileDay);
    }

    pub fn reset(&mut self) {
        self.dispatch(ProgressAction::Reset);
    }

    pub fn state(&self) -> &ProgressState {
        &self.state
    }

    pub fn rules(&self) -> &LedgerRules {
        &self.rules
    }

    pub fn xp(&self) -> u64 {
        self.state.xp
    }

    pub fn level(&self) -> u32 {
        self.state.level
    }

    pub fn streak(&self) -> &StreakRecord {
        &self.state.streak
    }

    pub fn stats(&self) -> &GamificationStats {
        &self.state.stats
    }

    pub fn unlocked_achievements(&self) -> &[UnlockedAchievement] {
        &self.state.unlocked_achievements
    }

    pub fn unlocked_achievement_ids(&self) -> Vec<&str> {
        self.state
            .unlocked_achievements
            .iter()
            .map(|u| u.achievement_id.as_str())
            .collect()
    }

    pub fn is_unlocked(&self, achievement_id: &str) -> bool {
        self.state.is_unlocked(achievement_id)
    }

    /// Unlocks waiting to be shown to the learner
    pub fn pending_achievements(&self) -> &[UnlockedAchievement] {
        &self.pending
    }

    /// Hands the notification queue to the host and empties it.
    pub fn drain_pending_achievements(&mut self) -> Vec<UnlockedAchievement> {
        std::mem::take(&mut self.pending)
    }

    pub fn recent_xp_events(&self) -> impl Iterator<Item = &XpEvent> {
        self.recent_xp.iter()
    }

    pub fn level_progress(&self) -> LevelProgress {
        LevelProgress::for_xp(self.state.xp)
    }

    /// Progress toward each locked achievement that has a numeric target
    pub fn achievement_progress(&self) -> Vec<AchievementProgress> {
        let ctx = self.state.context(None);
        CATALOG
            .iter()
            .filter(|a| !self.state.is_unlocked(a.id))
            .filter_map(|a| AchievementProgress::measure(a, &ctx))
            .collect()
    }
}
