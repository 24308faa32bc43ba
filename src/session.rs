//! The host-facing session: both engines plus the snapshot writer, built once
//! at startup and passed to whatever needs it.

use chrono::{DateTime, Local};
use serde::Serialize;
use tracing::{debug, warn};

use crate::achievements::UnlockedAchievement;
use crate::difficulty::{
    Adjustment, DifficultyAction, DifficultyController, DifficultySettings, PerformanceSample,
    TrendReport,
};
use crate::persistence::SnapshotWriter;
use crate::progress::{LedgerRules, ProgressAction, ProgressLedger};
use crate::snapshot::{self, DIFFICULTY_KEY, PROGRESS_KEY};
use crate::store::SnapshotStore;

pub struct Session {
    difficulty: DifficultyController,
    ledger: ProgressLedger,
    writer: Option<SnapshotWriter>,
}

impl Session {
    /// Loads both snapshots from `store` and hands the store to a background
    /// writer. Missing or corrupt snapshots start from defaults.
    pub fn open<S: SnapshotStore>(store: S, rules: LedgerRules) -> Self {
        let difficulty = snapshot::load_difficulty(&store);
        let progress = snapshot::load_progress(&store);

        Self {
            difficulty: DifficultyController::from_state(difficulty),
            ledger: ProgressLedger::from_state(progress, rules),
            writer: Some(SnapshotWriter::spawn(store)),
        }
    }

    /// Session without durable storage
    pub fn ephemeral(rules: LedgerRules) -> Self {
        Self {
            difficulty: DifficultyController::new(),
            ledger: ProgressLedger::new(rules),
            writer: None,
        }
    }

    pub fn difficulty(&self) -> &DifficultyController {
        &self.difficulty
    }

    pub fn ledger(&self) -> &ProgressLedger {
        &self.ledger
    }

    /// Run on start and on resume: applies the calendar-day boundary rules.
    pub fn start_day(&mut self) {
        self.start_day_at(Local::now());
    }

    pub fn start_day_at(&mut self, at: DateTime<Local>) {
        self.dispatch_progress_at(ProgressAction::ReconcileDay, at);
    }

    pub fn dispatch_difficulty(&mut self, action: DifficultyAction) -> Adjustment {
        let adjustment = self.difficulty.dispatch(action);
        self.persist_difficulty();
        adjustment
    }

    pub fn dispatch_progress(&mut self, action: ProgressAction) -> Vec<UnlockedAchievement> {
        self.dispatch_progress_at(action, Local::now())
    }

    pub fn dispatch_progress_at(
        &mut self,
        action: ProgressAction,
        at: DateTime<Local>,
    ) -> Vec<UnlockedAchievement> {
        let unlocked = self.ledger.dispatch_at(action, at);
        self.persist_progress();
        unlocked
    }

    pub fn record_sample(&mut self, sample: PerformanceSample) -> Adjustment {
        self.dispatch_difficulty(DifficultyAction::RecordSample(sample))
    }

    pub fn current_settings(&self) -> DifficultySettings {
        self.difficulty.current_settings()
    }

    pub fn current_trend(&self) -> TrendReport {
        self.difficulty.current_trend()
    }

    pub fn add_xp(&mut self, amount: u64, source: &str) {
        self.dispatch_progress(ProgressAction::AddXp {
            amount,
            source: source.to_string(),
        });
    }

    pub fn record_practice_time(&mut self, minutes: u32) -> Vec<UnlockedAchievement> {
        self.dispatch_progress(ProgressAction::RecordPracticeTime { minutes })
    }

    pub fn complete_lesson(&mut self) -> Vec<UnlockedAchievement> {
        self.dispatch_progress(ProgressAction::CompleteLesson)
    }

    pub fn complete_conversation(&mut self) -> Vec<UnlockedAchievement> {
        self.dispatch_progress(ProgressAction::CompleteConversation)
    }

    pub fn record_words_spoken(&mut self, count: u64) -> Vec<UnlockedAchievement> {
        self.dispatch_progress(ProgressAction::RecordWordsSpoken { count })
    }

    pub fn record_pronunciation_score(&mut self, score: u32) -> Vec<UnlockedAchievement> {
        self.dispatch_progress(ProgressAction::RecordPronunciationScore { score })
    }

    pub fn complete_role_play(&mut self, scenario_id: &str) -> Vec<UnlockedAchievement> {
        self.dispatch_progress(ProgressAction::CompleteRolePlay {
            scenario_id: scenario_id.to_string(),
        })
    }

    pub fn record_perfect_answer(&mut self) {
        self.dispatch_progress(ProgressAction::RecordPerfectAnswer);
    }

    pub fn use_streak_freeze(&mut self) {
        self.dispatch_progress(ProgressAction::UseStreakFreeze);
    }

    pub fn check_and_unlock_achievements(&mut self) -> Vec<UnlockedAchievement> {
        self.dispatch_progress(ProgressAction::CheckAchievements)
    }

    /// The notification queue is transient; draining it does not write.
    pub fn drain_pending_achievements(&mut self) -> Vec<UnlockedAchievement> {
        self.ledger.drain_pending_achievements()
    }

    /// Back to defaults for both engines, persisted.
    pub fn reset(&mut self) {
        self.difficulty.reset();
        self.ledger.reset();
        self.persist_difficulty();
        self.persist_progress();
    }

    /// Waits for queued writes. Failures are logged, never returned.
    pub fn flush(&self) {
        if let Some(writer) = &self.writer {
            if let Err(err) = writer.flush() {
                warn!(error = %err, "snapshot flush failed");
            }
        }
    }

    /// Flushes and stops the writer.
    pub fn close(mut self) {
        self.flush();
        self.writer.take();
    }

    pub fn report(&self) -> SessionReport {
        SessionReport::from(self)
    }

    fn persist_difficulty(&self) {
        self.persist(DIFFICULTY_KEY, self.difficulty.state());
    }

    fn persist_progress(&self) {
        self.persist(PROGRESS_KEY, self.ledger.state());
    }

    fn persist<T: Serialize>(&self, key: &str, value: &T) {
        let Some(writer) = &self.writer else {
            return;
        };
        match snapshot::encode(value) {
            Ok(json) => {
                debug!(key, "queueing snapshot");
                writer.enqueue(key, json);
            }
            Err(err) => warn!(key, error = %err, "snapshot encoding failed"),
        }
    }
}

/// Read-only view for rendering progress
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionReport {
    pub difficulty_level: u8,
    pub settings: DifficultySettings,
    pub trend: TrendReport,
    pub xp: u64,
    pub level: u32,
    pub level_progress: crate::progress::LevelProgress,
    pub streak: crate::streak::StreakRecord,
    pub stats: crate::progress::GamificationStats,
    pub unlocked_achievements: Vec<String>,
}

impl From<&Session> for SessionReport {
    fn from(session: &Session) -> Self {
        let ledger = session.ledger();
        Self {
            difficulty_level: session.difficulty().level().get(),
            settings: session.current_settings(),
            trend: session.current_trend(),
            xp: ledger.xp(),
            level: ledger.level(),
            level_progress: ledger.level_progress(),
            streak: ledger.streak().clone(),
            stats: ledger.stats().clone(),
            unlocked_achievements: ledger
                .unlocked_achievement_ids()
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}
