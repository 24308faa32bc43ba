//! Persisted layout of both engines and the lenient reload path.
//!
//! Each engine is stored as one JSON record under a fixed key. Reading never
//! fails: a missing, unreadable or corrupt record falls back to defaults, and
//! a readable one is repaired so the in-memory invariants hold again.

use serde::Serialize;
use std::collections::HashSet;
use tracing::{debug, warn};

use crate::achievements;
use crate::difficulty::{DifficultyLevel, DifficultyState};
use crate::error::Result;
use crate::progress::{level_for_xp, ProgressState};
use crate::store::SnapshotStore;

pub const DIFFICULTY_KEY: &str = "speakwell.difficulty.v1";
pub const PROGRESS_KEY: &str = "speakwell.progress.v1";

pub fn encode<T: Serialize>(value: &T) -> Result<String> {
    Ok(serde_json::to_string(value)?)
}

pub fn decode_difficulty(raw: &str) -> Option<DifficultyState> {
    match serde_json::from_str::<DifficultyState>(raw) {
        Ok(mut state) => {
            state.difficulty_level = DifficultyLevel::new(state.difficulty_level.get());
            state.performance_history.enforce_capacity();
            Some(state)
        }
        Err(err) => {
            warn!(error = %err, "discarding corrupt difficulty snapshot");
            None
        }
    }
}

pub fn decode_progress(raw: &str) -> Option<ProgressState> {
    match serde_json::from_str::<ProgressState>(raw) {
        Ok(mut state) => {
            repair_progress(&mut state);
            Some(state)
        }
        Err(err) => {
            warn!(error = %err, "discarding corrupt progress snapshot");
            None
        }
    }
}

fn repair_progress(state: &mut ProgressState) {
    state.level = level_for_xp(state.xp);
    state.streak.repair();

    let mut seen = HashSet::new();
    state.unlocked_achievements.retain(|u| {
        achievements::find(&u.achievement_id).is_some() && seen.insert(u.achievement_id.clone())
    });
}

fn load_raw(store: &dyn SnapshotStore, key: &str) -> Option<String> {
    match store.load(key) {
        Ok(raw) => raw,
        Err(err) => {
            warn!(key, error = %err, "snapshot read failed, starting from defaults");
            None
        }
    }
}

pub fn load_difficulty(store: &dyn SnapshotStore) -> DifficultyState {
    let state = load_raw(store, DIFFICULTY_KEY)
        .and_then(|raw| decode_difficulty(&raw))
        .unwrap_or_default();
    debug!(level = state.difficulty_level.get(), "difficulty snapshot loaded");
    state
}

pub fn load_progress(store: &dyn SnapshotStore) -> ProgressState {
    let state = load_raw(store, PROGRESS_KEY)
        .and_then(|raw| decode_progress(&raw))
        .unwrap_or_default();
    debug!(xp = state.xp, level = state.level, "progress snapshot loaded");
    state
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::difficulty::{PerformanceSample, HISTORY_CAPACITY};
    use crate::store::MemoryStore;

    #[test]
    fn missing_snapshots_load_defaults() {
        let store = MemoryStore::new();
        assert_eq!(load_difficulty(&store), DifficultyState::default());
        assert_eq!(load_progress(&store), ProgressState::default());
    }

    #[test]
    fn corrupt_snapshots_load_defaults() {
        let store = MemoryStore::new();
        store.insert(DIFFICULTY_KEY, "{{{");
        store.insert(PROGRESS_KEY, r#"{"xp": "lots"}"#);
        assert_eq!(load_difficulty(&store), DifficultyState::default());
        assert_eq!(load_progress(&store), ProgressState::default());
    }

    #[test]
    fn persisted_layout_uses_documented_field_names() {
        let mut state = DifficultyState::default();
        state
            .performance_history
            .push(&PerformanceSample::scores(80.0, 70.0, 60.0));
        let json: serde_json::Value = serde_json::from_str(&encode(&state).unwrap()).unwrap();
        assert_eq!(json["difficultyLevel"], 5);
        assert_eq!(json["performanceHistory"]["pronunciation"][0], 80.0);

        let json: serde_json::Value =
            serde_json::from_str(&encode(&ProgressState::default()).unwrap()).unwrap();
        for field in ["xp", "level", "streak", "unlockedAchievements", "stats"] {
            assert!(json.get(field).is_some(), "missing {field}");
        }
    }

    #[test]
    fn out_of_range_difficulty_is_clamped() {
        let raw = r#"{"difficultyLevel": 42, "performanceHistory": {"pronunciation": [1,2,3,4,5,6,7,8,9,10,11,12]}}"#;
        let state = decode_difficulty(raw).unwrap();
        assert_eq!(state.difficulty_level.get(), 10);
        assert_eq!(state.performance_history.pronunciation.len(), HISTORY_CAPACITY);
        assert_eq!(state.performance_history.pronunciation.front(), Some(&3.0));
    }

    #[test]
    fn inconsistent_progress_is_repaired() {
        let raw = r#"{
            "xp": 2500,
            "level": 1,
            "streak": {"currentStreak": 4, "longestStreak": 2},
            "unlockedAchievements": [
                {"achievementId": "lessons_1", "unlockedAt": "2024-05-01T10:00:00+00:00", "xpEarned": 25},
                {"achievementId": "lessons_1", "unlockedAt": "2024-05-02T10:00:00+00:00", "xpEarned": 25},
                {"achievementId": "retired_badge", "unlockedAt": "2024-05-02T10:00:00+00:00", "xpEarned": 5}
            ]
        }"#;
        let state = decode_progress(raw).unwrap();
        assert_eq!(state.level, 5);
        assert_eq!(state.streak.longest_streak, 4);
        assert!(state.streak.freeze_available);
        assert_eq!(state.unlocked_achievements.len(), 1);
        assert_eq!(state.unlocked_achievements[0].achievement_id, "lessons_1");
    }
}
