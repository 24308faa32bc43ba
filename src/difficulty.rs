//! Adaptive difficulty: a rolling window of performance samples drives a
//! 1-10 difficulty level, and the level alone determines the content settings
//! handed to the tutoring service.

use itertools::izip;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::{debug, info};

use crate::util::{mean, weighted_mean};

/// Most recent values kept per metric
pub const HISTORY_CAPACITY: usize = 10;

pub const MIN_LEVEL: u8 = 1;
pub const MAX_LEVEL: u8 = 10;
pub const DEFAULT_LEVEL: u8 = 5;

const RAISE_THRESHOLD: f64 = 85.0;
const LOWER_THRESHOLD: f64 = 60.0;
const RAISE_MIN_SAMPLES: usize = 3;
const LOWER_MIN_SAMPLES: usize = 2;
const RECENT_WINDOW: usize = 3;
const TREND_MARGIN: f64 = 5.0;
const RECENCY_BASE: f64 = 1.2;

/// One observation from a practice turn. Absent fields leave that metric's
/// history untouched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceSample {
    pub pronunciation: Option<f64>,
    pub fluency: Option<f64>,
    pub grammar: Option<f64>,
    pub response_time_ms: Option<f64>,
}

impl PerformanceSample {
    /// Sample carrying the three scored metrics
    pub fn scores(pronunciation: f64, fluency: f64, grammar: f64) -> Self {
        Self {
            pronunciation: Some(pronunciation),
            fluency: Some(fluency),
            grammar: Some(grammar),
            response_time_ms: None,
        }
    }

    pub fn with_response_time(mut self, ms: f64) -> Self {
        self.response_time_ms = Some(ms);
        self
    }
}

/// Four independent FIFO windows, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PerformanceHistory {
    pub pronunciation: VecDeque<f64>,
    pub fluency: VecDeque<f64>,
    pub grammar: VecDeque<f64>,
    pub response_time: VecDeque<f64>,
}

fn push_bounded(window: &mut VecDeque<f64>, value: f64) {
    window.push_back(value);
    truncate_to_recent(window);
}

fn truncate_to_recent(window: &mut VecDeque<f64>) {
    while window.len() > HISTORY_CAPACITY {
        window.pop_front();
    }
}

impl PerformanceHistory {
    pub fn push(&mut self, sample: &PerformanceSample) {
        if let Some(v) = sample.pronunciation {
            push_bounded(&mut self.pronunciation, v);
        }
        if let Some(v) = sample.fluency {
            push_bounded(&mut self.fluency, v);
        }
        if let Some(v) = sample.grammar {
            push_bounded(&mut self.grammar, v);
        }
        if let Some(v) = sample.response_time_ms {
            push_bounded(&mut self.response_time, v);
        }
    }

    /// Number of aligned (pronunciation, fluency, grammar) triples
    pub fn aligned_len(&self) -> usize {
        self.pronunciation
            .len()
            .min(self.fluency.len())
            .min(self.grammar.len())
    }

    /// Per-turn composite scores in chronological order. The three windows are
    /// aligned on their most recent entries.
    pub fn composite_scores(&self) -> Vec<f64> {
        let n = self.aligned_len();
        izip!(
            self.pronunciation.iter().skip(self.pronunciation.len() - n),
            self.fluency.iter().skip(self.fluency.len() - n),
            self.grammar.iter().skip(self.grammar.len() - n)
        )
        .map(|(p, f, g)| (p + f + g) / 3.0)
        .collect()
    }

    /// Drops anything older than the capacity; used when loading stored data.
    pub fn enforce_capacity(&mut self) {
        truncate_to_recent(&mut self.pronunciation);
        truncate_to_recent(&mut self.fluency);
        truncate_to_recent(&mut self.grammar);
        truncate_to_recent(&mut self.response_time);
    }
}

/// Difficulty level, always within `MIN_LEVEL..=MAX_LEVEL`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DifficultyLevel(u8);

impl DifficultyLevel {
    pub fn new(level: u8) -> Self {
        Self(level.clamp(MIN_LEVEL, MAX_LEVEL))
    }

    pub fn get(self) -> u8 {
        self.0
    }

    fn raised(self) -> Self {
        Self::new(self.0.saturating_add(1))
    }

    fn lowered(self) -> Self {
        Self::new(self.0.saturating_sub(1))
    }
}

impl Default for DifficultyLevel {
    fn default() -> Self {
        Self(DEFAULT_LEVEL)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum_macros::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum VocabularyComplexity {
    Basic,
    Intermediate,
    Advanced,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum_macros::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SentenceComplexity {
    Simple,
    Moderate,
    Complex,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum_macros::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TopicComplexity {
    Everyday,
    Conversational,
    Professional,
}

/// Content-generation parameters derived from a level
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DifficultySettings {
    pub speech_speed: f64,
    pub vocabulary_complexity: VocabularyComplexity,
    pub sentence_complexity: SentenceComplexity,
    pub topic_complexity: TopicComplexity,
}

impl From<DifficultyLevel> for DifficultySettings {
    fn from(level: DifficultyLevel) -> Self {
        let l = level.get();
        let speech_speed = (0.7 + f64::from(l - 1) * 0.033).min(1.0);

        let (vocabulary_complexity, sentence_complexity, topic_complexity) = match l {
            1..=3 => (
                VocabularyComplexity::Basic,
                SentenceComplexity::Simple,
                TopicComplexity::Everyday,
            ),
            4..=6 => (
                VocabularyComplexity::Intermediate,
                SentenceComplexity::Moderate,
                TopicComplexity::Conversational,
            ),
            _ => (
                VocabularyComplexity::Advanced,
                SentenceComplexity::Complex,
                TopicComplexity::Professional,
            ),
        };

        Self {
            speech_speed,
            vocabulary_complexity,
            sentence_complexity,
            topic_complexity,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum_macros::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Trend {
    Improving,
    Stable,
    Declining,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendReport {
    pub trend: Trend,
    pub average_score: f64,
    pub recent_average: f64,
}

impl TrendReport {
    pub fn from_history(history: &PerformanceHistory) -> Self {
        let scores = history.composite_scores();
        let average_score = weighted_mean(&scores, RECENCY_BASE).unwrap_or(0.0);

        if scores.len() < 2 {
            return Self {
                trend: Trend::Stable,
                average_score,
                recent_average: average_score,
            };
        }

        let recent_average = recent_mean(&scores).unwrap_or(average_score);
        let delta = recent_average - average_score;
        let trend = if delta > TREND_MARGIN {
            Trend::Improving
        } else if delta < -TREND_MARGIN {
            Trend::Declining
        } else {
            Trend::Stable
        };

        Self {
            trend,
            average_score,
            recent_average,
        }
    }
}

fn recent_mean(scores: &[f64]) -> Option<f64> {
    let start = scores.len().saturating_sub(RECENT_WINDOW);
    mean(&scores[start..])
}

/// Outcome of an adjustment pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Adjustment {
    Raised,
    Lowered,
    Unchanged,
}

/// The adaptation rule: climb on a sustained strong window, drop quickly on
/// struggle.
pub fn evaluate_adjustment(history: &PerformanceHistory, level: DifficultyLevel) -> Adjustment {
    let scores = history.composite_scores();
    let n = scores.len();
    if n < LOWER_MIN_SAMPLES {
        return Adjustment::Unchanged;
    }

    let Some(recent_average) = recent_mean(&scores) else {
        return Adjustment::Unchanged;
    };

    if recent_average > RAISE_THRESHOLD && n >= RAISE_MIN_SAMPLES {
        if level.get() < MAX_LEVEL {
            return Adjustment::Raised;
        }
    } else if recent_average < LOWER_THRESHOLD && level.get() > MIN_LEVEL {
        return Adjustment::Lowered;
    }

    Adjustment::Unchanged
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DifficultyState {
    pub difficulty_level: DifficultyLevel,
    pub performance_history: PerformanceHistory,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DifficultyAction {
    RecordSample(PerformanceSample),
    SetLevel(u8),
    Reset,
}

/// Pure transition function for the difficulty controller.
pub fn reduce(state: &DifficultyState, action: &DifficultyAction) -> DifficultyState {
    match action {
        DifficultyAction::RecordSample(sample) => {
            let mut history = state.performance_history.clone();
            history.push(sample);

            let difficulty_level = match evaluate_adjustment(&history, state.difficulty_level) {
                Adjustment::Raised => state.difficulty_level.raised(),
                Adjustment::Lowered => state.difficulty_level.lowered(),
                Adjustment::Unchanged => state.difficulty_level,
            };

            DifficultyState {
                difficulty_level,
                performance_history: history,
            }
        }
        DifficultyAction::SetLevel(level) => DifficultyState {
            difficulty_level: DifficultyLevel::new(*level),
            performance_history: state.performance_history.clone(),
        },
        DifficultyAction::Reset => DifficultyState::default(),
    }
}

/// Owns the difficulty state for one learner session
#[derive(Debug, Clone, Default)]
pub struct DifficultyController {
    state: DifficultyState,
}

impl DifficultyController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_state(state: DifficultyState) -> Self {
        Self { state }
    }

    pub fn state(&self) -> &DifficultyState {
        &self.state
    }

    pub fn level(&self) -> DifficultyLevel {
        self.state.difficulty_level
    }

    pub fn history(&self) -> &PerformanceHistory {
        &self.state.performance_history
    }

    pub fn dispatch(&mut self, action: DifficultyAction) -> Adjustment {
        let before = self.state.difficulty_level;
        self.state = reduce(&self.state, &action);
        let after = self.state.difficulty_level;

        debug!(?action, level = after.get(), "difficulty transition");

        match after.cmp(&before) {
            std::cmp::Ordering::Greater => {
                info!(from = before.get(), to = after.get(), "difficulty raised");
                Adjustment::Raised
            }
            std::cmp::Ordering::Less => {
                info!(from = before.get(), to = after.get(), "difficulty lowered");
                Adjustment::Lowered
            }
            std::cmp::Ordering::Equal => Adjustment::Unchanged,
        }
    }

    pub fn record_sample(&mut self, sample: PerformanceSample) -> Adjustment {
        self.dispatch(DifficultyAction::RecordSample(sample))
    }

    pub fn set_level(&mut self, level: u8) {
        self.dispatch(DifficultyAction::SetLevel(level));
    }

    pub fn reset(&mut self) {
        self.dispatch(DifficultyAction::Reset);
    }

    pub fn current_settings(&self) -> DifficultySettings {
        DifficultySettings::from(self.state.difficulty_level)
    }

    pub fn current_trend(&self) -> TrendReport {
        TrendReport::from_history(&self.state.performance_history)
    }

    pub fn average_response_time_ms(&self) -> Option<f64> {
        let times: Vec<f64> = self.state.performance_history.response_time.iter().copied().collect();
        mean(&times)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn feed(controller: &mut DifficultyController, triples: &[(f64, f64, f64)]) {
        for &(p, f, g) in triples {
            controller.record_sample(PerformanceSample::scores(p, f, g));
        }
    }

    #[test]
    fn starts_at_default_level() {
        let controller = DifficultyController::new();
        assert_eq!(controller.level().get(), DEFAULT_LEVEL);
    }

    #[test]
    fn strong_window_raises_level_by_one() {
        let mut controller = DifficultyController::new();
        feed(
            &mut controller,
            &[(90.0, 88.0, 85.0), (92.0, 91.0, 90.0), (95.0, 93.0, 92.0)],
        );
        assert_eq!(controller.level().get(), 6);
    }

    #[test]
    fn two_strong_samples_do_not_raise() {
        let mut controller = DifficultyController::new();
        feed(&mut controller, &[(95.0, 95.0, 95.0), (95.0, 95.0, 95.0)]);
        assert_eq!(controller.level().get(), DEFAULT_LEVEL);
    }

    #[test]
    fn struggling_pair_lowers_level() {
        let mut controller = DifficultyController::new();
        controller.record_sample(PerformanceSample::scores(55.0, 58.0, 50.0));
        assert_eq!(controller.level().get(), DEFAULT_LEVEL);

        let adjustment = controller.record_sample(PerformanceSample::scores(50.0, 55.0, 52.0));
        assert_matches!(adjustment, Adjustment::Lowered);
        assert_eq!(controller.level().get(), DEFAULT_LEVEL - 1);
    }

    #[test]
    fn single_sample_never_adjusts() {
        let mut controller = DifficultyController::new();
        let adjustment = controller.record_sample(PerformanceSample::scores(10.0, 10.0, 10.0));
        assert_matches!(adjustment, Adjustment::Unchanged);
        assert_eq!(controller.level().get(), DEFAULT_LEVEL);
    }

    #[test]
    fn middle_band_holds_level() {
        let mut controller = DifficultyController::new();
        feed(&mut controller, &[(70.0, 75.0, 80.0); 6]);
        assert_eq!(controller.level().get(), DEFAULT_LEVEL);
    }

    #[test]
    fn level_is_clamped_at_bounds() {
        let mut controller = DifficultyController::new();
        feed(&mut controller, &[(99.0, 99.0, 99.0); 20]);
        assert_eq!(controller.level().get(), MAX_LEVEL);

        feed(&mut controller, &[(5.0, 5.0, 5.0); 20]);
        assert_eq!(controller.level().get(), MIN_LEVEL);
    }

    #[test]
    fn history_keeps_most_recent_ten() {
        let mut controller = DifficultyController::new();
        for i in 0..15 {
            let v = 60.0 + i as f64;
            controller.record_sample(PerformanceSample::scores(v, v, v).with_response_time(v));
        }
        let history = controller.history();
        assert_eq!(history.pronunciation.len(), HISTORY_CAPACITY);
        assert_eq!(history.response_time.len(), HISTORY_CAPACITY);
        assert_eq!(history.pronunciation.front(), Some(&65.0));
        assert_eq!(history.pronunciation.back(), Some(&74.0));
    }

    #[test]
    fn partial_samples_only_extend_present_metrics() {
        let mut controller = DifficultyController::new();
        controller.record_sample(PerformanceSample {
            pronunciation: Some(80.0),
            ..Default::default()
        });
        let history = controller.history();
        assert_eq!(history.pronunciation.len(), 1);
        assert!(history.fluency.is_empty());
        assert_eq!(history.aligned_len(), 0);
    }

    #[test]
    fn response_time_does_not_count_toward_score() {
        let mut controller = DifficultyController::new();
        for _ in 0..5 {
            controller.record_sample(PerformanceSample {
                response_time_ms: Some(5.0),
                ..Default::default()
            });
        }
        assert_eq!(controller.level().get(), DEFAULT_LEVEL);
        assert_eq!(controller.average_response_time_ms(), Some(5.0));
    }

    #[test]
    fn settings_follow_level_table() {
        let low = DifficultySettings::from(DifficultyLevel::new(1));
        assert!((low.speech_speed - 0.7).abs() < 1e-9);
        assert_eq!(low.vocabulary_complexity, VocabularyComplexity::Basic);
        assert_eq!(low.sentence_complexity, SentenceComplexity::Simple);
        assert_eq!(low.topic_complexity, TopicComplexity::Everyday);

        let mid = DifficultySettings::from(DifficultyLevel::new(5));
        assert!((mid.speech_speed - 0.832).abs() < 1e-9);
        assert_eq!(mid.vocabulary_complexity, VocabularyComplexity::Intermediate);
        assert_eq!(mid.topic_complexity, TopicComplexity::Conversational);

        let high = DifficultySettings::from(DifficultyLevel::new(10));
        assert!(high.speech_speed <= 1.0);
        assert!((high.speech_speed - 0.997).abs() < 1e-9);
        assert_eq!(high.sentence_complexity, SentenceComplexity::Complex);
        assert_eq!(high.topic_complexity, TopicComplexity::Professional);
    }

    #[test]
    fn difficulty_level_clamps_on_construction() {
        assert_eq!(DifficultyLevel::new(0).get(), MIN_LEVEL);
        assert_eq!(DifficultyLevel::new(42).get(), MAX_LEVEL);
    }

    #[test]
    fn trend_is_stable_with_too_little_data() {
        let mut controller = DifficultyController::new();
        controller.record_sample(PerformanceSample::scores(70.0, 70.0, 70.0));
        let report = controller.current_trend();
        assert_eq!(report.trend, Trend::Stable);
        assert_eq!(report.average_score, report.recent_average);
        assert!((report.average_score - 70.0).abs() < 1e-9);
    }

    #[test]
    fn trend_with_two_samples_uses_both() {
        let mut controller = DifficultyController::new();
        controller.record_sample(PerformanceSample::scores(60.0, 60.0, 60.0));
        controller.record_sample(PerformanceSample::scores(80.0, 80.0, 80.0));

        let report = controller.current_trend();
        let expected = weighted_mean(&[60.0, 80.0], RECENCY_BASE).unwrap();
        assert!((report.recent_average - 70.0).abs() < 1e-9);
        assert!((report.average_score - expected).abs() < 1e-9);
        assert_eq!(report.trend, Trend::Stable);
        assert_eq!(controller.level().get(), DEFAULT_LEVEL);
    }

    #[test]
    fn trend_detects_improvement_and_decline() {
        let mut improving = DifficultyController::new();
        feed(
            &mut improving,
            &[
                (60.0, 60.0, 60.0),
                (62.0, 62.0, 62.0),
                (61.0, 61.0, 61.0),
                (63.0, 63.0, 63.0),
                (60.0, 60.0, 60.0),
                (84.0, 84.0, 84.0),
                (84.0, 84.0, 84.0),
                (84.0, 84.0, 84.0),
            ],
        );
        assert_eq!(improving.current_trend().trend, Trend::Improving);

        let mut declining = DifficultyController::new();
        feed(
            &mut declining,
            &[
                (84.0, 84.0, 84.0),
                (83.0, 83.0, 83.0),
                (84.0, 84.0, 84.0),
                (82.0, 82.0, 82.0),
                (84.0, 84.0, 84.0),
                (62.0, 62.0, 62.0),
                (62.0, 62.0, 62.0),
                (62.0, 62.0, 62.0),
            ],
        );
        assert_eq!(declining.current_trend().trend, Trend::Declining);
    }

    #[test]
    fn reduce_is_pure() {
        let state = DifficultyState::default();
        let next = reduce(&state, &DifficultyAction::SetLevel(8));
        assert_eq!(state.difficulty_level.get(), DEFAULT_LEVEL);
        assert_eq!(next.difficulty_level.get(), 8);

        let reset = reduce(&next, &DifficultyAction::Reset);
        assert_eq!(reset, DifficultyState::default());
    }
}
