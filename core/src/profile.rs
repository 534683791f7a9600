//! Persisted child progress: the fields this core reads at session start and
//! writes back at session end through the persistence collaborator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::quiz::QUIZ_GOAL;
use crate::telemetry::BehavioralMetrics;

/// Fun-time seconds credited per completed quiz session.
pub const FUN_TIME_REWARD_SECONDS: u32 = 300;
/// Stars credited per completed quiz session.
pub const STARS_PER_QUIZ: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum GameCategory {
    Smart,
    Fun,
}

/// One entry in the append-only session history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub game_type: GameCategory,
    pub duration_seconds: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub behavioral: Option<BehavioralMetrics>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChildProgress {
    pub fun_time_balance_seconds: u32,
    pub stars: u32,
    /// Coarse gamification counter, incremented once per completed quiz
    /// session. Not the in-session answer streak.
    pub streak: u32,
    #[serde(default)]
    pub history: Vec<SessionRecord>,
}

impl ChildProgress {
    /// Applies one completed quiz session: reward credit, stars, session
    /// streak, and a history entry with the behavioral snapshot.
    pub fn record_quiz_completion(
        &mut self,
        score: u32,
        metrics: &BehavioralMetrics,
        now: DateTime<Utc>,
    ) {
        self.fun_time_balance_seconds += FUN_TIME_REWARD_SECONDS;
        self.stars += STARS_PER_QUIZ;
        self.streak += 1;
        self.history.push(SessionRecord {
            id: Uuid::new_v4().to_string(),
            timestamp: now,
            game_type: GameCategory::Smart,
            duration_seconds: metrics.avg_response_time_seconds * QUIZ_GOAL as f64,
            score: Some(score),
            success: Some(true),
            behavioral: Some(*metrics),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metrics() -> BehavioralMetrics {
        BehavioralMetrics {
            avg_response_time_seconds: 4.0,
            hesitation_count: 0,
            impulsive_click_count: 0,
            total_mistakes: 0,
            focus_score: 100,
        }
    }

    #[test]
    fn quiz_completion_credits_everything_once() {
        let mut progress = ChildProgress::default();
        progress.record_quiz_completion(100, &metrics(), Utc::now());

        assert_eq!(progress.fun_time_balance_seconds, FUN_TIME_REWARD_SECONDS);
        assert_eq!(progress.stars, STARS_PER_QUIZ);
        assert_eq!(progress.streak, 1);
        assert_eq!(progress.history.len(), 1);

        let entry = &progress.history[0];
        assert_eq!(entry.game_type, GameCategory::Smart);
        assert_eq!(entry.score, Some(100));
        assert_eq!(entry.success, Some(true));
        assert_eq!(entry.duration_seconds, 12.0);
        assert!(entry.behavioral.is_some());
    }

    #[test]
    fn history_is_append_only_across_sessions() {
        let mut progress = ChildProgress::default();
        for _ in 0..3 {
            progress.record_quiz_completion(100, &metrics(), Utc::now());
        }
        assert_eq!(progress.history.len(), 3);
        assert_eq!(progress.streak, 3);
        assert_eq!(progress.stars, 30);
        assert_eq!(progress.fun_time_balance_seconds, 900);
    }

    #[test]
    fn full_quiz_session_feeds_progress_and_ledger() {
        use std::time::{Duration, Instant};

        use crate::content::Language;
        use crate::ledger::FunTimeLedger;
        use crate::provider::ContentProvider;
        use crate::quiz::{QuizEvent, QuizSession};

        // Offline provider: every problem comes from the builtin pool, so
        // the correct answer is always known to the test.
        let mut session = QuizSession::new(ContentProvider::offline(), Language::En);
        let mut ledger = FunTimeLedger::new(0);
        let mut progress = ChildProgress::default();

        let mut now = Instant::now();
        session.poll(now);
        let mut completed = None;
        while completed.is_none() {
            let answer = session.problem().unwrap().correct_answer.clone();
            now += Duration::from_secs(2);
            session.submit(&answer, now);
            now += Duration::from_secs(3);
            for event in session.poll(now) {
                if let QuizEvent::Completed { score, metrics } = event {
                    completed = Some((score, metrics));
                }
            }
        }

        let (score, metrics) = completed.unwrap();
        assert_eq!(score, 100);
        assert_eq!(metrics.total_mistakes, 0);

        progress.record_quiz_completion(score, &metrics, Utc::now());
        ledger.credit(FUN_TIME_REWARD_SECONDS);

        assert_eq!(progress.stars, 10);
        assert_eq!(progress.streak, 1);
        assert_eq!(progress.fun_time_balance_seconds, 300);
        assert_eq!(progress.history.len(), 1);
        assert_eq!(progress.history[0].game_type, GameCategory::Smart);
        assert_eq!(ledger.activate(), 300);
    }

    #[test]
    fn progress_round_trips_through_json() {
        let mut progress = ChildProgress::default();
        progress.record_quiz_completion(100, &metrics(), Utc::now());
        let json = serde_json::to_string(&progress).unwrap();
        assert!(json.contains("\"gameType\":\"SMART\""));
        let back: ChildProgress = serde_json::from_str(&json).unwrap();
        assert_eq!(back, progress);
    }
}
