use serde::{Deserialize, Serialize};

/// Incorrect answers submitted faster than this count as impulsive clicks.
pub const IMPULSIVE_THRESHOLD_SECS: f64 = 3.0;

const INITIAL_FOCUS: i32 = 100;
const HESITATION_FOCUS_PENALTY: i32 = 5;
const MISTAKE_FOCUS_PENALTY: i32 = 10;

/// Snapshot of one quiz session's behavioral signals, handed to the host on
/// completion.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BehavioralMetrics {
    pub avg_response_time_seconds: f64,
    pub hesitation_count: u32,
    pub impulsive_click_count: u32,
    pub total_mistakes: u32,
    /// Starts at 100, -5 per hesitation, -10 per mistake. Deliberately
    /// unclamped; a reporting value, not a percentage.
    pub focus_score: i32,
}

/// Per-session accumulator. Owned by exactly one quiz session and mutated
/// only by its state machine.
#[derive(Debug)]
pub struct TelemetryCollector {
    hesitation_count: u32,
    impulsive_click_count: u32,
    total_mistakes: u32,
    focus_score: i32,
    total_response_secs: f64,
    answered: u32,
}

impl TelemetryCollector {
    pub fn new() -> Self {
        Self {
            hesitation_count: 0,
            impulsive_click_count: 0,
            total_mistakes: 0,
            focus_score: INITIAL_FOCUS,
            total_response_secs: 0.0,
            answered: 0,
        }
    }

    /// Idle episode at the hesitation threshold on an unanswered problem.
    pub fn record_hesitation(&mut self) {
        self.hesitation_count += 1;
        self.focus_score -= HESITATION_FOCUS_PENALTY;
    }

    pub fn record_mistake(&mut self, response_secs: f64) {
        self.total_mistakes += 1;
        self.focus_score -= MISTAKE_FOCUS_PENALTY;
        if response_secs < IMPULSIVE_THRESHOLD_SECS {
            self.impulsive_click_count += 1;
        }
    }

    /// Accumulates only; the average is computed once in `finalize`.
    pub fn record_success(&mut self, response_secs: f64) {
        self.total_response_secs += response_secs;
        self.answered += 1;
    }

    pub fn finalize(&self) -> BehavioralMetrics {
        let avg = if self.answered == 0 {
            0.0
        } else {
            self.total_response_secs / self.answered as f64
        };
        BehavioralMetrics {
            avg_response_time_seconds: avg,
            hesitation_count: self.hesitation_count,
            impulsive_click_count: self.impulsive_click_count,
            total_mistakes: self.total_mistakes,
            focus_score: self.focus_score,
        }
    }
}

impl Default for TelemetryCollector {
    fn default() -> Self {
        Self::new()
    }
}
