use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
    /// Child-profile preference. The selector never returns this; hosts
    /// resolve it through `select_difficulty` before every fetch.
    Adaptive,
}

/// Maps the running correct-answer streak to a concrete difficulty tier.
/// Re-evaluated before each problem is requested, never cached.
pub fn select_difficulty(streak: u32) -> Difficulty {
    if streak > 3 {
        Difficulty::Hard
    } else if streak > 1 {
        Difficulty::Medium
    } else {
        Difficulty::Easy
    }
}

/// One multiple-choice problem. Immutable once created; lives for a single
/// question-answering round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Problem {
    pub id: String,
    pub question: String,
    pub options: [String; 4],
    pub correct_answer: String,
    pub hint: String,
    pub theme: String,
    pub difficulty: Difficulty,
}

impl Problem {
    pub fn is_correct(&self, option: &str) -> bool {
        option == self.correct_answer
    }
}
