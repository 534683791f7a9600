//! Never-failing wrappers around the content generator. Every failure is
//! absorbed locally: problems fall back to a built-in pool, feedback falls
//! back to baked-in messages.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::content::{
    ContentGenerator, Emotion, Feedback, FeedbackContext, GenerateError, HelpTrigger, Language,
};
use crate::problem::{Difficulty, Problem};

struct BuiltinProblem {
    question: &'static str,
    answer: &'static str,
    options: [&'static str; 4],
    hint: &'static str,
    theme: &'static str,
}

fn builtin_pool(language: Language) -> [BuiltinProblem; 5] {
    let sl = language == Language::Sl;
    [
        BuiltinProblem {
            question: "5 + 3 = ?",
            answer: "8",
            options: ["7", "8", "9", "6"],
            hint: if sl { "Preštej na prste!" } else { "Izbroj na prste!" },
            theme: "Basic",
        },
        BuiltinProblem {
            question: "10 - 4 = ?",
            answer: "6",
            options: ["5", "6", "7", "4"],
            hint: if sl {
                "Odštevanje je obratno od seštevanja."
            } else {
                "Oduzimanje je suprotno od sabiranja."
            },
            theme: "Basic",
        },
        BuiltinProblem {
            question: "2 + 2 + 2 = ?",
            answer: "6",
            options: ["5", "6", "8", "4"],
            hint: "2, 4, ...",
            theme: "Patterns",
        },
        BuiltinProblem {
            question: "7 + 7 = ?",
            answer: "14",
            options: ["12", "13", "14", "15"],
            hint: "Double 7",
            theme: "Doubles",
        },
        BuiltinProblem {
            question: "3 x 3 = ?",
            answer: "9",
            options: ["6", "9", "12", "8"],
            hint: "3 + 3 + 3",
            theme: "Multiplication",
        },
    ]
}

/// Front door for all generated content. Owns an optional generator; without
/// one (offline mode) every request is served from the fallbacks.
pub struct ContentProvider {
    generator: Option<Box<dyn ContentGenerator>>,
    rng: StdRng,
}

impl ContentProvider {
    pub fn new(generator: Option<Box<dyn ContentGenerator>>) -> Self {
        Self {
            generator,
            rng: StdRng::from_entropy(),
        }
    }

    pub fn offline() -> Self {
        Self::new(None)
    }

    fn generate<T>(
        &self,
        call: impl FnOnce(&dyn ContentGenerator) -> Result<T, GenerateError>,
    ) -> Result<T, GenerateError> {
        match &self.generator {
            Some(generator) => call(generator.as_ref()),
            None => Err(GenerateError::NotConfigured),
        }
    }

    /// Always returns a problem. Fallbacks are tagged `Easy` regardless of
    /// the requested difficulty and carry a fresh id.
    pub fn fetch_problem(&mut self, difficulty: Difficulty, language: Language) -> Problem {
        match self.generate(|g| g.generate_problem(difficulty, language)) {
            Ok(problem) => problem,
            Err(e) => {
                if e.is_benign() {
                    debug!("problem generation unavailable: {e}");
                } else {
                    warn!("problem generation failed: {e}");
                }
                self.fallback_problem(language)
            }
        }
    }

    pub fn encouragement(
        &mut self,
        context: FeedbackContext,
        streak: u32,
        language: Language,
    ) -> Feedback {
        self.generate(|g| g.generate_encouragement(context, streak, language))
            .unwrap_or_else(|_| match context {
                FeedbackContext::Success => Feedback::new("Bravo! 🎉", Emotion::Happy),
                FeedbackContext::Failure => {
                    Feedback::new("Samo polako, pokušaj ponovo!", Emotion::Thinking)
                }
            })
    }

    pub fn frustration_help(
        &mut self,
        trigger: HelpTrigger,
        problem: &Problem,
        language: Language,
    ) -> Feedback {
        match self.generate(|g| g.generate_help(trigger, problem, language)) {
            Ok(feedback) => feedback,
            Err(e) => {
                if !e.is_benign() {
                    warn!("help generation failed: {e}");
                }
                Feedback::new("Tu sam ako trebaš pomoć! 💪", Emotion::Happy)
            }
        }
    }

    fn fallback_problem(&mut self, language: Language) -> Problem {
        let pool = builtin_pool(language);
        let pick = &pool[self.rng.gen_range(0..pool.len())];
        Problem {
            id: Uuid::new_v4().to_string(),
            question: pick.question.to_string(),
            options: pick.options.map(str::to_string),
            correct_answer: pick.answer.to_string(),
            hint: pick.hint.to_string(),
            theme: pick.theme.to_string(),
            difficulty: Difficulty::Easy,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Generator that fails every call, as if the service were down.
    struct FailingGenerator;

    impl ContentGenerator for FailingGenerator {
        fn generate_problem(
            &self,
            _difficulty: Difficulty,
            _language: Language,
        ) -> Result<Problem, GenerateError> {
            Err(GenerateError::Transport("connection refused".to_string()))
        }

        fn generate_encouragement(
            &self,
            _context: FeedbackContext,
            _streak: u32,
            _language: Language,
        ) -> Result<Feedback, GenerateError> {
            Err(GenerateError::Transport("connection refused".to_string()))
        }

        fn generate_help(
            &self,
            _trigger: HelpTrigger,
            _problem: &Problem,
            _language: Language,
        ) -> Result<Feedback, GenerateError> {
            Err(GenerateError::Transport("connection refused".to_string()))
        }
    }

    #[test]
    fn fallback_pool_serves_valid_problems_forever() {
        let mut provider = ContentProvider::new(Some(Box::new(FailingGenerator)));
        let pool = builtin_pool(Language::En);
        for _ in 0..100 {
            let p = provider.fetch_problem(Difficulty::Hard, Language::En);
            assert_eq!(p.options.len(), 4);
            assert!(p.options.contains(&p.correct_answer));
            assert!(!p.hint.is_empty());
            assert_eq!(p.difficulty, Difficulty::Easy);
            assert!(
                pool.iter().any(|b| b.question == p.question),
                "problem not from the builtin pool: {}",
                p.question
            );
        }
    }

    #[test]
    fn fallback_ids_are_unique() {
        let mut provider = ContentProvider::offline();
        let a = provider.fetch_problem(Difficulty::Easy, Language::En);
        let b = provider.fetch_problem(Difficulty::Easy, Language::En);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn offline_feedback_uses_baked_in_messages() {
        let mut provider = ContentProvider::offline();
        let success = provider.encouragement(FeedbackContext::Success, 2, Language::Sr);
        assert_eq!(success.emotion, Emotion::Happy);
        assert!(!success.message.is_empty());

        let failure = provider.encouragement(FeedbackContext::Failure, 0, Language::Sr);
        assert_eq!(failure.emotion, Emotion::Thinking);
    }

    #[test]
    fn offline_help_never_reveals_the_answer() {
        let mut provider = ContentProvider::offline();
        let problem = provider.fetch_problem(Difficulty::Easy, Language::En);
        let help = provider.frustration_help(HelpTrigger::ConsecutiveErrors, &problem, Language::En);
        assert!(!help.message.contains(&problem.correct_answer));
    }

    #[test]
    fn slovenian_hints_are_localized() {
        let pool = builtin_pool(Language::Sl);
        assert_eq!(pool[0].hint, "Preštej na prste!");
        let pool = builtin_pool(Language::Hr);
        assert_eq!(pool[0].hint, "Izbroj na prste!");
    }
}
