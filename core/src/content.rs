//! Boundary to the external generative content service.
//!
//! Everything here is fallible; the provider layer absorbs the failures so
//! the game loop never sees them.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

use crate::problem::{Difficulty, Problem};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    En,
    Sr,
    Hr,
    Sl,
}

impl Language {
    /// English name of the language, as used in generation prompts.
    pub fn english_name(self) -> &'static str {
        match self {
            Language::Sr => "Serbian",
            Language::Hr => "Croatian",
            Language::Sl => "Slovenian",
            Language::En => "English",
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            Language::En => "en",
            Language::Sr => "sr",
            Language::Hr => "hr",
            Language::Sl => "sl",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Emotion {
    Happy,
    Excited,
    Thinking,
    Proud,
}

/// Avatar message shown to the child alongside a quiz problem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feedback {
    pub message: String,
    pub emotion: Emotion,
}

impl Feedback {
    pub fn new(message: impl Into<String>, emotion: Emotion) -> Self {
        Self {
            message: message.into(),
            emotion,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedbackContext {
    Success,
    Failure,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HelpTrigger {
    Idle,
    ConsecutiveErrors,
}

#[derive(Debug, Error)]
pub enum GenerateError {
    /// Rate-limit / quota responses. Expected during normal operation and
    /// not worth an error-level log.
    #[error("generation quota exhausted")]
    QuotaExhausted,
    #[error("request failed: {0}")]
    Transport(String),
    #[error("could not read response body: {0}")]
    Body(#[from] std::io::Error),
    #[error("malformed response: {0}")]
    Malformed(String),
    #[error("no API key configured")]
    NotConfigured,
}

impl GenerateError {
    /// Benign failures: quota exhaustion and running without a key.
    pub fn is_benign(&self) -> bool {
        matches!(self, GenerateError::QuotaExhausted | GenerateError::NotConfigured)
    }
}

/// A service that can produce quiz problems and avatar feedback.
pub trait ContentGenerator {
    fn generate_problem(
        &self,
        difficulty: Difficulty,
        language: Language,
    ) -> Result<Problem, GenerateError>;

    fn generate_encouragement(
        &self,
        context: FeedbackContext,
        streak: u32,
        language: Language,
    ) -> Result<Feedback, GenerateError>;

    fn generate_help(
        &self,
        trigger: HelpTrigger,
        problem: &Problem,
        language: Language,
    ) -> Result<Feedback, GenerateError>;
}

pub const GEMINI_MODEL: &str = "gemini-2.5-flash";

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

const CHILD_PERSONA: &str = "You are a warm, playful AI buddy for children aged 5-10. \
Keep every message short, simple, encouraging and age-appropriate. Never be harsh.";

/// Gemini-backed generator. Requests a fixed JSON shape via `responseSchema`
/// and rejects anything that does not validate field by field.
pub struct GeminiClient {
    agent: ureq::Agent,
    api_key: String,
    model: String,
}

impl GeminiClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(8))
            .build();
        Self {
            agent,
            api_key: api_key.into(),
            model: GEMINI_MODEL.to_string(),
        }
    }

    /// Builds a client from `GEMINI_API_KEY`, or `None` when unset.
    pub fn from_env() -> Option<Self> {
        std::env::var("GEMINI_API_KEY")
            .ok()
            .filter(|key| !key.is_empty())
            .map(Self::new)
    }

    fn generate(
        &self,
        prompt: &str,
        system: &str,
        schema: serde_json::Value,
    ) -> Result<serde_json::Value, GenerateError> {
        let url = format!(
            "{}/{}:generateContent?key={}",
            API_BASE, self.model, self.api_key
        );
        let body = json!({
            "contents": [{ "parts": [{ "text": prompt }] }],
            "systemInstruction": { "parts": [{ "text": system }] },
            "generationConfig": {
                "responseMimeType": "application/json",
                "responseSchema": schema,
            },
        });

        let response = match self.agent.post(&url).send_json(body) {
            Ok(response) => response,
            Err(ureq::Error::Status(429, _)) => return Err(GenerateError::QuotaExhausted),
            Err(ureq::Error::Status(code, response)) => {
                let text = response.into_string().unwrap_or_default();
                if text.contains("RESOURCE_EXHAUSTED") {
                    return Err(GenerateError::QuotaExhausted);
                }
                return Err(GenerateError::Transport(format!("status {code}: {text}")));
            }
            Err(e) => return Err(GenerateError::Transport(e.to_string())),
        };

        let envelope: serde_json::Value = response.into_json()?;
        let text = envelope["candidates"][0]["content"]["parts"][0]["text"]
            .as_str()
            .ok_or_else(|| GenerateError::Malformed("no text part in response".to_string()))?;
        serde_json::from_str(text).map_err(|e| GenerateError::Malformed(e.to_string()))
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProblemPayload {
    question: String,
    options: Vec<String>,
    correct_answer: String,
    hint: String,
    theme: String,
}

#[derive(Deserialize)]
struct FeedbackPayload {
    message: String,
    emotion: Emotion,
}

fn validate_problem(payload: ProblemPayload, difficulty: Difficulty) -> Result<Problem, GenerateError> {
    let options: [String; 4] = payload
        .options
        .try_into()
        .map_err(|_| GenerateError::Malformed("expected exactly 4 options".to_string()))?;
    if !options.contains(&payload.correct_answer) {
        return Err(GenerateError::Malformed(
            "correct answer is not one of the options".to_string(),
        ));
    }
    if payload.question.trim().is_empty() || payload.hint.trim().is_empty() {
        return Err(GenerateError::Malformed(
            "empty question or hint".to_string(),
        ));
    }
    Ok(Problem {
        id: Uuid::new_v4().to_string(),
        question: payload.question,
        options,
        correct_answer: payload.correct_answer,
        hint: payload.hint,
        theme: payload.theme,
        difficulty,
    })
}

impl ContentGenerator for GeminiClient {
    fn generate_problem(
        &self,
        difficulty: Difficulty,
        language: Language,
    ) -> Result<Problem, GenerateError> {
        let topic = match difficulty {
            Difficulty::Easy => "addition/subtraction up to 20",
            Difficulty::Medium => "multiplication/division basic, addition up to 100",
            Difficulty::Hard | Difficulty::Adaptive => "mixed operations, simple logic puzzles",
        };
        let lang = language.english_name();
        let schema = json!({
            "type": "OBJECT",
            "properties": {
                "question": { "type": "STRING", "description": format!("The math question text in {lang}.") },
                "options": {
                    "type": "ARRAY",
                    "items": { "type": "STRING" },
                    "description": "4 possible answers."
                },
                "correctAnswer": { "type": "STRING", "description": "The correct option." },
                "hint": { "type": "STRING", "description": format!("A Socratic hint in {lang} that guides them without giving the answer.") },
                "theme": { "type": "STRING", "description": format!("A fun theme for the question (e.g., space, animals) in {lang}.") },
            },
            "required": ["question", "options", "correctAnswer", "hint", "theme"],
        });
        let prompt = format!(
            "Generate a creative and fun math problem for a child in {lang}. \
             Difficulty: {topic}. Ensure the theme is engaging and the text is culturally appropriate."
        );

        let value = self.generate(&prompt, CHILD_PERSONA, schema)?;
        let payload: ProblemPayload =
            serde_json::from_value(value).map_err(|e| GenerateError::Malformed(e.to_string()))?;
        validate_problem(payload, difficulty)
    }

    fn generate_encouragement(
        &self,
        context: FeedbackContext,
        streak: u32,
        language: Language,
    ) -> Result<Feedback, GenerateError> {
        let lang = language.english_name();
        let prompt = match context {
            FeedbackContext::Success => format!(
                "The child just solved a problem correctly! Streak: {streak}. \
                 Provide Growth Mindset praise in {lang}. Focus on effort or strategy."
            ),
            FeedbackContext::Failure => format!(
                "The child got an answer wrong. Be gentle and emotionally supportive in {lang}. \
                 Use the Socratic method to suggest a new approach."
            ),
        };
        let value = self.generate(&prompt, CHILD_PERSONA, feedback_schema(lang))?;
        let payload: FeedbackPayload =
            serde_json::from_value(value).map_err(|e| GenerateError::Malformed(e.to_string()))?;
        Ok(Feedback::new(payload.message, payload.emotion))
    }

    fn generate_help(
        &self,
        trigger: HelpTrigger,
        problem: &Problem,
        language: Language,
    ) -> Result<Feedback, GenerateError> {
        let lang = language.english_name();
        let context = match trigger {
            HelpTrigger::Idle => "Child is staring at the screen without acting.",
            HelpTrigger::ConsecutiveErrors => "Child answered incorrectly twice.",
        };
        let prompt = format!(
            "The child is playing a Smart Game (Math).\n\
             Problem: \"{}\"\n\
             Correct Answer: \"{}\"\n\
             Context Trigger: {}\n\n\
             Generate a supportive, helpful message in {}.\n\
             If idle: validate that it is okay to take time and suggest breaking the problem down.\n\
             If repeated errors: offer a very specific conceptual hint. Do NOT give the answer.",
            problem.question, problem.correct_answer, context, lang
        );
        let value = self.generate(&prompt, CHILD_PERSONA, feedback_schema(lang))?;
        let payload: FeedbackPayload =
            serde_json::from_value(value).map_err(|e| GenerateError::Malformed(e.to_string()))?;
        Ok(Feedback::new(payload.message, payload.emotion))
    }
}

fn feedback_schema(lang: &str) -> serde_json::Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "message": { "type": "STRING", "description": format!("Message in {lang}") },
            "emotion": { "type": "STRING", "enum": ["happy", "excited", "thinking", "proud"] },
        },
        "required": ["message", "emotion"],
    })
}
