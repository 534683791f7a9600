//! Quiz session state machine. Drives difficulty selection and problem
//! fetching, routes every answer through the telemetry collector, and hands
//! the host a single completion event.
//!
//! Time never enters through internal clock reads: the host passes `Instant`s
//! into `poll`/`submit` and drives the 1-second idle tick itself, so sessions
//! are fully deterministic under test.

use std::time::{Duration, Instant};

use crate::content::{Feedback, FeedbackContext, HelpTrigger, Language};
use crate::problem::{select_difficulty, Problem};
use crate::provider::ContentProvider;
use crate::telemetry::{BehavioralMetrics, TelemetryCollector};

/// Correct answers needed to complete a session.
pub const QUIZ_GOAL: u32 = 3;
/// Idle seconds on an unanswered problem before a hesitation is recorded.
pub const IDLE_THRESHOLD_SECS: u32 = 15;
/// Wrong submissions on the same problem before help escalates.
pub const MAX_WRONG_ATTEMPTS: u32 = 2;
/// Score handed to the host on completion.
pub const QUIZ_SCORE: u32 = 100;

const SUCCESS_FEEDBACK_DELAY: Duration = Duration::from_millis(2000);
const RETRY_FEEDBACK_DELAY: Duration = Duration::from_millis(1500);
const ESCALATION_FEEDBACK_DELAY: Duration = Duration::from_millis(2500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuizPhase {
    Loading,
    AwaitingAnswer,
    Evaluating,
    ShowingFeedback,
    Complete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AfterFeedback {
    NextProblem,
    RetrySame,
    Finish,
}

#[derive(Debug, Clone)]
pub enum QuizEvent {
    /// A new problem is on display.
    ProblemReady,
    /// Avatar message to show.
    Feedback(Feedback),
    /// The escalation threshold was hit; the host may highlight the correct
    /// option.
    HighlightAnswer,
    /// Emitted exactly once; the session is finished afterwards.
    Completed { score: u32, metrics: BehavioralMetrics },
}

/// Tags idle ticks with the problem they were scheduled for, so a tick that
/// outlives its problem is a detectable no-op instead of silent corruption.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickToken(u64);

pub struct QuizSession {
    provider: ContentProvider,
    language: Language,
    goal: u32,
    phase: QuizPhase,
    problem: Option<Problem>,
    shown_at: Option<Instant>,
    selection: Option<String>,
    streak: u32,
    solved: u32,
    wrong_attempts: u32,
    idle_seconds: u32,
    idle_help_shown: bool,
    feedback_until: Option<Instant>,
    after_feedback: AfterFeedback,
    generation: u64,
    telemetry: TelemetryCollector,
    last_feedback: Option<Feedback>,
}

impl QuizSession {
    pub fn new(provider: ContentProvider, language: Language) -> Self {
        Self::with_goal(provider, language, QUIZ_GOAL)
    }

    pub fn with_goal(provider: ContentProvider, language: Language, goal: u32) -> Self {
        Self {
            provider,
            language,
            goal,
            phase: QuizPhase::Loading,
            problem: None,
            shown_at: None,
            selection: None,
            streak: 0,
            solved: 0,
            wrong_attempts: 0,
            idle_seconds: 0,
            idle_help_shown: false,
            feedback_until: None,
            after_feedback: AfterFeedback::NextProblem,
            generation: 0,
            telemetry: TelemetryCollector::new(),
            last_feedback: None,
        }
    }

    pub fn phase(&self) -> QuizPhase {
        self.phase
    }

    pub fn problem(&self) -> Option<&Problem> {
        self.problem.as_ref()
    }

    pub fn streak(&self) -> u32 {
        self.streak
    }

    pub fn solved(&self) -> u32 {
        self.solved
    }

    pub fn goal(&self) -> u32 {
        self.goal
    }

    pub fn wrong_attempts(&self) -> u32 {
        self.wrong_attempts
    }

    pub fn idle_seconds(&self) -> u32 {
        self.idle_seconds
    }

    pub fn selection(&self) -> Option<&str> {
        self.selection.as_deref()
    }

    /// Whether the UI should highlight the correct option (escalation hit).
    pub fn highlight_correct(&self) -> bool {
        self.wrong_attempts >= MAX_WRONG_ATTEMPTS
    }

    pub fn last_feedback(&self) -> Option<&Feedback> {
        self.last_feedback.as_ref()
    }

    /// Token for scheduling idle ticks against the current problem.
    pub fn tick_token(&self) -> TickToken {
        TickToken(self.generation)
    }

    /// Performs any work that has come due: the initial problem load, the
    /// next load or retry once a feedback delay expires, and the final
    /// completion emission.
    pub fn poll(&mut self, now: Instant) -> Vec<QuizEvent> {
        let mut events = Vec::new();
        loop {
            match self.phase {
                QuizPhase::Loading => {
                    self.load_problem(now);
                    events.push(QuizEvent::ProblemReady);
                    break;
                }
                QuizPhase::ShowingFeedback => match self.feedback_until {
                    Some(until) if now >= until => {
                        self.feedback_until = None;
                        match self.after_feedback {
                            AfterFeedback::NextProblem => {
                                self.phase = QuizPhase::Loading;
                                // loop around to load it
                            }
                            AfterFeedback::RetrySame => {
                                self.selection = None;
                                self.phase = QuizPhase::AwaitingAnswer;
                                break;
                            }
                            AfterFeedback::Finish => {
                                self.phase = QuizPhase::Complete;
                                events.push(QuizEvent::Completed {
                                    score: QUIZ_SCORE,
                                    metrics: self.telemetry.finalize(),
                                });
                                break;
                            }
                        }
                    }
                    _ => break,
                },
                _ => break,
            }
        }
        events
    }

    /// One second of idle time on the current problem. No-op when the token
    /// is stale, an answer is pending, or the machine is not awaiting one.
    pub fn tick_idle(&mut self, token: TickToken) -> Option<QuizEvent> {
        if token.0 != self.generation
            || self.phase != QuizPhase::AwaitingAnswer
            || self.selection.is_some()
        {
            return None;
        }
        self.idle_seconds += 1;
        if self.idle_seconds != IDLE_THRESHOLD_SECS {
            return None;
        }
        self.telemetry.record_hesitation();
        if self.idle_help_shown {
            return None;
        }
        self.idle_help_shown = true;
        let problem = self.problem.as_ref()?;
        let feedback = self
            .provider
            .frustration_help(HelpTrigger::Idle, problem, self.language);
        self.last_feedback = Some(feedback.clone());
        Some(QuizEvent::Feedback(feedback))
    }

    /// Answer submission. Ignored while a prior selection is still showing
    /// feedback, so double-clicks and late clicks are harmless.
    pub fn submit(&mut self, option: &str, now: Instant) -> Vec<QuizEvent> {
        if self.phase != QuizPhase::AwaitingAnswer || self.selection.is_some() {
            return Vec::new();
        }
        let Some(problem) = self.problem.clone() else {
            return Vec::new();
        };
        self.phase = QuizPhase::Evaluating;
        let elapsed = self
            .shown_at
            .map(|shown| now.saturating_duration_since(shown).as_secs_f64())
            .unwrap_or(0.0);
        self.selection = Some(option.to_string());

        let mut events = Vec::new();
        if problem.is_correct(option) {
            self.telemetry.record_success(elapsed);
            self.streak += 1;
            self.solved += 1;
            let feedback =
                self.provider
                    .encouragement(FeedbackContext::Success, self.streak, self.language);
            self.last_feedback = Some(feedback.clone());
            events.push(QuizEvent::Feedback(feedback));
            self.after_feedback = if self.solved >= self.goal {
                AfterFeedback::Finish
            } else {
                AfterFeedback::NextProblem
            };
            self.feedback_until = Some(now + SUCCESS_FEEDBACK_DELAY);
        } else {
            self.telemetry.record_mistake(elapsed);
            self.wrong_attempts += 1;
            self.idle_seconds = 0;
            self.idle_help_shown = false;
            if self.wrong_attempts >= MAX_WRONG_ATTEMPTS {
                // Streak was already reset on the first wrong answer; the
                // escalation branch must not reset it again.
                let feedback = self.provider.frustration_help(
                    HelpTrigger::ConsecutiveErrors,
                    &problem,
                    self.language,
                );
                self.last_feedback = Some(feedback.clone());
                events.push(QuizEvent::Feedback(feedback));
                events.push(QuizEvent::HighlightAnswer);
                self.feedback_until = Some(now + ESCALATION_FEEDBACK_DELAY);
            } else {
                self.streak = 0;
                let feedback =
                    self.provider
                        .encouragement(FeedbackContext::Failure, 0, self.language);
                self.last_feedback = Some(feedback.clone());
                events.push(QuizEvent::Feedback(feedback));
                self.feedback_until = Some(now + RETRY_FEEDBACK_DELAY);
            }
            self.after_feedback = AfterFeedback::RetrySame;
        }
        self.phase = QuizPhase::ShowingFeedback;
        events
    }

    fn load_problem(&mut self, now: Instant) {
        self.generation += 1;
        self.wrong_attempts = 0;
        self.idle_seconds = 0;
        self.idle_help_shown = false;
        self.selection = None;
        let difficulty = select_difficulty(self.streak);
        let problem = self.provider.fetch_problem(difficulty, self.language);
        self.problem = Some(problem);
        self.shown_at = Some(now);
        self.phase = QuizPhase::AwaitingAnswer;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::content::{ContentGenerator, Emotion, GenerateError};
    use crate::problem::Difficulty;

    #[derive(Default)]
    struct Counts {
        problems: AtomicU32,
        successes: AtomicU32,
        failures: AtomicU32,
        idle_helps: AtomicU32,
        error_helps: AtomicU32,
    }

    struct StubGenerator {
        counts: Arc<Counts>,
    }

    fn stub_problem(difficulty: Difficulty) -> Problem {
        Problem {
            id: "p".to_string(),
            question: "2 + 2 = ?".to_string(),
            options: ["3", "4", "5", "6"].map(str::to_string),
            correct_answer: "4".to_string(),
            hint: "count up from 2".to_string(),
            theme: "robots".to_string(),
            difficulty,
        }
    }

    impl ContentGenerator for StubGenerator {
        fn generate_problem(
            &self,
            difficulty: Difficulty,
            _language: Language,
        ) -> Result<Problem, GenerateError> {
            self.counts.problems.fetch_add(1, Ordering::SeqCst);
            Ok(stub_problem(difficulty))
        }

        fn generate_encouragement(
            &self,
            context: FeedbackContext,
            _streak: u32,
            _language: Language,
        ) -> Result<Feedback, GenerateError> {
            match context {
                FeedbackContext::Success => {
                    self.counts.successes.fetch_add(1, Ordering::SeqCst);
                    Ok(Feedback::new("nice", Emotion::Excited))
                }
                FeedbackContext::Failure => {
                    self.counts.failures.fetch_add(1, Ordering::SeqCst);
                    Ok(Feedback::new("try again", Emotion::Thinking))
                }
            }
        }

        fn generate_help(
            &self,
            trigger: HelpTrigger,
            _problem: &Problem,
            _language: Language,
        ) -> Result<Feedback, GenerateError> {
            match trigger {
                HelpTrigger::Idle => self.counts.idle_helps.fetch_add(1, Ordering::SeqCst),
                HelpTrigger::ConsecutiveErrors => {
                    self.counts.error_helps.fetch_add(1, Ordering::SeqCst)
                }
            };
            Ok(Feedback::new("here is a hint", Emotion::Thinking))
        }
    }

    fn session() -> (QuizSession, Arc<Counts>) {
        let counts = Arc::new(Counts::default());
        let provider = ContentProvider::new(Some(Box::new(StubGenerator {
            counts: counts.clone(),
        })));
        (QuizSession::new(provider, Language::En), counts)
    }

    fn secs(n: u64) -> Duration {
        Duration::from_secs(n)
    }

    #[test]
    fn first_poll_loads_a_problem() {
        let (mut s, _) = session();
        let t0 = Instant::now();
        let events = s.poll(t0);
        assert!(matches!(events.as_slice(), [QuizEvent::ProblemReady]));
        assert_eq!(s.phase(), QuizPhase::AwaitingAnswer);
        assert!(s.problem().is_some());
    }

    #[test]
    fn three_correct_answers_complete_with_score_100() {
        let (mut s, counts) = session();
        let t0 = Instant::now();
        let mut now = t0;
        s.poll(now);
        for round in 0..3 {
            now += secs(2);
            let events = s.submit("4", now);
            assert!(
                events.iter().any(|e| matches!(e, QuizEvent::Feedback(_))),
                "round {round} should produce feedback"
            );
            now += secs(3); // past the 2s success delay
            let events = s.poll(now);
            if round < 2 {
                assert!(matches!(events.as_slice(), [QuizEvent::ProblemReady]));
            } else {
                match events.as_slice() {
                    [QuizEvent::Completed { score, metrics }] => {
                        assert_eq!(*score, 100);
                        assert_eq!(metrics.total_mistakes, 0);
                        assert_eq!(metrics.avg_response_time_seconds, 2.0);
                    }
                    other => panic!("expected completion, got {other:?}"),
                }
            }
        }
        assert_eq!(s.phase(), QuizPhase::Complete);
        assert_eq!(s.solved(), 3);
        assert_eq!(counts.successes.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn wrong_answers_do_not_count_toward_the_goal() {
        let (mut s, _) = session();
        let t0 = Instant::now();
        let mut now = t0;
        s.poll(now);

        now += secs(5);
        s.submit("3", now);
        assert_eq!(s.solved(), 0);
        now += secs(2); // past the 1.5s retry delay
        s.poll(now);
        assert_eq!(s.phase(), QuizPhase::AwaitingAnswer);

        now += secs(1);
        s.submit("4", now);
        assert_eq!(s.solved(), 1);
    }

    #[test]
    fn submissions_are_ignored_while_feedback_is_showing() {
        let (mut s, counts) = session();
        let t0 = Instant::now();
        s.poll(t0);
        let now = t0 + secs(4);
        s.submit("4", now);
        // Second submission lands during the 2s feedback window.
        let events = s.submit("3", now + Duration::from_millis(500));
        assert!(events.is_empty());
        assert_eq!(counts.failures.load(Ordering::SeqCst), 0);
        assert_eq!(s.solved(), 1);
    }

    #[test]
    fn first_wrong_answer_resets_streak_and_asks_for_encouragement() {
        let (mut s, counts) = session();
        let t0 = Instant::now();
        let mut now = t0;
        s.poll(now);

        // Build a streak of one.
        now += secs(4);
        s.submit("4", now);
        now += secs(3);
        s.poll(now);
        assert_eq!(s.streak(), 1);

        now += secs(4);
        s.submit("5", now);
        assert_eq!(s.streak(), 0);
        assert_eq!(counts.failures.load(Ordering::SeqCst), 1);
        assert_eq!(counts.error_helps.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn second_wrong_answer_escalates_once_without_a_second_reset() {
        let (mut s, counts) = session();
        let t0 = Instant::now();
        let mut now = t0;
        s.poll(now);

        now += secs(4);
        s.submit("3", now);
        now += secs(2);
        s.poll(now); // back to AwaitingAnswer on the same problem

        now += secs(4);
        let events = s.submit("5", now);
        assert!(events
            .iter()
            .any(|e| matches!(e, QuizEvent::HighlightAnswer)));
        assert!(s.highlight_correct());
        assert_eq!(counts.error_helps.load(Ordering::SeqCst), 1);
        // Exactly one failure encouragement: the single streak reset already
        // happened on the first wrong answer.
        assert_eq!(counts.failures.load(Ordering::SeqCst), 1);

        // The escalated delay is 2.5s: not back yet at 2s...
        s.poll(now + secs(2));
        assert_eq!(s.phase(), QuizPhase::ShowingFeedback);
        // ...but back on the same problem at 3s.
        s.poll(now + secs(3));
        assert_eq!(s.phase(), QuizPhase::AwaitingAnswer);
        assert_eq!(counts.problems.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn idle_threshold_records_hesitation_and_requests_help_once() {
        let (mut s, counts) = session();
        let t0 = Instant::now();
        let mut now = t0;
        s.poll(now);
        let token = s.tick_token();

        for tick in 1..=20 {
            let event = s.tick_idle(token);
            if tick == IDLE_THRESHOLD_SECS {
                assert!(matches!(event, Some(QuizEvent::Feedback(_))));
            } else {
                assert!(event.is_none(), "unexpected event at tick {tick}");
            }
        }
        assert_eq!(counts.idle_helps.load(Ordering::SeqCst), 1);

        // Finish the session and confirm exactly one hesitation landed.
        for _ in 0..3 {
            now += secs(4);
            s.submit("4", now);
            now += secs(3);
            let events = s.poll(now);
            if let Some(QuizEvent::Completed { metrics, .. }) = events.first() {
                assert_eq!(metrics.hesitation_count, 1);
                assert_eq!(metrics.focus_score, 95);
            }
        }
        assert_eq!(s.phase(), QuizPhase::Complete);
    }

    #[test]
    fn stale_tick_tokens_are_no_ops() {
        let (mut s, _) = session();
        let t0 = Instant::now();
        let mut now = t0;
        s.poll(now);
        let old_token = s.tick_token();

        now += secs(4);
        s.submit("4", now);
        now += secs(3);
        s.poll(now); // next problem loaded, generation bumped

        assert_ne!(old_token, s.tick_token());
        for _ in 0..30 {
            assert!(s.tick_idle(old_token).is_none());
        }
        assert_eq!(s.idle_seconds(), 0);
    }

    #[test]
    fn ticks_are_suppressed_while_a_selection_is_pending() {
        let (mut s, _) = session();
        let t0 = Instant::now();
        s.poll(t0);
        let token = s.tick_token();
        s.submit("3", t0 + secs(4));
        assert!(s.tick_idle(token).is_none());
        assert_eq!(s.idle_seconds(), 0);
    }

    #[test]
    fn wrong_answer_rearms_idle_help_on_the_same_problem() {
        let (mut s, counts) = session();
        let t0 = Instant::now();
        let mut now = t0;
        s.poll(now);
        let token = s.tick_token();

        for _ in 0..IDLE_THRESHOLD_SECS {
            s.tick_idle(token);
        }
        assert_eq!(counts.idle_helps.load(Ordering::SeqCst), 1);

        now += secs(20);
        s.submit("3", now);
        now += secs(2);
        s.poll(now);

        // Same problem, same token; the idle counter and help flag were reset.
        for _ in 0..IDLE_THRESHOLD_SECS {
            s.tick_idle(token);
        }
        assert_eq!(counts.idle_helps.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn difficulty_follows_the_streak() {
        let counts = Arc::new(Counts::default());
        let provider = ContentProvider::new(Some(Box::new(StubGenerator {
            counts: counts.clone(),
        })));
        // Goal high enough to observe the medium and hard tiers.
        let mut s = QuizSession::with_goal(provider, Language::En, 6);
        let t0 = Instant::now();
        let mut now = t0;
        s.poll(now);
        let mut seen = Vec::new();
        for _ in 0..5 {
            seen.push(s.problem().unwrap().difficulty);
            now += secs(4);
            s.submit("4", now);
            now += secs(3);
            s.poll(now);
        }
        assert_eq!(
            seen,
            vec![
                Difficulty::Easy,   // streak 0
                Difficulty::Easy,   // streak 1
                Difficulty::Medium, // streak 2
                Difficulty::Medium, // streak 3
                Difficulty::Hard,   // streak 4
            ]
        );
    }

    #[test]
    fn retry_elapsed_time_is_measured_from_problem_display() {
        let (mut s, _) = session();
        let t0 = Instant::now();
        let mut now = t0;
        s.poll(now);

        // Fast wrong answer: impulsive.
        now += secs(1);
        s.submit("3", now);
        now += secs(2);
        s.poll(now);

        // The retry succeeds 10s after display; finish the session.
        now = t0 + secs(10);
        s.submit("4", now);
        now += secs(3);
        s.poll(now);
        for _ in 0..2 {
            now += secs(4);
            s.submit("4", now);
            now += secs(3);
            let events = s.poll(now);
            if let Some(QuizEvent::Completed { metrics, .. }) = events.first() {
                assert_eq!(metrics.impulsive_click_count, 1);
                assert_eq!(metrics.total_mistakes, 1);
                assert_eq!(metrics.focus_score, 90);
            }
        }
    }
}
