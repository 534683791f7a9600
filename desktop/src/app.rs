use chrono::Utc;
use eframe::egui;
use kidoo_core::content::{GeminiClient, Language};
use kidoo_core::ledger::FunTimeLedger;
use kidoo_core::profile::{ChildProgress, FUN_TIME_REWARD_SECONDS};
use kidoo_core::provider::ContentProvider;
use kidoo_core::telemetry::BehavioralMetrics;

use crate::fun::FunView;
use crate::quiz::QuizView;
use crate::storage::{self, SavedState};

/// What a view asks the app to do after its frame.
pub enum Transition {
    None,
    StartQuiz,
    EnterFun,
    GoHome,
    QuizDone { score: u32, metrics: BehavioralMetrics },
    FunExit,
}

enum View {
    Home,
    Quiz(QuizView),
    Fun(FunView),
}

pub struct KidooApp {
    view: View,
    progress: ChildProgress,
    ledger: FunTimeLedger,
    language: Language,
}

impl KidooApp {
    pub fn new(_cc: &eframe::CreationContext<'_>) -> Self {
        let state = storage::load_or_default();
        let ledger = FunTimeLedger::new(state.progress.fun_time_balance_seconds);
        Self {
            view: View::Home,
            progress: state.progress,
            ledger,
            language: state.language,
        }
    }

    fn new_provider() -> ContentProvider {
        match GeminiClient::from_env() {
            Some(client) => ContentProvider::new(Some(Box::new(client))),
            None => ContentProvider::offline(),
        }
    }

    fn save(&mut self) {
        self.progress.fun_time_balance_seconds = self.ledger.balance_seconds();
        let state = SavedState {
            language: self.language,
            progress: self.progress.clone(),
        };
        if let Err(e) = storage::save(&state) {
            tracing::warn!("could not save progress: {e}");
        }
    }
}

impl eframe::App for KidooApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let transition = match &mut self.view {
            View::Home => home_ui(ctx, &self.progress, &self.ledger, &mut self.language),
            View::Quiz(quiz) => quiz.ui(ctx),
            View::Fun(fun) => fun.ui(ctx, &mut self.ledger),
        };

        match transition {
            Transition::None => {}
            Transition::StartQuiz => {
                self.view = View::Quiz(QuizView::new(Self::new_provider(), self.language));
            }
            Transition::EnterFun => {
                // Withdraw the whole balance into the countdown; refuse on
                // an empty bank.
                if self.ledger.activate() > 0 {
                    self.view = View::Fun(FunView::new());
                }
            }
            Transition::GoHome => {
                self.view = View::Home;
            }
            Transition::QuizDone { score, metrics } => {
                self.progress
                    .record_quiz_completion(score, &metrics, Utc::now());
                self.ledger.credit(FUN_TIME_REWARD_SECONDS);
                self.save();
                self.view = View::Home;
            }
            Transition::FunExit => {
                let refunded = self.ledger.exit();
                tracing::debug!("reward session over, {refunded}s refunded");
                self.save();
                self.view = View::Home;
            }
        }
    }
}

fn home_ui(
    ctx: &egui::Context,
    progress: &ChildProgress,
    ledger: &FunTimeLedger,
    language: &mut Language,
) -> Transition {
    let mut transition = Transition::None;

    egui::CentralPanel::default().show(ctx, |ui| {
        ui.vertical_centered(|ui| {
            ui.add_space(24.0);
            ui.heading(egui::RichText::new("Kidoo").size(36.0).strong());
            ui.add_space(16.0);

            ui.horizontal(|ui| {
                ui.add_space(ui.available_width() / 2.0 - 130.0);
                ui.label(format!("⭐ {}", progress.stars));
                ui.separator();
                ui.label(format!("🔥 streak {}", progress.streak));
                ui.separator();
                ui.label(format!(
                    "🕐 {} min earned",
                    ledger.balance_seconds() / 60
                ));
            });

            ui.add_space(32.0);

            if ui
                .add_sized([220.0, 52.0], egui::Button::new("🧠 Smart Game"))
                .clicked()
            {
                transition = Transition::StartQuiz;
            }

            ui.add_space(12.0);

            let can_play = ledger.balance_seconds() > 0;
            let reward = ui.add_enabled(
                can_play,
                egui::Button::new("🎈 Reward Zone").min_size(egui::vec2(220.0, 52.0)),
            );
            if reward.clicked() {
                transition = Transition::EnterFun;
            }
            if !can_play {
                ui.add_space(6.0);
                ui.label(
                    egui::RichText::new("Solve a quiz to earn fun time!")
                        .size(13.0)
                        .weak(),
                );
            }

            ui.add_space(40.0);
            ui.separator();
            ui.add_space(8.0);

            egui::ComboBox::from_label("Language")
                .selected_text(language.english_name())
                .show_ui(ui, |ui| {
                    for lang in [Language::En, Language::Sr, Language::Hr, Language::Sl] {
                        ui.selectable_value(language, lang, lang.english_name());
                    }
                });
        });
    });

    transition
}
