use std::time::{Duration, Instant};

use eframe::egui;
use kidoo_core::content::Language;
use kidoo_core::provider::ContentProvider;
use kidoo_core::quiz::{QuizEvent, QuizPhase, QuizSession};

use crate::app::Transition;

/// Hosts one quiz session. The 1-second idle tick is derived from frame
/// time, so dropping the view tears every timer down with it.
pub struct QuizView {
    session: QuizSession,
    last_idle_tick: Instant,
}

impl QuizView {
    pub fn new(provider: ContentProvider, language: Language) -> Self {
        Self {
            session: QuizSession::new(provider, language),
            last_idle_tick: Instant::now(),
        }
    }

    pub fn ui(&mut self, ctx: &egui::Context) -> Transition {
        let now = Instant::now();
        let mut transition = Transition::None;

        for event in self.session.poll(now) {
            if let QuizEvent::Completed { score, metrics } = event {
                transition = Transition::QuizDone { score, metrics };
            }
        }

        while now.duration_since(self.last_idle_tick) >= Duration::from_secs(1) {
            self.last_idle_tick += Duration::from_secs(1);
            let _ = self.session.tick_idle(self.session.tick_token());
        }

        let mut submitted: Option<String> = None;

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.horizontal(|ui| {
                if ui.button("⬅ Back").clicked() {
                    transition = Transition::GoHome;
                }
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    let solved = self.session.solved();
                    let goal = self.session.goal();
                    ui.label(format!("★ {solved}/{goal}"));
                });
            });
            ui.separator();

            ui.vertical_centered(|ui| {
                ui.add_space(16.0);

                match self.session.phase() {
                    QuizPhase::Loading => {
                        ui.add_space(40.0);
                        ui.spinner();
                        ui.label("Thinking of a good one...");
                    }
                    QuizPhase::Complete => {
                        ui.add_space(40.0);
                        ui.heading("All done! 🎉");
                    }
                    _ => {
                        if let Some(problem) = self.session.problem().cloned() {
                            ui.label(
                                egui::RichText::new(problem.theme.to_uppercase())
                                    .size(12.0)
                                    .weak(),
                            );
                            ui.add_space(8.0);
                            ui.label(
                                egui::RichText::new(&problem.question).size(28.0).strong(),
                            );
                            ui.add_space(20.0);

                            let selection = self.session.selection().map(str::to_string);
                            let highlight = self.session.highlight_correct();

                            for row in problem.options.chunks(2) {
                                ui.horizontal(|ui| {
                                    ui.add_space(ui.available_width() / 2.0 - 160.0);
                                    for option in row {
                                        let mut text = egui::RichText::new(option).size(22.0);
                                        let mut fill = None;
                                        if selection.as_deref() == Some(option.as_str()) {
                                            fill = if problem.is_correct(option) {
                                                Some(egui::Color32::from_rgb(50, 160, 80))
                                            } else {
                                                Some(egui::Color32::from_rgb(190, 60, 60))
                                            };
                                            text = text.color(egui::Color32::WHITE);
                                        } else if highlight && problem.is_correct(option) {
                                            fill = Some(egui::Color32::from_rgb(235, 200, 70));
                                        }

                                        let mut button = egui::Button::new(text)
                                            .min_size(egui::vec2(150.0, 56.0));
                                        if let Some(color) = fill {
                                            button = button.fill(color);
                                        }
                                        if ui.add(button).clicked() {
                                            submitted = Some(option.clone());
                                        }
                                    }
                                });
                                ui.add_space(8.0);
                            }

                            if self.session.idle_seconds()
                                > kidoo_core::quiz::IDLE_THRESHOLD_SECS
                            {
                                ui.add_space(4.0);
                                ui.label(
                                    egui::RichText::new("Take your time 🙂").size(13.0).weak(),
                                );
                            }
                        }
                    }
                }

                if let Some(feedback) = self.session.last_feedback() {
                    ui.add_space(20.0);
                    ui.separator();
                    ui.add_space(8.0);
                    ui.label(egui::RichText::new(&feedback.message).size(16.0).italics());
                }
            });
        });

        if let Some(option) = submitted {
            // The session ignores submissions while feedback is pending.
            let _ = self.session.submit(&option, now);
        }

        ctx.request_repaint_after(Duration::from_millis(100));
        transition
    }
}
