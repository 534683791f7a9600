use std::time::{Duration, Instant};

use eframe::egui;
use kidoo_core::bubbles::{BubbleField, SPAWN_INTERVAL_MS};
use kidoo_core::ledger::{FunTimeLedger, TickOutcome};

use crate::app::Transition;

fn format_time(seconds: u32) -> String {
    format!("{}:{:02}", seconds / 60, seconds % 60)
}

/// The reward game: pop rising bubbles until the fun-time countdown runs
/// out or the child leaves. Both cadences (1s countdown, 800ms spawn) are
/// derived from frame time.
pub struct FunView {
    field: BubbleField,
    last_countdown_tick: Instant,
    last_spawn: Instant,
}

impl FunView {
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            field: BubbleField::new(400.0, 600.0),
            last_countdown_tick: now,
            last_spawn: now,
        }
    }

    pub fn ui(&mut self, ctx: &egui::Context, ledger: &mut FunTimeLedger) -> Transition {
        let now = Instant::now();
        let mut transition = Transition::None;

        while now.duration_since(self.last_countdown_tick) >= Duration::from_secs(1) {
            self.last_countdown_tick += Duration::from_secs(1);
            if ledger.tick() == TickOutcome::Expired {
                transition = Transition::FunExit;
            }
        }

        let spawn_interval = Duration::from_millis(SPAWN_INTERVAL_MS);
        while now.duration_since(self.last_spawn) >= spawn_interval {
            self.last_spawn += spawn_interval;
            self.field.spawn();
        }

        self.field.advance();

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.label(
                    egui::RichText::new(format!("🏆 {}", self.field.score()))
                        .size(20.0)
                        .strong(),
                );
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    if ui.button("✖").clicked() {
                        transition = Transition::FunExit;
                    }
                    let remaining = ledger.active_seconds();
                    let mut time = egui::RichText::new(format_time(remaining)).size(20.0);
                    if remaining < 60 {
                        time = time.color(egui::Color32::from_rgb(220, 60, 60));
                    }
                    ui.label(time);
                });
            });
            ui.separator();

            let (response, painter) =
                ui.allocate_painter(ui.available_size(), egui::Sense::click());
            let rect = response.rect;
            self.field.set_bounds(rect.width(), rect.height());

            if response.clicked() {
                if let Some(pos) = response.interact_pointer_pos() {
                    let local = pos - rect.min;
                    // Topmost (most recently spawned) bubble wins.
                    let hit = self
                        .field
                        .bubbles()
                        .iter()
                        .rev()
                        .find(|b| {
                            let cx = b.x + b.size / 2.0;
                            let cy = b.y + b.size / 2.0;
                            let dx = local.x - cx;
                            let dy = local.y - cy;
                            dx * dx + dy * dy <= (b.size / 2.0) * (b.size / 2.0)
                        })
                        .map(|b| b.id);
                    if let Some(id) = hit {
                        self.field.pop(id);
                    }
                }
            }

            for bubble in self.field.bubbles() {
                let center = rect.min
                    + egui::vec2(bubble.x + bubble.size / 2.0, bubble.y + bubble.size / 2.0);
                let [r, g, b] = bubble.color;
                painter.circle_filled(center, bubble.size / 2.0, egui::Color32::from_rgb(r, g, b));
                // Small highlight to make them read as bubbles.
                painter.circle_filled(
                    center - egui::vec2(bubble.size * 0.15, bubble.size * 0.15),
                    bubble.size * 0.1,
                    egui::Color32::from_white_alpha(120),
                );
            }

            if self.field.score() == 0 {
                painter.text(
                    rect.center(),
                    egui::Align2::CENTER_CENTER,
                    "Pop the bubbles!",
                    egui::FontId::proportional(28.0),
                    egui::Color32::from_white_alpha(90),
                );
            }
        });

        // Animation frame: keep advancing even without input.
        ctx.request_repaint();
        transition
    }
}
