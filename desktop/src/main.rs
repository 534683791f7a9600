mod app;
mod fun;
mod quiz;
mod storage;

use app::KidooApp;
use eframe::egui;

fn main() -> eframe::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([480.0, 680.0])
            .with_min_inner_size([400.0, 560.0]),
        ..Default::default()
    };

    eframe::run_native(
        "Kidoo",
        options,
        Box::new(|cc| Ok(Box::new(KidooApp::new(cc)))),
    )
}
