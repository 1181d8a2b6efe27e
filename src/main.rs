mod domain;
mod infrastructure;
mod presentation;

use eframe::egui;

fn main() -> Result<(), eframe::Error> {
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([560.0, 640.0])
            .with_min_inner_size([420.0, 480.0])
            .with_title("Remote Light"),
        ..Default::default()
    };

    eframe::run_native(
        "Remote Light",
        options,
        Box::new(|cc| Ok(Box::new(presentation::app::RemoteLightApp::new(cc)))),
    )
}
