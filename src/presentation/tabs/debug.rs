use crate::domain::protocol::{LIGHT_CHARACTERISTIC, LIGHT_DEVICE_NAME, LIGHT_SERVICE};
use crate::presentation::app::RemoteLightApp;
use crate::presentation::components::Components;
use eframe::egui;

pub fn render(app: &mut RemoteLightApp, ui: &mut egui::Ui) {
    Components::heading(ui, "Debug & Internal State");
    ui.add_space(20.0);

    Components::card(ui, "Link Engine", |ui| {
        egui::Grid::new("debug_grid")
            .spacing([20.0, 5.0])
            .show(ui, |ui| {
                ui.label("Phase:");
                ui.label(egui::RichText::new(app.view.phase.to_string()).strong());
                ui.end_row();
                ui.label("Target:");
                ui.label(LIGHT_DEVICE_NAME);
                ui.end_row();
                ui.label("Service:");
                ui.monospace(LIGHT_SERVICE.to_string());
                ui.end_row();
                ui.label("Characteristic:");
                ui.monospace(LIGHT_CHARACTERISTIC.to_string());
                ui.end_row();
                ui.label("Backend:");
                ui.label(format!("{:?}", app.settings.get().transport));
                ui.end_row();
            });
    });

    ui.add_space(10.0);

    Components::card(ui, "Link Events", |ui| {
        if app.view.event_log.is_empty() {
            ui.label("No events yet.");
            return;
        }
        egui::ScrollArea::vertical()
            .id_salt("event_log")
            .max_height(260.0)
            .stick_to_bottom(true)
            .show(ui, |ui| {
                for (at, entry) in &app.view.event_log {
                    ui.monospace(format!("{:>8.3}s  {}", at.as_secs_f32(), entry));
                }
            });
    });
}
