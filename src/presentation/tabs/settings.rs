use crate::domain::settings::TransportKind;
use crate::presentation::app::RemoteLightApp;
use crate::presentation::components::Components;
use eframe::egui;
use tracing::{info, warn};

pub fn render(app: &mut RemoteLightApp, ui: &mut egui::Ui) {
    Components::heading(ui, "Settings");
    ui.add_space(20.0);

    let mut changed = false;
    let settings_mut = app.settings.get_mut();

    Components::card(ui, "Bluetooth Backend", |ui| {
        ui.horizontal(|ui| {
            ui.label("Transport:");
            egui::ComboBox::from_id_salt("transport")
                .selected_text(transport_name(settings_mut.transport))
                .show_ui(ui, |ui| {
                    for kind in [
                        TransportKind::Auto,
                        TransportKind::WinRt,
                        TransportKind::Simulated,
                    ] {
                        let name = transport_name(kind);
                        changed |= ui
                            .selectable_value(&mut settings_mut.transport, kind, name)
                            .changed();
                    }
                });
        });

        ui.collapsing("Simulated Light", |ui| {
            let sim = &mut settings_mut.simulator;
            changed |= ui.checkbox(&mut sim.radio_enabled, "Radio enabled").changed();
            ui.horizontal(|ui| {
                ui.label("Advertising interval (ms):");
                changed |= ui
                    .add(egui::DragValue::new(&mut sim.scan_interval_ms).range(1..=5000))
                    .changed();
            });
            ui.horizontal(|ui| {
                ui.label("Connect latency (ms):");
                changed |= ui
                    .add(egui::DragValue::new(&mut sim.connect_latency_ms).range(0..=5000))
                    .changed();
            });

            let mut drops = sim.drop_link_after_writes.is_some();
            if ui.checkbox(&mut drops, "Drop link after writes").changed() {
                sim.drop_link_after_writes = drops.then_some(10);
                changed = true;
            }
            if let Some(limit) = &mut sim.drop_link_after_writes {
                ui.indent("drop_after", |ui| {
                    changed |= ui
                        .add(egui::DragValue::new(limit).range(1..=1000).suffix(" writes"))
                        .changed();
                });
            }
        });
    });

    ui.add_space(10.0);

    Components::card(ui, "Logging", |ui| {
        let log = &mut settings_mut.log_settings;
        ui.horizontal(|ui| {
            ui.label("Verbosity Level:");
            egui::ComboBox::from_id_salt("log_level")
                .selected_text(&log.level)
                .show_ui(ui, |ui| {
                    for level in &["trace", "debug", "info", "warn", "error"] {
                        changed |= ui
                            .selectable_value(&mut log.level, level.to_string(), *level)
                            .changed();
                    }
                });
        });

        changed |= ui
            .checkbox(&mut log.console_logging_enabled, "Console Logs")
            .changed();
        changed |= ui
            .checkbox(&mut log.file_logging_enabled, "File Logs")
            .changed();

        if log.file_logging_enabled {
            ui.indent("file_logs", |ui| {
                ui.horizontal(|ui| {
                    ui.label("Directory:");
                    changed |= ui.text_edit_singleline(&mut log.log_dir).changed();
                });
                ui.horizontal(|ui| {
                    ui.label("Rotation:");
                    egui::ComboBox::from_id_salt("log_rot")
                        .selected_text(&log.rotation)
                        .show_ui(ui, |ui| {
                            for rot in &["daily", "hourly", "minutely", "never"] {
                                changed |= ui
                                    .selectable_value(&mut log.rotation, rot.to_string(), *rot)
                                    .changed();
                            }
                        });
                });
            });
        }
    });

    app.settings_dirty |= changed;
    ui.add_space(10.0);

    ui.horizontal(|ui| {
        if ui
            .add_enabled(app.settings_dirty, egui::Button::new("Save"))
            .clicked()
        {
            match app.settings.save() {
                Ok(()) => {
                    info!("Settings saved");
                    app.settings_dirty = false;
                }
                Err(e) => warn!("Failed to save settings: {}", e),
            }
        }
        ui.label(
            egui::RichText::new("Changes apply after a restart.")
                .italics()
                .size(12.0),
        );
    });
}

fn transport_name(kind: TransportKind) -> &'static str {
    match kind {
        TransportKind::Auto => "Automatic",
        TransportKind::WinRt => "Windows Bluetooth",
        TransportKind::Simulated => "Simulated light",
    }
}
