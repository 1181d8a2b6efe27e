use crate::domain::link::LinkCommand;
use crate::domain::models::LinkPhase;
use crate::domain::protocol::LIGHT_DEVICE_NAME;
use crate::presentation::app::{RemoteLightApp, SliderFrame};
use crate::presentation::components::Components;
use eframe::egui;

pub fn render(app: &mut RemoteLightApp, ui: &mut egui::Ui) {
    Components::heading(ui, "Remote Light");
    ui.add_space(20.0);

    ui_link_panel(app, ui);
    ui.add_space(15.0);

    ui_brightness_panel(app, ui);
    ui.add_space(15.0);

    ui_status_panel(app, ui);
}

fn ui_link_panel(app: &mut RemoteLightApp, ui: &mut egui::Ui) {
    let palette = app.palette();
    Components::card(ui, "Light Link", |ui| {
        let (text, bg_color, text_color) = palette.phase_banner(app.view.phase);
        Components::status_banner(ui, text, bg_color, text_color);

        ui.add_space(6.0);
        ui.horizontal(|ui| {
            ui.label(format!("Looking for \"{}\"", LIGHT_DEVICE_NAME));
            if matches!(
                app.view.phase,
                LinkPhase::Scanning | LinkPhase::Connecting | LinkPhase::DiscoveringServices
            ) {
                ui.spinner();
            }
        });

        if app.view.phase == LinkPhase::Idle && app.link.is_some() {
            ui.horizontal(|ui| {
                if ui.button("Retry").clicked() {
                    app.send(LinkCommand::Start);
                }
                bluetooth_settings_button(ui);
            });
        }
    });
}

#[cfg(windows)]
fn bluetooth_settings_button(ui: &mut egui::Ui) {
    if ui.button("Bluetooth Settings").clicked() {
        let _ = std::process::Command::new("explorer")
            .arg("ms-settings:bluetooth")
            .spawn();
    }
}

#[cfg(not(windows))]
fn bluetooth_settings_button(_ui: &mut egui::Ui) {}

fn ui_brightness_panel(app: &mut RemoteLightApp, ui: &mut egui::Ui) {
    let palette = app.palette();
    Components::card(ui, "Brightness", |ui| {
        let response = ui.add(
            egui::Slider::new(&mut app.brightness, u8::MIN..=u8::MAX)
                .show_value(true)
                .trailing_fill(true),
        );

        if let Some(origin) = SliderFrame::from_response(&response).write() {
            app.on_slider(origin);
        }

        ui.add_space(6.0);
        let color = if app.view.phase == LinkPhase::Ready {
            palette.fg
        } else {
            palette.accent_red
        };
        Components::readout(ui, &app.view.brightness_label, color);
    });
}

fn ui_status_panel(app: &mut RemoteLightApp, ui: &mut egui::Ui) {
    let palette = app.palette();
    if let Some(msg) = &app.view.status {
        Components::card(ui, "Status", |ui| {
            ui.label(
                egui::RichText::new(&msg.message)
                    .color(palette.severity(msg.severity))
                    .strong(),
            );
        });
    }
}
