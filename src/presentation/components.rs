use eframe::egui;

pub struct Components;

impl Components {
    pub fn heading(ui: &mut egui::Ui, text: &str) {
        ui.label(egui::RichText::new(text).heading().strong());
    }

    /// Rounded panel with a small caps title over its contents.
    pub fn card<R>(
        ui: &mut egui::Ui,
        title: &str,
        add_contents: impl FnOnce(&mut egui::Ui) -> R,
    ) -> R {
        let visuals = ui.visuals();
        let frame = egui::Frame::none()
            .inner_margin(egui::Margin::symmetric(16.0, 12.0))
            .rounding(egui::Rounding::same(10.0))
            .fill(visuals.faint_bg_color)
            .stroke(visuals.widgets.noninteractive.bg_stroke);
        let title_color = visuals.weak_text_color();

        frame
            .show(ui, |ui| {
                ui.set_width(ui.available_width());
                ui.label(
                    egui::RichText::new(title.to_uppercase())
                        .size(12.0)
                        .strong()
                        .color(title_color),
                );
                ui.add_space(4.0);
                add_contents(ui)
            })
            .inner
    }

    /// Full-width pill showing the link phase.
    pub fn status_banner(
        ui: &mut egui::Ui,
        text: &str,
        fill: egui::Color32,
        text_color: egui::Color32,
    ) {
        egui::Frame::none()
            .fill(fill)
            .rounding(egui::Rounding::same(16.0))
            .inner_margin(egui::Margin::symmetric(12.0, 8.0))
            .show(ui, |ui| {
                ui.vertical_centered(|ui| {
                    ui.label(egui::RichText::new(text).color(text_color).size(16.0).strong());
                });
            });
    }

    /// Large read-out of the last brightness label
    pub fn readout(ui: &mut egui::Ui, text: &str, color: egui::Color32) {
        ui.label(egui::RichText::new(text).size(22.0).strong().color(color));
    }
}
