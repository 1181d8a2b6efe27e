use crate::domain::models::{LinkPhase, MessageSeverity};
use eframe::egui;

pub struct Palette {
    pub bg: egui::Color32,
    pub fg: egui::Color32,
    pub accent_amber: egui::Color32,
    pub accent_green: egui::Color32,
    pub accent_cyan: egui::Color32,
    pub accent_red: egui::Color32,
    pub muted: egui::Color32,
}

impl Palette {
    pub fn new(is_dark: bool) -> Self {
        if is_dark {
            Self {
                bg: egui::Color32::from_rgb(22, 22, 26),
                fg: egui::Color32::from_gray(235),
                accent_amber: egui::Color32::from_rgb(255, 190, 40),
                accent_green: egui::Color32::from_rgb(60, 220, 120),
                accent_cyan: egui::Color32::from_rgb(70, 200, 255),
                accent_red: egui::Color32::from_rgb(255, 90, 90),
                muted: egui::Color32::from_gray(90),
            }
        } else {
            Self {
                bg: egui::Color32::from_rgb(248, 246, 240),
                fg: egui::Color32::BLACK,
                accent_amber: egui::Color32::from_rgb(255, 205, 0),
                accent_green: egui::Color32::from_rgb(40, 200, 90),
                accent_cyan: egui::Color32::from_rgb(0, 170, 235),
                accent_red: egui::Color32::from_rgb(230, 50, 50),
                muted: egui::Color32::from_gray(150),
            }
        }
    }

    /// Banner text and colours (background, text) for a link phase.
    pub fn phase_banner(&self, phase: LinkPhase) -> (&'static str, egui::Color32, egui::Color32) {
        match phase {
            LinkPhase::Ready => ("CONNECTED", self.accent_green, egui::Color32::BLACK),
            LinkPhase::Scanning => ("SEARCHING...", self.accent_cyan, egui::Color32::BLACK),
            LinkPhase::Connecting => ("CONNECTING...", self.accent_amber, egui::Color32::BLACK),
            LinkPhase::DiscoveringServices => {
                ("PREPARING LIGHT...", self.accent_amber, egui::Color32::BLACK)
            }
            LinkPhase::Disconnected => ("LINK LOST", self.accent_red, egui::Color32::WHITE),
            LinkPhase::Idle => ("OFFLINE", self.muted, egui::Color32::WHITE),
        }
    }

    pub fn severity(&self, severity: MessageSeverity) -> egui::Color32 {
        match severity {
            MessageSeverity::Info => self.accent_cyan,
            MessageSeverity::Success => self.accent_green,
            MessageSeverity::Warning => self.accent_amber,
            MessageSeverity::Error => self.accent_red,
        }
    }
}

/// Soft, rounded look on top of egui's stock visuals, with amber as the lamp colour.
pub fn apply_theme(ctx: &egui::Context, is_dark: bool) {
    let palette = Palette::new(is_dark);
    let mut visuals = if is_dark {
        egui::Visuals::dark()
    } else {
        egui::Visuals::light()
    };

    let rounding = egui::Rounding::same(6.0);
    let soft = egui::Stroke::new(1.0, palette.muted);
    let raised = if is_dark {
        egui::Color32::from_gray(38)
    } else {
        egui::Color32::from_gray(236)
    };

    let widgets = &mut visuals.widgets;
    shade(&mut widgets.noninteractive, palette.bg, soft, palette.fg);
    shade(&mut widgets.inactive, raised, soft, palette.fg);
    shade(
        &mut widgets.hovered,
        raised,
        egui::Stroke::new(1.5, palette.accent_amber),
        palette.fg,
    );
    shade(
        &mut widgets.active,
        palette.accent_amber,
        egui::Stroke::new(1.5, palette.accent_amber),
        egui::Color32::BLACK,
    );
    for look in [
        &mut widgets.noninteractive,
        &mut widgets.inactive,
        &mut widgets.hovered,
        &mut widgets.active,
        &mut widgets.open,
    ] {
        look.rounding = rounding;
    }

    visuals.selection.bg_fill = palette.accent_amber.gamma_multiply(0.8);
    visuals.selection.stroke = egui::Stroke::new(1.0, palette.fg);
    visuals.slider_trailing_fill = true;
    visuals.window_rounding = egui::Rounding::same(10.0);
    visuals.window_fill = palette.bg;
    visuals.panel_fill = palette.bg;
    visuals.faint_bg_color = raised;
    visuals.hyperlink_color = palette.accent_cyan;

    ctx.style_mut(|style| {
        style.visuals = visuals;
        style.spacing.item_spacing = egui::vec2(10.0, 10.0);
        style.spacing.button_padding = egui::vec2(14.0, 8.0);
        // Wide slider so single steps are reachable with the mouse
        style.spacing.slider_width = 420.0;
        if let Some(body) = style.text_styles.get_mut(&egui::TextStyle::Body) {
            body.size = 15.0;
        }
        if let Some(heading) = style.text_styles.get_mut(&egui::TextStyle::Heading) {
            heading.size = 24.0;
        }
    });
}

fn shade(
    look: &mut egui::style::WidgetVisuals,
    fill: egui::Color32,
    stroke: egui::Stroke,
    text: egui::Color32,
) {
    look.bg_fill = fill;
    look.weak_bg_fill = fill;
    look.bg_stroke = stroke;
    look.fg_stroke = egui::Stroke::new(1.0, text);
}
