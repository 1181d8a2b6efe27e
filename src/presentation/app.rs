use crate::domain::brightness::{BrightnessValue, WriteOrigin, NOT_CONNECTED_TEXT};
use crate::domain::link::LinkCommand;
use crate::domain::models::{LinkNotice, LinkPhase, MessageSeverity, StatusMessage};
use crate::domain::settings::SettingsService;
use crate::infrastructure::link_service::LinkService;
use crate::infrastructure::logging::{init_logger, LoggingGuard};
use crate::presentation::theme::{apply_theme, Palette};
use eframe::egui;
use std::collections::VecDeque;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

const EVENT_LOG_CAPACITY: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tab {
    Home,
    Settings,
    Debug,
}

/// What the UI knows about the link, rebuilt purely from worker notices.
#[derive(Debug)]
pub struct LinkView {
    pub phase: LinkPhase,
    pub status: Option<StatusMessage>,
    pub brightness_label: String,
    pub fatal: Option<String>,
    pub event_log: VecDeque<(Duration, String)>,
    started: Instant,
}

impl LinkView {
    pub fn new() -> Self {
        Self {
            phase: LinkPhase::Idle,
            status: None,
            brightness_label: NOT_CONNECTED_TEXT.to_string(),
            fatal: None,
            event_log: VecDeque::new(),
            started: Instant::now(),
        }
    }

    pub fn apply(&mut self, notice: LinkNotice) {
        let entry = match &notice {
            LinkNotice::Phase(phase) => format!("phase -> {phase}"),
            LinkNotice::Status(status) => format!("{:?}: {}", status.severity, status.message),
            LinkNotice::BrightnessLabel(text) => text.clone(),
            LinkNotice::Fatal(message) => format!("FATAL: {message}"),
        };
        self.log(entry);

        match notice {
            LinkNotice::Phase(phase) => self.phase = phase,
            LinkNotice::Status(status) => self.status = Some(status),
            LinkNotice::BrightnessLabel(text) => self.brightness_label = text,
            LinkNotice::Fatal(message) => self.fatal = Some(message),
        }
    }

    fn log(&mut self, entry: String) {
        if self.event_log.len() == EVENT_LOG_CAPACITY {
            self.event_log.pop_front();
        }
        self.event_log.push_back((self.started.elapsed(), entry));
    }
}

impl Default for LinkView {
    fn default() -> Self {
        Self::new()
    }
}

/// One frame of slider interaction.
#[derive(Debug, Clone, Copy, Default)]
pub struct SliderFrame {
    pub changed: bool,
    pub dragged: bool,
    pub released: bool,
    pub pointer_down: bool,
}

impl SliderFrame {
    pub fn from_response(response: &egui::Response) -> Self {
        Self {
            changed: response.changed(),
            dragged: response.dragged(),
            released: response.drag_stopped() || response.clicked(),
            pointer_down: response.is_pointer_button_down_on(),
        }
    }

    /// The write this frame should produce.
    ///
    /// Anything while the pointer is held is live. Releasing the pointer or a keyboard
    /// step commits.
    pub fn write(&self) -> Option<WriteOrigin> {
        if self.released || (self.changed && !self.dragged && !self.pointer_down) {
            Some(WriteOrigin::Commit)
        } else if self.changed {
            Some(WriteOrigin::Live)
        } else {
            None
        }
    }
}

pub struct RemoteLightApp {
    pub(crate) settings: SettingsService,
    pub(crate) link: Option<LinkService>,
    pub(crate) view: LinkView,

    // UI State
    pub(crate) selected_tab: Tab,
    pub(crate) brightness: u8,
    pub(crate) is_dark_mode: bool,
    pub(crate) settings_dirty: bool,

    // Logging guard
    pub(crate) _logging_guard: Option<LoggingGuard>,
}

impl RemoteLightApp {
    pub fn new(cc: &eframe::CreationContext<'_>) -> Self {
        let settings = SettingsService::new().unwrap_or_else(|e| {
            eprintln!("Failed to load settings, using defaults: {}", e);
            SettingsService::in_memory()
        });

        let logging_guard = init_logger(&settings.get().log_settings)
            .map_err(|e| eprintln!("Failed to initialize logging: {}", e))
            .ok();

        info!("Starting Remote Light");

        let is_dark_mode = settings.get().dark_mode;
        apply_theme(&cc.egui_ctx, is_dark_mode);

        let mut view = LinkView::new();
        let link = match LinkService::spawn(settings.get()) {
            Ok(link) => Some(link),
            Err(e) => {
                error!("Failed to start light link: {}", e);
                view.apply(LinkNotice::Status(StatusMessage {
                    message: format!("Bluetooth unavailable: {e}"),
                    severity: MessageSeverity::Error,
                }));
                None
            }
        };

        Self {
            brightness: settings.get().last_brightness,
            settings,
            link,
            view,
            selected_tab: Tab::Home,
            is_dark_mode,
            settings_dirty: false,
            _logging_guard: logging_guard,
        }
    }

    pub(crate) fn send(&mut self, command: LinkCommand) {
        let Some(link) = &self.link else {
            return;
        };
        if let Err(e) = link.send(command) {
            error!("Light link unreachable: {}", e);
            self.view.apply(LinkNotice::Status(StatusMessage {
                message: e.to_string(),
                severity: MessageSeverity::Error,
            }));
        }
    }

    pub(crate) fn on_slider(&mut self, origin: WriteOrigin) {
        let value = BrightnessValue::new(self.brightness);
        self.send(LinkCommand::SetBrightness { value, origin });

        if origin == WriteOrigin::Commit {
            if let Err(e) = self.settings.remember_brightness(value.value()) {
                warn!("Failed to save brightness: {}", e);
            }
        }
    }

    pub(crate) fn palette(&self) -> Palette {
        Palette::new(self.is_dark_mode)
    }

    fn drain_notices(&mut self) {
        let Some(link) = &mut self.link else {
            return;
        };
        while let Some(notice) = link.try_recv() {
            self.view.apply(notice);
        }
    }
}

impl eframe::App for RemoteLightApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.drain_notices();

        if let Some(message) = &self.view.fatal {
            error!("Shutting down: {}", message);
            ctx.send_viewport_cmd(egui::ViewportCommand::Close);
            return;
        }

        // Notices arrive from another thread; poll for them while idle.
        ctx.request_repaint_after(Duration::from_millis(100));

        egui::TopBottomPanel::top("top_panel").show(ctx, |ui| {
            egui::menu::bar(ui, |ui| {
                ui.selectable_value(&mut self.selected_tab, Tab::Home, "Light");
                ui.selectable_value(&mut self.selected_tab, Tab::Settings, "Settings");
                ui.selectable_value(&mut self.selected_tab, Tab::Debug, "Debug");

                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    let switch_icon = if self.is_dark_mode {
                        "☀ Light"
                    } else {
                        "🌙 Dark"
                    };
                    if ui.button(switch_icon).clicked() {
                        self.is_dark_mode = !self.is_dark_mode;
                        self.settings.get_mut().dark_mode = self.is_dark_mode;
                        if let Err(e) = self.settings.save() {
                            warn!("Failed to save settings: {}", e);
                        }
                        apply_theme(ctx, self.is_dark_mode);
                    }
                });
            });
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            egui::ScrollArea::vertical().show(ui, |ui| {
                ui.vertical_centered(|ui| {
                    ui.set_max_width(640.0);
                    ui.add_space(20.0);

                    use crate::presentation::tabs;
                    match self.selected_tab {
                        Tab::Home => tabs::home::render(self, ui),
                        Tab::Settings => tabs::settings::render(self, ui),
                        Tab::Debug => tabs::debug::render(self, ui),
                    }

                    ui.add_space(30.0);
                });
            });
        });
    }
}
