use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogSettings {
    #[serde(default = "default_level")]
    pub level: String, // "trace", "debug", "info", "warn", "error"
    #[serde(default = "default_true")]
    pub file_logging_enabled: bool,
    #[serde(default = "default_true")]
    pub console_logging_enabled: bool,
    #[serde(default = "default_log_dir")]
    pub log_dir: String,
    #[serde(default = "default_prefix")]
    pub file_name_prefix: String,
    #[serde(default = "default_true")]
    pub show_file_line: bool,
    #[serde(default = "default_false")]
    pub show_thread_ids: bool,
    #[serde(default = "default_true")]
    pub show_target: bool,
    #[serde(default = "default_true")]
    pub ansi_colors: bool,
    #[serde(default = "default_rotation")]
    pub rotation: String, // "daily", "hourly", "minutely", "never"
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: default_level(),
            file_logging_enabled: default_true(),
            console_logging_enabled: default_true(),
            log_dir: default_log_dir(),
            file_name_prefix: default_prefix(),
            show_file_line: default_true(),
            show_thread_ids: default_false(),
            show_target: default_true(),
            ansi_colors: default_true(),
            rotation: default_rotation(),
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}
fn default_true() -> bool {
    true
}
fn default_false() -> bool {
    false
}
fn default_log_dir() -> String {
    "logs".to_string()
}
fn default_prefix() -> String {
    "remote_light".to_string()
}
fn default_rotation() -> String {
    "daily".to_string()
}

/// Which Bluetooth backend drives the light link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// WinRT on Windows, the simulated light elsewhere
    #[default]
    Auto,
    WinRt,
    Simulated,
}

/// Behaviour of the in-process simulated light
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulatorSettings {
    #[serde(default = "default_true")]
    pub radio_enabled: bool,
    #[serde(default = "default_scan_interval_ms")]
    pub scan_interval_ms: u64,
    #[serde(default = "default_connect_latency_ms")]
    pub connect_latency_ms: u64,
    /// Drop the link after this many writes, to exercise reconnects
    #[serde(default)]
    pub drop_link_after_writes: Option<u32>,
}

impl Default for SimulatorSettings {
    fn default() -> Self {
        Self {
            radio_enabled: true,
            scan_interval_ms: default_scan_interval_ms(),
            connect_latency_ms: default_connect_latency_ms(),
            drop_link_after_writes: None,
        }
    }
}

fn default_scan_interval_ms() -> u64 {
    400
}
fn default_connect_latency_ms() -> u64 {
    250
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub log_settings: LogSettings,

    #[serde(default)]
    pub transport: TransportKind,
    #[serde(default)]
    pub simulator: SimulatorSettings,

    // UI
    #[serde(default)]
    pub dark_mode: bool,
    /// Slider position restored on startup; never sent to the light on its own
    #[serde(default)]
    pub last_brightness: u8,
}

pub struct SettingsService {
    settings: Settings,
    settings_path: Option<PathBuf>,
}

impl SettingsService {
    pub fn new() -> anyhow::Result<Self> {
        let settings_path = Self::get_settings_path()?;
        let settings = Self::load_from_file(&settings_path).unwrap_or_default();

        Ok(Self {
            settings,
            settings_path: Some(settings_path),
        })
    }

    /// Defaults that are never written to disk
    pub fn in_memory() -> Self {
        Self {
            settings: Settings::default(),
            settings_path: None,
        }
    }

    fn get_settings_path() -> anyhow::Result<PathBuf> {
        let mut path = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
        path.push("RemoteLight");
        fs::create_dir_all(&path)?;
        path.push("settings.json");
        Ok(path)
    }

    fn load_from_file(path: &Path) -> anyhow::Result<Settings> {
        let contents = fs::read_to_string(path)?;
        let settings = serde_json::from_str(&contents)?;
        Ok(settings)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let Some(path) = &self.settings_path else {
            return Ok(());
        };
        let json = serde_json::to_string_pretty(&self.settings)?;
        fs::write(path, json)?;
        Ok(())
    }

    pub fn get(&self) -> &Settings {
        &self.settings
    }

    pub fn get_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }

    pub fn remember_brightness(&mut self, value: u8) -> anyhow::Result<()> {
        if self.settings.last_brightness != value {
            self.settings.last_brightness = value;
            self.save()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_uses_defaults() {
        let settings: Settings = serde_json::from_str("{}").unwrap();
        assert_eq!(settings.transport, TransportKind::Auto);
        assert_eq!(settings.log_settings.level, "info");
        assert_eq!(settings.log_settings.file_name_prefix, "remote_light");
        assert!(settings.simulator.radio_enabled);
        assert_eq!(settings.simulator.scan_interval_ms, 400);
        assert_eq!(settings.last_brightness, 0);
    }

    #[test]
    fn test_partial_file_keeps_given_values() {
        let json = r#"{
            "transport": "simulated",
            "simulator": { "drop_link_after_writes": 3 },
            "log_settings": { "level": "debug" },
            "last_brightness": 180
        }"#;
        let settings: Settings = serde_json::from_str(json).unwrap();
        assert_eq!(settings.transport, TransportKind::Simulated);
        assert_eq!(settings.simulator.drop_link_after_writes, Some(3));
        assert_eq!(settings.simulator.connect_latency_ms, 250);
        assert_eq!(settings.log_settings.level, "debug");
        assert!(settings.log_settings.console_logging_enabled);
        assert_eq!(settings.last_brightness, 180);
    }

    #[test]
    fn test_transport_kind_names() {
        assert_eq!(
            serde_json::to_string(&TransportKind::WinRt).unwrap(),
            "\"winrt\""
        );
    }

    #[test]
    fn test_in_memory_save_is_noop() {
        let mut service = SettingsService::in_memory();
        service.remember_brightness(77).unwrap();
        assert_eq!(service.get().last_brightness, 77);
    }
}
