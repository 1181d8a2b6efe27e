use crate::domain::protocol::LIGHT_DEVICE_NAME;

/// Decides whether an advertisement belongs to the light we control.
///
/// Exact, case-sensitive name equality. No prefix matching and no address allow-list.
#[derive(Debug, Clone, Copy)]
pub struct DeviceMatcher {
    target: &'static str,
}

impl DeviceMatcher {
    pub const fn new(target: &'static str) -> Self {
        Self { target }
    }

    pub const fn light() -> Self {
        Self::new(LIGHT_DEVICE_NAME)
    }

    pub fn target(&self) -> &'static str {
        self.target
    }

    pub fn matches(&self, advertised_name: &str) -> bool {
        advertised_name == self.target
    }
}

impl Default for DeviceMatcher {
    fn default() -> Self {
        Self::light()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_name_only() {
        let matcher = DeviceMatcher::light();
        assert!(matcher.matches("ESP32C3 Light"));

        for name in [
            "",
            "esp32c3 light",
            "ESP32C3 Light ",
            "ESP32C3 Light 2",
            "ESP32C3",
            " ESP32C3 Light",
        ] {
            assert!(!matcher.matches(name), "{name:?} must not match");
        }
    }
}
