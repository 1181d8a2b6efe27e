use std::fmt;
use uuid::Uuid;

/// Transport-level handle of a peripheral (the 48-bit Bluetooth address on WinRT)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PeripheralId(pub u64);

impl fmt::Display for PeripheralId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = self.0.to_be_bytes();
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            b[2], b[3], b[4], b[5], b[6], b[7]
        )
    }
}

/// A single scan result: who advertised, and under which name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeripheralIdentity {
    pub id: PeripheralId,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ServiceId(pub Uuid);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CharacteristicId(pub Uuid);

impl fmt::Display for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl fmt::Display for CharacteristicId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredService {
    pub id: ServiceId,
    pub characteristics: Vec<CharacteristicId>,
}

/// GATT layout reported by the transport once discovery completes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceTree {
    pub services: Vec<DiscoveredService>,
}

impl ServiceTree {
    pub fn new(services: Vec<DiscoveredService>) -> Self {
        Self { services }
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    /// Looks up `characteristic` under `service`. Both must be present.
    pub fn resolve(
        &self,
        service: ServiceId,
        characteristic: CharacteristicId,
    ) -> Option<CharacteristicId> {
        self.services
            .iter()
            .find(|s| s.id == service)?
            .characteristics
            .iter()
            .copied()
            .find(|c| *c == characteristic)
    }
}

/// Externally visible lifecycle phase of the light link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkPhase {
    Idle,
    Scanning,
    Connecting,
    DiscoveringServices,
    Ready,
    /// Transient; always followed by `Scanning` (or `Idle` if the radio went away).
    Disconnected,
}

impl fmt::Display for LinkPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Idle => "idle",
            Self::Scanning => "scanning",
            Self::Connecting => "connecting",
            Self::DiscoveringServices => "discovering services",
            Self::Ready => "ready",
            Self::Disconnected => "disconnected",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusMessage {
    pub message: String,
    pub severity: MessageSeverity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageSeverity {
    Info,
    Success,
    Warning,
    Error,
}

/// Everything the link worker reports back to the UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkNotice {
    Phase(LinkPhase),
    Status(StatusMessage),
    /// Text for the brightness label: either the applied value or "not connected".
    BrightnessLabel(String),
    /// Unrecoverable condition (e.g. Bluetooth access denied); the app should exit.
    Fatal(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peripheral_id_formats_as_mac() {
        let id = PeripheralId(0x58CF_7942_1A2E);
        assert_eq!(id.to_string(), "58:CF:79:42:1A:2E");
    }

    #[test]
    fn test_resolve_requires_service_and_characteristic() {
        let service = ServiceId(Uuid::from_u128(1));
        let wanted = CharacteristicId(Uuid::from_u128(2));
        let other = CharacteristicId(Uuid::from_u128(3));

        let tree = ServiceTree::new(vec![DiscoveredService {
            id: service,
            characteristics: vec![other, wanted],
        }]);
        assert_eq!(tree.resolve(service, wanted), Some(wanted));
        assert_eq!(tree.resolve(ServiceId(Uuid::from_u128(9)), wanted), None);

        let without_char = ServiceTree::new(vec![DiscoveredService {
            id: service,
            characteristics: vec![other],
        }]);
        assert_eq!(without_char.resolve(service, wanted), None);
        assert_eq!(ServiceTree::default().resolve(service, wanted), None);
    }
}
