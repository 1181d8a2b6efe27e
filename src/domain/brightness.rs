use crate::domain::models::CharacteristicId;
use crate::domain::transport::{Transport, TransportError};
use std::fmt;
use tracing::{debug, trace};

/// Prefix of the label shown after a value was sent to the light
pub const LABEL_PREFIX: &str = "Current brightness: ";

/// Label shown when a value could not be sent
pub const NOT_CONNECTED_TEXT: &str = "Light not connected!";

/// Brightness as produced by the UI slider (0..=255).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct BrightnessValue(u8);

impl BrightnessValue {
    pub const MIN: Self = Self(u8::MIN);
    pub const MAX: Self = Self(u8::MAX);

    pub const fn new(value: u8) -> Self {
        Self(value)
    }

    pub fn value(self) -> u8 {
        self.0
    }

    /// Wire form: decimal ASCII digits, no terminator and no framing.
    pub fn encode(self) -> Vec<u8> {
        self.0.to_string().into_bytes()
    }

    pub fn label(self) -> String {
        format!("{LABEL_PREFIX}{}", self.0)
    }
}

impl From<u8> for BrightnessValue {
    fn from(value: u8) -> Self {
        Self(value)
    }
}

impl fmt::Display for BrightnessValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Which UI event produced a brightness value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOrigin {
    /// Intermediate value while the slider is being dragged
    Live,
    /// Final value when the interaction ends
    Commit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    Sent,
    /// The link is not Ready; nothing was handed to the transport.
    NotReady,
    /// The transport refused the write.
    Failed(TransportError),
}

impl WriteOutcome {
    pub fn label(&self, value: BrightnessValue) -> String {
        match self {
            Self::Sent => value.label(),
            Self::NotReady | Self::Failed(_) => NOT_CONNECTED_TEXT.to_string(),
        }
    }
}

/// Forwards brightness values to the resolved characteristic.
///
/// The writer never touches link state. It only receives the read-only answer to
/// "is the link Ready, and with which characteristic". Writes are not queued, retried or
/// coalesced: one UI event produces at most one transport call.
pub struct BrightnessWriter;

impl BrightnessWriter {
    pub fn write<T: Transport + ?Sized>(
        transport: &mut T,
        ready_characteristic: Option<CharacteristicId>,
        value: BrightnessValue,
    ) -> WriteOutcome {
        let Some(characteristic) = ready_characteristic else {
            debug!("Brightness {} rejected: link not ready", value);
            return WriteOutcome::NotReady;
        };

        let payload = value.encode();
        match transport.write_characteristic(characteristic, &payload) {
            Ok(()) => {
                trace!("Wrote brightness {} to {}", value, characteristic);
                WriteOutcome::Sent
            }
            Err(e) => WriteOutcome::Failed(e),
        }
    }
}
