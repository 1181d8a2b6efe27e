//! Transport Adapter port
//!
//! The link state machine talks to the radio only through [`Transport`]. Every method is
//! fire-and-forget: it starts the platform operation and returns immediately, and the
//! outcome arrives later as a [`TransportEvent`] posted through an [`EventSink`].

use crate::domain::link::LinkInput;
use crate::domain::models::{CharacteristicId, PeripheralId, PeripheralIdentity, ServiceTree};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::trace;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("Bluetooth radio is turned off")]
    Disabled,
    #[error("Bluetooth access was denied by the system")]
    PermissionDenied,
    #[error("no peripheral link is open")]
    NotConnected,
    #[error("characteristic {0} was not discovered on the peripheral")]
    UnknownCharacteristic(Uuid),
    #[error("platform Bluetooth error: {0}")]
    Platform(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connected,
    Disconnected,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    ScanResult(PeripheralIdentity),
    ConnectionStateChanged {
        peripheral: PeripheralId,
        state: ConnectionState,
    },
    /// Discovery finished. A failed discovery is reported with an empty tree.
    ServicesDiscovered {
        peripheral: PeripheralId,
        services: ServiceTree,
    },
}

pub trait Transport {
    /// Whether the radio is currently usable. Never tries to switch it on.
    fn is_enabled(&self) -> bool;

    /// Starts (or restarts) advertisement scanning. Results arrive as `ScanResult`.
    fn start_scan(&mut self) -> Result<(), TransportError>;

    fn stop_scan(&mut self) -> Result<(), TransportError>;

    /// Opens a link. Completion is reported as `ConnectionStateChanged`; a failed attempt
    /// is reported as `Disconnected`.
    fn connect(&mut self, peripheral: &PeripheralIdentity) -> Result<(), TransportError>;

    /// Enumerates services on the open link and reports `ServicesDiscovered`.
    fn discover_services(&mut self) -> Result<(), TransportError>;

    /// Unacknowledged write of `payload` to a characteristic found during discovery.
    fn write_characteristic(
        &mut self,
        characteristic: CharacteristicId,
        payload: &[u8],
    ) -> Result<(), TransportError>;

    /// Closes the open link, if any. No `Disconnected` event is emitted for a link closed
    /// through this call.
    fn disconnect(&mut self) -> Result<(), TransportError>;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn is_enabled(&self) -> bool {
        (**self).is_enabled()
    }

    fn start_scan(&mut self) -> Result<(), TransportError> {
        (**self).start_scan()
    }

    fn stop_scan(&mut self) -> Result<(), TransportError> {
        (**self).stop_scan()
    }

    fn connect(&mut self, peripheral: &PeripheralIdentity) -> Result<(), TransportError> {
        (**self).connect(peripheral)
    }

    fn discover_services(&mut self) -> Result<(), TransportError> {
        (**self).discover_services()
    }

    fn write_characteristic(
        &mut self,
        characteristic: CharacteristicId,
        payload: &[u8],
    ) -> Result<(), TransportError> {
        (**self).write_characteristic(characteristic, payload)
    }

    fn disconnect(&mut self) -> Result<(), TransportError> {
        (**self).disconnect()
    }
}

/// Posts transport callbacks into the link worker's single inbound queue.
#[derive(Debug, Clone)]
pub struct EventSink {
    inbox: mpsc::UnboundedSender<LinkInput>,
}

impl EventSink {
    pub fn new(inbox: mpsc::UnboundedSender<LinkInput>) -> Self {
        Self { inbox }
    }

    pub fn emit(&self, event: TransportEvent) {
        if let Err(e) = self.inbox.send(LinkInput::Transport(event)) {
            trace!("Link worker gone, dropping transport event: {:?}", e.0);
        }
    }
}
