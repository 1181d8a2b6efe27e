//! Bluetooth Service Module
//!
//! [`WinRtTransport`] implements the transport port on top of the Windows Runtime
//! Bluetooth APIs. Every call returns right away; the async WinRT work runs as a local task
//! on the link worker's runtime and reports back through the event sink.

use crate::domain::models::{CharacteristicId, PeripheralIdentity, ServiceTree};
use crate::domain::transport::{
    ConnectionState, EventSink, Transport, TransportError, TransportEvent,
};
use crate::infrastructure::bluetooth::{
    connection::GattLink, protocol::payload_buffer, scanner::AdvertisementScanner,
};
use std::cell::RefCell;
use std::rc::Rc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use windows::Devices::Bluetooth::BluetoothAdapter;
use windows::Devices::Bluetooth::GenericAttributeProfile::GattWriteOption;
use windows::Devices::Radios::{Radio, RadioAccessStatus, RadioState};

type SharedLink = Rc<RefCell<Option<GattLink>>>;

pub struct WinRtTransport {
    events: EventSink,
    radio: Option<Radio>,
    access_denied: bool,
    scanner: AdvertisementScanner,
    link: SharedLink,
    pending: Option<JoinHandle<()>>,
}

impl WinRtTransport {
    /// Looks up the default adapter's radio. A machine without one behaves like a
    /// radio that is switched off.
    pub async fn new(events: EventSink) -> Self {
        let access_denied = match Self::request_access().await {
            Ok(status) => {
                debug!("Radio access status: {:?}", status);
                status == RadioAccessStatus::DeniedByUser
                    || status == RadioAccessStatus::DeniedBySystem
            }
            Err(e) => {
                warn!("Radio access request failed: {}", e);
                false
            }
        };

        let radio = match Self::default_radio().await {
            Ok(radio) => Some(radio),
            Err(e) => {
                warn!("No Bluetooth radio available: {}", e);
                None
            }
        };

        Self {
            scanner: AdvertisementScanner::new(events.clone()),
            events,
            radio,
            access_denied,
            link: Rc::new(RefCell::new(None)),
            pending: None,
        }
    }

    async fn request_access() -> windows::core::Result<RadioAccessStatus> {
        Radio::RequestAccessAsync()?.await
    }

    async fn default_radio() -> windows::core::Result<Radio> {
        let adapter = BluetoothAdapter::GetDefaultAsync()?.await?;
        adapter.GetRadioAsync()?.await
    }

    fn abort_pending(&mut self) {
        if let Some(task) = self.pending.take() {
            task.abort();
        }
    }
}

impl Transport for WinRtTransport {
    fn is_enabled(&self) -> bool {
        self.radio
            .as_ref()
            .and_then(|radio| radio.State().ok())
            .is_some_and(|state| state == RadioState::On)
    }

    fn start_scan(&mut self) -> Result<(), TransportError> {
        if self.access_denied {
            return Err(TransportError::PermissionDenied);
        }
        if !self.is_enabled() {
            return Err(TransportError::Disabled);
        }
        self.scanner.start()
    }

    fn stop_scan(&mut self) -> Result<(), TransportError> {
        self.scanner.stop()
    }

    fn connect(&mut self, peripheral: &PeripheralIdentity) -> Result<(), TransportError> {
        self.abort_pending();
        if let Some(old) = self.link.borrow_mut().take() {
            old.close();
        }

        let events = self.events.clone();
        let link = Rc::clone(&self.link);
        let id = peripheral.id;
        self.pending = Some(tokio::task::spawn_local(async move {
            let state = match GattLink::open(id, events.clone()).await {
                Ok(gatt) => {
                    *link.borrow_mut() = Some(gatt);
                    ConnectionState::Connected
                }
                Err(e) => {
                    warn!("Connection to {} failed: {}", id, e);
                    ConnectionState::Disconnected
                }
            };
            events.emit(TransportEvent::ConnectionStateChanged {
                peripheral: id,
                state,
            });
        }));
        Ok(())
    }

    fn discover_services(&mut self) -> Result<(), TransportError> {
        let (peripheral, device) = {
            let link = self.link.borrow();
            let gatt = link.as_ref().ok_or(TransportError::NotConnected)?;
            (gatt.peripheral(), gatt.device())
        };

        self.abort_pending();
        let events = self.events.clone();
        let link = Rc::clone(&self.link);
        self.pending = Some(tokio::task::spawn_local(async move {
            let services = match GattLink::discover(&device).await {
                Ok((tree, handles)) => {
                    match link.borrow_mut().as_mut() {
                        Some(gatt) if gatt.peripheral() == peripheral => {
                            gatt.set_characteristics(handles)
                        }
                        _ => debug!("Link to {} closed during discovery", peripheral),
                    }
                    tree
                }
                Err(e) => {
                    warn!("Service discovery on {} failed: {}", peripheral, e);
                    ServiceTree::default()
                }
            };
            events.emit(TransportEvent::ServicesDiscovered {
                peripheral,
                services,
            });
        }));
        Ok(())
    }

    fn write_characteristic(
        &mut self,
        characteristic: CharacteristicId,
        payload: &[u8],
    ) -> Result<(), TransportError> {
        let link = self.link.borrow();
        let gatt = link.as_ref().ok_or(TransportError::NotConnected)?;
        let target = gatt
            .characteristic(characteristic)
            .ok_or(TransportError::UnknownCharacteristic(characteristic.0))?;

        let buffer = payload_buffer(payload)?;
        // Fire-and-forget write
        let _ = target.WriteValueWithOptionAsync(&buffer, GattWriteOption::WriteWithoutResponse)?;
        Ok(())
    }

    fn disconnect(&mut self) -> Result<(), TransportError> {
        self.abort_pending();
        if let Some(gatt) = self.link.borrow_mut().take() {
            gatt.close();
        }
        Ok(())
    }
}

impl Drop for WinRtTransport {
    fn drop(&mut self) {
        let _ = self.scanner.stop();
        let _ = self.disconnect();
    }
}
