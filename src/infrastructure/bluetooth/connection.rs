//! BLE Connection Module
//!
//! Opens a GATT link to one peripheral, enumerates its services and keeps the discovered
//! characteristics for later writes.

use crate::domain::models::{
    CharacteristicId, DiscoveredService, PeripheralId, ServiceId, ServiceTree,
};
use crate::domain::transport::{ConnectionState, EventSink, TransportError, TransportEvent};
use crate::infrastructure::bluetooth::protocol::{communication_error, uuid_from_guid};
use std::collections::HashMap;
use tracing::{debug, info, warn};
use uuid::Uuid;
use windows::Devices::Bluetooth::GenericAttributeProfile::{
    GattCharacteristic, GattCommunicationStatus, GattSession,
};
use windows::Devices::Bluetooth::{
    BluetoothCacheMode, BluetoothConnectionStatus, BluetoothLEDevice,
};
use windows::Foundation::TypedEventHandler;

/// An open link to a peripheral.
pub struct GattLink {
    peripheral: PeripheralId,
    device: BluetoothLEDevice,
    session: Option<GattSession>,
    status_token: Option<i64>,
    characteristics: HashMap<Uuid, GattCharacteristic>,
}

impl GattLink {
    /// Connect to a device by Bluetooth address
    ///
    /// Link loss after this returns is reported through `events` as `Disconnected`.
    pub async fn open(
        peripheral: PeripheralId,
        events: EventSink,
    ) -> Result<Self, TransportError> {
        info!("Connecting to Bluetooth device: {}", peripheral);
        let device = BluetoothLEDevice::FromBluetoothAddressAsync(peripheral.0)?.await?;

        // A session with MaintainConnection keeps Windows from dropping an idle link.
        let session = match Self::create_gatt_session(&device).await {
            Ok(session) => Some(session),
            Err(e) => {
                warn!("Failed to create GattSession, continuing anyway: {}", e);
                None
            }
        };

        let handler = TypedEventHandler::new(move |dev: windows::core::Ref<BluetoothLEDevice>, _| {
            if let Some(dev) = dev.as_ref() {
                if dev.ConnectionStatus()? == BluetoothConnectionStatus::Disconnected {
                    events.emit(TransportEvent::ConnectionStateChanged {
                        peripheral,
                        state: ConnectionState::Disconnected,
                    });
                }
            }
            Ok(())
        });
        let status_token = device.ConnectionStatusChanged(&handler)?;

        Ok(Self {
            peripheral,
            device,
            session,
            status_token: Some(status_token),
            characteristics: HashMap::new(),
        })
    }

    async fn create_gatt_session(device: &BluetoothLEDevice) -> windows::core::Result<GattSession> {
        let device_id = device.BluetoothDeviceId()?;
        let session = GattSession::FromDeviceIdAsync(&device_id)?.await?;
        session.SetMaintainConnection(true)?;
        Ok(session)
    }

    pub fn peripheral(&self) -> PeripheralId {
        self.peripheral
    }

    pub fn device(&self) -> BluetoothLEDevice {
        self.device.clone()
    }

    /// Enumerate every service and characteristic, bypassing the system GATT cache.
    pub async fn discover(
        device: &BluetoothLEDevice,
    ) -> Result<(ServiceTree, HashMap<Uuid, GattCharacteristic>), TransportError> {
        let services_result = device
            .GetGattServicesWithCacheModeAsync(BluetoothCacheMode::Uncached)?
            .await?;
        let status = services_result.Status()?;
        if status != GattCommunicationStatus::Success {
            return Err(communication_error(status));
        }

        let services = services_result.Services()?;
        let mut tree = Vec::new();
        let mut handles = HashMap::new();

        for i in 0..services.Size()? {
            let service = services.GetAt(i)?;
            let service_id = ServiceId(uuid_from_guid(service.Uuid()?));

            let chars_result = service
                .GetCharacteristicsWithCacheModeAsync(BluetoothCacheMode::Uncached)?
                .await?;
            let mut characteristics = Vec::new();
            match chars_result.Status()? {
                GattCommunicationStatus::Success => {
                    let found = chars_result.Characteristics()?;
                    for j in 0..found.Size()? {
                        let characteristic = found.GetAt(j)?;
                        let uuid = uuid_from_guid(characteristic.Uuid()?);
                        characteristics.push(CharacteristicId(uuid));
                        handles.insert(uuid, characteristic);
                    }
                }
                status => debug!("Characteristics of {} unavailable: {:?}", service_id, status),
            }

            debug!(
                "Service {} with {} characteristics",
                service_id,
                characteristics.len()
            );
            tree.push(DiscoveredService {
                id: service_id,
                characteristics,
            });
        }

        info!("Discovered {} services", tree.len());
        Ok((ServiceTree::new(tree), handles))
    }

    pub fn set_characteristics(&mut self, characteristics: HashMap<Uuid, GattCharacteristic>) {
        self.characteristics = characteristics;
    }

    pub fn characteristic(&self, id: CharacteristicId) -> Option<&GattCharacteristic> {
        self.characteristics.get(&id.0)
    }

    /// Release the link without reporting a disconnect.
    pub fn close(mut self) {
        if let Some(token) = self.status_token.take() {
            let _ = self.device.RemoveConnectionStatusChanged(token);
        }
        self.characteristics.clear();
        if let Some(session) = self.session.take() {
            let _ = session.Close();
        }
        let _ = self.device.Close();
        info!("Closed link to {}", self.peripheral);
    }
}
