//! Simulated Light Transport
//!
//! Stands in for the radio when no WinRT stack is available (or when selected in
//! settings). Advertises a few neighbouring devices plus the light, accepts connections
//! only to the light and logs each brightness it receives.

use crate::domain::models::{
    CharacteristicId, DiscoveredService, PeripheralId, PeripheralIdentity, ServiceId, ServiceTree,
};
use crate::domain::protocol::{LIGHT_CHARACTERISTIC, LIGHT_DEVICE_NAME, LIGHT_SERVICE};
use crate::domain::settings::SimulatorSettings;
use crate::domain::transport::{
    ConnectionState, EventSink, Transport, TransportError, TransportEvent,
};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info};
use uuid::Uuid;

pub const SIMULATED_LIGHT_ADDRESS: PeripheralId = PeripheralId(0x58CF_7942_1A2E);

/// Advertisements heard before the light in every scan cycle
const NEIGHBOURS: &[(u64, &str)] = &[
    (0xC4DE_E2A1_0F31, "Mi Smart Band 7"),
    (0x58CF_7942_1A2F, "ESP32C3 Light 2"),
    (0x0C8B_FD11_2290, "esp32c3 light"),
];

const GENERIC_ACCESS_SERVICE: ServiceId =
    ServiceId(Uuid::from_u128(0x00001800_0000_1000_8000_00805f9b34fb));
const DEVICE_NAME_CHAR: CharacteristicId =
    CharacteristicId(Uuid::from_u128(0x00002a00_0000_1000_8000_00805f9b34fb));

struct SimulatedLink {
    peripheral: PeripheralId,
    writes: u32,
}

pub struct SimulatedTransport {
    events: EventSink,
    settings: SimulatorSettings,
    scan_task: Option<JoinHandle<()>>,
    link: Option<SimulatedLink>,
}

impl SimulatedTransport {
    pub fn new(events: EventSink, settings: SimulatorSettings) -> Self {
        Self {
            events,
            settings,
            scan_task: None,
            link: None,
        }
    }

    fn advertisements() -> Vec<PeripheralIdentity> {
        NEIGHBOURS
            .iter()
            .map(|(address, name)| PeripheralIdentity {
                id: PeripheralId(*address),
                name: name.to_string(),
            })
            .chain(std::iter::once(PeripheralIdentity {
                id: SIMULATED_LIGHT_ADDRESS,
                name: LIGHT_DEVICE_NAME.to_string(),
            }))
            .collect()
    }

    fn light_services() -> ServiceTree {
        ServiceTree::new(vec![
            DiscoveredService {
                id: GENERIC_ACCESS_SERVICE,
                characteristics: vec![DEVICE_NAME_CHAR],
            },
            DiscoveredService {
                id: LIGHT_SERVICE,
                characteristics: vec![LIGHT_CHARACTERISTIC],
            },
        ])
    }

    fn latency(&self) -> Duration {
        Duration::from_millis(self.settings.connect_latency_ms)
    }

    fn abort_scan(&mut self) {
        if let Some(task) = self.scan_task.take() {
            task.abort();
        }
    }

    /// Emits `event` after the configured link latency.
    fn emit_later(&self, event: TransportEvent) {
        let events = self.events.clone();
        let latency = self.latency();
        tokio::spawn(async move {
            tokio::time::sleep(latency).await;
            events.emit(event);
        });
    }
}

impl Transport for SimulatedTransport {
    fn is_enabled(&self) -> bool {
        self.settings.radio_enabled
    }

    fn start_scan(&mut self) -> Result<(), TransportError> {
        if !self.settings.radio_enabled {
            return Err(TransportError::Disabled);
        }
        self.abort_scan();

        info!("Simulated scan started");
        let events = self.events.clone();
        let interval = Duration::from_millis(self.settings.scan_interval_ms);
        self.scan_task = Some(tokio::spawn(async move {
            let advertisements = Self::advertisements();
            loop {
                for advertisement in &advertisements {
                    tokio::time::sleep(interval).await;
                    events.emit(TransportEvent::ScanResult(advertisement.clone()));
                }
            }
        }));
        Ok(())
    }

    fn stop_scan(&mut self) -> Result<(), TransportError> {
        if self.scan_task.is_some() {
            info!("Simulated scan stopped");
        }
        self.abort_scan();
        Ok(())
    }

    fn connect(&mut self, peripheral: &PeripheralIdentity) -> Result<(), TransportError> {
        let state = if peripheral.id == SIMULATED_LIGHT_ADDRESS {
            self.link = Some(SimulatedLink {
                peripheral: peripheral.id,
                writes: 0,
            });
            ConnectionState::Connected
        } else {
            debug!("Simulated peripheral {} refuses connections", peripheral.id);
            ConnectionState::Disconnected
        };

        self.emit_later(TransportEvent::ConnectionStateChanged {
            peripheral: peripheral.id,
            state,
        });
        Ok(())
    }

    fn discover_services(&mut self) -> Result<(), TransportError> {
        let link = self.link.as_ref().ok_or(TransportError::NotConnected)?;
        self.emit_later(TransportEvent::ServicesDiscovered {
            peripheral: link.peripheral,
            services: Self::light_services(),
        });
        Ok(())
    }

    fn write_characteristic(
        &mut self,
        characteristic: CharacteristicId,
        payload: &[u8],
    ) -> Result<(), TransportError> {
        let link = self.link.as_mut().ok_or(TransportError::NotConnected)?;
        if characteristic != LIGHT_CHARACTERISTIC {
            return Err(TransportError::UnknownCharacteristic(characteristic.0));
        }

        link.writes += 1;
        info!(
            "Simulated light brightness set to {}",
            String::from_utf8_lossy(payload)
        );

        if let Some(limit) = self.settings.drop_link_after_writes {
            if link.writes >= limit {
                let peripheral = link.peripheral;
                info!("Simulated light dropping link after {} writes", limit);
                self.link = None;
                self.events.emit(TransportEvent::ConnectionStateChanged {
                    peripheral,
                    state: ConnectionState::Disconnected,
                });
            }
        }
        Ok(())
    }

    fn disconnect(&mut self) -> Result<(), TransportError> {
        if let Some(link) = self.link.take() {
            info!("Simulated link to {} closed", link.peripheral);
        }
        Ok(())
    }
}

impl Drop for SimulatedTransport {
    fn drop(&mut self) {
        self.abort_scan();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::link::LinkInput;
    use tokio::sync::mpsc;
    use tokio::time::timeout;

    fn transport(
        settings: SimulatorSettings,
    ) -> (SimulatedTransport, mpsc::UnboundedReceiver<LinkInput>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (SimulatedTransport::new(EventSink::new(tx), settings), rx)
    }

    fn fast() -> SimulatorSettings {
        SimulatorSettings {
            scan_interval_ms: 1,
            connect_latency_ms: 1,
            ..Default::default()
        }
    }

    async fn next_event(rx: &mut mpsc::UnboundedReceiver<LinkInput>) -> TransportEvent {
        match timeout(Duration::from_secs(2), rx.recv()).await {
            Ok(Some(LinkInput::Transport(event))) => event,
            other => panic!("expected a transport event, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_scan_advertises_light_after_neighbours() {
        let (mut sim, mut rx) = transport(fast());
        sim.start_scan().unwrap();

        let mut names = Vec::new();
        for _ in 0..4 {
            if let TransportEvent::ScanResult(identity) = next_event(&mut rx).await {
                names.push(identity.name);
            }
        }
        sim.stop_scan().unwrap();

        assert_eq!(names.len(), 4);
        assert_eq!(names[3], LIGHT_DEVICE_NAME);
    }

    #[tokio::test]
    async fn test_radio_off_refuses_scan() {
        let (mut sim, _rx) = transport(SimulatorSettings {
            radio_enabled: false,
            ..fast()
        });
        assert!(!sim.is_enabled());
        assert_eq!(sim.start_scan(), Err(TransportError::Disabled));
    }

    #[tokio::test]
    async fn test_connect_discover_write() {
        let (mut sim, mut rx) = transport(fast());
        let light = PeripheralIdentity {
            id: SIMULATED_LIGHT_ADDRESS,
            name: LIGHT_DEVICE_NAME.to_string(),
        };

        assert_eq!(
            sim.write_characteristic(LIGHT_CHARACTERISTIC, b"1"),
            Err(TransportError::NotConnected)
        );

        sim.connect(&light).unwrap();
        assert_eq!(
            next_event(&mut rx).await,
            TransportEvent::ConnectionStateChanged {
                peripheral: SIMULATED_LIGHT_ADDRESS,
                state: ConnectionState::Connected
            }
        );

        sim.discover_services().unwrap();
        match next_event(&mut rx).await {
            TransportEvent::ServicesDiscovered { services, .. } => {
                assert_eq!(
                    services.resolve(LIGHT_SERVICE, LIGHT_CHARACTERISTIC),
                    Some(LIGHT_CHARACTERISTIC)
                );
            }
            other => panic!("unexpected event {other:?}"),
        }

        assert!(sim.write_characteristic(LIGHT_CHARACTERISTIC, b"200").is_ok());
        assert_eq!(
            sim.write_characteristic(DEVICE_NAME_CHAR, b"200"),
            Err(TransportError::UnknownCharacteristic(DEVICE_NAME_CHAR.0))
        );

        sim.disconnect().unwrap();
        assert_eq!(sim.discover_services(), Err(TransportError::NotConnected));
    }

    #[tokio::test]
    async fn test_decoy_refuses_connection() {
        let (mut sim, mut rx) = transport(fast());
        let decoy = PeripheralIdentity {
            id: PeripheralId(0xC4DE_E2A1_0F31),
            name: "Mi Smart Band 7".to_string(),
        };

        sim.connect(&decoy).unwrap();
        assert_eq!(
            next_event(&mut rx).await,
            TransportEvent::ConnectionStateChanged {
                peripheral: decoy.id,
                state: ConnectionState::Disconnected
            }
        );
    }

    #[tokio::test]
    async fn test_drops_link_after_configured_writes() {
        let (mut sim, mut rx) = transport(SimulatorSettings {
            drop_link_after_writes: Some(2),
            ..fast()
        });
        sim.connect(&PeripheralIdentity {
            id: SIMULATED_LIGHT_ADDRESS,
            name: LIGHT_DEVICE_NAME.to_string(),
        })
        .unwrap();
        let _ = next_event(&mut rx).await;

        sim.write_characteristic(LIGHT_CHARACTERISTIC, b"1").unwrap();
        sim.write_characteristic(LIGHT_CHARACTERISTIC, b"2").unwrap();

        assert_eq!(
            next_event(&mut rx).await,
            TransportEvent::ConnectionStateChanged {
                peripheral: SIMULATED_LIGHT_ADDRESS,
                state: ConnectionState::Disconnected
            }
        );
        assert_eq!(
            sim.write_characteristic(LIGHT_CHARACTERISTIC, b"3"),
            Err(TransportError::NotConnected)
        );
    }
}
