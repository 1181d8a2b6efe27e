//! BLE Scanner Module
//!
//! Wraps `BluetoothLEAdvertisementWatcher` and forwards every named advertisement to the
//! link worker. Name matching happens in the state machine, not here.

use crate::domain::models::{PeripheralId, PeripheralIdentity};
use crate::domain::transport::{EventSink, TransportError, TransportEvent};
use tracing::{info, trace};
use windows::Devices::Bluetooth::Advertisement::{
    BluetoothLEAdvertisementReceivedEventArgs, BluetoothLEAdvertisementWatcher,
    BluetoothLEScanningMode,
};
use windows::Foundation::TypedEventHandler;

pub struct AdvertisementScanner {
    watcher: Option<BluetoothLEAdvertisementWatcher>,
    events: EventSink,
}

impl AdvertisementScanner {
    pub fn new(events: EventSink) -> Self {
        Self {
            watcher: None,
            events,
        }
    }

    /// Start scanning, replacing any running watcher
    pub fn start(&mut self) -> Result<(), TransportError> {
        self.stop()?;
        info!("Starting BLE advertisement watcher");

        let watcher = BluetoothLEAdvertisementWatcher::new()?;
        // Active scanning asks for scan responses, where the local name usually lives.
        watcher.SetScanningMode(BluetoothLEScanningMode::Active)?;

        let events = self.events.clone();
        let handler = TypedEventHandler::new(
            move |_: windows::core::Ref<BluetoothLEAdvertisementWatcher>,
                  args: windows::core::Ref<BluetoothLEAdvertisementReceivedEventArgs>| {
                if let Some(args) = args.as_ref() {
                    let name = args.Advertisement()?.LocalName()?.to_string();
                    let address = args.BluetoothAddress()?;
                    if name.is_empty() {
                        trace!("Unnamed advertisement from {:#X}", address);
                    } else {
                        events.emit(TransportEvent::ScanResult(PeripheralIdentity {
                            id: PeripheralId(address),
                            name,
                        }));
                    }
                }
                Ok(())
            },
        );

        watcher.Received(&handler)?;
        watcher.Start()?;
        self.watcher = Some(watcher);
        Ok(())
    }

    pub fn stop(&mut self) -> Result<(), TransportError> {
        if let Some(watcher) = self.watcher.take() {
            info!("Stopping BLE advertisement watcher");
            watcher.Stop()?;
        }
        Ok(())
    }
}

impl Drop for AdvertisementScanner {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}
