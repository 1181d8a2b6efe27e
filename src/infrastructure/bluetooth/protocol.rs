//! WinRT conversions
//!
//! Maps between the platform-free identifiers and errors used by the link state machine
//! and their Windows Runtime counterparts.

use crate::domain::transport::TransportError;
use tracing::debug;
use uuid::Uuid;
use windows::core::GUID;
use windows::Devices::Bluetooth::GenericAttributeProfile::GattCommunicationStatus;
use windows::Storage::Streams::{DataWriter, IBuffer};
use windows::Win32::Foundation::E_ACCESSDENIED;

pub fn uuid_from_guid(guid: GUID) -> Uuid {
    Uuid::from_fields(guid.data1, guid.data2, guid.data3, &guid.data4)
}

/// Copies `payload` into a WinRT buffer suitable for a GATT write.
pub fn payload_buffer(payload: &[u8]) -> windows::core::Result<IBuffer> {
    let writer = DataWriter::new()?;
    writer.WriteBytes(payload)?;
    writer.DetachBuffer()
}

/// Turns a non-success GATT status into a transport error.
pub fn communication_error(status: GattCommunicationStatus) -> TransportError {
    if status == GattCommunicationStatus::AccessDenied {
        TransportError::PermissionDenied
    } else {
        TransportError::Platform(format!("GATT status {:?}", status))
    }
}

impl From<windows::core::Error> for TransportError {
    fn from(error: windows::core::Error) -> Self {
        debug!("WinRT error {:?}", error);
        if error.code() == E_ACCESSDENIED {
            Self::PermissionDenied
        } else {
            Self::Platform(error.message())
        }
    }
}
