//! Light Peripheral Protocol
//!
//! Fixed identifiers forming the wire contract with the ESP32-C3 light firmware.
//! None of these are negotiated at runtime or read from settings.

use crate::domain::models::{CharacteristicId, ServiceId};
use uuid::Uuid;

/// Advertised name of the light. Matched exactly, case-sensitive.
pub const LIGHT_DEVICE_NAME: &str = "ESP32C3 Light";

/// Primary service exposed by the light
pub const LIGHT_SERVICE: ServiceId =
    ServiceId(Uuid::from_u128(0x3fd76e07_c468_4042_9365_52d90025f661));

/// Writable characteristic carrying the brightness as decimal ASCII text
pub const LIGHT_CHARACTERISTIC: CharacteristicId =
    CharacteristicId(Uuid::from_u128(0xe3aebfb6_9a19_40d8_86fb_24edd872232d));
