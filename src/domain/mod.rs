//! Platform-free core: matcher, brightness writer, link state machine and the transport port.

pub mod brightness;
pub mod link;
pub mod matcher;
pub mod models;
pub mod protocol;
pub mod settings;
pub mod transport;
