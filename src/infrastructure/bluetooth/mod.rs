//! Bluetooth Module
//!
//! Transport implementations for the light link.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                     LinkController                       │
//! │            (domain state machine, link thread)           │
//! └─────────────────────┬───────────────────────────────────┘
//!                       │ Transport
//!         ┌─────────────┴─────────────┐
//!         ▼                           ▼
//! ┌────────────────┐          ┌───────────────────┐
//! │ WinRtTransport │          │ SimulatedTransport│
//! │ (Windows only) │          │ (every platform)  │
//! └───────┬────────┘          └───────────────────┘
//!         │
//!   ┌─────┴──────┬──────────────┐
//!   ▼            ▼              ▼
//! Scanner    Connection     Protocol
//! ```
//!
//! ## Modules
//!
//! - [`scanner`] - BLE advertisement watcher
//! - [`connection`] - GATT link and service discovery
//! - [`protocol`] - GUID/UUID conversions and WinRT error mapping
//! - [`service`] - WinRT transport coordinator
//! - [`simulated`] - In-process simulated light

#[cfg(windows)]
pub mod connection;
#[cfg(windows)]
pub mod protocol;
#[cfg(windows)]
pub mod scanner;
#[cfg(windows)]
pub mod service;
pub mod simulated;

#[cfg(windows)]
pub use service::WinRtTransport;
pub use simulated::SimulatedTransport;
