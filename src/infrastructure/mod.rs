pub mod bluetooth;
pub mod link_service;
pub mod logging;
