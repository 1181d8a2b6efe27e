//! egui front end: slider, link banner and settings screens.

pub mod app;
pub mod components;
pub mod tabs;
pub mod theme;
