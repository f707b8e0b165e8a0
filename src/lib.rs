//! Weather Bot: OpenWeatherMap lookups behind a button-driven chat dialog.

pub mod channels;
pub mod config;
pub mod dialog;
pub mod error;
pub mod navigation;
pub mod weather;
