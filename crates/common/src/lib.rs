pub mod config;
pub mod signature;

#[cfg(feature = "logging")]
pub mod logging;

#[cfg(feature = "api")]
pub mod api;
