//! Engine runner: configuration, assembly and the paper broker.

pub mod app;
pub mod config;
pub mod paper;

pub use app::TradingApp;
pub use config::{ConfigError, TradingConfig};
pub use paper::PaperBroker;
