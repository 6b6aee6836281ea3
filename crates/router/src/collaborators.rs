//! Side-channel collaborators: trade persistence and operator alerts.
//!
//! Both are best-effort. A failing store or alert sink never blocks the
//! trading path; the router logs and moves on.

use kestrel_core::FillEvent;
use thiserror::Error;

#[derive(Error, Debug)]
#[error("{0}")]
pub struct CollaboratorError(pub String);

/// Durable record of executed trades.
pub trait TradeStore: Send + Sync {
    fn record_fill(&self, fill: &FillEvent) -> Result<(), CollaboratorError>;
}

/// Operator notification channel.
pub trait AlertSink: Send + Sync {
    fn notify(&self, message: &str) -> Result<(), CollaboratorError>;
}

/// Discards every fill.
pub struct NullTradeStore;

impl TradeStore for NullTradeStore {
    fn record_fill(&self, _fill: &FillEvent) -> Result<(), CollaboratorError> {
        Ok(())
    }
}

/// Drops every notification.
pub struct NullAlertSink;

impl AlertSink for NullAlertSink {
    fn notify(&self, _message: &str) -> Result<(), CollaboratorError> {
        Ok(())
    }
}
