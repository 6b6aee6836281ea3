//! Strategy routing and order placement.
//!
//! The [`StrategyRouter`] owns every loaded strategy, delivers events to
//! the ones that subscribed, executes the actions they return and stamps
//! orders with process-unique client ids before they reach the venue.

pub mod collaborators;
pub mod handlers;
pub mod router;

pub use collaborators::{AlertSink, CollaboratorError, NullAlertSink, NullTradeStore, TradeStore};
pub use handlers::register_all;
pub use router::{RouterError, StrategyRouter, StrategySettings};
