//! # m2-server
//!
//! WebSocket gateway between one M2 CAN transceiver and any number of
//! live-data clients.
//!
//! - [`router`]: upgrade authorization and path dispatch, `/health`, `/metrics`
//! - [`socket`]: per-socket reader/writer tasks
//! - [`reactor`]: the single task owning all gateway state
//! - [`gateway`]: device slot, fan-out, subscriptions, liveness and rate
//! - [`envelope`]: client JSON wire format

#![deny(unsafe_code)]

pub mod config;
pub mod connection;
pub mod envelope;
pub mod errors;
pub mod gateway;
pub mod health;
pub mod metrics;
pub mod rate;
pub mod reactor;
pub mod router;
pub mod server;
pub mod shutdown;
pub mod socket;

pub use config::GatewayConfig;
pub use errors::ServerError;
pub use gateway::{Gateway, GatewayStats};
pub use server::{GatewayServer, ServerHandle};
pub use shutdown::ShutdownCoordinator;
