//! # GSI Bridge
//!
//! A local bridge for Dota 2 Game State Integration: the game client pushes
//! JSON updates over HTTP, the bridge parses them into a typed snapshot and
//! fans the raw document out to in-process subscribers. Receive-only; the
//! game initiates every connection.
//!
//! The pipeline: listener accepts -> validator gates -> mapper parses ->
//! store commits -> subscribers are notified -> response is written. A
//! health monitor watches for feed silence and a reconnect controller
//! restarts the listener with jittered exponential backoff.

pub mod config;
pub mod connector;
pub mod error;
pub mod http;
pub mod listener;
pub mod logger;
pub mod mapper;
pub mod model;
pub mod monitor;
pub mod reconnect;
pub mod registry;
pub mod store;

pub use connector::GsiConnector;
pub use error::{GsiError, MapError};
pub use model::{GamePhase, Snapshot};
pub use reconnect::BackoffPolicy;
pub use registry::{SubscriberCallback, SubscriptionHandle};
