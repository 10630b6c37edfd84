//! wvp-runtime
//!
//! Session glue for the wave client.
//!
//! - `log`: the shared, observable log view (reconciler + notification bus).
//! - `subscription`: exactly-one live feed registration per session.
//! - `client`: `WaveClient`, the surface a front end talks to. Starting a
//!   session fetches the full log and opens the feed; a confirmed write
//!   refetches the log before the write path is released.
//! - `timeout`: caller-side bounds for remote round trips.

pub mod client;
pub mod log;
pub mod state;
pub mod subscription;
pub mod timeout;

pub use client::{ClientError, ClientOptions, WaveClient};
pub use log::SharedLog;
pub use state::{ClientBus, ClientEvent};
pub use subscription::EventSubscriptionManager;
pub use timeout::{with_timeout, TimedOut};
