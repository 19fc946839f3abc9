//! In-process RPC fabric for the replication lab.
//!
//! Servers are actors behind mpsc channels; a [`Network`] routes request
//! envelopes to them and every call gets its own reply channel. The
//! [`service!`] macro turns an RPC interface declaration into a typed
//! `Client`, `Server` and async `Service` trait.
//!
//! Delivery is at-most-once per call: an unreachable target, a dropped
//! reply or a timeout all surface as an `Err` from the client method.

pub mod client;
mod macros;
pub mod network;
pub mod server;

pub use anyhow;
pub use async_trait::async_trait;
pub use futures;
pub use log;
pub use rand;
pub use serde;
pub use serde_json;
pub use tokio;

pub use network::{NetHandle, Network};

use std::time::Duration;

/// How long a caller waits for a reply before declaring the callee
/// unreachable.
pub const RPC_TIMEOUT: Duration = Duration::from_millis(500);
