//! The view service: a singleton failure detector that names, over time,
//! which replica is primary and which is backup of the key/value service.
//!
//! Replicas ping it every [`PING_INTERVAL`]; it answers with the current
//! [`View`]. A view only advances once its primary has acknowledged it by
//! pinging with the view's own number, which is what keeps a partitioned
//! primary from being skipped.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// How often replicas ping the view service, and how often it looks for
/// dead servers.
pub const PING_INTERVAL: Duration = Duration::from_millis(100);

/// A server silent for this many ping intervals is declared dead.
pub const DEAD_PINGS: u32 = 5;

/// One numbered assignment of the primary and backup roles. The zero view
/// has no servers in it.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct View {
    pub viewnum: u64,
    pub primary: Option<String>,
    pub backup: Option<String>,
}

simnet::service! {
    service view_svc {
        fn ping(me: String, viewnum: u64) -> View;
        fn get() -> View;
    }
}

pub use view_svc::{Client as ViewClient, Server as ViewServer, Service as ViewService};

mod client;
mod server;


pub use client::Clerk;
pub use server::ViewManager;
