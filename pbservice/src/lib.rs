//! Primary/backup key/value store.
//!
//! Each replica follows the view service's current [`View`](viewservice::View):
//! the primary takes client operations, synchronously forwards every write
//! to the backup, and hands a full snapshot to any newly inducted backup
//! before operating under the new view.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Outcome of a replica operation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PbErr {
    /// Applied.
    Ok,
    /// Get on a key never written.
    NoKey,
    /// The contacted replica is not the primary.
    WrongServer,
}

/// Reply to a get.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GetReply {
    pub err: PbErr,
    /// The stored value when `err` is [`PbErr::Ok`].
    pub value: Option<String>,
}

simnet::service! {
    service kv_svc {
        fn get(key: String) -> GetReply;
        fn put(key: String, value: String) -> PbErr;
        fn forward(key: String, value: String) -> PbErr;
        fn install_snapshot(values: HashMap<String, String>) -> PbErr;
    }
}

pub use kv_svc::{Client as KvClient, Server as KvServer, Service as KvService};

mod client;
mod server;

/// Util functions for testing.
pub mod tests;

pub use client::Clerk;
pub use server::Replica;
