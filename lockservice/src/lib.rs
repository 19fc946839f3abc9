//! Two-replica lock server.
//!
//! The primary mirrors every request to the backup before applying it, so
//! a client that fails over mid-request can retransmit under the same
//! `(client_id, request_id)` and get the originally computed answer
//! instead of mutating the lock twice.

simnet::service! {
    service lock_svc {
        fn lock(name: String, client_id: u64, request_id: u64) -> bool;
        fn unlock(name: String, client_id: u64, request_id: u64) -> bool;
    }
}

pub use lock_svc::{Client as LockClient, Server as LockServer, Service as LockService};

mod client;
mod server;


pub use client::Clerk;
pub use server::LockTable;
