#![deny(missing_docs)]
//! Multi-decree Paxos library, to be embedded in an application.
//!
//! A fixed set of peers agrees on one value per instance (a non-negative
//! sequence number), coping with message loss, reordering, duplication and
//! unreachable peers. Nothing is persisted; a peer that restarts rejoins
//! with empty state.
//!
//! The application interface, on [`Peer`]:
//!
//! - `start(seq, value)` begins agreement on an instance
//! - `status(seq)` inspects it locally
//! - `done(seq)` promises never to reference instances `<= seq` again
//! - `max()` / `min()` expose the seen and reclaimed horizons
//!
//! Every message carries the sender's `done` watermark, and every reply
//! the replier's, so peers learn each other's horizons from ordinary
//! protocol traffic and reclaim instances below `1 + min(done)`.

use serde::{Deserialize, Serialize};

/// A numbered proposal as remembered by an acceptor.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Proposal {
    /// Proposal number, unique across peers and attempts.
    pub n: u64,
    /// The proposed payload.
    pub value: String,
}

/// What a peer knows locally about one instance.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Status {
    /// Agreement reached on this value.
    Decided(String),
    /// No decision known here yet.
    Pending,
    /// Reclaimed: every peer declared the instance done.
    Forgotten,
}

/// Reply to a prepare.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PrepareReply {
    /// Whether the number was promised.
    pub ok: bool,
    /// The acceptor's accepted proposal, when promising.
    pub accepted: Option<Proposal>,
    /// On rejection, the number the proposer has to beat.
    pub promised: u64,
    /// The replier's done watermark.
    pub done: i64,
}

/// Reply to an accept.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AcceptReply {
    /// Whether the proposal was accepted.
    pub ok: bool,
    /// The replier's done watermark.
    pub done: i64,
}

/// Reply to a decide.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DecideReply {
    /// The replier's done watermark.
    pub done: i64,
}

simnet::service! {
    service paxos_svc {
        fn prepare(seq: i64, n: u64, sender: usize, done: i64) -> PrepareReply;
        fn accept(seq: i64, n: u64, value: String, sender: usize, done: i64) -> AcceptReply;
        fn decide(seq: i64, value: String, sender: usize, done: i64) -> DecideReply;
    }
}

pub use paxos_svc::{Client as PaxosClient, Server as PaxosServer, Service as PaxosService};

mod acceptor;
mod peer;
mod proposer;

/// Util functions for testing.
pub mod tests;

pub use acceptor::Acceptor;
pub use peer::Peer;
