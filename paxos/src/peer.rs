use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use crate::{proposer::Proposer, Acceptor, PaxosClient, Proposal, Status};

/// Acceptor bookkeeping for one instance.
#[derive(Default)]
pub(crate) struct Slot {
    pub promised: u64,
    pub accepted: Option<Proposal>,
    pub decided: Option<String>,
}

/// All mutable state of one peer, shared between its acceptor service,
/// its proposer tasks and the local API.
pub(crate) struct PeerState {
    pub slots: HashMap<i64, Slot>,
    /// `done[i]` is the highest seq peer `i` has declared done; -1 until
    /// heard from.
    pub done: Vec<i64>,
    pub max_seen: i64,
    /// Proposal round counter, strictly increasing per peer.
    pub round: u64,
}

impl PeerState {
    pub fn new(npeers: usize) -> Self {
        Self {
            slots: HashMap::new(),
            done: vec![-1; npeers],
            max_seen: -1,
            round: 0,
        }
    }

    /// Everything below this has been reclaimed.
    pub fn min(&self) -> i64 {
        1 + *self.done.iter().min().expect("peer set is never empty")
    }

    /// Fold in a done watermark heard from `peer` and drop any slots that
    /// fall below the new horizon.
    pub fn observe_done(&mut self, peer: usize, done: i64) {
        if done > self.done[peer] {
            self.done[peer] = done;
            let min = self.min();
            self.slots.retain(|&seq, _| seq >= min);
        }
    }

    pub fn observe_seq(&mut self, seq: i64) {
        if seq > self.max_seen {
            self.max_seen = seq;
        }
    }
}

/// One Paxos peer: the handle its embedding application drives.
///
/// `peers` lists clients to every peer's acceptor service in an ordering
/// shared by the whole set; `peers[me]` is this peer's own.
pub struct Peer {
    me: usize,
    peers: Vec<PaxosClient>,
    state: Arc<Mutex<PeerState>>,
}

impl Peer {
    /// Create a peer with index `me` into `peers`.
    pub fn new(me: usize, peers: Vec<PaxosClient>) -> Self {
        let state = Arc::new(Mutex::new(PeerState::new(peers.len())));
        Self { me, peers, state }
    }

    /// The acceptor half, for registration on the network.
    pub fn acceptor(&self) -> Acceptor {
        Acceptor::new(self.me, self.state.clone())
    }

    /// Begin agreement on instance `seq` proposing `value`.
    ///
    /// Returns immediately; poll [`Peer::status`] for the outcome. Starting
    /// an already reclaimed instance is a no-op, and starting a decided one
    /// just re-announces the decision.
    pub fn start(&self, seq: i64, value: String) {
        {
            let mut st = self.state.lock().unwrap();
            if seq < st.min() {
                return;
            }
            st.observe_seq(seq);
        }
        let proposer = Proposer::new(self.me, self.peers.clone(), self.state.clone());
        simnet::tokio::spawn(proposer.drive(seq, value));
    }

    /// What this peer knows about `seq`. Local inspection only; never
    /// contacts other peers.
    pub fn status(&self, seq: i64) -> Status {
        let st = self.state.lock().unwrap();
        if seq < st.min() {
            return Status::Forgotten;
        }
        match st.slots.get(&seq).and_then(|slot| slot.decided.clone()) {
            Some(value) => Status::Decided(value),
            None => Status::Pending,
        }
    }

    /// The application is finished with all instances `<= seq`.
    pub fn done(&self, seq: i64) {
        let mut st = self.state.lock().unwrap();
        let me = self.me;
        st.observe_done(me, seq);
    }

    /// Highest instance number this peer has seen, or -1.
    pub fn max(&self) -> i64 {
        self.state.lock().unwrap().max_seen
    }

    /// One more than the lowest done watermark exchanged so far. Instances
    /// below this are forgotten; it cannot advance past a peer that has
    /// not been heard from.
    pub fn min(&self) -> i64 {
        self.state.lock().unwrap().min()
    }
}
