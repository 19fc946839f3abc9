use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use rand::Rng;
use simnet::{log::trace, tokio};

use crate::{peer::PeerState, PaxosClient, Proposal};

/// Drives agreement on one instance. Spawned by
/// [`Peer::start`](crate::Peer::start); holds the lock only between
/// messages, never across one.
pub(crate) struct Proposer {
    me: usize,
    peers: Vec<PaxosClient>,
    state: Arc<Mutex<PeerState>>,
}

impl Proposer {
    pub fn new(me: usize, peers: Vec<PaxosClient>, state: Arc<Mutex<PeerState>>) -> Self {
        Self { me, peers, state }
    }

    fn majority(&self) -> usize {
        self.peers.len() / 2 + 1
    }

    /// Run rounds until the instance is decided, here or elsewhere.
    pub async fn drive(self, seq: i64, value: String) {
        loop {
            enum Step {
                Forgotten,
                Decided(String, i64),
                Round(u64, i64),
            }

            let step = {
                let mut st = self.state.lock().unwrap();
                if seq < st.min() {
                    Step::Forgotten
                } else if let Some(v) = st.slots.get(&seq).and_then(|s| s.decided.clone()) {
                    Step::Decided(v, st.done[self.me])
                } else {
                    st.round += 1;
                    let n = (st.round << 32) + self.me as u64;
                    Step::Round(n, st.done[self.me])
                }
            };

            match step {
                Step::Forgotten => return,
                Step::Decided(v, done) => {
                    // Someone else finished; spread the word and stop.
                    self.broadcast_decide(seq, v, done).await;
                    return;
                }
                Step::Round(n, done) => {
                    if let Some(chosen) = self.run_round(seq, n, value.clone(), done).await {
                        self.broadcast_decide(seq, chosen, done).await;
                        return;
                    }
                }
            }

            let backoff = rand::thread_rng().gen_range(10..250);
            tokio::time::sleep(Duration::from_millis(backoff)).await;
        }
    }

    /// One prepare/accept round under number `n`. Returns the value a
    /// majority accepted, if one did.
    async fn run_round(&self, seq: i64, n: u64, value: String, done: i64) -> Option<String> {
        let mut promised = 0;
        let mut highest: Option<Proposal> = None;
        let mut rival = 0;

        for (i, client) in self.peers.iter().enumerate() {
            match client.prepare(seq, n, self.me, done).await {
                Ok(reply) => {
                    self.observe(i, reply.done);
                    if reply.ok {
                        promised += 1;
                        if let Some(p) = reply.accepted {
                            if highest.as_ref().map_or(true, |h| p.n > h.n) {
                                highest = Some(p);
                            }
                        }
                    } else if reply.promised > rival {
                        rival = reply.promised;
                    }
                }
                Err(e) => trace!("[{}] prepare({}) to {} failed: {}", self.me, seq, i, e),
            }
        }
        if promised < self.majority() {
            trace!("[{}] prepare({}) got {} promises", self.me, seq, promised);
            self.catch_up(rival);
            return None;
        }

        // Adopt the highest-numbered accepted value; free choice otherwise.
        let chosen = match highest {
            Some(p) => p.value,
            None => value,
        };

        let mut accepted = 0;
        for (i, client) in self.peers.iter().enumerate() {
            match client.accept(seq, n, chosen.clone(), self.me, done).await {
                Ok(reply) => {
                    self.observe(i, reply.done);
                    if reply.ok {
                        accepted += 1;
                    }
                }
                Err(e) => trace!("[{}] accept({}) to {} failed: {}", self.me, seq, i, e),
            }
        }
        if accepted < self.majority() {
            trace!("[{}] accept({}) got {} accepts", self.me, seq, accepted);
            return None;
        }
        Some(chosen)
    }

    async fn broadcast_decide(&self, seq: i64, value: String, done: i64) {
        for (i, client) in self.peers.iter().enumerate() {
            match client.decide(seq, value.clone(), self.me, done).await {
                Ok(reply) => self.observe(i, reply.done),
                Err(e) => trace!("[{}] decide({}) to {} failed: {}", self.me, seq, i, e),
            }
        }
    }

    fn observe(&self, peer: usize, done: i64) {
        self.state.lock().unwrap().observe_done(peer, done);
    }

    /// Jump the round counter past a rival number seen in a rejection so
    /// the next attempt actually outbids it.
    fn catch_up(&self, n: u64) {
        let mut st = self.state.lock().unwrap();
        let round = n >> 32;
        if round > st.round {
            st.round = round;
        }
    }
}
