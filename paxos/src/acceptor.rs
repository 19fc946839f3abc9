use std::sync::{Arc, Mutex};

use simnet::{anyhow::Result, log::trace};

use crate::{
    peer::PeerState, AcceptReply, DecideReply, PaxosService, PrepareReply, Proposal,
};

/// The acceptor half of a peer, registered as its `paxos_svc` service.
/// Shares state with the [`Peer`](crate::Peer) it was taken from.
#[derive(Clone)]
pub struct Acceptor {
    me: usize,
    state: Arc<Mutex<PeerState>>,
}

impl Acceptor {
    pub(crate) fn new(me: usize, state: Arc<Mutex<PeerState>>) -> Self {
        Self { me, state }
    }
}

#[simnet::async_trait]
impl PaxosService for Acceptor {
    async fn prepare(
        &mut self,
        seq: i64,
        n: u64,
        sender: usize,
        done: i64,
    ) -> Result<PrepareReply> {
        let mut st = self.state.lock().unwrap();
        st.observe_done(sender, done);
        st.observe_seq(seq);
        let mine = st.done[self.me];

        if seq < st.min() {
            // Reclaimed instance; nothing left to promise.
            return Ok(PrepareReply {
                ok: false,
                accepted: None,
                promised: 0,
                done: mine,
            });
        }

        let slot = st.slots.entry(seq).or_default();
        if n > slot.promised {
            slot.promised = n;
            trace!("[{}] promised {} for seq {}", self.me, n, seq);
            Ok(PrepareReply {
                ok: true,
                accepted: slot.accepted.clone(),
                promised: n,
                done: mine,
            })
        } else {
            Ok(PrepareReply {
                ok: false,
                accepted: None,
                promised: slot.promised,
                done: mine,
            })
        }
    }

    async fn accept(
        &mut self,
        seq: i64,
        n: u64,
        value: String,
        sender: usize,
        done: i64,
    ) -> Result<AcceptReply> {
        let mut st = self.state.lock().unwrap();
        st.observe_done(sender, done);
        st.observe_seq(seq);
        let mine = st.done[self.me];

        if seq < st.min() {
            return Ok(AcceptReply {
                ok: false,
                done: mine,
            });
        }

        let slot = st.slots.entry(seq).or_default();
        if n >= slot.promised {
            slot.promised = n;
            slot.accepted = Some(Proposal { n, value });
            trace!("[{}] accepted {} for seq {}", self.me, n, seq);
            Ok(AcceptReply {
                ok: true,
                done: mine,
            })
        } else {
            Ok(AcceptReply {
                ok: false,
                done: mine,
            })
        }
    }

    async fn decide(
        &mut self,
        seq: i64,
        value: String,
        sender: usize,
        done: i64,
    ) -> Result<DecideReply> {
        let mut st = self.state.lock().unwrap();
        st.observe_done(sender, done);
        st.observe_seq(seq);
        let mine = st.done[self.me];

        if seq >= st.min() {
            st.slots.entry(seq).or_default().decided = Some(value);
        }
        Ok(DecideReply { done: mine })
    }
}
