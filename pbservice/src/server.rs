use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use simnet::{
    anyhow::{anyhow, Result},
    log::{info, trace, warn},
    NetHandle,
};
use viewservice::{Clerk as ViewClerk, View, PING_INTERVAL};

use crate::{GetReply, KvClient, KvService, PbErr};

#[derive(Default)]
struct State {
    view: View,
    values: HashMap<String, String>,
    /// Bumped on every write; lets a view change detect writes that raced
    /// with a snapshot transfer.
    version: u64,
}

/// One replica of the key/value store.
///
/// Clones share one state; register one clone as the `kv_svc` service and
/// spawn [`Replica::run_ticker`] on another.
#[derive(Clone)]
pub struct Replica {
    me: String,
    net: NetHandle,
    state: Arc<Mutex<State>>,
}

impl Replica {
    /// `me` is this replica's network id, `net` the fabric it forwards on.
    pub fn new(me: String, net: NetHandle) -> Self {
        Self {
            me,
            net,
            state: Arc::new(Mutex::new(State::default())),
        }
    }

    /// Ping the view service once and carry out any resulting view change.
    ///
    /// A view naming this replica primary with a freshly inducted backup is
    /// adopted only after the backup holds a full snapshot; until then the
    /// replica keeps pinging the old viewnum, which also withholds the
    /// acknowledgement the view service waits for.
    pub async fn tick(&self, vs: &ViewClerk) {
        let viewnum = self.state.lock().unwrap().view.viewnum;
        let next = match vs.ping(viewnum).await {
            Ok(view) => view,
            Err(e) => {
                warn!("{}: view service unreachable: {}", self.me, e);
                return;
            }
        };

        let current = self.state.lock().unwrap().view.clone();
        if next.viewnum == current.viewnum {
            return;
        }

        if next.primary.as_deref() == Some(self.me.as_str()) {
            if let Some(backup) = next.backup.as_deref() {
                if next.backup != current.backup {
                    let (values, version) = {
                        let st = self.state.lock().unwrap();
                        (st.values.clone(), st.version)
                    };
                    match self.connect(backup).install_snapshot(values).await {
                        Ok(PbErr::Ok) => {}
                        _ => {
                            warn!(
                                "{}: snapshot to {} failed, staying in view {}",
                                self.me, backup, current.viewnum
                            );
                            return;
                        }
                    }
                    let mut st = self.state.lock().unwrap();
                    if st.version != version {
                        // A write raced with the transfer; the snapshot is
                        // already stale. Retry on the next tick.
                        warn!(
                            "{}: wrote during snapshot to {}, retrying",
                            self.me, backup
                        );
                        return;
                    }
                    info!("{}: entering view {}", self.me, next.viewnum);
                    st.view = next;
                    return;
                }
            }
        }

        info!("{}: entering view {}", self.me, next.viewnum);
        self.state.lock().unwrap().view = next;
    }

    /// Ping loop; runs until aborted.
    pub async fn run_ticker(self, vs: ViewClerk) {
        loop {
            self.tick(&vs).await;
            simnet::tokio::time::sleep(PING_INTERVAL).await;
        }
    }

    fn connect(&self, id: &str) -> KvClient {
        self.net.connect(id)
    }
}

#[simnet::async_trait]
impl KvService for Replica {
    async fn get(&mut self, key: String) -> Result<GetReply> {
        let st = self.state.lock().unwrap();
        if st.view.primary.as_deref() != Some(self.me.as_str()) {
            trace!("{}: get({}) refused, not primary", self.me, key);
            return Ok(GetReply {
                err: PbErr::WrongServer,
                value: None,
            });
        }
        match st.values.get(&key) {
            Some(value) => Ok(GetReply {
                err: PbErr::Ok,
                value: Some(value.clone()),
            }),
            None => Ok(GetReply {
                err: PbErr::NoKey,
                value: None,
            }),
        }
    }

    async fn put(&mut self, key: String, value: String) -> Result<PbErr> {
        // Apply under the lock, forward after releasing it. Requests are
        // handled one at a time, so forwards still reach the backup in
        // application order.
        let backup = {
            let mut st = self.state.lock().unwrap();
            if st.view.primary.as_deref() != Some(self.me.as_str()) {
                trace!("{}: put({}) refused, not primary", self.me, key);
                return Ok(PbErr::WrongServer);
            }
            trace!("{}: put {} = {}", self.me, key, value);
            st.values.insert(key.clone(), value.clone());
            st.version += 1;
            st.view.backup.clone()
        };

        if let Some(backup) = backup {
            match self.connect(&backup).forward(key, value).await {
                Ok(PbErr::Ok) => {}
                // The write is not replicated; fail the call so the clerk
                // retries once the view has settled.
                _ => return Err(anyhow!("forward to backup {} failed", backup)),
            }
        }
        Ok(PbErr::Ok)
    }

    async fn forward(&mut self, key: String, value: String) -> Result<PbErr> {
        let mut st = self.state.lock().unwrap();
        trace!("{}: forward {} = {}", self.me, key, value);
        st.values.insert(key, value);
        st.version += 1;
        Ok(PbErr::Ok)
    }

    async fn install_snapshot(&mut self, values: HashMap<String, String>) -> Result<PbErr> {
        let mut st = self.state.lock().unwrap();
        info!("{}: snapshot installed, {} keys", self.me, values.len());
        st.values = values;
        st.version += 1;
        Ok(PbErr::Ok)
    }
}
