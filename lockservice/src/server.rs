use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use simnet::{
    anyhow::Result,
    log::{trace, warn},
    NetHandle,
};

use crate::{LockClient, LockService};

/// Last request seen from one client, with the answer it was given.
#[derive(Clone, Copy)]
struct LastRequest {
    request_id: u64,
    granted: bool,
}

#[derive(Default)]
struct State {
    /// For each lock name, is it held?
    locks: HashMap<String, bool>,
    last: HashMap<u64, LastRequest>,
}

/// One lock server replica. Roles are fixed at startup: the primary knows
/// its backup's id and mirrors every request there before applying it.
#[derive(Clone)]
pub struct LockTable {
    am_primary: bool,
    backup: Option<String>,
    net: NetHandle,
    state: Arc<Mutex<State>>,
}

impl LockTable {
    pub fn new(am_primary: bool, backup: Option<String>, net: NetHandle) -> Self {
        Self {
            am_primary,
            backup,
            net,
            state: Arc::new(Mutex::new(State::default())),
        }
    }

    /// Mirror a request to the backup. Requests are handled one at a time,
    /// so both replicas apply them in the same order; a dead backup is
    /// tolerated.
    async fn mirror_lock(&self, name: &str, client_id: u64, request_id: u64) {
        if let Some(backup) = self.backup.as_deref() {
            let client: LockClient = self.net.connect(backup);
            if let Err(e) = client.lock(name.to_string(), client_id, request_id).await {
                warn!("lock mirror to {} failed: {}", backup, e);
            }
        }
    }

    async fn mirror_unlock(&self, name: &str, client_id: u64, request_id: u64) {
        if let Some(backup) = self.backup.as_deref() {
            let client: LockClient = self.net.connect(backup);
            if let Err(e) = client.unlock(name.to_string(), client_id, request_id).await {
                warn!("unlock mirror to {} failed: {}", backup, e);
            }
        }
    }

    fn apply_lock(&self, name: String, client_id: u64, request_id: u64) -> bool {
        let mut st = self.state.lock().unwrap();
        if let Some(last) = st.last.get(&client_id) {
            if last.request_id == request_id {
                return last.granted;
            }
        }
        let held = st.locks.get(&name).copied().unwrap_or(false);
        let granted = !held;
        if granted {
            st.locks.insert(name, true);
        }
        st.last.insert(
            client_id,
            LastRequest {
                request_id,
                granted,
            },
        );
        granted
    }

    fn apply_unlock(&self, name: String, client_id: u64, request_id: u64) -> bool {
        let mut st = self.state.lock().unwrap();
        if let Some(last) = st.last.get(&client_id) {
            if last.request_id == request_id {
                return last.granted;
            }
        }
        let held = st.locks.get(&name).copied().unwrap_or(false);
        if held {
            st.locks.insert(name, false);
        }
        st.last.insert(
            client_id,
            LastRequest {
                request_id,
                granted: held,
            },
        );
        held
    }
}

#[simnet::async_trait]
impl LockService for LockTable {
    async fn lock(&mut self, name: String, client_id: u64, request_id: u64) -> Result<bool> {
        if self.am_primary {
            self.mirror_lock(&name, client_id, request_id).await;
        }
        let granted = self.apply_lock(name.clone(), client_id, request_id);
        trace!(
            "[{}][{}][{}] lock {}: {}",
            if self.am_primary { "primary" } else { "backup" },
            client_id,
            request_id,
            name,
            granted
        );
        Ok(granted)
    }

    async fn unlock(&mut self, name: String, client_id: u64, request_id: u64) -> Result<bool> {
        if self.am_primary {
            self.mirror_unlock(&name, client_id, request_id).await;
        }
        let released = self.apply_unlock(name.clone(), client_id, request_id);
        trace!(
            "[{}][{}][{}] unlock {}: {}",
            if self.am_primary { "primary" } else { "backup" },
            client_id,
            request_id,
            name,
            released
        );
        Ok(released)
    }
}
