use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::Instant,
};

use simnet::{anyhow::Result, log::info};

use crate::{View, ViewService, DEAD_PINGS, PING_INTERVAL};

struct State {
    last_ping: HashMap<String, Instant>,
    current: View,
    primary_ack: u64,
}

/// Tracks pinger liveness and issues the sequence of views.
///
/// Clones share one state; register one clone as the `view_svc` service
/// and drive [`ViewManager::tick`] on another every [`PING_INTERVAL`].
#[derive(Clone)]
pub struct ViewManager {
    state: Arc<Mutex<State>>,
}

impl ViewManager {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(State {
                last_ping: HashMap::new(),
                current: View::default(),
                primary_ack: 0,
            })),
        }
    }

    /// One failure-detection step: replace a primary or backup that has
    /// missed [`DEAD_PINGS`] intervals. At most one transition per tick.
    pub fn tick(&self) {
        let mut st = self.state.lock().unwrap();

        // An unacked primary pins the view; replacing it behind its back
        // could lose acknowledged writes.
        if st.primary_ack < st.current.viewnum {
            return;
        }

        let view = st.current.clone();
        if expired(&st.last_ping, view.primary.as_deref()) {
            let next = View {
                viewnum: view.viewnum + 1,
                primary: view.backup.clone(),
                backup: idle_server(&st.last_ping, &view),
            };
            info!(
                "primary {:?} dead, installing view {}",
                view.primary, next.viewnum
            );
            st.current = next;
        } else if expired(&st.last_ping, view.backup.as_deref()) {
            let next = View {
                viewnum: view.viewnum + 1,
                primary: view.primary.clone(),
                backup: idle_server(&st.last_ping, &view),
            };
            info!(
                "backup {:?} dead, installing view {}",
                view.backup, next.viewnum
            );
            st.current = next;
        }
    }
}

#[simnet::async_trait]
impl ViewService for ViewManager {
    async fn ping(&mut self, me: String, viewnum: u64) -> Result<View> {
        let mut st = self.state.lock().unwrap();
        st.last_ping.insert(me.clone(), Instant::now());

        let view = st.current.clone();
        if view.primary.as_deref() == Some(me.as_str()) && view.viewnum == viewnum {
            st.primary_ack = viewnum;
        }

        let candidate = next_view(&view, &me, viewnum);
        if candidate.viewnum != st.current.viewnum && candidate.viewnum <= st.primary_ack + 1 {
            info!(
                "installing view {}: primary {:?}, backup {:?}",
                candidate.viewnum, candidate.primary, candidate.backup
            );
            st.current = candidate.clone();
            Ok(candidate)
        } else {
            Ok(view)
        }
    }

    async fn get(&mut self) -> Result<View> {
        Ok(self.state.lock().unwrap().current.clone())
    }
}

/// Candidate successor of `current` given a ping from `server` claiming
/// `viewnum`. Fills empty roles; any change bumps the view number by one.
fn next_view(current: &View, server: &str, viewnum: u64) -> View {
    let mut primary = current.primary.clone();

    // A primary pinging with viewnum 0 after the service has moved past
    // view 1 has restarted and lost its state; its slot is vacant.
    if viewnum == 0 && current.viewnum > 1 && primary.as_deref() == Some(server) {
        primary = None;
    }

    let mut next = current.clone();
    let mut changed = false;
    match primary {
        None => {
            if let Some(backup) = current.backup.clone() {
                next.primary = Some(backup);
                next.backup = Some(server.to_string());
            } else {
                next.primary = Some(server.to_string());
            }
            changed = true;
        }
        Some(primary) => {
            if current.backup.is_none() && primary != server {
                next.backup = Some(server.to_string());
                changed = true;
            }
        }
    }
    if changed {
        next.viewnum = current.viewnum + 1;
    }
    next
}

fn expired(times: &HashMap<String, Instant>, server: Option<&str>) -> bool {
    match server {
        Some(s) => times
            .get(s)
            .map_or(false, |t| t.elapsed() > PING_INTERVAL * DEAD_PINGS),
        None => false,
    }
}

/// A live pinger holding neither role, if any.
fn idle_server(times: &HashMap<String, Instant>, view: &View) -> Option<String> {
    times
        .iter()
        .find(|(id, t)| {
            t.elapsed() < PING_INTERVAL * DEAD_PINGS
                && view.primary.as_deref() != Some(id.as_str())
                && view.backup.as_deref() != Some(id.as_str())
        })
        .map(|(id, _)| id.clone())
}
