use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use futures::Future;
use log::{info, warn};
use tokio::sync::mpsc::{self, Receiver, Sender};

use crate::{client::Client, server::Server};

/// One request in flight: target id, the caller's reply channel and the
/// serialized request body.
#[derive(Debug)]
pub struct Envelope {
    pub to: String,
    pub reply: Sender<String>,
    pub body: String,
}

/// Routes envelopes to registered server channels. Owned by the routing
/// loop once [`Network::run`] starts; keep a [`NetHandle`] around for
/// everything else.
pub struct Network {
    pub tx: Sender<Envelope>,
    rx: Receiver<Envelope>,
    nodes: Arc<Mutex<HashMap<String, Sender<Envelope>>>>,
}

impl Network {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel(100);
        Self {
            tx,
            rx,
            nodes: Arc::new(Mutex::new(HashMap::default())),
        }
    }

    /// A cheap clone-everywhere handle to this network.
    pub fn handle(&self) -> NetHandle {
        NetHandle {
            tx: self.tx.clone(),
            nodes: self.nodes.clone(),
        }
    }

    /// Register a service under `id`. Returns a client for it and the
    /// server routine, which the caller spawns. The node becomes reachable
    /// once the routine has run far enough to install its channel.
    pub fn register_service<S, C, F, V>(&self, id: String, f: F) -> (C, impl Future<Output = ()>)
    where
        F: FnOnce() -> V,
        S: Server<Service = V> + Send + 'static,
        C: Client,
    {
        let client = C::from_server(id.clone(), self.tx.clone());
        let nodes = self.nodes.clone();
        (client, async move {
            let mut server = S::from_service(f());
            nodes
                .lock()
                .unwrap()
                .insert(id.clone(), server.client_chan());
            if let Err(e) = server.run().await {
                info!("server {} stopped: {}", id, e);
            }
        })
    }

    /// Routing loop; consumes the network.
    pub async fn run(&mut self) {
        loop {
            let envelope = self
                .rx
                .recv()
                .await
                .expect("sender cannot be dropped by itself");
            let node = {
                let nodes = self.nodes.lock().unwrap();
                nodes.get(&envelope.to).cloned()
            };

            match node {
                Some(tx) => {
                    if tx.send(envelope).await.is_err() {
                        warn!("send to node failed, dropped");
                    }
                }
                // Dropping the envelope drops its reply channel; the
                // caller observes an unreachable peer.
                None => warn!("node {} not found, dropped", envelope.to),
            }
        }
    }
}

/// Handle for creating clients and administering nodes after the routing
/// loop has taken ownership of the [`Network`].
#[derive(Clone)]
pub struct NetHandle {
    tx: Sender<Envelope>,
    nodes: Arc<Mutex<HashMap<String, Sender<Envelope>>>>,
}

impl NetHandle {
    /// A typed client for the node registered under `id`.
    pub fn connect<C: Client>(&self, id: impl Into<String>) -> C {
        C::from_server(id.into(), self.tx.clone())
    }

    /// The network's input channel.
    pub fn tx(&self) -> Sender<Envelope> {
        self.tx.clone()
    }

    pub fn registered(&self, id: &str) -> bool {
        self.nodes.lock().unwrap().contains_key(id)
    }

    /// Unplug a node; later calls to it fail as unreachable.
    pub fn remove(&self, id: &str) {
        self.nodes.lock().unwrap().remove(id);
    }
}
