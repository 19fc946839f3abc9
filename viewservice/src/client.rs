use simnet::anyhow::Result;

use crate::{View, ViewClient};

/// Client-side stub for the view service, carried by every replica and
/// clerk that needs to know who is primary.
#[derive(Clone)]
pub struct Clerk {
    me: String,
    client: ViewClient,
}

impl Clerk {
    /// `me` is the name this clerk pings under.
    pub fn new(me: String, client: ViewClient) -> Self {
        Self { me, client }
    }

    /// Report liveness under `viewnum` and learn the latest view.
    pub async fn ping(&self, viewnum: u64) -> Result<View> {
        self.client.ping(self.me.clone(), viewnum).await
    }

    /// Fetch the current view without counting as alive.
    pub async fn get(&self) -> Result<View> {
        self.client.get().await
    }
}
