use simnet::{log::trace, tokio, NetHandle};
use viewservice::{Clerk as ViewClerk, PING_INTERVAL};

use crate::{KvClient, PbErr};

/// Client-side stub: locates the primary through the view service and
/// retries until the operation lands on it.
pub struct Clerk {
    vs: ViewClerk,
    net: NetHandle,
    primary: Option<String>,
}

impl Clerk {
    pub fn new(vs: ViewClerk, net: NetHandle) -> Self {
        Self {
            vs,
            net,
            primary: None,
        }
    }

    /// Fetch `key` from the current primary; `None` when unset. Blocks
    /// until some primary answers.
    pub async fn get(&mut self, key: &str) -> Option<String> {
        loop {
            if let Some(primary) = self.primary.clone() {
                let client: KvClient = self.net.connect(primary.as_str());
                match client.get(key.to_string()).await {
                    Ok(reply) => match reply.err {
                        PbErr::Ok => return reply.value,
                        PbErr::NoKey => return None,
                        PbErr::WrongServer => trace!("stale primary {}", primary),
                    },
                    Err(e) => trace!("get via {} failed: {}", primary, e),
                }
            }
            tokio::time::sleep(PING_INTERVAL).await;
            self.refresh_primary().await;
        }
    }

    /// Store `value` under `key`; returns once the write is acknowledged
    /// by the primary (and thus by its backup, if the view names one).
    pub async fn put(&mut self, key: &str, value: &str) {
        loop {
            if let Some(primary) = self.primary.clone() {
                let client: KvClient = self.net.connect(primary.as_str());
                match client.put(key.to_string(), value.to_string()).await {
                    Ok(PbErr::Ok) => return,
                    Ok(err) => trace!("put refused by {}: {:?}", primary, err),
                    Err(e) => trace!("put via {} failed: {}", primary, e),
                }
            }
            tokio::time::sleep(PING_INTERVAL).await;
            self.refresh_primary().await;
        }
    }

    async fn refresh_primary(&mut self) {
        if let Ok(view) = self.vs.get().await {
            self.primary = view.primary;
        }
    }
}
