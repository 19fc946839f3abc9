use rand::Rng;
use simnet::{log::trace, NetHandle};

use crate::LockClient;

/// Lock service client: talks to the primary and fails over to the backup
/// with the same request id, relying on the servers' duplicate tables.
pub struct Clerk {
    primary: LockClient,
    backup: LockClient,
    id: u64,
    request: u64,
}

impl Clerk {
    pub fn new(net: &NetHandle, primary: &str, backup: &str) -> Self {
        Self {
            primary: net.connect(primary),
            backup: net.connect(backup),
            id: rand::thread_rng().gen::<u32>() as u64,
            request: 0,
        }
    }

    /// Acquire `name`; false when it is already held or neither replica
    /// answered.
    pub async fn lock(&mut self, name: &str) -> bool {
        let request_id = self.request;
        self.request += 1;
        match self.primary.lock(name.to_string(), self.id, request_id).await {
            Ok(granted) => granted,
            Err(_) => match self.backup.lock(name.to_string(), self.id, request_id).await {
                Ok(granted) => granted,
                Err(e) => {
                    trace!("lock {}: both replicas unreachable: {}", name, e);
                    false
                }
            },
        }
    }

    /// Release `name`; false when it was not held or neither replica
    /// answered.
    pub async fn unlock(&mut self, name: &str) -> bool {
        let request_id = self.request;
        self.request += 1;
        match self
            .primary
            .unlock(name.to_string(), self.id, request_id)
            .await
        {
            Ok(released) => released,
            Err(_) => match self
                .backup
                .unlock(name.to_string(), self.id, request_id)
                .await
            {
                Ok(released) => released,
                Err(e) => {
                    trace!("unlock {}: both replicas unreachable: {}", name, e);
                    false
                }
            },
        }
    }
}
