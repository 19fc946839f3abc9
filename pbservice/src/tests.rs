use simnet::{tokio, NetHandle, Network};
use tokio::task::JoinHandle;
use viewservice::{
    tests::{register_view_service, VIEW_SERVER},
    Clerk as ViewClerk, View, ViewClient, PING_INTERVAL,
};

use crate::{Clerk, KvClient, KvServer, Replica};

/// One replica's handles, for killing it mid-test.
pub struct ReplicaHandle {
    pub id: String,
    pub client: KvClient,
    pub tasks: Vec<JoinHandle<()>>,
}

/// A view service plus `n` replicas on one network.
pub struct PbCluster {
    pub net: NetHandle,
    pub view_client: ViewClient,
    pub replicas: Vec<ReplicaHandle>,
    pub tasks: Vec<JoinHandle<()>>,
}

/// Network id of replica `i`.
pub fn replica_id(i: usize) -> String {
    format!("pb-{}", i)
}

/// Stand up the view service and `n` replicas, all ticking.
pub fn pb_cluster(n: usize) -> PbCluster {
    let mut net = Network::new();
    let handle = net.handle();
    let (view_client, mut tasks) = register_view_service(&net);

    let mut replicas = Vec::new();
    for i in 0..n {
        let id = replica_id(i);
        let replica = Replica::new(id.clone(), handle.clone());
        let svc = replica.clone();
        let (client, routine) = net
            .register_service::<KvServer<Replica>, KvClient, _, _>(id.clone(), move || svc);
        let vs = ViewClerk::new(id.clone(), handle.connect(VIEW_SERVER));
        let replica_tasks = vec![
            tokio::spawn(routine),
            tokio::spawn(replica.run_ticker(vs)),
        ];
        replicas.push(ReplicaHandle {
            id,
            client,
            tasks: replica_tasks,
        });
    }
    tasks.push(tokio::spawn(async move { net.run().await }));

    // Wait until every server finishes registration.
    while !handle.registered(VIEW_SERVER) {}
    for i in 0..n {
        while !handle.registered(&replica_id(i)) {}
    }

    PbCluster {
        net: handle,
        view_client,
        replicas,
        tasks,
    }
}

impl PbCluster {
    /// A fresh clerk on this cluster's network.
    pub fn clerk(&self) -> Clerk {
        let vs = ViewClerk::new("clerk".to_string(), self.net.connect(VIEW_SERVER));
        Clerk::new(vs, self.net.clone())
    }

    /// Current view as the view service sees it.
    pub async fn view(&self) -> View {
        self.view_client.get().await.expect("view service died")
    }

    /// Wait until the view names both a primary and a backup, then give
    /// the replicas a moment to settle into it.
    pub async fn wait_for_backup(&self) -> View {
        loop {
            let view = self.view().await;
            if view.primary.is_some() && view.backup.is_some() {
                tokio::time::sleep(PING_INTERVAL * 3).await;
                return view;
            }
            tokio::time::sleep(PING_INTERVAL).await;
        }
    }

    /// Abort a replica's tasks and unplug it from the fabric.
    pub fn kill(&mut self, id: &str) {
        let replica = self
            .replicas
            .iter()
            .find(|r| r.id == id)
            .expect("no such replica");
        for task in &replica.tasks {
            task.abort();
        }
        self.net.remove(id);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 20)]
async fn test_put_then_get() {
    let _ = env_logger::builder().is_test(true).try_init();
    let cluster = pb_cluster(2);
    let mut ck = cluster.clerk();

    ck.put("x", "1").await;
    assert_eq!(ck.get("x").await.as_deref(), Some("1"));
    assert_eq!(ck.get("missing").await, None);

    ck.put("x", "2").await;
    assert_eq!(ck.get("x").await.as_deref(), Some("2"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 20)]
async fn test_backup_refuses_clients() {
    let _ = env_logger::builder().is_test(true).try_init();
    let cluster = pb_cluster(2);
    let mut ck = cluster.clerk();

    ck.put("x", "1").await;
    let view = cluster.wait_for_backup().await;
    let backup = view.backup.expect("waited for a backup");

    let client: KvClient = cluster.net.connect(backup.as_str());
    let reply = client.get("x".to_string()).await.unwrap();
    assert_eq!(reply.err, crate::PbErr::WrongServer);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 20)]
async fn test_get_survives_failover() {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut cluster = pb_cluster(3);
    let mut ck = cluster.clerk();

    // The write may land before any backup exists; the snapshot taken at
    // induction must carry it over.
    ck.put("x", "1").await;

    let view = cluster.wait_for_backup().await;
    let primary = view.primary.expect("view had a primary");
    cluster.kill(&primary);

    assert_eq!(ck.get("x").await.as_deref(), Some("1"));

    // The promoted replica also takes writes.
    ck.put("y", "2").await;
    assert_eq!(ck.get("y").await.as_deref(), Some("2"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 20)]
async fn test_forwarded_write_survives_failover() {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut cluster = pb_cluster(3);
    let mut ck = cluster.clerk();

    let view = cluster.wait_for_backup().await;

    // Written while a backup is in place: replicated by forwarding.
    ck.put("x", "1").await;

    let primary = view.primary.expect("view had a primary");
    cluster.kill(&primary);

    assert_eq!(ck.get("x").await.as_deref(), Some("1"));
}
