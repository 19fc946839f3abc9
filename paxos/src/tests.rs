use std::time::Duration;

use simnet::{tokio, NetHandle, Network};
use tokio::task::JoinHandle;

use crate::{Acceptor, PaxosClient, PaxosServer, Peer, Status};

/// Network id of peer `i`.
pub fn peer_id(i: usize) -> String {
    format!("paxos-{}", i)
}

/// A fixed set of peers wired up on one network.
pub struct PaxosCluster {
    /// Handle to the fabric, for unplugging peers.
    pub net: NetHandle,
    /// The peers, indexed as on the wire.
    pub peers: Vec<Peer>,
    /// Server and routing tasks.
    pub tasks: Vec<JoinHandle<()>>,
}

impl PaxosCluster {
    /// Unplug peer `i`; its acceptor stops answering.
    pub fn kill(&self, i: usize) {
        self.net.remove(&peer_id(i));
    }
}

/// Stand up `n` peers, each knowing all peers' addresses.
pub fn paxos_cluster(n: usize) -> PaxosCluster {
    let mut net = Network::new();
    let handle = net.handle();
    let clients: Vec<PaxosClient> = (0..n).map(|i| handle.connect(peer_id(i))).collect();

    let mut peers = Vec::new();
    let mut tasks = Vec::new();
    for i in 0..n {
        let peer = Peer::new(i, clients.clone());
        let acceptor = peer.acceptor();
        let (_, routine) = net.register_service::<PaxosServer<Acceptor>, PaxosClient, _, _>(
            peer_id(i),
            move || acceptor,
        );
        tasks.push(tokio::spawn(routine));
        peers.push(peer);
    }
    tasks.push(tokio::spawn(async move { net.run().await }));

    // Wait until every acceptor finishes registration.
    for i in 0..n {
        while !handle.registered(&peer_id(i)) {}
    }

    PaxosCluster {
        net: handle,
        peers,
        tasks,
    }
}

/// Poll until `peer` reports a decision for `seq`.
pub async fn wait_decided(peer: &Peer, seq: i64) -> String {
    loop {
        if let Status::Decided(value) = peer.status(seq) {
            return value;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 20)]
async fn test_single_proposer_decides_everywhere() {
    let _ = env_logger::builder().is_test(true).try_init();
    let cluster = paxos_cluster(3);

    cluster.peers[0].start(7, "apple".to_string());

    for peer in &cluster.peers {
        assert_eq!(wait_decided(peer, 7).await, "apple");
    }
    for peer in &cluster.peers {
        assert_eq!(peer.max(), 7);
        assert_eq!(peer.min(), 0);
        assert_eq!(peer.status(3), Status::Pending);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 20)]
async fn test_contending_proposers_agree() {
    let _ = env_logger::builder().is_test(true).try_init();
    let cluster = paxos_cluster(3);

    cluster.peers[0].start(9, "a".to_string());
    cluster.peers[1].start(9, "b".to_string());

    let chosen = wait_decided(&cluster.peers[0], 9).await;
    assert!(chosen == "a" || chosen == "b");
    for peer in &cluster.peers {
        assert_eq!(wait_decided(peer, 9).await, chosen);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 20)]
async fn test_repeated_start_is_stable() {
    let _ = env_logger::builder().is_test(true).try_init();
    let cluster = paxos_cluster(3);

    cluster.peers[0].start(1, "first".to_string());
    let chosen = wait_decided(&cluster.peers[2], 1).await;

    // A later proposal for a decided instance cannot change the outcome.
    cluster.peers[1].start(1, "second".to_string());
    tokio::time::sleep(Duration::from_millis(200)).await;
    for peer in &cluster.peers {
        assert_eq!(wait_decided(peer, 1).await, chosen);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 20)]
async fn test_progress_with_unreachable_minority() {
    let _ = env_logger::builder().is_test(true).try_init();
    let cluster = paxos_cluster(3);
    cluster.kill(2);

    cluster.peers[0].start(0, "solo".to_string());

    assert_eq!(wait_decided(&cluster.peers[0], 0).await, "solo");
    assert_eq!(wait_decided(&cluster.peers[1], 0).await, "solo");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 20)]
async fn test_done_reclaims_instances() {
    let _ = env_logger::builder().is_test(true).try_init();
    let cluster = paxos_cluster(3);

    for seq in 0..10 {
        cluster.peers[0].start(seq, format!("value-{}", seq));
        for peer in &cluster.peers {
            wait_decided(peer, seq).await;
        }
    }

    for peer in &cluster.peers {
        peer.done(5);
    }
    // Watermarks travel on protocol traffic; one agreement per proposer
    // tells everyone about everyone.
    for (i, peer) in cluster.peers.iter().enumerate() {
        peer.start(10 + i as i64, format!("flush-{}", i));
    }
    for (i, peer) in cluster.peers.iter().enumerate() {
        wait_decided(peer, 10 + i as i64).await;
    }

    for peer in &cluster.peers {
        let mut rounds = 0;
        while peer.min() != 6 {
            rounds += 1;
            assert!(rounds < 100, "min never reached 6: {}", peer.min());
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(peer.status(3), Status::Forgotten);
        assert_eq!(peer.status(5), Status::Forgotten);
        match peer.status(6) {
            Status::Decided(_) => {}
            other => panic!("seq 6 should survive reclamation, got {:?}", other),
        }
    }
}
