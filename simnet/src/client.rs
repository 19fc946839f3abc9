use tokio::sync::mpsc::Sender;

use crate::network::Envelope;

/// Implemented by every client type the [`service!`](crate::service) macro
/// generates; a client is just a target id plus the network's input channel.
pub trait Client {
    fn from_server(server_id: String, net_tx: Sender<Envelope>) -> Self;
}
