use crate::network::Envelope;
use anyhow::Result;
use tokio::sync::mpsc::Sender;

/// Driving loop of a registered service; generated by the
/// [`service!`](crate::service) macro.
#[async_trait::async_trait]
pub trait Server {
    type Service;
    fn from_service(svc: Self::Service) -> Self;
    fn client_chan(&self) -> Sender<Envelope>;
    async fn handle(&mut self) -> Result<()>;
    /// Serve until the request channel closes.
    async fn run(&mut self) -> Result<()> {
        loop {
            self.handle().await?;
        }
    }
}
