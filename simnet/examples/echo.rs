simnet::service! {
    service echo_svc {
        fn say(text: String) -> String;
    }
}

use echo_svc::{Client, Server, Service};
use simnet::{anyhow::Result, tokio, Network};
use std::time::Duration;

struct Echo;

#[simnet::async_trait]
impl Service for Echo {
    async fn say(&mut self, text: String) -> Result<String> {
        Ok(text)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let mut net = Network::new();
    let (client, routine) =
        net.register_service::<Server<Echo>, Client, _, _>("echo".to_string(), || Echo);
    let handle = net.handle();
    tokio::spawn(routine);
    tokio::spawn(async move { net.run().await });
    while !handle.registered("echo") {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    println!("{}", client.say("hello".to_string()).await?);
    Ok(())
}
