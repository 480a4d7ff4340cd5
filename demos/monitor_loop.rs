use std::time::Duration;

use zeva12can::{PollConfig, Poller, SocketCanBus};

#[tokio::main]
pub async fn main() {
    let bus = SocketCanBus::open(SocketCanBus::DEFAULT_INTERFACE).unwrap();
    let poller = Poller::new(&bus, PollConfig { shunt_mv: 3900, ..PollConfig::default() });
    let mut census = poller.probe_all().await.unwrap();
    loop {
        poller.update_all(&mut census.present).await.unwrap();
        for unit in &census.present {
            println!("{:?}", unit.telemetry());
        }
        tokio::time::sleep(Duration::from_secs(5)).await;
    }
}
