use std::io::Write;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use zeva12can::{CanBus, PollConfig, Poller, UnitIndex, UnitSession};

#[derive(Parser, Debug)]
#[command(name = "zeva12can")]
#[command(version)]
#[command(about = "Talk to Zeva BMS-12 units over CAN bus.", long_about = None)]
struct Cli {
    /// CAN interface the units are on. It must already be up at 250 kbit/s
    #[arg(short, long, default_value = "can0", global = true)]
    interface: String,

    /// How long the bus must stay quiet before a reply is considered complete
    #[arg(long, default_value_t = 100, global = true)]
    timeout_ms: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Find the units on the bus and print their cell voltages.
    Monitor {
        /// Shunt level in mV sent to every unit. 0 disables shunting
        #[arg(long, default_value_t = 0)]
        shunt_mv: u16,

        /// Keep updating the units found, every this many seconds
        #[arg(long)]
        interval: Option<u64>,
    },
    /// Ask one unit to reboot.
    Reboot {
        /// Unit index, 0-15
        #[arg(value_parser = clap::value_parser!(u8).range(0..=15))]
        unit: u8,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    let reply_timeout = Duration::from_millis(cli.timeout_ms);

    println!("Initializing CAN bus");
    let bus = open_bus(&cli.interface)?;

    match cli.command {
        Commands::Monitor { shunt_mv, interval } => {
            let config = PollConfig { shunt_mv, reply_timeout };
            monitor(&bus, config, interval.map(Duration::from_secs)).await
        }
        Commands::Reboot { unit } => {
            let unit = UnitIndex::new(unit)?;
            let session = UnitSession::new(unit, &bus).with_reply_timeout(reply_timeout);
            reboot(&session).await
        }
    }
}

#[cfg(target_os = "linux")]
fn open_bus(interface: &str) -> anyhow::Result<zeva12can::SocketCanBus> {
    use anyhow::Context;

    zeva12can::SocketCanBus::open(interface).context("Is the CAN interface up?")
}

#[cfg(not(target_os = "linux"))]
fn open_bus(interface: &str) -> anyhow::Result<NoBus> {
    anyhow::bail!("Cannot open {interface}: SocketCAN is only available on Linux")
}

#[cfg(not(target_os = "linux"))]
enum NoBus {}

#[cfg(not(target_os = "linux"))]
impl CanBus for NoBus {
    async fn send(&self, _frame: &zeva12can::Frame) -> anyhow::Result<()> {
        match *self {}
    }

    async fn recv(&self, _timeout: Duration) -> anyhow::Result<Option<zeva12can::Frame>> {
        match *self {}
    }
}

async fn monitor<B: CanBus>(
    bus: &B,
    config: PollConfig,
    interval: Option<Duration>,
) -> anyhow::Result<()> {
    let poller = Poller::new(bus, config);

    let mut present = Vec::new();
    for unit in UnitIndex::all() {
        print!("Probing unit {unit} ... ");
        std::io::stdout().flush()?;
        let mut session = poller.session(unit);
        match session.probe().await? {
            Some(version) => {
                println!("{version}");
                present.push(session);
            }
            None => println!(),
        }
    }

    loop {
        poller.update_all(&mut present).await?;
        for session in &present {
            print_unit(session);
        }

        let Some(interval) = interval else {
            return Ok(());
        };
        tokio::time::sleep(interval).await;
        println!();
    }
}

fn print_unit<B: CanBus>(session: &UnitSession<'_, B>) {
    let telemetry = session.telemetry();
    let cells: String = telemetry.cell_mv.iter().map(|mv| format!("{mv:5} ")).collect();
    let [t1, t2] = telemetry.temperature_c;
    println!(
        "[{:2}] {cells}| {t1:4}C {t2:4}C | {:6} mV",
        telemetry.unit.get(),
        telemetry.pack_mv()
    );
}

async fn reboot<B: CanBus>(session: &UnitSession<'_, B>) -> anyhow::Result<()> {
    println!("Attempt to reboot unit {}", session.unit());
    session.reboot().await
}
