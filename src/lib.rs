//! Read cell voltages, temperatures and firmware versions from Zeva BMS-12 battery management units over CAN bus
//!
//! Up to 16 BMS-12 units share one CAN bus at 250 kbit/s. Each frame's arbitration id encodes the unit
//! index and the message kind as `300 + unit * 10 + kind`. The host sends a query (which also carries the
//! cell shunt level) and the unit answers with a short burst of frames: three blocks of four cell voltages
//! and one frame with two temperatures. A version request is used to find out which units are present.
//!
//! Since there is no length or sequence information in the replies, a burst is considered complete once
//! the bus stays quiet for a short time (100ms by default).
//!
//! Currently the following data can be accessed:
//!
//! - Cell voltages (mV, 12 cells per unit)
//! - Temperatures (°C, 2 sensors per unit)
//! - Firmware version
//!
//! # Example
//!
//! ```no_run
//! # #[tokio::main]
//! # pub async fn main() -> anyhow::Result<()> {
//! use zeva12can::{PollConfig, Poller, SocketCanBus};
//!
//! let bus = SocketCanBus::open("can0")?;
//! let poller = Poller::new(&bus, PollConfig::default());
//! let census = poller.poll().await?;
//! for unit in &census.present {
//!     println!("{:?}", unit.telemetry());
//! }
//! # Ok(())
//! # }
//! ```

pub mod address;
mod bus;
mod error;
mod frame;
pub mod message;
mod poller;
#[cfg(target_os = "linux")]
mod socket_bus;
mod telemetry;
mod unit;

pub use address::{MessageKind, UnitIndex};
pub use bus::CanBus;
pub use error::{DecodeError, ProtocolError};
pub use frame::Frame;
pub use message::FirmwareVersion;
pub use poller::{Census, PollConfig, Poller};
#[cfg(target_os = "linux")]
pub use socket_bus::SocketCanBus;
pub use telemetry::{Telemetry, CELL_COUNT};
pub use unit::{UnitSession, UnitState, DEFAULT_REPLY_TIMEOUT};
