//! The bus transport the protocol layer runs over.

use std::future::Future;
use std::time::Duration;

use crate::frame::Frame;

/// A shared CAN bus handle.
///
/// Both methods take `&self` so one handle can be lent to every unit on the
/// bus. Opening and configuring the bus is up to the implementation.
pub trait CanBus {
    /// Put one frame on the bus.
    fn send(&self, frame: &Frame) -> impl Future<Output = anyhow::Result<()>>;

    /// Wait up to `timeout` for the next data frame. `Ok(None)` means nothing arrived.
    fn recv(&self, timeout: Duration) -> impl Future<Output = anyhow::Result<Option<Frame>>>;
}
