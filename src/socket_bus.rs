use std::time::Duration;

use anyhow::{anyhow, Context};
use socketcan::tokio::CanSocket;
use socketcan::{CanFrame, EmbeddedFrame, ExtendedId, Id, StandardId};
use tokio::time::{timeout, Instant};
use tracing::{debug, trace};

use crate::bus::CanBus;
use crate::frame::Frame;

/// A Linux SocketCAN interface.
///
/// The interface must already be up with the right bitrate (250 kbit/s for
/// the BMS-12), e.g. `ip link set can0 up type can bitrate 250000`.
pub struct SocketCanBus {
    interface: String,
    socket: CanSocket,
}

impl SocketCanBus {
    pub const DEFAULT_INTERFACE: &'static str = "can0";

    pub fn open(interface: &str) -> anyhow::Result<Self> {
        let socket = CanSocket::open(interface)
            .with_context(|| format!("Failed to open CAN interface {interface}"))?;
        debug!(interface, "CAN interface open");
        Ok(Self { interface: interface.to_string(), socket })
    }

    fn to_can_frame(frame: &Frame) -> anyhow::Result<CanFrame> {
        let id = if frame.extended {
            ExtendedId::new(frame.id).map(Id::Extended)
        } else {
            u16::try_from(frame.id).ok().and_then(StandardId::new).map(Id::Standard)
        }
        .ok_or_else(|| anyhow!("Invalid CAN id {}", frame.id))?;

        CanFrame::new(id, &frame.data)
            .ok_or_else(|| anyhow!("Invalid CAN payload of {} bytes", frame.data.len()))
    }

    fn from_can_frame(frame: &CanFrame) -> Option<Frame> {
        let CanFrame::Data(data_frame) = frame else {
            return None;
        };
        let (id, extended) = match data_frame.id() {
            Id::Standard(id) => (u32::from(id.as_raw()), false),
            Id::Extended(id) => (id.as_raw(), true),
        };
        Some(Frame { id, data: data_frame.data().to_vec(), extended })
    }
}

impl CanBus for SocketCanBus {
    async fn send(&self, frame: &Frame) -> anyhow::Result<()> {
        let can_frame = Self::to_can_frame(frame)?;
        self.socket
            .write_frame(can_frame)
            .await
            .with_context(|| format!("Failed to send frame {frame} on {}", self.interface))?;
        Ok(())
    }

    async fn recv(&self, wait: Duration) -> anyhow::Result<Option<Frame>> {
        let deadline = Instant::now() + wait;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let read_result = timeout(remaining, self.socket.read_frame()).await;
            match read_result {
                // timeout
                Err(_) => return Ok(None),
                Ok(Ok(can_frame)) => match Self::from_can_frame(&can_frame) {
                    Some(frame) => return Ok(Some(frame)),
                    None => trace!(interface = %self.interface, "Skipping remote or error frame"),
                },
                Ok(Err(err)) => {
                    return Err(anyhow::Error::from(err)
                        .context(format!("Failed to read from {}", self.interface)))
                }
            }
        }
    }
}

#[cfg(test)]
fn round_trip(frame: &Frame) -> Option<Frame> {
    SocketCanBus::from_can_frame(&SocketCanBus::to_can_frame(frame).unwrap())
}

#[test]
fn test_extended_frame_round_trip() {
    let frame = Frame::extended(316, &hex::decode("0100020500000000").unwrap());
    assert_eq!(round_trip(&frame), Some(frame));
}

#[test]
fn test_standard_frame_round_trip() {
    let frame = Frame::standard(0x7ff, &[0x0e, 0xd8]);
    let received = round_trip(&frame).unwrap();
    assert!(!received.extended);
    assert_eq!(received, frame);
}

#[test]
fn test_standard_id_too_large() {
    let frame = Frame { id: 0x800, data: vec![0, 0], extended: false };
    let err = SocketCanBus::to_can_frame(&frame).unwrap_err();
    assert_eq!(err.to_string(), "Invalid CAN id 2048");
}

#[test]
fn test_payload_too_long() {
    let frame = Frame { id: 310, data: vec![0; 9], extended: true };
    let err = SocketCanBus::to_can_frame(&frame).unwrap_err();
    assert_eq!(err.to_string(), "Invalid CAN payload of 9 bytes");
}

#[test]
fn test_remote_and_error_frames_skipped() {
    let remote = CanFrame::new_remote(ExtendedId::new(316).unwrap(), 8).unwrap();
    assert!(matches!(remote, CanFrame::Remote(_)));
    assert_eq!(SocketCanBus::from_can_frame(&remote), None);

    let error = CanFrame::Error(socketcan::CanErrorFrame::new_error(0x40, &[0; 8]).unwrap());
    assert_eq!(SocketCanBus::from_can_frame(&error), None);
}
