//! Payload codecs for the BMS-12 frames and classification of received frames.

mod query_message;
mod temperature_message;
mod version_message;
mod voltages_message;

pub use query_message::encode_query;
pub use temperature_message::decode_temperature_pair;
pub use version_message::{decode_version_reply, FirmwareVersion};
pub use voltages_message::{decode_cell_block, CELLS_PER_BLOCK};

pub(crate) use version_message::REQUEST as VERSION_REQUEST;

use crate::address::{self, MessageKind, UnitIndex};
use crate::error::DecodeError;
use crate::frame::Frame;

/// A decoded reply from a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply {
    /// Four cell voltages in mV starting at cell `offset`
    Cells { offset: usize, mv: [u16; CELLS_PER_BLOCK] },
    /// Both temperature sensors in °C
    Temperatures([i16; 2]),
    /// An acknowledged version reply
    Version(FirmwareVersion),
}

/// The outcome of checking a received frame against one unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    Matched(Reply),
    /// Not a BMS-12 id, or addressed to another unit
    AddressMismatch,
    /// For this unit, but nothing a host needs to act on
    Unrecognized(MessageKind),
    /// For this unit, but the payload could not be decoded
    Malformed(DecodeError),
}

impl Inbound {
    pub fn classify(frame: &Frame, unit: UnitIndex) -> Self {
        let kind = match address::decode(frame.id) {
            Some((from, kind)) if from == unit => kind,
            _ => return Inbound::AddressMismatch,
        };

        let decoded = match kind {
            MessageKind::Cells1To4 | MessageKind::Cells5To8 | MessageKind::Cells9To12 => {
                decode_cell_block(&frame.data).map(|mv| {
                    let offset = kind.cell_offset().unwrap_or_default();
                    Some(Reply::Cells { offset, mv })
                })
            }
            MessageKind::Temperature => {
                decode_temperature_pair(&frame.data).map(|t| Some(Reply::Temperatures(t)))
            }
            MessageKind::VersionReply => {
                decode_version_reply(&frame.data).map(|v| v.map(Reply::Version))
            }
            _ => Ok(None),
        };

        match decoded {
            Ok(Some(reply)) => Inbound::Matched(reply),
            Ok(None) => Inbound::Unrecognized(kind),
            Err(e) => Inbound::Malformed(e),
        }
    }
}

#[cfg(test)]
fn unit(index: u8) -> UnitIndex {
    UnitIndex::new(index).unwrap()
}

#[test]
fn test_classify_cell_block() {
    let frame = Frame::extended(322, &hex::decode("0ce40ce50ce60ce7").unwrap());
    assert_eq!(
        Inbound::classify(&frame, unit(2)),
        Inbound::Matched(Reply::Cells { offset: 4, mv: [3300, 3301, 3302, 3303] })
    );
}

#[test]
fn test_classify_other_unit() {
    let frame = Frame::extended(341, &hex::decode("0ce40ce50ce60ce7").unwrap());
    assert_eq!(Inbound::classify(&frame, unit(5)), Inbound::AddressMismatch);
}

#[test]
fn test_classify_foreign_id() {
    let frame = Frame::standard(0x100, &[0; 8]);
    assert_eq!(Inbound::classify(&frame, unit(0)), Inbound::AddressMismatch);
}

#[test]
fn test_classify_temperature() {
    let frame = Frame::extended(314, &[60, 61]);
    assert_eq!(Inbound::classify(&frame, unit(1)), Inbound::Matched(Reply::Temperatures([20, 21])));
}

#[test]
fn test_classify_malformed_temperature() {
    let frame = Frame::extended(314, &[60, 61, 0, 0, 0, 0, 0, 0]);
    assert!(matches!(Inbound::classify(&frame, unit(1)), Inbound::Malformed(_)));
}

#[test]
fn test_classify_version_nack() {
    let frame = Frame::extended(316, &[0, 1, 2, 3, 0, 0, 0, 0]);
    assert_eq!(
        Inbound::classify(&frame, unit(1)),
        Inbound::Unrecognized(MessageKind::VersionReply)
    );
}

#[test]
fn test_classify_short_version_nack() {
    let frame = Frame::extended(316, &[0]);
    assert_eq!(
        Inbound::classify(&frame, unit(1)),
        Inbound::Unrecognized(MessageKind::VersionReply)
    );
}

#[test]
fn test_classify_own_request_echo() {
    let frame = Frame::extended(310, &[0, 0]);
    assert_eq!(Inbound::classify(&frame, unit(1)), Inbound::Unrecognized(MessageKind::Query));
}
