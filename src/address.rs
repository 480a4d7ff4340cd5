//! Arbitration id addressing.
//!
//! Every BMS-12 frame id packs a unit index and a message kind as
//! `300 + unit * 10 + kind`. The same scheme is used in both directions.

use std::fmt;

use crate::error::ProtocolError;

/// Lowest id used by the BMS-12 protocol (unit 0, kind 0).
pub const ID_BASE: u32 = 300;
/// Highest id accepted when decoding replies.
///
/// This stops short of unit 15's kinds 5-9 (455-459), so unit 15 can never
/// be matched by a version reply.
pub const ID_MAX: u32 = 454;

/// Index of one BMS-12 unit on the bus, 0-15.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UnitIndex(u8);

impl UnitIndex {
    pub const MAX: u8 = 15;

    pub fn new(index: u8) -> Result<Self, ProtocolError> {
        if index > Self::MAX {
            return Err(ProtocolError::UnitOutOfRange(index));
        }
        Ok(Self(index))
    }

    /// All unit indices in ascending order.
    pub fn all() -> impl Iterator<Item = UnitIndex> {
        (0..=Self::MAX).map(UnitIndex)
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for UnitIndex {
    type Error = ProtocolError;

    fn try_from(index: u8) -> Result<Self, Self::Error> {
        Self::new(index)
    }
}

impl fmt::Display for UnitIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// The message kind, i.e. the last decimal digit of the arbitration id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    /// Host to unit: query telemetry and set the shunt level.
    Query,
    /// Unit to host: cell voltages 0-3.
    Cells1To4,
    /// Unit to host: cell voltages 4-7.
    Cells5To8,
    /// Unit to host: cell voltages 8-11.
    Cells9To12,
    /// Unit to host: both temperature sensors.
    Temperature,
    /// Host to unit.
    VersionRequest,
    /// Unit to host.
    VersionReply,
    /// Host to unit. The payload of this command is not known.
    Reboot,
    /// A digit the protocol gives no meaning to (7 or 8).
    Other(u8),
}

impl MessageKind {
    /// Map an id digit (0-9) to its kind.
    pub fn from_digit(digit: u8) -> Self {
        match digit {
            0 => MessageKind::Query,
            1 => MessageKind::Cells1To4,
            2 => MessageKind::Cells5To8,
            3 => MessageKind::Cells9To12,
            4 => MessageKind::Temperature,
            5 => MessageKind::VersionRequest,
            6 => MessageKind::VersionReply,
            9 => MessageKind::Reboot,
            other => MessageKind::Other(other),
        }
    }

    pub fn digit(self) -> u8 {
        match self {
            MessageKind::Query => 0,
            MessageKind::Cells1To4 => 1,
            MessageKind::Cells5To8 => 2,
            MessageKind::Cells9To12 => 3,
            MessageKind::Temperature => 4,
            MessageKind::VersionRequest => 5,
            MessageKind::VersionReply => 6,
            MessageKind::Reboot => 9,
            MessageKind::Other(digit) => digit,
        }
    }

    /// For a cell block reply, the index of the first cell it carries.
    pub fn cell_offset(self) -> Option<usize> {
        match self {
            MessageKind::Cells1To4 => Some(0),
            MessageKind::Cells5To8 => Some(4),
            MessageKind::Cells9To12 => Some(8),
            _ => None,
        }
    }
}

/// Build the arbitration id for a message of `kind` to or from `unit`.
pub fn encode(unit: UnitIndex, kind: MessageKind) -> u32 {
    debug_assert!(kind.digit() < 10, "message kind must be a single digit");
    ID_BASE + u32::from(unit.get()) * 10 + u32::from(kind.digit())
}

/// Split an arbitration id into unit and kind.
///
/// Returns `None` for ids outside `ID_BASE..=ID_MAX`, which belong to other
/// devices on the bus.
pub fn decode(id: u32) -> Option<(UnitIndex, MessageKind)> {
    if !(ID_BASE..=ID_MAX).contains(&id) {
        return None;
    }
    let offset = id - ID_BASE;
    // offset <= 154, so both parts fit in a u8
    let unit = UnitIndex((offset / 10) as u8);
    let kind = MessageKind::from_digit((offset % 10) as u8);
    Some((unit, kind))
}

#[cfg(test)]
fn unit(index: u8) -> UnitIndex {
    UnitIndex::new(index).unwrap()
}

#[test]
fn test_encode_known_ids() {
    assert_eq!(encode(unit(0), MessageKind::Query), 300);
    assert_eq!(encode(unit(1), MessageKind::Query), 310);
    assert_eq!(encode(unit(1), MessageKind::VersionRequest), 315);
    assert_eq!(encode(unit(3), MessageKind::Cells9To12), 333);
    assert_eq!(encode(unit(15), MessageKind::Temperature), 454);
    assert_eq!(encode(unit(2), MessageKind::Reboot), 329);
}

#[test]
fn test_decode_unit_and_kind() {
    assert_eq!(decode(310), Some((unit(1), MessageKind::Query)));
    assert_eq!(decode(353), Some((unit(5), MessageKind::Cells9To12)));
    assert_eq!(decode(367), Some((unit(6), MessageKind::Other(7))));
}

#[test]
fn test_decode_inverts_encode_inside_window() {
    let kinds = [
        MessageKind::Cells1To4,
        MessageKind::Cells5To8,
        MessageKind::Cells9To12,
        MessageKind::Temperature,
        MessageKind::VersionRequest,
        MessageKind::VersionReply,
    ];
    for u in UnitIndex::all().filter(|u| u.get() < 15) {
        for kind in kinds {
            assert_eq!(decode(encode(u, kind)), Some((u, kind)), "unit {u} {kind:?}");
        }
    }
    for kind in &kinds[..4] {
        assert_eq!(decode(encode(unit(15), *kind)), Some((unit(15), *kind)));
    }
}

#[test]
fn test_decode_rejects_ids_outside_window() {
    assert_eq!(decode(299), None);
    assert_eq!(decode(455), None);
    assert_eq!(decode(0), None);
    // unit 15 version reply falls past the window
    assert_eq!(decode(encode(unit(15), MessageKind::VersionReply)), None);
}

#[test]
fn test_unit_index_range() {
    assert_eq!(UnitIndex::new(15).map(UnitIndex::get), Ok(15));
    assert_eq!(UnitIndex::new(16), Err(ProtocolError::UnitOutOfRange(16)));
    assert_eq!(UnitIndex::all().count(), 16);
}
