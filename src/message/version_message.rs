use std::fmt;

use crate::error::DecodeError;

/// A verbatim payload which asks a unit for its firmware version
pub(crate) const REQUEST: [u8; 8] = [0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00];

/// Leading byte of a reply that acknowledges a version request.
const ACK_FLAG: u8 = 1;

/// Firmware version reported by a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct FirmwareVersion {
    pub major: u8,
    pub minor: u8,
    pub patch: u8,
}

impl FirmwareVersion {
    pub fn new(major: u8, minor: u8, patch: u8) -> Self {
        Self { major, minor, patch }
    }
}

impl fmt::Display for FirmwareVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Decode a version reply.
///
/// Returns `Ok(None)` when the flag byte is not an acknowledgment; such a
/// reply carries no version and is not an error.
pub fn decode_version_reply(data: &[u8]) -> Result<Option<FirmwareVersion>, DecodeError> {
    if data.first() != Some(&ACK_FLAG) {
        return Ok(None);
    }
    if data.len() < 4 {
        return Err(DecodeError { what: "version reply", expected: 4, actual: data.len() });
    }
    Ok(Some(FirmwareVersion::new(data[1], data[2], data[3])))
}

#[test]
fn test_decode_version_reply() {
    let data = hex::decode("0100020500000000").unwrap();
    assert_eq!(decode_version_reply(&data), Ok(Some(FirmwareVersion::new(0, 2, 5))));
}

#[test]
fn test_decode_version_reply_not_ack() {
    let data = hex::decode("0000020500000000").unwrap();
    assert_eq!(decode_version_reply(&data), Ok(None));
}

#[test]
fn test_decode_version_reply_short() {
    assert!(decode_version_reply(&[0x01, 0x02]).is_err());
}

#[test]
fn test_decode_version_reply_short_not_ack() {
    assert_eq!(decode_version_reply(&[0x00]), Ok(None));
    assert_eq!(decode_version_reply(&[]), Ok(None));
}

#[test]
fn test_version_display() {
    assert_eq!(FirmwareVersion::new(1, 10, 3).to_string(), "1.10.3");
}
