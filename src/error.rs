use thiserror::Error;

use crate::address::UnitIndex;

/// A payload could not be decoded because it has the wrong size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("{what} payload must be {expected} bytes, got {actual}")]
pub struct DecodeError {
    pub what: &'static str,
    pub expected: usize,
    pub actual: usize,
}

impl DecodeError {
    pub(crate) fn check(what: &'static str, expected: usize, bytes: &[u8]) -> Result<(), Self> {
        if bytes.len() != expected {
            return Err(Self { what, expected, actual: bytes.len() });
        }
        Ok(())
    }
}

/// Errors raised by the BMS protocol layer itself, as opposed to the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("unit index {0} is out of range, valid units are 0-15")]
    UnitOutOfRange(u8),

    /// The reboot command has a reserved message kind but no known payload
    /// or acknowledgment format, so nothing is put on the bus.
    #[error("reboot of unit {0} is not supported: the reboot frame format is unknown")]
    RebootUnsupported(UnitIndex),
}
