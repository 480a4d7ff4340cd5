use std::fmt;

/// The largest payload a classic CAN frame can carry.
pub const MAX_DATA_LEN: usize = 8;

/// A CAN data frame as seen by the BMS protocol layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// The arbitration id
    pub id: u32,
    /// Payload, at most 8 bytes
    pub data: Vec<u8>,
    /// Whether `id` is a 29 bit extended id
    pub extended: bool,
}

impl Frame {
    /// A frame with an extended id, which is what the BMS-12 expects from the host.
    pub fn extended(id: u32, data: &[u8]) -> Self {
        debug_assert!(data.len() <= MAX_DATA_LEN);
        Self { id, data: data.to_vec(), extended: true }
    }

    pub fn standard(id: u32, data: &[u8]) -> Self {
        debug_assert!(data.len() <= MAX_DATA_LEN);
        Self { id, data: data.to_vec(), extended: false }
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let h = hex::encode(&self.data);
        write!(f, "{}#{h}", self.id)
    }
}

#[test]
fn test_display_frame() {
    let frame = Frame::extended(315, &[1, 0, 0, 0, 0, 0, 0, 0]);
    assert_eq!(frame.to_string(), "315#0100000000000000");
}
