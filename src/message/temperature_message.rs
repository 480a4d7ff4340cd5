use crate::error::DecodeError;

/// Raw temperature bytes are offset by this many degrees.
const TEMPERATURE_OFFSET_C: i16 = 40;

/// Decode the two temperature sensors of a temperature reply, in °C.
pub fn decode_temperature_pair(data: &[u8]) -> Result<[i16; 2], DecodeError> {
    DecodeError::check("temperature", 2, data)?;
    Ok([
        i16::from(data[0]) - TEMPERATURE_OFFSET_C,
        i16::from(data[1]) - TEMPERATURE_OFFSET_C,
    ])
}

#[test]
fn test_decode_temperature_extremes() {
    assert_eq!(decode_temperature_pair(&[0x00, 0xff]), Ok([-40, 215]));
}

#[test]
fn test_decode_temperature_room() {
    assert_eq!(decode_temperature_pair(&[62, 65]), Ok([22, 25]));
}

#[test]
fn test_decode_temperature_wrong_len() {
    assert!(decode_temperature_pair(&[62]).is_err());
    assert!(decode_temperature_pair(&[62, 65, 0]).is_err());
}
