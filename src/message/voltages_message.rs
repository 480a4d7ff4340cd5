use crate::error::DecodeError;

/// Number of cells carried by one voltages reply.
pub const CELLS_PER_BLOCK: usize = 4;

const BLOCK_LEN: usize = CELLS_PER_BLOCK * 2;

/// Decode one cell block reply into four cell voltages in mV, in wire order.
pub fn decode_cell_block(data: &[u8]) -> Result<[u16; CELLS_PER_BLOCK], DecodeError> {
    DecodeError::check("cell block", BLOCK_LEN, data)?;
    let mut mv = [0u16; CELLS_PER_BLOCK];
    for (cell, bytes) in mv.iter_mut().zip(data.chunks_exact(2)) {
        *cell = u16::from_be_bytes([bytes[0], bytes[1]]);
    }
    Ok(mv)
}

#[test]
fn test_decode_cell_block() {
    let data = hex::decode("0001000200030004").unwrap();
    assert_eq!(decode_cell_block(&data), Ok([1, 2, 3, 4]));
}

#[test]
fn test_decode_cell_block_real_voltages() {
    // 3301, 3312, 3299, 4200 mV
    let data = hex::decode("0ce50cf00ce31068").unwrap();
    assert_eq!(decode_cell_block(&data), Ok([3301, 3312, 3299, 4200]));
}

#[test]
fn test_decode_cell_block_short() {
    let data = hex::decode("00010002000300").unwrap();
    let err = decode_cell_block(&data).unwrap_err();
    assert_eq!(err.expected, 8);
    assert_eq!(err.actual, 7);
}
