/// Payload of a query, which carries the shunt level in mV (0 disables shunting).
pub fn encode_query(shunt_mv: u16) -> [u8; 2] {
    shunt_mv.to_be_bytes()
}

#[test]
fn test_encode_query() {
    assert_eq!(encode_query(0), [0x00, 0x00]);
    assert_eq!(hex::encode(encode_query(3800)), "0ed8");
}
