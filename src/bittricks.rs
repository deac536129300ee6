/*!
bit packing for the state hashes.

todo: should this be a crate?
*/

pub fn u16s_to_u32(high: u16, low: u16) -> u32 {
    ((high as u32) << 16) | (low as u32)
}

pub fn u8s_to_u32(bytes: [u8; 4]) -> u32 {
    u32::from_be_bytes(bytes)
}
