//! Small shared helpers

/// Render a hash rate as the 32-byte hex quantity `eth_submitHashrate` expects
///
/// Big-endian, zero-padded to 64 hex characters, `0x`-prefixed.
pub fn hashrate_hex(rate: u64) -> String {
    format!("0x{:064x}", rate)
}
