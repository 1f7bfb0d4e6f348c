//! Numeric argument parsing for command lines.
//!
//! Block numbers, counts, and addresses are hexadecimal with an optional
//! `0x` prefix. Device ids default to decimal; a `0x` prefix switches
//! them to hexadecimal too.

use alloc::string::ToString;

use blkmap::DeviceId;

use crate::shell::CmdError;

fn strip_radix_prefix(token: &str) -> Option<&str> {
    token
        .strip_prefix("0x")
        .or_else(|| token.strip_prefix("0X"))
}

/// Parses a block number, count, or byte address.
pub(crate) fn parse_hex(token: &str) -> Result<u64, CmdError> {
    let digits = strip_radix_prefix(token).unwrap_or(token);
    u64::from_str_radix(digits, 16).map_err(|_| CmdError::BadNumber(token.to_string()))
}

/// Parses a device id.
pub(crate) fn parse_id(token: &str) -> Result<DeviceId, CmdError> {
    let value = match strip_radix_prefix(token) {
        Some(digits) => u32::from_str_radix(digits, 16),
        None => token.parse(),
    }
    .map_err(|_| CmdError::BadNumber(token.to_string()))?;
    Ok(DeviceId::new(value))
}
