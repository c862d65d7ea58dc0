use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result, msg};

/// Longest accepted device identifier. Launchers send a hex SHA-256 digest
/// (64 chars) of the machine's hardware ids.
pub const MAX_DEVICE_ID_LEN: usize = 128;

/// A device bound to a license.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub device_id: String,
    pub first_seen: i64,
    pub last_seen: i64,
}

/// Trim and validate a device identifier sent by a launcher.
pub fn normalize_device_id(input: &str) -> Result<String> {
    let device_id = input.trim();
    if device_id.is_empty() {
        return Err(AppError::Validation(msg::DEVICE_ID_EMPTY.into()));
    }
    if device_id.chars().count() > MAX_DEVICE_ID_LEN {
        return Err(AppError::Validation(msg::DEVICE_ID_TOO_LONG.into()));
    }
    Ok(device_id.to_string())
}
