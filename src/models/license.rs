use serde::{Deserialize, Serialize};

use crate::clock::SECONDS_PER_DAY;
use crate::error::{AppError, Result, msg};

use super::Device;

/// Maximum number of devices bound to one license at any time.
pub const MAX_DEVICES: usize = 2;
/// Validity of a freshly issued or renewed license.
pub const LICENSE_VALIDITY_DAYS: i64 = 365;
/// Checks inside this window report the license as expiring soon.
pub const EXPIRY_WARNING_DAYS: i64 = 7;

/// Basic email format validation.
///
/// Exactly one @, non-empty local part without spaces, and a domain with at
/// least one inner dot. Not RFC 5322; a sanity check for typos.
pub fn validate_email_format(email: &str) -> Result<()> {
    let email = email.trim();

    if email.is_empty() {
        return Err(AppError::Validation(msg::EMAIL_EMPTY.into()));
    }

    let Some((local_part, domain_part)) = email.split_once('@') else {
        return Err(AppError::Validation(msg::INVALID_EMAIL_FORMAT.into()));
    };

    if local_part.is_empty() || local_part.contains(' ') || domain_part.contains('@') {
        return Err(AppError::Validation(msg::INVALID_EMAIL_FORMAT.into()));
    }

    if domain_part.is_empty()
        || !domain_part.contains('.')
        || domain_part.starts_with('.')
        || domain_part.ends_with('.')
    {
        return Err(AppError::Validation(msg::INVALID_EMAIL_FORMAT.into()));
    }

    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct License {
    pub code: String,
    pub email: String,
    pub created_at: i64,
    pub expires_at: i64,
}

impl License {
    /// Active iff `now < expires_at`. Never stored.
    pub fn is_active(&self, now: i64) -> bool {
        now < self.expires_at
    }

    pub fn status(&self, now: i64) -> LicenseStatus {
        if self.is_active(now) {
            LicenseStatus::Active
        } else {
            LicenseStatus::Expired
        }
    }

    /// Seconds of validity left; zero once expired.
    pub fn remaining_seconds(&self, now: i64) -> i64 {
        (self.expires_at - now).max(0)
    }

    /// Whole days of validity left (floored).
    pub fn remaining_days(&self, now: i64) -> i64 {
        self.remaining_seconds(now) / SECONDS_PER_DAY
    }

    pub fn expires_soon(&self, now: i64) -> bool {
        self.is_active(now) && self.remaining_seconds(now) < EXPIRY_WARNING_DAYS * SECONDS_PER_DAY
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LicenseStatus {
    Active,
    Expired,
}

/// A license with its bound devices and derived status, as returned to admins.
#[derive(Debug, Clone, Serialize)]
pub struct LicenseDetails {
    #[serde(flatten)]
    pub license: License,
    pub status: LicenseStatus,
    pub remaining_days: i64,
    /// Oldest first.
    pub devices: Vec<Device>,
}

impl LicenseDetails {
    pub fn new(license: License, devices: Vec<Device>, now: i64) -> Self {
        Self {
            status: license.status(now),
            remaining_days: license.remaining_days(now),
            license,
            devices,
        }
    }

    pub fn device_ids(&self) -> Vec<&str> {
        self.devices.iter().map(|d| d.device_id.as_str()).collect()
    }
}

#[derive(Debug, Deserialize)]
pub struct IssueLicense {
    pub email: String,
}

impl IssueLicense {
    pub fn validate(&self) -> Result<()> {
        validate_email_format(&self.email)
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateEmail {
    pub email: String,
}

impl UpdateEmail {
    pub fn validate(&self) -> Result<()> {
        validate_email_format(&self.email)
    }
}
