//! License lifecycle engine.
//!
//! Every operation a launcher or an admin can perform on a license goes
//! through [`LicenseEngine`]. The engine owns no state of its own beyond the
//! store handle and clock it was constructed with; it is cheap to clone and
//! safe to share across request handlers.

use std::sync::Arc;

use rusqlite::Connection;
use serde::Serialize;

use crate::clock::{Clock, SECONDS_PER_DAY, SystemClock};
use crate::code::normalize_code;
use crate::db::{DbPool, queries};
use crate::error::{AppError, Result, msg};
use crate::models::{LICENSE_VALIDITY_DAYS, License, LicenseDetails, MAX_DEVICES, normalize_device_id};
use crate::pagination::{Paginated, PaginationQuery};

/// Attempts per store operation when SQLite reports the write lock as
/// busy after the connection's busy timeout.
pub const STORE_RETRY_ATTEMPTS: usize = 3;

#[derive(Debug, Clone, Serialize)]
pub struct Renewal {
    pub code: String,
    pub expires_at: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeviceReset {
    pub code: String,
    pub cleared_count: usize,
}

/// Successful verification of a license on a device.
#[derive(Debug, Clone, Serialize)]
pub struct CheckOutcome {
    pub code: String,
    pub expires_at: i64,
    pub remaining_seconds: i64,
    /// Whole days left, floored.
    pub remaining_days: i64,
    /// Fewer than seven days left; the launcher shows a renewal warning.
    pub expires_soon: bool,
    pub device_count: usize,
    /// This check bound the device to the license.
    pub registered: bool,
}

#[derive(Clone)]
pub struct LicenseEngine {
    pool: DbPool,
    clock: Arc<dyn Clock>,
}

impl LicenseEngine {
    pub fn new(pool: DbPool, clock: Arc<dyn Clock>) -> Self {
        Self { pool, clock }
    }

    pub fn with_system_clock(pool: DbPool) -> Self {
        Self::new(pool, Arc::new(SystemClock))
    }

    pub fn now(&self) -> i64 {
        self.clock.now()
    }

    /// Run a store operation on a pooled connection, replaying it when the
    /// write lock could not be taken. Each closure call must be a complete
    /// transaction so a replay never sees partial work.
    fn with_retry<T>(
        &self,
        operation: &'static str,
        mut f: impl FnMut(&mut Connection) -> Result<T>,
    ) -> Result<T> {
        let mut attempt = 1;
        loop {
            let mut conn = self.pool.get()?;
            match f(&mut *conn) {
                Err(e) if e.is_lock_conflict() && attempt < STORE_RETRY_ATTEMPTS => {
                    tracing::warn!(operation, attempt, "Store busy, retrying: {}", e);
                    attempt += 1;
                }
                result => return result,
            }
        }
    }

    /// Issue a new license valid for 365 days from now, with no devices.
    pub fn issue(&self, email: &str) -> Result<License> {
        let email = email.trim();
        if email.is_empty() {
            return Err(AppError::Validation(msg::EMAIL_EMPTY.into()));
        }

        let now = self.now();
        let expires_at = now + LICENSE_VALIDITY_DAYS * SECONDS_PER_DAY;

        let license = self.with_retry("issue", |conn| {
            queries::create_license(conn, email, now, expires_at)
        })?;

        tracing::info!(code = %license.code, expires_at, "Issued license");
        Ok(license)
    }

    /// Extend a license to 365 days from now and unbind all its devices.
    ///
    /// Always counts from the moment of renewal, never from the old expiry,
    /// so an expired license comes back to life.
    pub fn renew(&self, code: &str) -> Result<Renewal> {
        let code = normalize_code(code)?;
        let new_expires_at = self.now() + LICENSE_VALIDITY_DAYS * SECONDS_PER_DAY;

        let expires_at = self
            .with_retry("renew", |conn| {
                queries::renew_license_atomic(conn, &code, new_expires_at)
            })?
            .ok_or_else(|| AppError::NotFound(msg::LICENSE_NOT_FOUND.into()))?;

        tracing::info!(code = %code, expires_at, "Renewed license");
        Ok(Renewal { code, expires_at })
    }

    /// Unbind every device. Expiry and email are untouched.
    pub fn reset_devices(&self, code: &str) -> Result<DeviceReset> {
        let code = normalize_code(code)?;

        let cleared_count = self
            .with_retry("reset_devices", |conn| {
                queries::clear_devices_atomic(conn, &code)
            })?
            .ok_or_else(|| AppError::NotFound(msg::LICENSE_NOT_FOUND.into()))?;

        tracing::info!(code = %code, cleared_count, "Reset license devices");
        Ok(DeviceReset {
            code,
            cleared_count,
        })
    }

    pub fn update_email(&self, code: &str, new_email: &str) -> Result<()> {
        let code = normalize_code(code)?;
        let new_email = new_email.trim();
        if new_email.is_empty() {
            return Err(AppError::Validation(msg::EMAIL_EMPTY.into()));
        }

        let updated = self.with_retry("update_email", |conn| {
            queries::update_license_email(conn, &code, new_email)
        })?;
        if !updated {
            return Err(AppError::NotFound(msg::LICENSE_NOT_FOUND.into()));
        }

        tracing::info!(code = %code, "Updated license email");
        Ok(())
    }

    /// Verify `code` for `device_id`, binding the device if it is new and a
    /// slot is free.
    ///
    /// Fails with `NotFound` for unknown codes, `Expired` once `now >=
    /// expires_at`, and `DeviceLimit` when two other devices are bound.
    pub fn check(&self, code: &str, device_id: &str) -> Result<CheckOutcome> {
        let code = normalize_code(code)?;
        let device_id = normalize_device_id(device_id)?;
        let now = self.now();

        let checked = self.with_retry("check", |conn| {
            queries::acquire_device_atomic(conn, &code, &device_id, now, MAX_DEVICES)
        })?;

        let registered = checked.acquisition == queries::DeviceAcquisition::Created;
        let license = checked.license;

        if registered {
            tracing::info!(
                code = %code,
                device_count = checked.device_count,
                "Registered new device"
            );
        }

        Ok(CheckOutcome {
            remaining_seconds: license.remaining_seconds(now),
            remaining_days: license.remaining_days(now),
            expires_soon: license.expires_soon(now),
            expires_at: license.expires_at,
            device_count: checked.device_count,
            registered,
            code,
        })
    }

    /// Look up a license with its devices and derived status.
    pub fn get_license(&self, code: &str) -> Result<LicenseDetails> {
        let code = normalize_code(code)?;
        let (license, devices) = self
            .with_retry("get_license", |conn| queries::get_license_with_devices(conn, &code))?
            .ok_or_else(|| AppError::NotFound(msg::LICENSE_NOT_FOUND.into()))?;

        Ok(LicenseDetails::new(license, devices, self.now()))
    }

    /// List licenses newest first, optionally only those for one email.
    pub fn list_licenses(
        &self,
        email: Option<&str>,
        page: &PaginationQuery,
    ) -> Result<Paginated<LicenseDetails>> {
        let email = email.map(str::trim).filter(|e| !e.is_empty());
        let (limit, offset) = (page.limit(), page.offset());
        let (licenses, total) = self.with_retry("list_licenses", |conn| {
            queries::list_licenses_with_devices(conn, email, limit, offset)
        })?;

        let now = self.now();
        let items = licenses
            .into_iter()
            .map(|(license, devices)| LicenseDetails::new(license, devices, now))
            .collect();

        Ok(Paginated::new(items, total, limit, offset))
    }
}
