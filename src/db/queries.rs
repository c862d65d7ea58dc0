use rusqlite::{Connection, OptionalExtension, TransactionBehavior, params};

use crate::code::generate_code;
use crate::error::{AppError, Result, msg};
use crate::models::*;

use super::from_row::{DEVICE_COLS, LICENSE_COLS, query_all, query_one};

/// How many fresh codes to try before giving up on issuing a license.
pub const CODE_GENERATION_ATTEMPTS: usize = 10;

// ============ Licenses ============

pub fn license_exists(conn: &Connection, code: &str) -> Result<bool> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM licenses WHERE code = ?1)",
        params![code],
        |row| row.get(0),
    )
    .map_err(Into::into)
}

/// Create a license under a freshly generated code.
///
/// Generation, the uniqueness lookup and the insert share one IMMEDIATE
/// transaction, so no concurrent issuer can claim the same code between the
/// lookup and the insert. A collision (store hit) draws a new code.
pub fn create_license(
    conn: &mut Connection,
    email: &str,
    created_at: i64,
    expires_at: i64,
) -> Result<License> {
    create_license_with(conn, email, created_at, expires_at, generate_code)
}

/// Same as [`create_license`] with a caller-supplied code source.
pub fn create_license_with(
    conn: &mut Connection,
    email: &str,
    created_at: i64,
    expires_at: i64,
    mut next_code: impl FnMut() -> String,
) -> Result<License> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let mut code = None;
    for _ in 0..CODE_GENERATION_ATTEMPTS {
        let candidate = next_code();
        if !license_exists(&tx, &candidate)? {
            code = Some(candidate);
            break;
        }
        tracing::warn!("License code collision, generating another");
    }
    let code = code.ok_or_else(|| AppError::Internal(msg::CODE_GENERATION_EXHAUSTED.into()))?;

    tx.execute(
        "INSERT INTO licenses (code, email, created_at, expires_at) VALUES (?1, ?2, ?3, ?4)",
        params![&code, email, created_at, expires_at],
    )?;
    tx.commit()?;

    Ok(License {
        code,
        email: email.to_string(),
        created_at,
        expires_at,
    })
}

pub fn get_license_by_code(conn: &Connection, code: &str) -> Result<Option<License>> {
    query_one(
        conn,
        &format!("SELECT {} FROM licenses WHERE code = ?1", LICENSE_COLS),
        &[&code],
    )
}

/// List licenses, newest first, optionally filtered by email (case-insensitive).
/// Returns the page and the total number of matching licenses.
pub fn list_licenses_paginated(
    conn: &Connection,
    email: Option<&str>,
    limit: i64,
    offset: i64,
) -> Result<(Vec<License>, i64)> {
    match email {
        Some(email) => {
            let total: i64 = conn.query_row(
                "SELECT COUNT(*) FROM licenses WHERE email = ?1 COLLATE NOCASE",
                params![email],
                |row| row.get(0),
            )?;
            let licenses = query_all(
                conn,
                &format!(
                    "SELECT {} FROM licenses WHERE email = ?1 COLLATE NOCASE
                     ORDER BY created_at DESC, code ASC LIMIT ?2 OFFSET ?3",
                    LICENSE_COLS
                ),
                &[&email, &limit, &offset],
            )?;
            Ok((licenses, total))
        }
        None => {
            let total: i64 =
                conn.query_row("SELECT COUNT(*) FROM licenses", [], |row| row.get(0))?;
            let licenses = query_all(
                conn,
                &format!(
                    "SELECT {} FROM licenses ORDER BY created_at DESC, code ASC LIMIT ?1 OFFSET ?2",
                    LICENSE_COLS
                ),
                &[&limit, &offset],
            )?;
            Ok((licenses, total))
        }
    }
}

pub fn update_license_email(conn: &Connection, code: &str, email: &str) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE licenses SET email = ?1 WHERE code = ?2",
        params![email, code],
    )?;
    Ok(affected > 0)
}

/// Renew a license: move expiry to `new_expires_at` and unbind all devices,
/// as one transaction.
///
/// Expiry never moves backwards or stays put: if `new_expires_at` does not
/// exceed the stored value (two renewals within the same second), the stored
/// value is bumped by one second instead.
///
/// Returns the stored expiry, or None if the license doesn't exist.
pub fn renew_license_atomic(
    conn: &mut Connection,
    code: &str,
    new_expires_at: i64,
) -> Result<Option<i64>> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let stored: Option<i64> = tx
        .query_row(
            "UPDATE licenses SET expires_at = MAX(?1, expires_at + 1) WHERE code = ?2
             RETURNING expires_at",
            params![new_expires_at, code],
            |row| row.get(0),
        )
        .optional()?;

    let Some(expires_at) = stored else {
        return Ok(None);
    };

    tx.execute(
        "DELETE FROM license_devices WHERE license_code = ?1",
        params![code],
    )?;
    tx.commit()?;

    Ok(Some(expires_at))
}

// ============ Devices ============

pub fn list_devices_for_license(conn: &Connection, code: &str) -> Result<Vec<Device>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM license_devices WHERE license_code = ?1 ORDER BY id ASC",
            DEVICE_COLS
        ),
        &[&code],
    )
}

pub fn count_devices_for_license(conn: &Connection, code: &str) -> Result<usize> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM license_devices WHERE license_code = ?1",
        params![code],
        |row| row.get(0),
    )?;
    Ok(count as usize)
}

// ============ Snapshot reads ============
//
// A license and its devices are read inside one deferred transaction, so a
// renew or reset committing between the two statements is either fully
// visible or not at all.

pub fn get_license_with_devices(
    conn: &mut Connection,
    code: &str,
) -> Result<Option<(License, Vec<Device>)>> {
    let tx = conn.transaction()?;
    let Some(license) = get_license_by_code(&tx, code)? else {
        return Ok(None);
    };
    let devices = list_devices_for_license(&tx, code)?;
    tx.commit()?;
    Ok(Some((license, devices)))
}

pub fn list_licenses_with_devices(
    conn: &mut Connection,
    email: Option<&str>,
    limit: i64,
    offset: i64,
) -> Result<(Vec<(License, Vec<Device>)>, i64)> {
    let tx = conn.transaction()?;
    let (licenses, total) = list_licenses_paginated(&tx, email, limit, offset)?;
    let items = licenses
        .into_iter()
        .map(|license| {
            let devices = list_devices_for_license(&tx, &license.code)?;
            Ok((license, devices))
        })
        .collect::<Result<Vec<_>>>()?;
    tx.commit()?;
    Ok((items, total))
}

/// Unbind every device from a license in one transaction.
///
/// Returns the number of devices removed, or None if the license doesn't exist.
pub fn clear_devices_atomic(conn: &mut Connection, code: &str) -> Result<Option<usize>> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    if !license_exists(&tx, code)? {
        return Ok(None);
    }

    let cleared = tx.execute(
        "DELETE FROM license_devices WHERE license_code = ?1",
        params![code],
    )?;
    tx.commit()?;

    Ok(Some(cleared))
}

/// How a device came to be bound after a successful check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceAcquisition {
    /// The device was already bound; the device list is unchanged.
    Existing,
    /// The device took a free slot.
    Created,
}

/// Result of a successful [`acquire_device_atomic`].
#[derive(Debug, Clone)]
pub struct DeviceCheck {
    pub license: License,
    pub device_count: usize,
    pub acquisition: DeviceAcquisition,
}

/// Verify a license for a device, binding the device if a slot is free.
///
/// The lookup, expiry check, device-list read and conditional insert all run
/// in one IMMEDIATE transaction. SQLite takes the write lock at BEGIN, so
/// concurrent checks against the same license serialize and the device cap
/// cannot be overshot. A check racing a reset or renewal sees the device list
/// either before or after it, never in between.
///
/// # PostgreSQL Migration Note
/// Use `SELECT ... FOR UPDATE` on the license row to get the same per-license
/// serialization.
pub fn acquire_device_atomic(
    conn: &mut Connection,
    code: &str,
    device_id: &str,
    now: i64,
    max_devices: usize,
) -> Result<DeviceCheck> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let license = get_license_by_code(&tx, code)?
        .ok_or_else(|| AppError::NotFound(msg::LICENSE_NOT_FOUND.into()))?;

    if !license.is_active(now) {
        return Err(AppError::Expired {
            expires_at: license.expires_at,
        });
    }

    let known = tx.execute(
        "UPDATE license_devices SET last_seen = ?1 WHERE license_code = ?2 AND device_id = ?3",
        params![now, code, device_id],
    )?;

    if known > 0 {
        let device_count = count_devices_for_license(&tx, code)?;
        tx.commit()?;
        return Ok(DeviceCheck {
            license,
            device_count,
            acquisition: DeviceAcquisition::Existing,
        });
    }

    let current = count_devices_for_license(&tx, code)?;
    if current >= max_devices {
        return Err(AppError::DeviceLimit { limit: max_devices });
    }

    tx.execute(
        "INSERT INTO license_devices (license_code, device_id, first_seen, last_seen)
         VALUES (?1, ?2, ?3, ?3)",
        params![code, device_id, now],
    )?;
    tx.commit()?;

    Ok(DeviceCheck {
        license,
        device_count: current + 1,
        acquisition: DeviceAcquisition::Created,
    })
}
