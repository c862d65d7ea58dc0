//! Device binding query tests

#[path = "../common/mod.rs"]
mod common;

use common::*;
use launchkey::db::queries::DeviceAcquisition;

const CODE: &str = "AAAA-BBBB-CCCC-DDDD";

#[test]
fn test_acquire_creates_then_reuses() {
    let mut conn = setup_test_db();
    insert_license(&mut conn, CODE, T0, T0 + ONE_YEAR);

    let first = queries::acquire_device_atomic(&mut conn, CODE, "dev1", T0, 2).unwrap();
    assert_eq!(first.acquisition, DeviceAcquisition::Created);
    assert_eq!(first.device_count, 1);
    assert_eq!(first.license.code, CODE);

    let again = queries::acquire_device_atomic(&mut conn, CODE, "dev1", T0 + 5, 2).unwrap();
    assert_eq!(again.acquisition, DeviceAcquisition::Existing);
    assert_eq!(again.device_count, 1);

    let devices = queries::list_devices_for_license(&conn, CODE).unwrap();
    assert_eq!(
        devices,
        vec![Device {
            device_id: "dev1".into(),
            first_seen: T0,
            last_seen: T0 + 5,
        }]
    );
}

#[test]
fn test_acquire_respects_max_devices() {
    let mut conn = setup_test_db();
    insert_license(&mut conn, CODE, T0, T0 + ONE_YEAR);

    queries::acquire_device_atomic(&mut conn, CODE, "dev1", T0, 1).unwrap();
    let result = queries::acquire_device_atomic(&mut conn, CODE, "dev2", T0, 1);
    assert!(matches!(result, Err(AppError::DeviceLimit { limit: 1 })));
    assert_eq!(queries::count_devices_for_license(&conn, CODE).unwrap(), 1);
}

#[test]
fn test_acquire_missing_and_expired() {
    let mut conn = setup_test_db();
    insert_license(&mut conn, CODE, T0, T0 + 100);

    assert!(matches!(
        queries::acquire_device_atomic(&mut conn, "EEEE-FFFF-GGGG-HHHH", "dev1", T0, 2),
        Err(AppError::NotFound(_))
    ));
    assert!(matches!(
        queries::acquire_device_atomic(&mut conn, CODE, "dev1", T0 + 100, 2),
        Err(AppError::Expired { expires_at }) if expires_at == T0 + 100
    ));
    assert_eq!(queries::count_devices_for_license(&conn, CODE).unwrap(), 0);
}

#[test]
fn test_devices_listed_in_binding_order() {
    let mut conn = setup_test_db();
    insert_license(&mut conn, CODE, T0, T0 + ONE_YEAR);

    queries::acquire_device_atomic(&mut conn, CODE, "zeta", T0, 2).unwrap();
    queries::acquire_device_atomic(&mut conn, CODE, "alpha", T0 + 1, 2).unwrap();

    let ids: Vec<_> = queries::list_devices_for_license(&conn, CODE)
        .unwrap()
        .into_iter()
        .map(|d| d.device_id)
        .collect();
    assert_eq!(ids, vec!["zeta", "alpha"]);
}

#[test]
fn test_clear_devices_atomic() {
    let mut conn = setup_test_db();
    insert_license(&mut conn, CODE, T0, T0 + ONE_YEAR);
    queries::acquire_device_atomic(&mut conn, CODE, "dev1", T0, 2).unwrap();
    queries::acquire_device_atomic(&mut conn, CODE, "dev2", T0, 2).unwrap();

    assert_eq!(queries::clear_devices_atomic(&mut conn, CODE).unwrap(), Some(2));
    assert_eq!(queries::clear_devices_atomic(&mut conn, CODE).unwrap(), Some(0));
    assert_eq!(
        queries::clear_devices_atomic(&mut conn, "EEEE-FFFF-GGGG-HHHH").unwrap(),
        None
    );
}

#[test]
fn test_deleting_license_cascades_to_devices() {
    let mut conn = setup_test_db();
    insert_license(&mut conn, CODE, T0, T0 + ONE_YEAR);
    queries::acquire_device_atomic(&mut conn, CODE, "dev1", T0, 2).unwrap();

    conn.execute("DELETE FROM licenses WHERE code = ?1", [CODE])
        .unwrap();
    let remaining: i64 = conn
        .query_row("SELECT COUNT(*) FROM license_devices", [], |row| row.get(0))
        .unwrap();
    assert_eq!(remaining, 0);
}

#[test]
fn test_license_read_with_devices() {
    let mut conn = setup_test_db();
    insert_license(&mut conn, CODE, T0, T0 + ONE_YEAR);
    queries::acquire_device_atomic(&mut conn, CODE, "dev1", T0, 2).unwrap();
    queries::acquire_device_atomic(&mut conn, CODE, "dev2", T0, 2).unwrap();

    let (license, devices) = queries::get_license_with_devices(&mut conn, CODE)
        .unwrap()
        .expect("license should exist");
    assert_eq!(license.code, CODE);
    let ids: Vec<_> = devices.iter().map(|d| d.device_id.as_str()).collect();
    assert_eq!(ids, ["dev1", "dev2"]);

    assert!(
        queries::get_license_with_devices(&mut conn, "ZZZZ-ZZZZ-ZZZZ-ZZZZ")
            .unwrap()
            .is_none()
    );

    let (page, total) = queries::list_licenses_with_devices(&mut conn, None, 10, 0).unwrap();
    assert_eq!(total, 1);
    assert_eq!(page.len(), 1);
    assert_eq!(page[0].1.len(), 2);
    assert!(conn.is_autocommit(), "the read transaction must be closed");
}
