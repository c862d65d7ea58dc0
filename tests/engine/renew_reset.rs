//! Renew and device reset

#[path = "../common/mod.rs"]
mod common;

use common::*;

#[test]
fn test_renew_counts_from_now_and_clears_devices() {
    let (engine, clock) = test_engine();
    let license = issue_test_license(&engine, "a@x.com");
    engine.check(&license.code, "dev1").unwrap();
    engine.check(&license.code, "dev2").unwrap();

    clock.advance_days(100);
    let renewal = engine.renew(&license.code).unwrap();

    assert_eq!(
        renewal.expires_at,
        T0 + 100 * SECONDS_PER_DAY + ONE_YEAR,
        "renewal should count 365 days from the renewal moment"
    );
    let details = engine.get_license(&license.code).unwrap();
    assert!(details.devices.is_empty(), "renew should unbind every device");
    assert_eq!(details.license.expires_at, renewal.expires_at);
    assert_eq!(details.license.created_at, T0, "created_at is never rewritten");
    assert_eq!(details.license.email, "a@x.com");
}

#[test]
fn test_renew_reactivates_expired_full_license() {
    let (engine, clock) = test_engine();
    let license = issue_test_license(&engine, "a@x.com");
    engine.check(&license.code, "dev1").unwrap();
    engine.check(&license.code, "dev2").unwrap();

    clock.advance_days(1000);
    assert_eq!(
        engine.get_license(&license.code).unwrap().status,
        LicenseStatus::Expired
    );

    let renewal = engine.renew(&license.code).unwrap();
    assert!(renewal.expires_at > clock.now());

    let details = engine.get_license(&license.code).unwrap();
    assert_eq!(details.status, LicenseStatus::Active);
    assert!(details.devices.is_empty());
    assert!(engine.check(&license.code, "dev3").is_ok());
}

#[test]
fn test_renew_always_moves_expiry_forward() {
    let (engine, _clock) = test_engine();
    let license = issue_test_license(&engine, "a@x.com");

    // Same instant as issue, then twice more without the clock moving.
    let first = engine.renew(&license.code).unwrap();
    let second = engine.renew(&license.code).unwrap();
    let third = engine.renew(&license.code).unwrap();

    assert!(first.expires_at > license.expires_at);
    assert!(second.expires_at > first.expires_at);
    assert!(third.expires_at > second.expires_at);
}

#[test]
fn test_renew_unknown_code() {
    let (engine, _clock) = test_engine();
    assert!(matches!(
        engine.renew("AAAA-BBBB-CCCC-DDDD"),
        Err(AppError::NotFound(_))
    ));
    assert!(matches!(engine.renew(""), Err(AppError::Validation(_))));
}

#[test]
fn test_reset_reports_cleared_count() {
    let (engine, _clock) = test_engine();
    let license = issue_test_license(&engine, "a@x.com");

    assert_eq!(engine.reset_devices(&license.code).unwrap().cleared_count, 0);

    engine.check(&license.code, "dev1").unwrap();
    assert_eq!(engine.reset_devices(&license.code).unwrap().cleared_count, 1);

    engine.check(&license.code, "dev1").unwrap();
    engine.check(&license.code, "dev2").unwrap();
    let reset = engine.reset_devices(&license.code).unwrap();
    assert_eq!(reset.cleared_count, 2);
    assert_eq!(reset.code, license.code);
}

#[test]
fn test_reset_keeps_expiry_and_email() {
    let (engine, clock) = test_engine();
    let license = issue_test_license(&engine, "a@x.com");
    engine.check(&license.code, "dev1").unwrap();

    clock.advance_days(10);
    engine.reset_devices(&license.code).unwrap();

    let details = engine.get_license(&license.code).unwrap();
    assert_eq!(details.license.expires_at, license.expires_at);
    assert_eq!(details.license.email, "a@x.com");
    assert!(details.devices.is_empty());
}

#[test]
fn test_reset_works_on_expired_license() {
    let (engine, clock) = test_engine();
    let license = issue_test_license(&engine, "a@x.com");
    engine.check(&license.code, "dev1").unwrap();

    clock.advance_days(400);
    assert_eq!(engine.reset_devices(&license.code).unwrap().cleared_count, 1);
    assert!(matches!(
        engine.check(&license.code, "dev1"),
        Err(AppError::Expired { .. })
    ));
}

#[test]
fn test_reset_unknown_code() {
    let (engine, _clock) = test_engine();
    assert!(matches!(
        engine.reset_devices("AAAA-BBBB-CCCC-DDDD"),
        Err(AppError::NotFound(_))
    ));
}
