//! Check: device binding, the device cap, expiry and remaining-time reporting

#[path = "../common/mod.rs"]
mod common;

use common::*;

#[test]
fn test_check_binds_up_to_two_devices() {
    let (engine, _clock) = test_engine();
    let license = issue_test_license(&engine, "a@x.com");

    let first = engine.check(&license.code, "dev1").unwrap();
    assert_eq!(first.device_count, 1);
    assert!(first.registered, "first check should bind the device");

    let second = engine.check(&license.code, "dev2").unwrap();
    assert_eq!(second.device_count, 2);
    assert!(second.registered);

    let third = engine.check(&license.code, "dev3");
    assert!(
        matches!(third, Err(AppError::DeviceLimit { limit: 2 })),
        "third distinct device should hit the limit, got {:?}",
        third
    );

    let details = engine.get_license(&license.code).unwrap();
    assert_eq!(details.device_ids(), vec!["dev1", "dev2"]);
}

#[test]
fn test_check_known_device_is_idempotent() {
    let (engine, clock) = test_engine();
    let license = issue_test_license(&engine, "a@x.com");
    engine.check(&license.code, "dev1").unwrap();
    engine.check(&license.code, "dev2").unwrap();

    for _ in 0..3 {
        clock.advance_secs(30);
        let outcome = engine.check(&license.code, "dev1").unwrap();
        assert_eq!(outcome.device_count, 2, "re-check should not change the count");
        assert!(!outcome.registered, "re-check should not register again");
    }

    let details = engine.get_license(&license.code).unwrap();
    assert_eq!(details.device_ids(), vec!["dev1", "dev2"]);
    assert_eq!(details.devices[0].first_seen, T0);
    assert_eq!(
        details.devices[0].last_seen,
        T0 + 90,
        "re-check should only refresh last_seen"
    );
}

#[test]
fn test_known_device_still_allowed_when_full() {
    let (engine, _clock) = test_engine();
    let license = issue_test_license(&engine, "a@x.com");
    engine.check(&license.code, "dev1").unwrap();
    engine.check(&license.code, "dev2").unwrap();
    assert!(engine.check(&license.code, "dev3").is_err());

    assert!(engine.check(&license.code, "dev2").is_ok());
    assert!(engine.check(&license.code, "dev1").is_ok());
}

#[test]
fn test_check_third_device_always_fails_in_any_order() {
    let orders = [
        ["a", "b", "c"],
        ["c", "b", "a"],
        ["b", "a", "c"],
    ];
    for order in orders {
        let (engine, _clock) = test_engine();
        let license = issue_test_license(&engine, "a@x.com");

        engine.check(&license.code, order[0]).unwrap();
        engine.check(&license.code, order[1]).unwrap();
        for _ in 0..3 {
            assert!(matches!(
                engine.check(&license.code, order[2]),
                Err(AppError::DeviceLimit { .. })
            ));
        }
        assert_eq!(engine.get_license(&license.code).unwrap().devices.len(), 2);
    }
}

#[test]
fn test_check_unknown_code_is_not_found() {
    let (engine, _clock) = test_engine();
    issue_test_license(&engine, "a@x.com");

    assert!(matches!(
        engine.check("AAAA-BBBB-CCCC-DDDD", "dev1"),
        Err(AppError::NotFound(_))
    ));
}

#[test]
fn test_check_rejects_malformed_input() {
    let (engine, _clock) = test_engine();
    let license = issue_test_license(&engine, "a@x.com");

    assert!(matches!(
        engine.check("AAAA-BBBB", "dev1"),
        Err(AppError::Validation(_))
    ));
    assert!(matches!(
        engine.check(&license.code, "   "),
        Err(AppError::Validation(_))
    ));
    assert!(matches!(
        engine.check(&license.code, &"x".repeat(MAX_DEVICE_ID_LEN + 1)),
        Err(AppError::Validation(_))
    ));
    assert!(engine.get_license(&license.code).unwrap().devices.is_empty());
}

#[test]
fn test_check_normalizes_code_and_device_id() {
    let (engine, _clock) = test_engine();
    let license = issue_test_license(&engine, "a@x.com");

    engine
        .check(&format!("  {}  ", license.code.to_lowercase()), " dev1 ")
        .unwrap();
    let again = engine.check(&license.code, "dev1").unwrap();
    assert!(!again.registered, "trimmed id should match the stored one");
    assert_eq!(again.device_count, 1);
}

#[test]
fn test_check_expired_license() {
    let (engine, clock) = test_engine();
    let license = issue_test_license(&engine, "a@x.com");
    engine.check(&license.code, "dev1").unwrap();

    clock.set(license.expires_at);
    let result = engine.check(&license.code, "dev1");
    assert!(
        matches!(result, Err(AppError::Expired { expires_at }) if expires_at == license.expires_at),
        "check at exactly expires_at should be expired, got {:?}",
        result
    );

    clock.set(license.expires_at - 1);
    assert!(engine.check(&license.code, "dev1").is_ok());
}

#[test]
fn test_expired_check_does_not_bind_device() {
    let (engine, clock) = test_engine();
    let license = issue_test_license(&engine, "a@x.com");

    clock.advance_days(400);
    assert!(engine.check(&license.code, "dev1").is_err());
    assert!(engine.get_license(&license.code).unwrap().devices.is_empty());
}

#[test]
fn test_check_reports_remaining_time() {
    let (engine, clock) = test_engine();
    let license = issue_test_license(&engine, "a@x.com");

    let fresh = engine.check(&license.code, "dev1").unwrap();
    assert_eq!(fresh.remaining_seconds, ONE_YEAR);
    assert_eq!(fresh.remaining_days, 365);
    assert!(!fresh.expires_soon);
    assert_eq!(fresh.expires_at, license.expires_at);

    // Seven days and one second left: not yet in the warning window.
    clock.set(license.expires_at - 7 * SECONDS_PER_DAY - 1);
    let outcome = engine.check(&license.code, "dev1").unwrap();
    assert_eq!(outcome.remaining_days, 7);
    assert!(!outcome.expires_soon);

    clock.set(license.expires_at - 7 * SECONDS_PER_DAY + 1);
    let outcome = engine.check(&license.code, "dev1").unwrap();
    assert_eq!(outcome.remaining_days, 6, "remaining days should be floored");
    assert!(outcome.expires_soon);

    clock.set(license.expires_at - 60);
    let outcome = engine.check(&license.code, "dev1").unwrap();
    assert_eq!(outcome.remaining_days, 0);
    assert_eq!(outcome.remaining_seconds, 60);
    assert!(outcome.expires_soon);
}

#[test]
fn test_devices_are_per_license() {
    let (engine, _clock) = test_engine();
    let a = issue_test_license(&engine, "a@x.com");
    let b = issue_test_license(&engine, "b@x.com");

    engine.check(&a.code, "dev1").unwrap();
    engine.check(&a.code, "dev2").unwrap();

    let outcome = engine.check(&b.code, "dev3").unwrap();
    assert_eq!(outcome.device_count, 1, "another license's devices should not count");
    assert!(engine.check(&b.code, "dev1").is_ok(), "a device may be on two licenses");
}

/// Issue → two devices → limit → reset → re-admit.
#[test]
fn test_device_limit_reset_scenario() {
    let (engine, _clock) = test_engine();

    let license = engine.issue("a@x.com").unwrap();
    assert_eq!(license.expires_at, T0 + ONE_YEAR);

    assert_eq!(engine.check(&license.code, "dev1").unwrap().device_count, 1);
    assert_eq!(engine.check(&license.code, "dev2").unwrap().device_count, 2);
    assert!(matches!(
        engine.check(&license.code, "dev3"),
        Err(AppError::DeviceLimit { .. })
    ));

    let reset = engine.reset_devices(&license.code).unwrap();
    assert_eq!(reset.cleared_count, 2);

    assert_eq!(engine.check(&license.code, "dev3").unwrap().device_count, 1);
}

/// Issue → expire → renew → check again.
#[test]
fn test_expiry_renewal_scenario() {
    let (engine, clock) = test_engine();
    let license = engine.issue("a@x.com").unwrap();

    clock.set(license.expires_at + SECONDS_PER_DAY);
    assert!(matches!(
        engine.check(&license.code, "dev1"),
        Err(AppError::Expired { .. })
    ));

    let renewal_time = clock.now();
    let renewal = engine.renew(&license.code).unwrap();
    assert_eq!(renewal.expires_at, renewal_time + ONE_YEAR);

    let outcome = engine.check(&license.code, "dev1").unwrap();
    assert_eq!(outcome.device_count, 1);
    assert_eq!(outcome.remaining_days, 365);
}
