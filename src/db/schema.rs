use rusqlite::Connection;

/// Initialize the database schema.
pub fn init_db(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        -- Licenses. code is the user-facing credential (XXXX-XXXX-XXXX-XXXX).
        -- Status (active/expired) is derived from expires_at, never stored.
        CREATE TABLE IF NOT EXISTS licenses (
            code TEXT PRIMARY KEY,
            email TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            expires_at INTEGER NOT NULL,
            CHECK (expires_at > created_at)
        );
        CREATE INDEX IF NOT EXISTS idx_licenses_email ON licenses(email COLLATE NOCASE);
        CREATE INDEX IF NOT EXISTS idx_licenses_created ON licenses(created_at);

        -- Devices bound to a license. Insertion order (id) is binding order.
        -- The per-license cap is enforced by the IMMEDIATE transaction in
        -- queries::acquire_device_atomic.
        CREATE TABLE IF NOT EXISTS license_devices (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            license_code TEXT NOT NULL REFERENCES licenses(code) ON DELETE CASCADE,
            device_id TEXT NOT NULL,
            first_seen INTEGER NOT NULL,
            last_seen INTEGER NOT NULL,
            UNIQUE(license_code, device_id)
        );
        CREATE INDEX IF NOT EXISTS idx_license_devices_license ON license_devices(license_code);
        "#,
    )
}
