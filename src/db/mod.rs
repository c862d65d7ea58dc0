mod from_row;
mod schema;
pub mod queries;

pub use schema::init_db;

use std::time::Duration;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

pub type DbPool = Pool<SqliteConnectionManager>;

/// How long a connection waits on SQLite's write lock before reporting busy.
pub const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

fn configure(
    manager: SqliteConnectionManager,
    busy_timeout: Duration,
    wal: bool,
) -> SqliteConnectionManager {
    manager.with_init(move |conn| {
        conn.busy_timeout(busy_timeout)?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        if wal {
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |_| Ok(()))?;
        }
        Ok(())
    })
}

/// File pool in WAL mode. Each engine operation may wait `busy_timeout` per
/// attempt on the write lock before reporting the store busy.
pub fn create_pool_with(
    database_path: &str,
    busy_timeout: Duration,
) -> Result<DbPool, r2d2::Error> {
    let manager = configure(SqliteConnectionManager::file(database_path), busy_timeout, true);
    Pool::builder().max_size(10).build(manager)
}

/// Pool over a private in-memory database shared by all of its connections.
pub fn create_memory_pool() -> Result<DbPool, r2d2::Error> {
    let manager = configure(SqliteConnectionManager::memory(), BUSY_TIMEOUT, false);
    Pool::builder().max_size(4).build(manager)
}
