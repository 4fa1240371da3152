//! SQLite connection setup

use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;

use crate::error::Result;

/// Opens a connection with WAL journaling, enforced foreign keys, and a
/// 5 second busy timeout so status reads can wait out the writer instead
/// of failing on a held lock.
pub fn establish(database_url: &str) -> Result<SqliteConnection> {
    let mut conn = SqliteConnection::establish(database_url)?;
    conn.batch_execute(
        "PRAGMA journal_mode = WAL; PRAGMA foreign_keys = ON; PRAGMA busy_timeout = 5000;",
    )?;
    Ok(conn)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn establishes_in_memory_database() {
        establish(":memory:").unwrap();
    }
}
