//! Embedded schema migrations

use diesel::sqlite::SqliteConnection;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use tracing::info;

use crate::error::{Result, StrategyError};

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// Applies pending migrations at startup.
pub fn run(conn: &mut SqliteConnection) -> Result<()> {
    let applied = conn
        .run_pending_migrations(MIGRATIONS)
        .map_err(|e| StrategyError::Migration(e.to_string()))?;
    for version in applied {
        info!(%version, "applied migration");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::connection;

    #[test]
    fn migrations_apply_cleanly_and_are_idempotent() {
        let mut conn = connection::establish(":memory:").unwrap();
        run(&mut conn).unwrap();
        run(&mut conn).unwrap();
    }
}
