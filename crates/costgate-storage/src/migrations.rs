// SPDX-FileCopyrightText: 2026 Costgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Embedded database migrations using refinery.
//!
//! SQL files under `migrations/` are compiled into the binary. Both stores run
//! the full set, so a ledger file also carries (empty) cache tables and vice
//! versa; each store only touches its own tables.

mod embedded {
    use refinery::embed_migrations;
    embed_migrations!("migrations");
}

/// Run all pending migrations against the given connection.
///
/// Refinery tracks applied migrations in `refinery_schema_history`. The
/// refinery error is carried inside a rusqlite error so this can run inside a
/// `tokio_rusqlite::Connection::call` closure.
pub fn run_migrations(conn: &mut rusqlite::Connection) -> Result<(), rusqlite::Error> {
    let report = embedded::migrations::runner()
        .run(conn)
        .map_err(|e| rusqlite::Error::UserFunctionError(Box::new(e)))?;
    for migration in report.applied_migrations() {
        tracing::debug!(%migration, "migration applied");
    }
    Ok(())
}
