// SPDX-FileCopyrightText: 2026 Costgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence layer for Costgate.
//!
//! Provides a migrated `Database` handle over tokio-rusqlite. The ledger and
//! the cache each open their own file; query code lives with its owner crate.

pub mod database;
pub mod migrations;

pub use database::{Database, map_tr_err};
