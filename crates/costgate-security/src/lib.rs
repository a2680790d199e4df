// SPDX-FileCopyrightText: 2026 Costgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Privacy controls for Costgate.
//!
//! Requests are anonymized before they are analyzed, hashed into cache keys,
//! logged, or sent to a backend.

pub mod anonymize;

pub use anonymize::{Anonymizer, anonymize};
