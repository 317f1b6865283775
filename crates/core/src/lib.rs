// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 Corral

#![cfg_attr(not(debug_assertions), deny(warnings))]

//! Shared data model for the corral job coordination suite.

mod classification;
mod error;
mod fingerprint;
mod job;
mod problem;
mod prover;
mod snapshot;

pub use classification::Classification;
pub use error::{Error, Result};
pub use fingerprint::{Fingerprint, FingerprintBuilder};
pub use job::{CurrentJob, JobRequest, WaitingJob};
pub use problem::{ExpectSource, Problem, find_expect, find_expect_in_file};
pub use prover::{Matchers, Prover};
pub use snapshot::{Event, RawOutput, Snapshot};

use std::time::{SystemTime, UNIX_EPOCH};

/// Seconds since the Unix epoch, the time encoding used on the wire and in snapshots.
pub fn unix_now() -> f64 {
	SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs_f64()).unwrap_or(0.0)
}
