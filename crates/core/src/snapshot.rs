// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 Corral

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Classification, Problem, Prover, unix_now};

/// Everything captured from one child process.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RawOutput {
	pub stdout: String,
	pub stderr: String,
	pub errcode: i32,
	/// Wall-clock seconds.
	pub rtime: f64,
	/// User CPU seconds.
	pub utime: f64,
	/// System CPU seconds.
	pub stime: f64,
}

/// One prover-on-problem outcome.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Event {
	pub program: Prover,
	pub problem: Problem,
	pub res: Classification,
	pub raw: RawOutput,
}

impl Event {
	/// An event recording a failure of the harness itself rather than a
	/// verdict of the prover; the message lands in stderr.
	pub fn harness_error(program: Prover, problem: Problem, message: impl Into<String>) -> Self {
		Self {
			program,
			problem,
			res: Classification::Error,
			raw: RawOutput {
				stderr: message.into(),
				errcode: -1,
				..RawOutput::default()
			},
		}
	}
}

/// Immutable, UUID-identified bundle of events produced by one batch.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
	pub uuid: Uuid,
	/// Seconds since the epoch at which the batch completed.
	pub timestamp: f64,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub meta: Option<String>,
	pub events: Vec<Event>,
}

impl Snapshot {
	pub fn new(meta: Option<String>, events: Vec<Event>) -> Self {
		Self {
			uuid: Uuid::new_v4(),
			timestamp: unix_now(),
			meta,
			events,
		}
	}
}
