// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 Corral

use corral_core::{CurrentJob, JobRequest, WaitingJob};
use serde::{Deserialize, Serialize};

/// Messages exchanged between a client and the arbiter. The set is closed;
/// anything else on the wire is a protocol error.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "msg", rename_all = "snake_case")]
pub enum Message {
	/// Client: opens a session.
	Start,
	/// Client: closes a session.
	End,
	/// Client: asks for cores.
	Acquire { job: JobRequest },
	/// Client: gives back what it holds.
	Release,
	/// Client: asks for a consistent view of the scheduler.
	Status,
	/// Client: stops admission of new acquires daemon-wide.
	StopAccepting,
	/// Server: the acquire was granted.
	Go,
	/// Server: the acquire was refused (daemon no longer accepting).
	Reject,
	/// Server: reply to `Status`.
	StatusAnswer {
		max_cores: u32,
		running: Vec<CurrentJob>,
		waiting: Vec<WaitingJob>,
	},
}

impl Message {
	/// Short name for logs.
	pub fn kind(&self) -> &'static str {
		match self {
			Message::Start => "start",
			Message::End => "end",
			Message::Acquire { .. } => "acquire",
			Message::Release => "release",
			Message::Status => "status",
			Message::StopAccepting => "stop_accepting",
			Message::Go => "go",
			Message::Reject => "reject",
			Message::StatusAnswer { .. } => "status_answer",
		}
	}
}
