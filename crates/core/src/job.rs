// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 Corral

use serde::{Deserialize, Serialize};

use crate::unix_now;

/// What a client asks the arbiter for.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct JobRequest {
	/// Cores needed; zero or negative means an exclusive hold of the whole host.
	pub cores: i32,
	/// Higher wins; ties prefer smaller jobs, then registration order.
	pub priority: i32,
	/// Pid of the requesting process.
	pub pid: u32,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub user: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub tag: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub info: Option<String>,
	/// Seconds since the epoch at which the request was issued.
	pub query_time: f64,
}

impl JobRequest {
	/// A request from the current process, issued now.
	pub fn new(cores: i32, priority: i32) -> Self {
		Self {
			cores,
			priority,
			pid: std::process::id(),
			user: None,
			tag: None,
			info: None,
			query_time: unix_now(),
		}
	}

	pub fn with_user(mut self, user: impl Into<String>) -> Self {
		self.user = Some(user.into());
		self
	}

	pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
		self.tag = Some(tag.into());
		self
	}

	pub fn with_info(mut self, info: impl Into<String>) -> Self {
		self.info = Some(info.into());
		self
	}

	/// Effective core demand against a pool of `max_cores`.
	pub fn cores_of(&self, max_cores: u32) -> u32 {
		if self.cores <= 0 {
			max_cores
		} else {
			self.cores as u32
		}
	}
}

/// An admitted job, as reported by status answers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CurrentJob {
	pub id: u64,
	pub job: JobRequest,
	/// Seconds since the epoch at which the job was admitted.
	pub start_time: f64,
}

/// A queued job, as reported by status answers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WaitingJob {
	pub id: u64,
	pub job: JobRequest,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn zero_or_negative_cores_mean_exclusive() {
		assert_eq!(JobRequest::new(0, 0).cores_of(8), 8);
		assert_eq!(JobRequest::new(-1, 0).cores_of(8), 8);
		assert_eq!(JobRequest::new(3, 0).cores_of(8), 3);
	}

	#[test]
	fn new_fills_pid_and_time() {
		let job = JobRequest::new(1, 0);
		assert_eq!(job.pid, std::process::id());
		assert!(job.query_time > 0.0);
	}
}
