// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 Corral

#![cfg_attr(not(debug_assertions), deny(warnings))]

//! Supervised execution of external provers.
//!
//! [`Executor::run`] launches one prover on one problem under time and
//! memory limits, classifies the outcome, and never fails: process-level
//! trouble comes back as an [`Event`] classified as an error.
//! A semaphore bounds how many children exist at once, and an optional
//! on-disk cache short-circuits repeated runs.

mod cache;
mod child;
mod classify;
mod template;

pub use cache::{Cache, DEFAULT_TTL};
pub use classify::classify;
pub use template::substitute;

use std::{io, sync::Arc, time::Duration};

use corral_core::{Event, Fingerprint, FingerprintBuilder, Problem, Prover, RawOutput};
use tokio::sync::Semaphore;
use tracing::{debug, warn};

/// Resource limits for one prover invocation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Limits {
	pub timeout_s: u64,
	pub memory_mb: u64,
}

impl Limits {
	pub fn new(timeout_s: u64, memory_mb: u64) -> Self {
		Self {
			timeout_s,
			memory_mb,
		}
	}
}

/// Runs provers with bounded parallelism.
pub struct Executor {
	permits: Arc<Semaphore>,
	cache: Option<Cache>,
}

impl Executor {
	/// An executor running at most `parallelism` children at once, without
	/// a result cache.
	pub fn new(parallelism: usize) -> Self {
		Self {
			permits: Arc::new(Semaphore::new(parallelism.max(1))),
			cache: None,
		}
	}

	/// Same, with results cached in `cache`.
	pub fn with_cache(parallelism: usize, cache: Cache) -> Self {
		Self {
			permits: Arc::new(Semaphore::new(parallelism.max(1))),
			cache: Some(cache),
		}
	}

	/// Run `prover` on `problem`, blocking until the child exited or was
	/// killed. Every failure mode is encoded in the returned event.
	pub async fn run(&self, prover: &Prover, problem: &Problem, limits: Limits) -> Event {
		let Some(cache) = &self.cache else {
			return self.execute(prover, problem, limits).await;
		};
		let fingerprint = match fingerprint(prover, problem, limits) {
			Ok(fingerprint) => fingerprint,
			Err(error) => {
				warn!(%error, problem = %problem.path.display(), "cannot fingerprint, running live");
				return self.execute(prover, problem, limits).await;
			}
		};
		if let Some(hit) = cache.load(fingerprint) {
			debug!(%fingerprint, "cache hit");
			return hit;
		}
		// Single-flight: only one producer per fingerprint; everyone else
		// waits on the lock and finds the entry the producer wrote.
		let flight = cache.flight(fingerprint);
		let _guard = flight.lock().await;
		if let Some(hit) = cache.load(fingerprint) {
			return hit;
		}
		let event = self.execute(prover, problem, limits).await;
		cache.store(fingerprint, &event);
		cache.finish_flight(fingerprint);
		event
	}

	async fn execute(&self, prover: &Prover, problem: &Problem, limits: Limits) -> Event {
		let matchers = match prover.matchers() {
			Ok(matchers) => matchers,
			Err(error) => return Event::harness_error(prover.clone(), problem.clone(), error.to_string()),
		};
		let cmdline = substitute(&prover.cmd, &prover.binary, &problem.path, limits.timeout_s, limits.memory_mb);
		debug!(prover = %prover.name, problem = %problem.path.display(), %cmdline, "spawning");

		let permit = match self.permits.acquire().await {
			Ok(permit) => permit,
			Err(_) => {
				return Event::harness_error(prover.clone(), problem.clone(), "executor shut down");
			}
		};
		let timeout = Duration::from_secs(limits.timeout_s);
		let memory_mb = limits.memory_mb;
		let outcome =
			tokio::task::spawn_blocking(move || child::run_child(&cmdline, timeout, memory_mb)).await;
		drop(permit);

		match outcome {
			Ok(Ok(out)) => {
				let res = classify(&matchers, out.timed_out, out.errcode, &out.stdout, &out.stderr);
				Event {
					program: prover.clone(),
					problem: problem.clone(),
					res,
					raw: RawOutput {
						stdout: out.stdout,
						stderr: out.stderr,
						errcode: out.errcode,
						rtime: out.rtime,
						utime: out.utime,
						stime: out.stime,
					},
				}
			}
			Ok(Err(error)) => {
				Event::harness_error(prover.clone(), problem.clone(), format!("spawn failed: {error}"))
			}
			Err(error) => {
				Event::harness_error(prover.clone(), problem.clone(), format!("executor task failed: {error}"))
			}
		}
	}
}

/// Stable hash of everything that determines a run's outcome: the full
/// prover descriptor, the problem path and content, and both limits.
fn fingerprint(prover: &Prover, problem: &Problem, limits: Limits) -> io::Result<Fingerprint> {
	let content = std::fs::read(&problem.path)?;
	let mut fp = FingerprintBuilder::new();
	prover.feed(&mut fp);
	fp.text(&problem.path.display().to_string());
	fp.field(&content);
	fp.number(limits.timeout_s);
	fp.number(limits.memory_mb);
	Ok(fp.finish())
}
