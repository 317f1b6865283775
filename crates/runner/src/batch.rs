// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 Corral

use std::{path::PathBuf, sync::Arc};

use corral_client::{SpawnOpts, connect_or_spawn};
use corral_core::{Event, JobRequest, Problem, Prover, Snapshot};
use corral_executor::{Cache, Executor, Limits};
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::{Error, Result, SnapshotStore};

/// How one batch runs.
#[derive(Clone, Debug)]
pub struct BatchOptions {
	pub limits: Limits,
	/// Executor width, and the core count acquired under `with_lock`.
	pub parallelism: usize,
	/// Hold a daemon grant around the whole batch.
	pub with_lock: bool,
	pub port: u16,
	/// Shows up as the lock's job info and the snapshot meta.
	pub tag: Option<String>,
	/// Result cache location; `None` runs everything live.
	pub cache_dir: Option<PathBuf>,
}

impl BatchOptions {
	pub fn new(limits: Limits, parallelism: usize) -> Self {
		Self {
			limits,
			parallelism: parallelism.max(1),
			with_lock: false,
			port: corral_wire::DEFAULT_PORT,
			tag: None,
			cache_dir: None,
		}
	}
}

/// Run every (prover × problem) pair with bounded parallelism and bundle
/// the outcomes into a snapshot, persisted through `store` when given.
///
/// Individual runs never fail the batch; their trouble is encoded in the
/// events. `on_event` sees each completed event as it arrives, in
/// completion order.
pub async fn run_batch(
	provers: &[Prover],
	problems: &[Problem],
	options: &BatchOptions,
	store: Option<&SnapshotStore>,
	mut on_event: impl FnMut(&Event),
) -> Result<Snapshot> {
	let executor = Arc::new(build_executor(options));

	// The lock wraps the whole batch: acquired before the first spawn,
	// released after the last child exited.
	let lock = if options.with_lock {
		let mut client = connect_or_spawn(options.port, &SpawnOpts::default()).await?;
		let job = JobRequest::new(options.parallelism as i32, 0)
			.with_info(options.tag.clone().unwrap_or_else(|| "corral batch".to_string()));
		info!(port = options.port, cores = options.parallelism, "acquiring batch lock");
		if !client.acquire(job).await? {
			return Err(Error::LockRejected);
		}
		Some(client)
	} else {
		None
	};

	let mut tasks = JoinSet::new();
	for prover in provers {
		for problem in problems {
			let executor = Arc::clone(&executor);
			let prover = prover.clone();
			let problem = problem.clone();
			let limits = options.limits;
			tasks.spawn(async move { executor.run(&prover, &problem, limits).await });
		}
	}

	let mut events = Vec::with_capacity(tasks.len());
	while let Some(joined) = tasks.join_next().await {
		match joined {
			Ok(event) => {
				on_event(&event);
				events.push(event);
			}
			// a panic in one pair loses that event, never the batch
			Err(error) => warn!(%error, "executor task failed"),
		}
	}

	if let Some(mut client) = lock {
		if let Err(error) = client.release().await {
			warn!(%error, "failed to release the batch lock");
		}
		if let Err(error) = client.end().await {
			warn!(%error, "failed to close the daemon session");
		}
	}

	let snapshot = Snapshot::new(options.tag.clone(), events);
	if let Some(store) = store {
		let path = store.save(&snapshot)?;
		info!(uuid = %snapshot.uuid, path = %path.display(), "snapshot saved");
	}
	Ok(snapshot)
}

fn build_executor(options: &BatchOptions) -> Executor {
	match &options.cache_dir {
		Some(dir) => match Cache::open(dir) {
			Ok(cache) => Executor::with_cache(options.parallelism, cache),
			Err(error) => {
				// cache trouble degrades to live runs
				warn!(dir = %dir.display(), %error, "cannot open cache, running live");
				Executor::new(options.parallelism)
			}
		},
		None => Executor::new(options.parallelism),
	}
}
