// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 Corral

use std::{path::PathBuf, process::ExitCode};

use corral_executor::Limits;
use corral_runner::{BatchOptions, SnapshotStore, SuiteConfig, Summary, discover, run_batch};

use crate::{fail, output};

#[derive(clap::Args)]
pub struct RunArgs {
	/// Suite definition file
	#[arg(short, long, default_value = "suite.toml")]
	config: PathBuf,

	/// Task to run; optional when the config defines exactly one
	task: Option<String>,

	/// Override the per-run timeout in seconds
	#[arg(short, long)]
	timeout: Option<u64>,

	/// Override the per-run memory limit in MiB
	#[arg(short, long)]
	memory: Option<u64>,

	/// Parallel runs
	#[arg(short = 'j', long)]
	parallelism: Option<usize>,

	/// Hold a daemon grant for the whole batch
	#[arg(long)]
	lock: bool,

	/// Free-form note recorded in the snapshot
	#[arg(long)]
	meta: Option<String>,

	/// Where snapshots are written
	#[arg(long, default_value = "snapshots")]
	snapshot_dir: PathBuf,

	/// Result cache directory; omit to run everything live
	#[arg(long)]
	cache_dir: Option<PathBuf>,
}

pub async fn run(port: u16, args: RunArgs) -> ExitCode {
	let config = match SuiteConfig::load(&args.config) {
		Ok(config) => config,
		Err(error) => return fail(error),
	};
	let task = match config.resolve_task(args.task.as_deref()) {
		Ok(task) => task,
		Err(error) => return fail(error),
	};
	let (problems, discarded) =
		match discover(&task.paths, &task.extensions, &task.expect, task.fallback) {
			Ok(found) => found,
			Err(error) => return fail(error),
		};
	for skip in &discarded {
		eprintln!("corral: skipping {}: {}", skip.path.display(), skip.reason);
	}
	if problems.is_empty() {
		eprintln!("corral: no problems to run");
		return ExitCode::from(2);
	}

	let limits = Limits::new(
		args.timeout.unwrap_or(task.limits.timeout_s),
		args.memory.unwrap_or(task.limits.memory_mb),
	);
	let parallelism = args.parallelism.unwrap_or(config.defaults.parallelism);
	let mut options = BatchOptions::new(limits, parallelism);
	options.with_lock = args.lock;
	options.port = port;
	options.tag = args.meta.clone().or_else(|| Some(task.name.clone()));
	options.cache_dir = args.cache_dir.clone();

	let store = match SnapshotStore::open(&args.snapshot_dir) {
		Ok(store) => store,
		Err(error) => return fail(error),
	};

	output::print_run_header(&task.name, task.provers.len(), problems.len(), parallelism);

	let total = task.provers.len() * problems.len();
	let mut done = 0usize;
	let outcome = run_batch(&task.provers, &problems, &options, Some(&store), |event| {
		done += 1;
		output::print_event(done, total, event);
	})
	.await;

	let snapshot = match outcome {
		Ok(snapshot) => snapshot,
		Err(error) => return fail(error),
	};
	let summary = Summary::tally(&snapshot.events).with_discarded(discarded.len());
	output::print_summary(&snapshot, &summary);

	if summary.all_agree() {
		ExitCode::SUCCESS
	} else {
		ExitCode::from(1)
	}
}
