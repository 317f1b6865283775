// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 Corral

#![cfg_attr(not(debug_assertions), deny(warnings))]

//! Batch orchestration: read a suite definition, discover problems, run
//! the (prover × problem) cross product through the executor, and record
//! the outcome as a snapshot.

mod batch;
mod config;
mod discovery;
mod report;
mod store;

pub use batch::{BatchOptions, run_batch};
pub use config::{Defaults, ProverSpec, ResolvedTask, SuiteConfig, TaskSpec};
pub use discovery::{Discarded, discover};
pub use report::{Agreement, Summary, agreement};
pub use store::SnapshotStore;

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("cannot read config {path}: {source}")]
	ConfigRead {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("malformed config {path}: {source}")]
	ConfigParse {
		path: PathBuf,
		#[source]
		source: toml::de::Error,
	},

	#[error("unknown prover `{0}`")]
	UnknownProver(String),

	#[error("unknown task `{0}`")]
	UnknownTask(String),

	#[error("config defines no tasks")]
	NoTasks,

	#[error("daemon rejected the batch lock")]
	LockRejected,

	#[error(transparent)]
	Core(#[from] corral_core::Error),

	#[error(transparent)]
	Client(#[from] corral_client::Error),

	#[error(transparent)]
	Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
