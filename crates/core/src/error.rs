// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 Corral

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("unknown classification `{0}`")]
	UnknownClassification(String),

	#[error("invalid pattern for prover `{prover}`: {source}")]
	Pattern {
		prover: String,
		#[source]
		source: regex::Error,
	},

	#[error("expected result not found in {path}")]
	ExpectNotFound { path: PathBuf },

	#[error("expect program `{program}` failed: {reason}")]
	ExpectProgram { program: String, reason: String },

	#[error(transparent)]
	Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
