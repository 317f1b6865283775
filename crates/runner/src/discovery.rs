// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 Corral

use std::path::{Path, PathBuf};

use corral_core::{Classification, ExpectSource, Problem};
use tracing::warn;
use walkdir::WalkDir;

use crate::Result;

/// A problem that could not be prepared; the batch continues without it.
#[derive(Clone, Debug)]
pub struct Discarded {
	pub path: PathBuf,
	pub reason: String,
}

/// Expand directories into files (sorted, recursive, optionally filtered by
/// extension), then resolve each file's expected outcome. Files that fail
/// to resolve are discarded with a reason rather than failing the batch.
pub fn discover(
	paths: &[PathBuf],
	extensions: &[String],
	expect: &ExpectSource,
	fallback: Option<Classification>,
) -> Result<(Vec<Problem>, Vec<Discarded>)> {
	let mut files = Vec::new();
	for path in paths {
		if path.is_dir() {
			for entry in WalkDir::new(path).sort_by_file_name() {
				let entry = entry.map_err(std::io::Error::other)?;
				if entry.file_type().is_file() && wanted(entry.path(), extensions) {
					files.push(entry.into_path());
				}
			}
		} else {
			files.push(path.clone());
		}
	}

	let mut problems = Vec::with_capacity(files.len());
	let mut discarded = Vec::new();
	for path in files {
		match expect.resolve(&path, fallback) {
			Ok(classification) => problems.push(Problem::new(path, classification)),
			Err(error) => {
				warn!(path = %path.display(), %error, "discarding problem");
				discarded.push(Discarded {
					path,
					reason: error.to_string(),
				});
			}
		}
	}
	Ok((problems, discarded))
}

fn wanted(path: &Path, extensions: &[String]) -> bool {
	if extensions.is_empty() {
		return true;
	}
	path.extension()
		.and_then(|ext| ext.to_str())
		.is_some_and(|ext| extensions.iter().any(|want| want == ext))
}
