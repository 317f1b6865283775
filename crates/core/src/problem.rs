// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 Corral

use std::{
	fs::File,
	io::Read,
	path::{Path, PathBuf},
	process::Command,
};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{Classification, Error, Result};

/// A problem file together with its expected outcome.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Problem {
	pub path: PathBuf,
	pub expect: Classification,
}

impl Problem {
	pub fn new(path: impl Into<PathBuf>, expect: Classification) -> Self {
		Self {
			path: path.into(),
			expect,
		}
	}
}

static EXPECT: Lazy<Regex> =
	Lazy::new(|| Regex::new(r"(?i)expect(ed)?:\s*(unsat|sat|unknown|timeout|error|fail)").unwrap());

/// How much of a problem file is scanned for a directive.
const SCAN_PREFIX: u64 = 64 * 1024;

/// Scan text for an `expect:`/`expected:` directive; first match wins.
pub fn find_expect(text: &str) -> Option<Classification> {
	EXPECT.captures(text).and_then(|c| c.get(2)).and_then(|m| m.as_str().parse().ok())
}

/// Scan the leading [`SCAN_PREFIX`] bytes of the file at `path` for a directive.
pub fn find_expect_in_file(path: &Path) -> Result<Option<Classification>> {
	let mut buf = Vec::new();
	File::open(path)?.take(SCAN_PREFIX).read_to_end(&mut buf)?;
	Ok(find_expect(&String::from_utf8_lossy(&buf)))
}

/// Where a problem's expected result comes from.
#[derive(Clone, Debug, PartialEq)]
pub enum ExpectSource {
	/// Scan the problem file for a directive.
	Auto,
	/// A fixed result, regardless of file content.
	Literal(Classification),
	/// Run an external command (with `$file` substituted) and parse its stdout.
	Program(String),
}

impl ExpectSource {
	/// Resolve the expected outcome for the problem at `path`.
	///
	/// `default` applies only to `Auto` when the file carries no directive;
	/// without it the problem fails with [`Error::ExpectNotFound`].
	pub fn resolve(&self, path: &Path, default: Option<Classification>) -> Result<Classification> {
		match self {
			ExpectSource::Auto => match find_expect_in_file(path)? {
				Some(found) => Ok(found),
				None => default.ok_or_else(|| Error::ExpectNotFound {
					path: path.to_path_buf(),
				}),
			},
			ExpectSource::Literal(expect) => Ok(*expect),
			ExpectSource::Program(cmd) => {
				let cmdline = cmd.replace("$file", &path.display().to_string());
				let output = Command::new("sh").arg("-c").arg(&cmdline).output()?;
				if !output.status.success() {
					return Err(Error::ExpectProgram {
						program: cmd.clone(),
						reason: format!("exit status {}", output.status),
					});
				}
				let text = String::from_utf8_lossy(&output.stdout);
				text.trim()
					.parse()
					.ok()
					.or_else(|| find_expect(&text))
					.ok_or_else(|| Error::ExpectProgram {
						program: cmd.clone(),
						reason: "no classification in output".to_string(),
					})
			}
		}
	}
}
