// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 Corral

use std::{collections::BTreeMap, fs, path::{Path, PathBuf}};

use corral_core::{Classification, ExpectSource, Prover};
use corral_executor::Limits;
use corral_wire::DEFAULT_PORT;
use serde::Deserialize;

use crate::{Error, Result};

/// A suite definition file: provers, tasks, and the defaults both inherit.
///
/// ```toml
/// [defaults]
/// timeout = 30
/// memory = 2048
/// parallelism = 4
///
/// [prover.z3]
/// binary = "z3"
/// cmd = "$binary -T:$timeout $file"
/// sat = "^sat"
/// unsat = "^unsat"
///
/// [task.smoke]
/// paths = ["bench/smoke"]
/// provers = ["z3"]
/// ```
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SuiteConfig {
	#[serde(default)]
	pub defaults: Defaults,
	#[serde(default)]
	pub prover: BTreeMap<String, ProverSpec>,
	#[serde(default)]
	pub task: BTreeMap<String, TaskSpec>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Defaults {
	#[serde(default = "default_timeout")]
	pub timeout: u64,
	#[serde(default = "default_memory")]
	pub memory: u64,
	#[serde(default = "default_parallelism")]
	pub parallelism: usize,
	#[serde(default = "default_port")]
	pub port: u16,
	/// Expected outcome for problems without an `expect:` directive.
	#[serde(default)]
	pub expect: Option<Classification>,
}

impl Default for Defaults {
	fn default() -> Self {
		Self {
			timeout: default_timeout(),
			memory: default_memory(),
			parallelism: default_parallelism(),
			port: default_port(),
			expect: None,
		}
	}
}

fn default_timeout() -> u64 {
	30
}

fn default_memory() -> u64 {
	2048
}

fn default_parallelism() -> usize {
	1
}

fn default_port() -> u16 {
	DEFAULT_PORT
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProverSpec {
	pub binary: String,
	pub cmd: String,
	pub sat: String,
	pub unsat: String,
	#[serde(default)]
	pub unknown: Option<String>,
	#[serde(default)]
	pub timeout: Option<String>,
	#[serde(default)]
	pub memory: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TaskSpec {
	/// Problem files, or directories walked recursively.
	pub paths: Vec<PathBuf>,
	/// Names from the `[prover.*]` table.
	pub provers: Vec<String>,
	/// Only files with one of these extensions when walking directories.
	#[serde(default)]
	pub extensions: Vec<String>,
	#[serde(default)]
	pub timeout: Option<u64>,
	#[serde(default)]
	pub memory: Option<u64>,
	/// Fallback for problems without an `expect:` directive.
	#[serde(default)]
	pub expect: Option<Classification>,
	/// Command computing the expected outcome instead of scanning the file.
	#[serde(default)]
	pub expect_program: Option<String>,
}

/// A task with every reference resolved and every default applied.
#[derive(Debug)]
pub struct ResolvedTask {
	pub name: String,
	pub provers: Vec<Prover>,
	pub paths: Vec<PathBuf>,
	pub extensions: Vec<String>,
	pub limits: Limits,
	pub expect: ExpectSource,
	/// Fallback when `expect` is `Auto` and the file has no directive.
	pub fallback: Option<Classification>,
}

impl SuiteConfig {
	pub fn load(path: &Path) -> Result<Self> {
		let text = fs::read_to_string(path).map_err(|source| Error::ConfigRead {
			path: path.to_path_buf(),
			source,
		})?;
		toml::from_str(&text).map_err(|source| Error::ConfigParse {
			path: path.to_path_buf(),
			source,
		})
	}

	/// Materialize the prover named in a task.
	pub fn prover(&self, name: &str) -> Result<Prover> {
		let spec = self.prover.get(name).ok_or_else(|| Error::UnknownProver(name.to_string()))?;
		Ok(Prover {
			name: name.to_string(),
			binary: spec.binary.clone(),
			cmd: spec.cmd.clone(),
			sat: spec.sat.clone(),
			unsat: spec.unsat.clone(),
			unknown: spec.unknown.clone(),
			timeout: spec.timeout.clone(),
			memory: spec.memory.clone(),
		})
	}

	/// Resolve a task by name; with `None`, the config must define exactly
	/// one task.
	pub fn resolve_task(&self, name: Option<&str>) -> Result<ResolvedTask> {
		let (name, spec) = match name {
			Some(name) => {
				(name, self.task.get(name).ok_or_else(|| Error::UnknownTask(name.to_string()))?)
			}
			None => {
				let mut tasks = self.task.iter();
				match (tasks.next(), tasks.next()) {
					(Some((name, spec)), None) => (name.as_str(), spec),
					(None, _) => return Err(Error::NoTasks),
					(Some(_), Some(_)) => {
						return Err(Error::UnknownTask(
							"several tasks defined, name one".to_string(),
						));
					}
				}
			}
		};
		let provers =
			spec.provers.iter().map(|prover| self.prover(prover)).collect::<Result<Vec<_>>>()?;
		let expect = match &spec.expect_program {
			Some(program) => ExpectSource::Program(program.clone()),
			None => ExpectSource::Auto,
		};
		Ok(ResolvedTask {
			name: name.to_string(),
			provers,
			paths: spec.paths.clone(),
			extensions: spec.extensions.clone(),
			limits: Limits::new(
				spec.timeout.unwrap_or(self.defaults.timeout),
				spec.memory.unwrap_or(self.defaults.memory),
			),
			expect,
			fallback: spec.expect.or(self.defaults.expect),
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn parse(text: &str) -> SuiteConfig {
		toml::from_str(text).unwrap()
	}

	const SUITE: &str = r#"
		[defaults]
		timeout = 10
		parallelism = 2

		[prover.z3]
		binary = "z3"
		cmd = "$binary -T:$timeout $file"
		sat = "^sat"
		unsat = "^unsat"

		[task.smoke]
		paths = ["bench"]
		provers = ["z3"]
		memory = 512
		expect = "unsat"
	"#;

	#[test]
	fn resolves_a_task_with_defaults() {
		let task = parse(SUITE).resolve_task(Some("smoke")).unwrap();
		assert_eq!(task.provers.len(), 1);
		assert_eq!(task.provers[0].name, "z3");
		assert_eq!(task.limits, Limits::new(10, 512));
		assert_eq!(task.fallback, Some(Classification::Unsat));
		assert_eq!(task.expect, ExpectSource::Auto);
	}

	#[test]
	fn single_task_needs_no_name() {
		let task = parse(SUITE).resolve_task(None).unwrap();
		assert_eq!(task.name, "smoke");
	}

	#[test]
	fn unknown_prover_reference_fails() {
		let config = parse(
			r#"
			[task.t]
			paths = ["x"]
			provers = ["vampire"]
		"#,
		);
		assert!(matches!(config.resolve_task(Some("t")), Err(Error::UnknownProver(_))));
	}

	#[test]
	fn unknown_task_fails() {
		assert!(matches!(parse(SUITE).resolve_task(Some("nope")), Err(Error::UnknownTask(_))));
	}

	#[test]
	fn unknown_keys_are_rejected() {
		let got: std::result::Result<SuiteConfig, _> = toml::from_str("[defaults]\ntypo = 1\n");
		assert!(got.is_err());
	}

	#[test]
	fn expect_program_overrides_auto() {
		let config = parse(
			r#"
			[prover.p]
			binary = "p"
			cmd = "$binary $file"
			sat = "s"
			unsat = "u"

			[task.t]
			paths = ["x"]
			provers = ["p"]
			expect_program = "headexpect $file"
		"#,
		);
		let task = config.resolve_task(Some("t")).unwrap();
		assert_eq!(task.expect, ExpectSource::Program("headexpect $file".to_string()));
	}
}
