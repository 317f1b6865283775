// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 Corral

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{Error, FingerprintBuilder, Result};

/// Description of an external prover binary and how to read its verdicts.
///
/// Patterns are stored as source strings so the descriptor stays
/// serializable and content-addressable; compile them with [`Prover::matchers`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Prover {
	pub name: String,
	/// Path to the binary, substituted for `$binary` in `cmd`.
	pub binary: String,
	/// Shell command template; `$binary`, `$file`, `$timeout` and
	/// `$memory` are substituted before execution.
	pub cmd: String,
	/// Pattern proving a satisfiable answer on stdout or stderr.
	pub sat: String,
	/// Pattern proving an unsatisfiable answer on stdout or stderr.
	pub unsat: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub unknown: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub timeout: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub memory: Option<String>,
}

impl Prover {
	/// Compile the verdict patterns.
	pub fn matchers(&self) -> Result<Matchers> {
		Matchers::compile(self)
	}

	/// Feed every descriptor field into a fingerprint, so any change to
	/// the prover invalidates cached results.
	pub fn feed(&self, fp: &mut FingerprintBuilder) {
		fp.text(&self.name)
			.text(&self.binary)
			.text(&self.cmd)
			.text(&self.sat)
			.text(&self.unsat)
			.opt_text(self.unknown.as_deref())
			.opt_text(self.timeout.as_deref())
			.opt_text(self.memory.as_deref());
	}
}

/// Compiled verdict patterns of a prover.
#[derive(Clone, Debug)]
pub struct Matchers {
	pub sat: Regex,
	pub unsat: Regex,
	pub unknown: Option<Regex>,
	pub timeout: Option<Regex>,
	pub memory: Option<Regex>,
}

impl Matchers {
	pub fn compile(prover: &Prover) -> Result<Self> {
		let compile = |pattern: &str| {
			Regex::new(pattern).map_err(|source| Error::Pattern {
				prover: prover.name.clone(),
				source,
			})
		};
		Ok(Self {
			sat: compile(&prover.sat)?,
			unsat: compile(&prover.unsat)?,
			unknown: prover.unknown.as_deref().map(compile).transpose()?,
			timeout: prover.timeout.as_deref().map(compile).transpose()?,
			memory: prover.memory.as_deref().map(compile).transpose()?,
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn prover() -> Prover {
		Prover {
			name: "z3".into(),
			binary: "z3".into(),
			cmd: "$binary $file".into(),
			sat: "^sat".into(),
			unsat: "^unsat".into(),
			unknown: Some("unknown".into()),
			timeout: None,
			memory: None,
		}
	}

	#[test]
	fn compiles_patterns() {
		let m = prover().matchers().unwrap();
		assert!(m.sat.is_match("sat"));
		assert!(!m.sat.is_match("unsat"));
		assert!(m.unknown.as_ref().unwrap().is_match("unknown"));
	}

	#[test]
	fn bad_pattern_names_the_prover() {
		let mut p = prover();
		p.sat = "(".into();
		let err = p.matchers().unwrap_err();
		assert!(err.to_string().contains("z3"));
	}

	#[test]
	fn fingerprint_tracks_every_field() {
		let base = {
			let mut fp = FingerprintBuilder::new();
			prover().feed(&mut fp);
			fp.finish()
		};
		let mut changed = prover();
		changed.timeout = Some("time limit".into());
		let mut fp = FingerprintBuilder::new();
		changed.feed(&mut fp);
		assert_ne!(fp.finish(), base);
	}
}
