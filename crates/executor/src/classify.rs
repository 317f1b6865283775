// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 Corral

use corral_core::{Classification, Matchers};
use regex::Regex;

/// Derive the outcome of a child from its exit data and the prover's
/// patterns. Precedence: the watchdog beats everything; a clean exit is
/// checked for sat before unsat; resource-limit and unknown patterns
/// soften any remaining exit into Unknown; the rest is Error.
pub fn classify(matchers: &Matchers, timed_out: bool, errcode: i32, stdout: &str, stderr: &str) -> Classification {
	let hit = |re: &Regex| re.is_match(stdout) || re.is_match(stderr);
	let opt_hit = |re: &Option<Regex>| re.as_ref().is_some_and(hit);
	if timed_out {
		return Classification::Timeout;
	}
	if errcode == 0 && hit(&matchers.sat) {
		return Classification::Sat;
	}
	if errcode == 0 && hit(&matchers.unsat) {
		return Classification::Unsat;
	}
	if opt_hit(&matchers.timeout) || opt_hit(&matchers.unknown) || opt_hit(&matchers.memory) {
		return Classification::Unknown;
	}
	Classification::Error
}
