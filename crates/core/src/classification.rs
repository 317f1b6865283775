// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 Corral

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::Error;

/// High-level outcome of a prover invocation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Classification {
	Sat,
	Unsat,
	Unknown,
	Timeout,
	Error,
}

impl Classification {
	/// True for a definite answer, as opposed to Unknown/Timeout/Error.
	pub fn is_decided(self) -> bool {
		matches!(self, Classification::Sat | Classification::Unsat)
	}

	pub fn as_str(self) -> &'static str {
		match self {
			Classification::Sat => "sat",
			Classification::Unsat => "unsat",
			Classification::Unknown => "unknown",
			Classification::Timeout => "timeout",
			Classification::Error => "error",
		}
	}
}

impl fmt::Display for Classification {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for Classification {
	type Err = Error;

	/// Case-insensitive; `fail` aliases `error`.
	fn from_str(s: &str) -> Result<Self, Error> {
		match s.to_ascii_lowercase().as_str() {
			"sat" => Ok(Classification::Sat),
			"unsat" => Ok(Classification::Unsat),
			"unknown" => Ok(Classification::Unknown),
			"timeout" => Ok(Classification::Timeout),
			"error" | "fail" => Ok(Classification::Error),
			other => Err(Error::UnknownClassification(other.to_string())),
		}
	}
}
