// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 Corral

use std::{fmt, str::FromStr};

use xxhash_rust::xxh3::Xxh3;

/// Stable content hash identifying a cacheable execution.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Fingerprint(u64);

impl Fingerprint {
	pub fn as_u64(self) -> u64 {
		self.0
	}
}

impl fmt::Display for Fingerprint {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{:016x}", self.0)
	}
}

impl FromStr for Fingerprint {
	type Err = std::num::ParseIntError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		u64::from_str_radix(s, 16).map(Fingerprint)
	}
}

/// Feeds length-delimited fields into xxh3 so that field boundaries
/// cannot alias (`"ab" + "c"` hashes differently from `"a" + "bc"`).
pub struct FingerprintBuilder {
	inner: Xxh3,
}

impl FingerprintBuilder {
	pub fn new() -> Self {
		Self {
			inner: Xxh3::new(),
		}
	}

	pub fn field(&mut self, bytes: &[u8]) -> &mut Self {
		self.inner.update(&(bytes.len() as u64).to_le_bytes());
		self.inner.update(bytes);
		self
	}

	pub fn text(&mut self, s: &str) -> &mut Self {
		self.field(s.as_bytes())
	}

	pub fn opt_text(&mut self, s: Option<&str>) -> &mut Self {
		match s {
			Some(s) => self.field(&[1]).text(s),
			None => self.field(&[0]),
		}
	}

	pub fn number(&mut self, v: u64) -> &mut Self {
		self.field(&v.to_le_bytes())
	}

	pub fn finish(&self) -> Fingerprint {
		Fingerprint(self.inner.digest())
	}
}

impl Default for FingerprintBuilder {
	fn default() -> Self {
		Self::new()
	}
}
