// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 Corral

use corral_core::{Classification, Event};

/// How one event relates to its problem's expectation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Agreement {
	/// Result equals the expectation.
	Ok,
	/// The prover gave up (Unknown/Timeout) on a problem with a definite
	/// expected answer; disappointing, not wrong.
	Inconclusive,
	/// The result contradicts the expectation.
	Mismatch,
}

pub fn agreement(event: &Event) -> Agreement {
	let expected = event.problem.expect;
	if event.res == expected {
		Agreement::Ok
	} else if matches!(event.res, Classification::Unknown | Classification::Timeout)
		&& expected.is_decided()
	{
		Agreement::Inconclusive
	} else {
		Agreement::Mismatch
	}
}

/// Totals over one batch.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Summary {
	pub ok: usize,
	pub inconclusive: usize,
	pub mismatch: usize,
	/// Problems that never ran (no expectation could be resolved).
	pub discarded: usize,
}

impl Summary {
	pub fn tally(events: &[Event]) -> Self {
		let mut summary = Self::default();
		for event in events {
			match agreement(event) {
				Agreement::Ok => summary.ok += 1,
				Agreement::Inconclusive => summary.inconclusive += 1,
				Agreement::Mismatch => summary.mismatch += 1,
			}
		}
		summary
	}

	pub fn with_discarded(mut self, discarded: usize) -> Self {
		self.discarded = discarded;
		self
	}

	/// Whether the batch earns exit code 0.
	pub fn all_agree(&self) -> bool {
		self.mismatch == 0
	}
}
