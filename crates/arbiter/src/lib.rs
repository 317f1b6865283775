// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 Corral

#![cfg_attr(not(debug_assertions), deny(warnings))]

//! The coordination daemon.
//!
//! One scheduler task owns every piece of mutable state; client sessions
//! talk to it exclusively through a message inbox and per-task oneshot
//! channels. Sessions never touch the queue or the core accounting
//! directly, which is what makes status answers consistent and the
//! capacity invariant easy to believe.

mod scheduler;
mod server;
mod session;

pub use server::{ArbiterConfig, Server, serve};

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error(transparent)]
	Io(#[from] std::io::Error),

	#[error(transparent)]
	Wire(#[from] corral_wire::Error),

	#[error("protocol error: expected {expected}, got {got}")]
	Protocol {
		expected: &'static str,
		got: &'static str,
	},

	#[error("scheduler is gone")]
	SchedulerGone,
}

pub type Result<T> = std::result::Result<T, Error>;
