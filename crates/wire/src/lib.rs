// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 Corral

#![cfg_attr(not(debug_assertions), deny(warnings))]

//! The arbiter wire protocol: a closed message set exchanged as
//! length-prefixed JSON frames over a local TCP stream.

mod frame;
mod message;

pub use frame::{MAX_FRAME, read_frame, write_frame};
pub use message::Message;

/// Port the daemon listens on and clients connect to by default.
///
/// The single shared constant; both sides must agree.
pub const DEFAULT_PORT: u16 = 12_000;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error(transparent)]
	Io(#[from] std::io::Error),

	#[error("frame of {len} bytes exceeds the {MAX_FRAME} byte limit")]
	Oversized { len: usize },

	#[error("malformed frame: {0}")]
	Codec(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
