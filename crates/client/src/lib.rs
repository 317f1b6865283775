// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 Corral

#![cfg_attr(not(debug_assertions), deny(warnings))]

//! Client side of the arbiter protocol.

mod spawn;

pub use spawn::{SpawnOpts, connect_or_spawn, spawn_daemon};

use std::net::{Ipv4Addr, SocketAddr};

use corral_core::{CurrentJob, JobRequest, WaitingJob};
use corral_wire::{Message, read_frame, write_frame};
use tokio::net::TcpStream;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error(transparent)]
	Io(#[from] std::io::Error),

	#[error(transparent)]
	Wire(#[from] corral_wire::Error),

	#[error("unexpected {0} from the daemon")]
	Unexpected(&'static str),

	#[error("daemon closed the connection")]
	Closed,

	#[error("no daemon answered on port {port}")]
	DaemonUnavailable { port: u16 },
}

pub type Result<T> = std::result::Result<T, Error>;

/// A consistent view of the daemon, straight from one scheduler turn.
#[derive(Clone, Debug)]
pub struct Status {
	pub max_cores: u32,
	pub running: Vec<CurrentJob>,
	pub waiting: Vec<WaitingJob>,
}

/// One session with the daemon.
///
/// The session follows the wire state machine: after a granted
/// [`Client::acquire`] the only legal moves are [`Client::release`] and
/// dropping the connection (which releases implicitly).
#[derive(Debug)]
pub struct Client {
	stream: TcpStream,
}

impl Client {
	/// Connect and open the session.
	pub async fn connect(addr: SocketAddr) -> Result<Self> {
		let mut stream = TcpStream::connect(addr).await?;
		write_frame(&mut stream, &Message::Start).await?;
		Ok(Self {
			stream,
		})
	}

	/// Connect to a daemon on the loopback interface.
	pub async fn connect_local(port: u16) -> Result<Self> {
		Self::connect(SocketAddr::from((Ipv4Addr::LOCALHOST, port))).await
	}

	/// Ask for cores; resolves to `true` once the scheduler grants them,
	/// or `false` when the daemon is no longer accepting. A grant may take
	/// arbitrarily long: it arrives when capacity frees up.
	pub async fn acquire(&mut self, job: JobRequest) -> Result<bool> {
		write_frame(&mut self.stream, &Message::Acquire {
			job,
		})
		.await?;
		match read_frame(&mut self.stream).await? {
			Some(Message::Go) => Ok(true),
			Some(Message::Reject) => Ok(false),
			Some(other) => Err(Error::Unexpected(other.kind())),
			None => Err(Error::Closed),
		}
	}

	/// Give back the cores granted by the last acquire.
	pub async fn release(&mut self) -> Result<()> {
		write_frame(&mut self.stream, &Message::Release).await?;
		Ok(())
	}

	/// Fetch the daemon's current state.
	pub async fn status(&mut self) -> Result<Status> {
		write_frame(&mut self.stream, &Message::Status).await?;
		match read_frame(&mut self.stream).await? {
			Some(Message::StatusAnswer {
				max_cores,
				running,
				waiting,
			}) => Ok(Status {
				max_cores,
				running,
				waiting,
			}),
			Some(other) => Err(Error::Unexpected(other.kind())),
			None => Err(Error::Closed),
		}
	}

	/// Tell the daemon to refuse all future acquires.
	pub async fn stop_accepting(&mut self) -> Result<()> {
		write_frame(&mut self.stream, &Message::StopAccepting).await?;
		Ok(())
	}

	/// Close the session politely.
	pub async fn end(mut self) -> Result<()> {
		write_frame(&mut self.stream, &Message::End).await?;
		Ok(())
	}
}
