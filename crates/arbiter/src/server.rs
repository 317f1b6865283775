// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 Corral

use std::{io, net::SocketAddr, time::Duration};

use corral_wire::DEFAULT_PORT;
use tokio::{net::TcpListener, sync::mpsc, task::JoinHandle};
use tracing::{info, warn};

use crate::{
	Result,
	scheduler::{SchedMsg, Scheduler},
	session,
};

/// Daemon configuration.
#[derive(Clone, Debug)]
pub struct ArbiterConfig {
	/// Loopback port to listen on; 0 picks an ephemeral port.
	pub port: u16,
	/// Size of the core pool being arbitrated.
	pub max_cores: u32,
	/// How long a daemon with no clients and no jobs lingers before
	/// shutting itself down.
	pub idle_grace: Duration,
}

impl Default for ArbiterConfig {
	fn default() -> Self {
		Self {
			port: DEFAULT_PORT,
			max_cores: num_cpus::get() as u32,
			idle_grace: Duration::from_secs(10),
		}
	}
}

/// A bound, not-yet-serving daemon.
pub struct Server {
	listener: TcpListener,
	inbox: mpsc::Sender<SchedMsg>,
	scheduler: JoinHandle<()>,
}

impl Server {
	/// Bind the loopback listener and start the scheduler task. Fails with
	/// `AddrInUse` when a daemon already owns the port.
	pub async fn bind(config: &ArbiterConfig) -> Result<Self> {
		let listener = TcpListener::bind(("127.0.0.1", config.port)).await?;
		let (inbox, scheduler) = Scheduler::spawn(config.max_cores, config.idle_grace);
		info!(addr = %listener.local_addr()?, cores = config.max_cores, "arbiter listening");
		Ok(Self {
			listener,
			inbox,
			scheduler,
		})
	}

	/// The bound address; what tests use together with port 0.
	pub fn local_addr(&self) -> io::Result<SocketAddr> {
		self.listener.local_addr()
	}

	/// Accept sessions until the scheduler decides the daemon is idle.
	/// Accept errors are logged and survived; only scheduler termination
	/// ends the loop.
	pub async fn run(mut self) {
		loop {
			tokio::select! {
				accepted = self.listener.accept() => match accepted {
					Ok((stream, _)) => {
						tokio::spawn(session::handle_session(stream, self.inbox.clone()));
					}
					Err(error) => warn!(%error, "accept failed"),
				},
				_ = &mut self.scheduler => {
					info!("scheduler stopped, closing listener");
					return;
				}
			}
		}
	}
}

/// Bind and serve in one call; returns once the daemon shut itself down.
pub async fn serve(config: &ArbiterConfig) -> Result<()> {
	Server::bind(config).await?.run().await;
	Ok(())
}
