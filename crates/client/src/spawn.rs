// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 Corral

use std::{
	io::ErrorKind,
	os::unix::process::CommandExt,
	path::PathBuf,
	process::{Command, Stdio},
	time::Duration,
};

use tracing::{debug, info};

use crate::{Client, Error, Result};

/// How to start a daemon when none answers on the port.
#[derive(Clone, Debug, Default)]
pub struct SpawnOpts {
	/// Daemon binary; defaults to `corrald` next to the current
	/// executable, falling back to a PATH lookup.
	pub binary: Option<PathBuf>,
	/// Core pool size passed to the daemon.
	pub max_cores: Option<u32>,
	/// Where the detached daemon appends its log records.
	pub log_file: Option<PathBuf>,
}

/// Fork-and-detach a fresh daemon on `port`. The child gets null stdio and
/// its own process group, so it survives this process.
pub fn spawn_daemon(port: u16, opts: &SpawnOpts) -> std::io::Result<()> {
	let binary = opts.binary.clone().unwrap_or_else(default_daemon_binary);
	let mut cmd = Command::new(&binary);
	cmd.arg("--port")
		.arg(port.to_string())
		.arg("--detach")
		.stdin(Stdio::null())
		.stdout(Stdio::null())
		.stderr(Stdio::null())
		.process_group(0);
	if let Some(cores) = opts.max_cores {
		cmd.arg("--cores").arg(cores.to_string());
	}
	if let Some(log_file) = &opts.log_file {
		cmd.arg("--log-file").arg(log_file);
	}
	info!(binary = %binary.display(), port, "spawning daemon");
	cmd.spawn()?;
	Ok(())
}

fn default_daemon_binary() -> PathBuf {
	std::env::current_exe()
		.ok()
		.and_then(|exe| exe.parent().map(|dir| dir.join("corrald")))
		.filter(|candidate| candidate.exists())
		.unwrap_or_else(|| PathBuf::from("corrald"))
}

/// Connect to the daemon on `port`, spawning one first when the port
/// refuses connection. Retries with backoff while the fresh daemon binds;
/// a second daemon losing the bind race is fine, we connect to whichever
/// won.
pub async fn connect_or_spawn(port: u16, opts: &SpawnOpts) -> Result<Client> {
	match Client::connect_local(port).await {
		Ok(client) => return Ok(client),
		Err(error) if is_refused(&error) => {
			debug!(port, "no daemon answering, spawning one");
		}
		Err(error) => return Err(error),
	}
	spawn_daemon(port, opts)?;
	let mut delay = Duration::from_millis(50);
	for _ in 0..20 {
		tokio::time::sleep(delay).await;
		match Client::connect_local(port).await {
			Ok(client) => return Ok(client),
			Err(error) if is_refused(&error) => {}
			Err(error) => return Err(error),
		}
		delay = (delay * 2).min(Duration::from_millis(500));
	}
	Err(Error::DaemonUnavailable {
		port,
	})
}

fn is_refused(error: &Error) -> bool {
	match error {
		Error::Io(e) => e.kind() == ErrorKind::ConnectionRefused,
		Error::Wire(corral_wire::Error::Io(e)) => e.kind() == ErrorKind::ConnectionRefused,
		_ => false,
	}
}
