// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 Corral

use std::{fs::OpenOptions, path::PathBuf, process::ExitCode, sync::Arc, time::Duration};

use clap::Parser;
use corral_arbiter::{ArbiterConfig, serve};
use corral_wire::DEFAULT_PORT;
use tracing::error;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "corrald")]
#[command(about = "Arbitrates a pool of CPU cores among local jobs", long_about = None)]
#[command(version)]
struct Args {
	/// Loopback port to listen on
	#[arg(short, long, env = "CORRAL_PORT", default_value_t = DEFAULT_PORT)]
	port: u16,

	/// Number of cores to arbitrate (defaults to every core of the host)
	#[arg(short, long)]
	cores: Option<u32>,

	/// Append log records to this file instead of stderr
	#[arg(long)]
	log_file: Option<PathBuf>,

	/// Detached mode: move to a scratch working directory first
	#[arg(long)]
	detach: bool,

	/// Seconds an idle daemon lingers before exiting on its own
	#[arg(long, default_value_t = 10)]
	idle_grace: u64,
}

fn main() -> ExitCode {
	let args = Args::parse();
	if let Err(error) = init_tracing(args.log_file.as_deref()) {
		eprintln!("corrald: cannot open log file: {error}");
		return ExitCode::from(2);
	}
	if args.detach {
		if let Err(error) = enter_scratch_dir() {
			error!(%error, "cannot enter scratch directory");
			return ExitCode::FAILURE;
		}
	}

	let config = ArbiterConfig {
		port: args.port,
		max_cores: args.cores.unwrap_or_else(|| num_cpus::get() as u32),
		idle_grace: Duration::from_secs(args.idle_grace),
	};

	let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
		Ok(runtime) => runtime,
		Err(error) => {
			error!(%error, "cannot build runtime");
			return ExitCode::FAILURE;
		}
	};

	// A bind failure usually means a live daemon already owns the port;
	// there is exactly one daemon per port, so this one bows out.
	match runtime.block_on(serve(&config)) {
		Ok(()) => ExitCode::SUCCESS,
		Err(error) => {
			error!(%error, port = config.port, "daemon failed");
			ExitCode::FAILURE
		}
	}
}

fn init_tracing(log_file: Option<&std::path::Path>) -> std::io::Result<()> {
	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
	match log_file {
		Some(path) => {
			let file = OpenOptions::new().create(true).append(true).open(path)?;
			tracing_subscriber::fmt()
				.with_env_filter(filter)
				.with_writer(Arc::new(file))
				.with_ansi(false)
				.init();
		}
		None => {
			tracing_subscriber::fmt().with_env_filter(filter).init();
		}
	}
	Ok(())
}

fn enter_scratch_dir() -> std::io::Result<()> {
	let dir = std::env::temp_dir().join("corral");
	std::fs::create_dir_all(&dir)?;
	std::env::set_current_dir(&dir)
}
