// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 Corral

mod output;
mod run;

use std::{io::ErrorKind, path::PathBuf, process::ExitCode, time::Duration};

use clap::{Parser, Subcommand};
use corral_client::{Client, Error as ClientError, SpawnOpts, connect_or_spawn};
use corral_core::JobRequest;
use corral_wire::DEFAULT_PORT;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "corral")]
#[command(about = "Coordinate prover jobs and run benchmark batches", long_about = None)]
#[command(version)]
struct Cli {
	/// Daemon port
	#[arg(short, long, global = true, env = "CORRAL_PORT", default_value_t = DEFAULT_PORT)]
	port: u16,

	#[command(subcommand)]
	command: Command,
}

#[derive(Subcommand)]
enum Command {
	/// Run a suite of provers over problem files
	Run(run::RunArgs),
	/// Show the daemon's running and waiting jobs
	Status,
	/// Tell the daemon to refuse new acquires
	StopAccepting,
	/// Hold cores while an arbitrary command runs
	Lock(LockArgs),
	/// Start a daemon on this host
	Daemon(DaemonArgs),
}

#[derive(clap::Args)]
struct LockArgs {
	/// Cores to hold; 0 takes the whole host
	#[arg(short = 'j', long, default_value_t = 1)]
	cores: i32,

	/// Queue priority of the hold
	#[arg(long, default_value_t = 0)]
	priority: i32,

	/// Command to run while the cores are held
	#[arg(last = true, required = true)]
	command: Vec<String>,
}

#[derive(clap::Args)]
struct DaemonArgs {
	/// Number of cores to arbitrate
	#[arg(short, long)]
	cores: Option<u32>,

	/// Log file for the detached daemon
	#[arg(long)]
	log_file: Option<PathBuf>,

	/// Serve in the foreground instead of detaching
	#[arg(long)]
	foreground: bool,
}

fn main() -> ExitCode {
	let cli = Cli::parse();
	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
	tracing_subscriber::fmt().with_env_filter(filter).init();

	let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
		Ok(runtime) => runtime,
		Err(error) => {
			eprintln!("corral: cannot build runtime: {error}");
			return ExitCode::FAILURE;
		}
	};
	runtime.block_on(async {
		match cli.command {
			Command::Run(args) => run::run(cli.port, args).await,
			Command::Status => status(cli.port).await,
			Command::StopAccepting => stop_accepting(cli.port).await,
			Command::Lock(args) => lock(cli.port, args).await,
			Command::Daemon(args) => daemon(cli.port, args).await,
		}
	})
}

fn fail(error: impl std::fmt::Display) -> ExitCode {
	eprintln!("corral: {error}");
	ExitCode::from(2)
}

fn no_daemon(error: &ClientError) -> bool {
	matches!(error, ClientError::Io(e) if e.kind() == ErrorKind::ConnectionRefused)
}

async fn status(port: u16) -> ExitCode {
	let mut client = match Client::connect_local(port).await {
		Ok(client) => client,
		Err(error) if no_daemon(&error) => {
			println!("no daemon running on port {port}");
			return ExitCode::SUCCESS;
		}
		Err(error) => return fail(error),
	};
	match client.status().await {
		Ok(status) => {
			output::print_status(&status);
			let _ = client.end().await;
			ExitCode::SUCCESS
		}
		Err(error) => fail(error),
	}
}

async fn stop_accepting(port: u16) -> ExitCode {
	let mut client = match Client::connect_local(port).await {
		Ok(client) => client,
		Err(error) => return fail(error),
	};
	if let Err(error) = client.stop_accepting().await {
		return fail(error);
	}
	let _ = client.end().await;
	println!("daemon on port {port} no longer accepts new jobs");
	ExitCode::SUCCESS
}

async fn lock(port: u16, args: LockArgs) -> ExitCode {
	let mut client = match connect_or_spawn(port, &SpawnOpts::default()).await {
		Ok(client) => client,
		Err(error) => return fail(error),
	};
	let job = JobRequest::new(args.cores, args.priority).with_info(args.command.join(" "));
	match client.acquire(job).await {
		Ok(true) => {}
		Ok(false) => {
			eprintln!("corral: daemon is not accepting new jobs");
			return ExitCode::from(2);
		}
		Err(error) => return fail(error),
	}

	let status =
		tokio::process::Command::new(&args.command[0]).args(&args.command[1..]).status().await;
	let code = match status {
		Ok(status) => ExitCode::from(status.code().unwrap_or(1).clamp(0, 255) as u8),
		Err(error) => {
			eprintln!("corral: cannot run {}: {error}", args.command[0]);
			ExitCode::from(2)
		}
	};

	let _ = client.release().await;
	let _ = client.end().await;
	code
}

async fn daemon(port: u16, args: DaemonArgs) -> ExitCode {
	if args.foreground {
		let config = corral_arbiter::ArbiterConfig {
			port,
			max_cores: args.cores.unwrap_or_else(|| num_cpus::get() as u32),
			idle_grace: Duration::from_secs(10),
		};
		return match corral_arbiter::serve(&config).await {
			Ok(()) => ExitCode::SUCCESS,
			Err(error) => fail(error),
		};
	}
	let opts = SpawnOpts {
		binary: None,
		max_cores: args.cores,
		log_file: args.log_file,
	};
	match connect_or_spawn(port, &opts).await {
		Ok(client) => {
			println!("daemon running on port {port}");
			let _ = client.end().await;
			ExitCode::SUCCESS
		}
		Err(error) => fail(error),
	}
}
