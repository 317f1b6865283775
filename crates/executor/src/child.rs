// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 Corral

use std::{
	io::Read,
	os::unix::process::{CommandExt, ExitStatusExt},
	process::{Command, Stdio},
	sync::{
		Arc,
		atomic::{AtomicBool, Ordering},
		mpsc::{self, RecvTimeoutError},
	},
	thread,
	time::{Duration, Instant},
};

use wait4::{ResUse, Wait4};

/// Extra slack the watchdog grants beyond the configured timeout.
const WATCHDOG_GRACE: Duration = Duration::from_secs(1);

/// What came back from one supervised child.
#[derive(Debug)]
pub(crate) struct ChildOutput {
	pub stdout: String,
	pub stderr: String,
	pub errcode: i32,
	pub rtime: f64,
	pub utime: f64,
	pub stime: f64,
	pub timed_out: bool,
}

/// Run `cmdline` through `sh -c` in its own process group, capturing both
/// output streams, enforcing an address-space limit, and killing the whole
/// group once `timeout + grace` elapses. Blocks until the child is gone.
pub(crate) fn run_child(cmdline: &str, timeout: Duration, memory_mb: u64) -> std::io::Result<ChildOutput> {
	let mut cmd = Command::new("sh");
	cmd.arg("-c")
		.arg(cmdline)
		.stdin(Stdio::null())
		.stdout(Stdio::piped())
		.stderr(Stdio::piped())
		.process_group(0);
	if memory_mb > 0 {
		unsafe {
			cmd.pre_exec(move || limit_address_space(memory_mb));
		}
	}
	let mut child = cmd.spawn()?;
	let started = Instant::now();

	// Drain both pipes off-thread; a child that fills a pipe while we sit
	// in wait4 would deadlock otherwise.
	let stdout = drain(child.stdout.take());
	let stderr = drain(child.stderr.take());

	let pgid = child.id() as libc::pid_t;
	let fired = Arc::new(AtomicBool::new(false));
	let (done_tx, done_rx) = mpsc::channel::<()>();
	let watchdog = {
		let fired = Arc::clone(&fired);
		thread::spawn(move || {
			if let Err(RecvTimeoutError::Timeout) = done_rx.recv_timeout(timeout + WATCHDOG_GRACE) {
				fired.store(true, Ordering::SeqCst);
				// the whole group, so shell pipelines die with the shell
				unsafe {
					libc::killpg(pgid, libc::SIGKILL);
				}
			}
		})
	};

	let ResUse {
		status,
		rusage,
	} = child.wait4()?;
	let rtime = started.elapsed().as_secs_f64();
	let _ = done_tx.send(());
	let _ = watchdog.join();

	let stdout = stdout.join().unwrap_or_default();
	let stderr = stderr.join().unwrap_or_default();

	// shell convention for signal deaths
	let errcode = status.code().unwrap_or_else(|| 128 + status.signal().unwrap_or(0));

	Ok(ChildOutput {
		stdout,
		stderr,
		errcode,
		rtime,
		utime: rusage.utime.as_secs_f64(),
		stime: rusage.stime.as_secs_f64(),
		timed_out: fired.load(Ordering::SeqCst),
	})
}

fn drain(pipe: Option<impl Read + Send + 'static>) -> thread::JoinHandle<String> {
	thread::spawn(move || {
		let mut buf = Vec::new();
		if let Some(mut pipe) = pipe {
			let _ = pipe.read_to_end(&mut buf);
		}
		String::from_utf8_lossy(&buf).into_owned()
	})
}

fn limit_address_space(memory_mb: u64) -> std::io::Result<()> {
	let bytes = memory_mb.saturating_mul(1024 * 1024);
	let limit = libc::rlimit {
		rlim_cur: bytes,
		rlim_max: bytes,
	};
	if unsafe { libc::setrlimit(libc::RLIMIT_AS, &limit) } != 0 {
		return Err(std::io::Error::last_os_error());
	}
	Ok(())
}
