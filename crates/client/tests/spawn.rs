// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 Corral

use std::{net::TcpListener, path::PathBuf};

use corral_client::{Error, SpawnOpts, connect_or_spawn};
use corral_core::JobRequest;

/// A port nothing listens on; bound briefly to find it, then released.
fn free_port() -> u16 {
	TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap().port()
}

/// The corrald built alongside the test binaries: integration tests run
/// from `target/<profile>/deps`, the daemon sits one directory up.
fn built_corrald() -> PathBuf {
	let mut dir = std::env::current_exe().unwrap();
	dir.pop();
	if dir.ends_with("deps") {
		dir.pop();
	}
	dir.join("corrald")
}

#[tokio::test]
async fn spawns_a_daemon_when_the_port_refuses() {
	let port = free_port();
	let binary = built_corrald();
	assert!(
		binary.exists(),
		"corrald must be built next to the tests, looked at {}",
		binary.display()
	);

	let opts = SpawnOpts {
		binary: Some(binary),
		max_cores: Some(2),
		log_file: None,
	};

	// nothing listens on the port yet, so this exercises the refused
	// branch, the detach, and the retry loop
	let mut client = connect_or_spawn(port, &opts).await.unwrap();

	// the daemon we spawned is real and got our core count: it answers
	// status and grants cores
	let status = client.status().await.unwrap();
	assert_eq!(status.max_cores, 2);
	assert!(client.acquire(JobRequest::new(1, 0).with_info("spawn test")).await.unwrap());
	client.release().await.unwrap();

	// a second caller finds the daemon already answering and connects
	// without spawning another
	let second = connect_or_spawn(port, &opts).await.unwrap();
	let _ = second.end().await;

	// once the last client leaves, the daemon shuts itself down
	client.end().await.unwrap();
}

#[tokio::test]
async fn gives_up_when_the_spawned_binary_never_binds() {
	let port = free_port();
	let opts = SpawnOpts {
		// spawns fine, exits immediately, never listens
		binary: Some(PathBuf::from("/bin/true")),
		max_cores: None,
		log_file: None,
	};
	let err = connect_or_spawn(port, &opts).await.unwrap_err();
	assert!(matches!(err, Error::DaemonUnavailable { .. }), "got {err}");
}

#[tokio::test]
async fn missing_daemon_binary_surfaces_the_spawn_error() {
	let port = free_port();
	let opts = SpawnOpts {
		binary: Some(PathBuf::from("/no/such/corrald")),
		max_cores: None,
		log_file: None,
	};
	let err = connect_or_spawn(port, &opts).await.unwrap_err();
	assert!(matches!(err, Error::Io(_)), "got {err}");
}
