// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 Corral

use std::time::Duration;

use corral_arbiter::{ArbiterConfig, Error, Server};
use corral_client::Client;
use corral_core::JobRequest;
use tokio::{
	task::JoinHandle,
	time::{sleep, timeout},
};

const GRACE: Duration = Duration::from_secs(5);

async fn start(max_cores: u32, idle_grace: Duration) -> (u16, JoinHandle<()>) {
	let config = ArbiterConfig {
		port: 0,
		max_cores,
		idle_grace,
	};
	let server = Server::bind(&config).await.unwrap();
	let port = server.local_addr().unwrap().port();
	(port, tokio::spawn(server.run()))
}

async fn connect(port: u16) -> Client {
	Client::connect_local(port).await.unwrap()
}

/// Acquire in a background task; the task resolves to the still-holding
/// client once the grant arrives.
fn acquire_in_background(mut client: Client, job: JobRequest) -> JoinHandle<Client> {
	tokio::spawn(async move {
		assert!(client.acquire(job).await.unwrap(), "expected a grant, got a reject");
		client
	})
}

#[tokio::test]
async fn grants_immediately_when_cores_are_free() {
	let (port, _server) = start(4, GRACE).await;
	let mut client = connect(port).await;
	assert!(client.acquire(JobRequest::new(2, 0)).await.unwrap());
	client.release().await.unwrap();
	client.end().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn priority_wins_then_smaller_jobs_pack_first() {
	let (port, _server) = start(4, GRACE).await;

	// hold everything so the three competitors queue up
	let mut blocker = connect(port).await;
	assert!(blocker.acquire(JobRequest::new(0, 0).with_info("blocker")).await.unwrap());

	let x = acquire_in_background(connect(port).await, JobRequest::new(3, 0).with_info("x"));
	sleep(Duration::from_millis(80)).await;
	let y = acquire_in_background(connect(port).await, JobRequest::new(2, 0).with_info("y"));
	sleep(Duration::from_millis(80)).await;
	let z = acquire_in_background(connect(port).await, JobRequest::new(1, 5).with_info("z"));
	sleep(Duration::from_millis(80)).await;

	// the queue is already in admission order: priority first, then the
	// smaller of the equal-priority pair, then the bigger one
	let mut observer = connect(port).await;
	let status = observer.status().await.unwrap();
	let queued: Vec<_> = status.waiting.iter().map(|w| w.job.info.clone().unwrap()).collect();
	assert_eq!(queued, ["z", "y", "x"]);

	blocker.release().await.unwrap();

	// z (priority 5) and y (2 cores at priority 0) fit into the 4 freed
	// cores in the same admit tick; x (3 cores) must wait
	let mut y = timeout(GRACE, y).await.unwrap().unwrap();
	let _z = timeout(GRACE, z).await.unwrap().unwrap();
	sleep(Duration::from_millis(200)).await;
	assert!(!x.is_finished(), "x cannot fit until y releases");

	let status = observer.status().await.unwrap();
	let used: u32 = status.running.iter().map(|j| j.job.cores_of(status.max_cores)).sum();
	assert!(used <= status.max_cores);

	y.release().await.unwrap();
	let _x = timeout(GRACE, x).await.unwrap().unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn freed_cores_admit_several_waiters_in_one_tick() {
	let (port, _server) = start(2, GRACE).await;

	let mut a = connect(port).await;
	assert!(a.acquire(JobRequest::new(2, 0).with_info("a")).await.unwrap());

	let b = acquire_in_background(connect(port).await, JobRequest::new(1, 0).with_info("b"));
	sleep(Duration::from_millis(80)).await;
	let c = acquire_in_background(connect(port).await, JobRequest::new(1, 0).with_info("c"));
	sleep(Duration::from_millis(80)).await;
	let d = acquire_in_background(connect(port).await, JobRequest::new(1, 0).with_info("d"));
	sleep(Duration::from_millis(80)).await;

	a.release().await.unwrap();

	// b and c together fill the two freed cores; d stays queued
	let mut b = timeout(GRACE, b).await.unwrap().unwrap();
	let _c = timeout(GRACE, c).await.unwrap().unwrap();
	sleep(Duration::from_millis(200)).await;
	assert!(!d.is_finished(), "d must wait for another release");

	b.release().await.unwrap();
	let _d = timeout(GRACE, d).await.unwrap().unwrap();
}

#[tokio::test]
async fn stop_accepting_rejects_new_acquires_but_keeps_holders() {
	let (port, _server) = start(2, GRACE).await;

	let mut holder = connect(port).await;
	assert!(holder.acquire(JobRequest::new(1, 0).with_info("holder")).await.unwrap());

	let mut admin = connect(port).await;
	admin.stop_accepting().await.unwrap();
	sleep(Duration::from_millis(100)).await;

	let mut late = connect(port).await;
	assert!(!late.acquire(JobRequest::new(1, 0)).await.unwrap(), "expected a reject");

	// the holder is unaffected
	let status = admin.status().await.unwrap();
	assert_eq!(status.running.len(), 1);
	assert_eq!(status.running[0].job.info.as_deref(), Some("holder"));

	holder.release().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn dropped_connection_releases_its_grant() {
	let (port, _server) = start(2, GRACE).await;

	let mut a = connect(port).await;
	assert!(a.acquire(JobRequest::new(2, 0)).await.unwrap());

	let b = acquire_in_background(connect(port).await, JobRequest::new(1, 0));
	sleep(Duration::from_millis(80)).await;
	assert!(!b.is_finished());

	// no Release, no End: the connection just dies
	drop(a);

	let _b = timeout(GRACE, b).await.unwrap().unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn waiter_that_disconnects_leaves_the_queue() {
	let (port, _server) = start(2, GRACE).await;

	let mut a = connect(port).await;
	assert!(a.acquire(JobRequest::new(2, 0)).await.unwrap());

	let doomed = acquire_in_background(connect(port).await, JobRequest::new(1, 0).with_info("doomed"));
	sleep(Duration::from_millis(80)).await;
	doomed.abort();
	sleep(Duration::from_millis(80)).await;

	a.release().await.unwrap();
	sleep(Duration::from_millis(100)).await;

	let mut observer = connect(port).await;
	let status = observer.status().await.unwrap();
	assert!(status.running.is_empty(), "the dead waiter must not occupy cores");
	assert!(status.waiting.is_empty());
}

#[tokio::test]
async fn exclusive_hold_takes_the_whole_host() {
	let (port, _server) = start(4, GRACE).await;

	let mut exclusive = connect(port).await;
	assert!(exclusive.acquire(JobRequest::new(0, 0)).await.unwrap());

	let small = acquire_in_background(connect(port).await, JobRequest::new(1, 0));
	sleep(Duration::from_millis(150)).await;
	assert!(!small.is_finished(), "nothing fits next to an exclusive hold");

	exclusive.release().await.unwrap();
	let _small = timeout(GRACE, small).await.unwrap().unwrap();
}

#[tokio::test]
async fn idle_daemon_shuts_itself_down() {
	let (_port, server) = start(4, Duration::from_millis(200)).await;
	timeout(Duration::from_secs(2), server).await.expect("daemon should exit on its own").unwrap();
}

#[tokio::test]
async fn second_daemon_on_the_same_port_fails_to_bind() {
	let (port, _server) = start(2, GRACE).await;

	let second = Server::bind(&ArbiterConfig {
		port,
		max_cores: 2,
		idle_grace: GRACE,
	})
	.await;
	match second {
		Err(Error::Io(error)) => {
			assert_eq!(error.kind(), std::io::ErrorKind::AddrInUse);
		}
		Err(other) => panic!("expected AddrInUse, got {other}"),
		Ok(_) => panic!("second bind on port {port} must fail"),
	}
}

#[tokio::test]
async fn connected_idle_client_blocks_shutdown() {
	let (port, server) = start(4, Duration::from_millis(200)).await;
	let client = connect(port).await;

	sleep(Duration::from_millis(600)).await;
	assert!(!server.is_finished(), "a connected client must keep the daemon alive");

	client.end().await.unwrap();
	timeout(Duration::from_secs(2), server).await.expect("daemon should exit after the last client").unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn capacity_invariant_holds_under_churn() {
	let (port, _server) = start(3, GRACE).await;

	let mut workers = Vec::new();
	for i in 0..6u32 {
		let cores = 1 + (i % 2) as i32;
		workers.push(tokio::spawn(async move {
			let mut client = Client::connect_local(port).await.unwrap();
			for _ in 0..5 {
				assert!(client.acquire(JobRequest::new(cores, 0)).await.unwrap());
				sleep(Duration::from_millis(20)).await;
				client.release().await.unwrap();
			}
			client.end().await.unwrap();
		}));
	}

	let mut observer = connect(port).await;
	for _ in 0..40 {
		let status = observer.status().await.unwrap();
		let used: u32 = status.running.iter().map(|j| j.job.cores_of(status.max_cores)).sum();
		assert!(used <= status.max_cores, "running jobs use {used} of {} cores", status.max_cores);
		sleep(Duration::from_millis(10)).await;
	}

	for worker in workers {
		timeout(GRACE, worker).await.unwrap().unwrap();
	}
}

mod protocol {
	use corral_wire::{Message, read_frame, write_frame};
	use tokio::net::TcpStream;

	use super::*;

	#[tokio::test]
	async fn wrong_first_message_closes_the_session() {
		let (port, _server) = start(2, GRACE).await;
		let mut rogue = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
		write_frame(&mut rogue, &Message::Status).await.unwrap();
		assert!(read_frame(&mut rogue).await.unwrap().is_none(), "server must just close");
	}

	#[tokio::test]
	async fn release_without_a_grant_closes_the_session_only() {
		let (port, _server) = start(2, GRACE).await;

		let mut rogue = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
		write_frame(&mut rogue, &Message::Start).await.unwrap();
		write_frame(&mut rogue, &Message::Release).await.unwrap();
		assert!(read_frame(&mut rogue).await.unwrap().is_none());

		// the daemon is unharmed
		let mut fine = connect(port).await;
		assert!(fine.acquire(JobRequest::new(1, 0)).await.unwrap());
		fine.release().await.unwrap();
		fine.end().await.unwrap();
	}

	#[tokio::test]
	async fn go_reject_from_a_client_is_a_protocol_error() {
		let (port, _server) = start(2, GRACE).await;
		let mut rogue = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
		write_frame(&mut rogue, &Message::Start).await.unwrap();
		write_frame(&mut rogue, &Message::Go).await.unwrap();
		assert!(read_frame(&mut rogue).await.unwrap().is_none());
	}
}
