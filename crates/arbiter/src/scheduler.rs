// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 Corral

use std::{cmp::Ordering, collections::BinaryHeap, time::Duration};

use corral_core::{CurrentJob, JobRequest, WaitingJob, unix_now};
use tokio::{
	sync::{mpsc, oneshot},
	task::JoinHandle,
	time::timeout,
};
use tracing::{debug, info, warn};

/// Verdict delivered on a task's ready channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Admission {
	Go,
	Reject,
}

/// Reply to a `Register`: the scheduler-assigned task id plus the channel
/// the admission verdict will arrive on.
pub(crate) struct Registered {
	pub id: u64,
	pub ready: oneshot::Receiver<Admission>,
}

/// Everything a session can ask of the scheduler.
pub(crate) enum SchedMsg {
	/// A session opened; connected-but-idle clients block auto-shutdown.
	Connected,
	/// A session went away.
	Disconnected,
	/// Queue an acquire.
	Register {
		job: JobRequest,
		reply: oneshot::Sender<Registered>,
	},
	/// Forget a queued task whose owner died before admission.
	Cancel(u64),
	/// Give back an admitted task's cores.
	Done(u64),
	/// Take a consistent snapshot of the scheduler state.
	Status(oneshot::Sender<StatusView>),
	/// Refuse all future acquires.
	StopAccepting,
}

/// Copy of the scheduler state, taken in a single scheduler turn.
#[derive(Clone, Debug)]
pub(crate) struct StatusView {
	pub max_cores: u32,
	pub running: Vec<CurrentJob>,
	pub waiting: Vec<WaitingJob>,
}

struct Waiting {
	id: u64,
	job: JobRequest,
	ready: oneshot::Sender<Admission>,
}

impl Waiting {
	/// Ordering key only: exclusive jobs sort as the largest demand.
	fn demand(&self) -> u32 {
		if self.job.cores <= 0 {
			u32::MAX
		} else {
			self.job.cores as u32
		}
	}
}

impl PartialEq for Waiting {
	fn eq(&self, other: &Self) -> bool {
		self.cmp(other) == Ordering::Equal
	}
}

impl Eq for Waiting {}

impl PartialOrd for Waiting {
	fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
		Some(self.cmp(other))
	}
}

impl Ord for Waiting {
	// Max-heap: Greater pops first. Priority descending, then fewer cores,
	// then registration order; ids are handed out monotonically, so the id
	// doubles as the registration sequence.
	fn cmp(&self, other: &Self) -> Ordering {
		self.job
			.priority
			.cmp(&other.job.priority)
			.then_with(|| other.demand().cmp(&self.demand()))
			.then_with(|| other.id.cmp(&self.id))
	}
}

/// The single task owning all arbiter state.
pub(crate) struct Scheduler {
	max_cores: u32,
	accepting: bool,
	num_clients: u32,
	next_id: u64,
	running: Vec<CurrentJob>,
	waiting: BinaryHeap<Waiting>,
	inbox: mpsc::Receiver<SchedMsg>,
	idle_grace: Duration,
}

impl Scheduler {
	pub fn spawn(max_cores: u32, idle_grace: Duration) -> (mpsc::Sender<SchedMsg>, JoinHandle<()>) {
		let (tx, rx) = mpsc::channel(64);
		let scheduler = Self {
			max_cores,
			accepting: true,
			num_clients: 0,
			next_id: 0,
			running: Vec::new(),
			waiting: BinaryHeap::new(),
			inbox: rx,
			idle_grace,
		};
		(tx, tokio::spawn(scheduler.run()))
	}

	async fn run(mut self) {
		loop {
			// While idle only a new client can change anything, and if none
			// shows up within the grace period the daemon is done.
			let received = if self.idle() {
				match timeout(self.idle_grace, self.inbox.recv()).await {
					Ok(received) => received,
					Err(_) => {
						info!("idle for {:?}, shutting down", self.idle_grace);
						return;
					}
				}
			} else {
				self.inbox.recv().await
			};
			let Some(msg) = received else {
				return;
			};
			self.handle(msg);
			self.admit();
			if self.idle() {
				info!("no clients and no jobs, shutting down");
				return;
			}
		}
	}

	fn idle(&self) -> bool {
		self.num_clients == 0 && self.running.is_empty() && self.waiting.is_empty()
	}

	fn used(&self) -> u32 {
		self.running.iter().map(|j| j.job.cores_of(self.max_cores)).sum()
	}

	fn handle(&mut self, msg: SchedMsg) {
		match msg {
			SchedMsg::Connected => self.num_clients += 1,
			SchedMsg::Disconnected => self.num_clients = self.num_clients.saturating_sub(1),
			SchedMsg::Register {
				job,
				reply,
			} => self.register(job, reply),
			SchedMsg::Cancel(id) => self.cancel(id),
			SchedMsg::Done(id) => self.done(id),
			SchedMsg::Status(reply) => {
				let _ = reply.send(self.status());
			}
			SchedMsg::StopAccepting => {
				info!("no longer accepting new jobs");
				self.accepting = false;
			}
		}
	}

	fn register(&mut self, job: JobRequest, reply: oneshot::Sender<Registered>) {
		let id = self.next_id;
		self.next_id += 1;
		let (ready_tx, ready_rx) = oneshot::channel();
		let registered = Registered {
			id,
			ready: ready_rx,
		};
		if reply.send(registered).is_err() {
			// session died between sending Register and our answer
			return;
		}
		if !self.accepting {
			debug!(task = id, "rejected, not accepting");
			let _ = ready_tx.send(Admission::Reject);
			return;
		}
		debug!(task = id, cores = job.cores, priority = job.priority, "queued");
		self.waiting.push(Waiting {
			id,
			job,
			ready: ready_tx,
		});
	}

	fn cancel(&mut self, id: u64) {
		let before = self.waiting.len();
		self.waiting.retain(|w| w.id != id);
		if self.waiting.len() == before {
			// the task was admitted before its owner died
			self.done(id);
		} else {
			debug!(task = id, "cancelled while waiting");
		}
	}

	fn done(&mut self, id: u64) {
		match self.running.iter().position(|j| j.id == id) {
			Some(at) => {
				let job = self.running.remove(at);
				debug!(task = id, held = unix_now() - job.start_time, "released");
			}
			None => warn!(task = id, "release for unknown task"),
		}
	}

	fn status(&self) -> StatusView {
		let mut queue: Vec<&Waiting> = self.waiting.iter().collect();
		queue.sort_by(|a, b| b.cmp(a));
		StatusView {
			max_cores: self.max_cores,
			running: self.running.clone(),
			waiting: queue
				.into_iter()
				.map(|w| WaitingJob {
					id: w.id,
					job: w.job.clone(),
				})
				.collect(),
		}
	}

	/// Admit waiters while the best one fits into the free cores. A task
	/// whose owner vanished is skipped without ever occupying cores.
	fn admit(&mut self) {
		while let Some(best) = self.waiting.peek() {
			let need = best.job.cores_of(self.max_cores);
			if need > self.max_cores - self.used() {
				break;
			}
			let Some(task) = self.waiting.pop() else {
				break;
			};
			if task.ready.send(Admission::Go).is_ok() {
				debug!(task = task.id, cores = need, "admitted");
				self.running.push(CurrentJob {
					id: task.id,
					job: task.job,
					start_time: unix_now(),
				});
			} else {
				debug!(task = task.id, "granted task's owner is gone, skipping");
			}
		}
	}
}
