// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 Corral

use corral_wire::{Message, read_frame, write_frame};
use tokio::{
	net::{
		TcpStream,
		tcp::{OwnedReadHalf, OwnedWriteHalf},
	},
	sync::{mpsc, oneshot},
};
use tracing::{debug, warn};

use crate::{
	Error, Result,
	scheduler::{Admission, Registered, SchedMsg},
};

/// Drive one client connection through the session state machine.
///
/// Whatever happens inside, the scheduler's bookkeeping is restored on the
/// way out: a held task is released, the client count is decremented.
pub(crate) async fn handle_session(stream: TcpStream, sched: mpsc::Sender<SchedMsg>) {
	let peer = stream.peer_addr().map(|a| a.to_string()).unwrap_or_else(|_| "?".to_string());
	if sched.send(SchedMsg::Connected).await.is_err() {
		// scheduler already shut down; the listener is closing too
		return;
	}
	let (mut reader, mut writer) = stream.into_split();
	let mut holding = None;
	match drive(&mut reader, &mut writer, &sched, &mut holding).await {
		Ok(()) => debug!(%peer, "session closed"),
		Err(error) => warn!(%peer, %error, "closing session"),
	}
	if let Some(id) = holding {
		debug!(%peer, task = id, "implicit release on disconnect");
		let _ = sched.send(SchedMsg::Done(id)).await;
	}
	let _ = sched.send(SchedMsg::Disconnected).await;
}

async fn drive(
	reader: &mut OwnedReadHalf,
	writer: &mut OwnedWriteHalf,
	sched: &mpsc::Sender<SchedMsg>,
	holding: &mut Option<u64>,
) -> Result<()> {
	match read_frame(reader).await? {
		Some(Message::Start) => {}
		// connected and left without a word
		None => return Ok(()),
		Some(other) => {
			return Err(Error::Protocol {
				expected: "start",
				got: other.kind(),
			});
		}
	}
	loop {
		let Some(msg) = read_frame(reader).await? else {
			// disconnect; the caller releases whatever we hold
			return Ok(());
		};
		match msg {
			Message::Acquire {
				job,
			} if holding.is_none() => {
				let (reply_tx, reply_rx) = oneshot::channel();
				let register = SchedMsg::Register {
					job,
					reply: reply_tx,
				};
				sched.send(register).await.map_err(|_| Error::SchedulerGone)?;
				let Registered {
					id,
					ready,
				} = reply_rx.await.map_err(|_| Error::SchedulerGone)?;
				// AWAITING_GO. Nothing legal arrives from the client here,
				// but a disconnect must unqueue the task.
				tokio::select! {
					biased;
					verdict = ready => match verdict {
						Ok(Admission::Go) => {
							// mark before writing: if the write fails, the
							// cleanup path must release the grant
							*holding = Some(id);
							write_frame(writer, &Message::Go).await?;
						}
						Ok(Admission::Reject) => {
							write_frame(writer, &Message::Reject).await?;
						}
						Err(_) => return Err(Error::SchedulerGone),
					},
					frame = read_frame(reader) => {
						let _ = sched.send(SchedMsg::Cancel(id)).await;
						return match frame? {
							None => Ok(()),
							Some(other) => Err(Error::Protocol {
								expected: "nothing while awaiting go",
								got: other.kind(),
							}),
						};
					}
				}
			}
			Message::Release if holding.is_some() => {
				if let Some(id) = holding.take() {
					sched.send(SchedMsg::Done(id)).await.map_err(|_| Error::SchedulerGone)?;
				}
			}
			Message::Status if holding.is_none() => {
				let (tx, rx) = oneshot::channel();
				sched.send(SchedMsg::Status(tx)).await.map_err(|_| Error::SchedulerGone)?;
				let view = rx.await.map_err(|_| Error::SchedulerGone)?;
				let answer = Message::StatusAnswer {
					max_cores: view.max_cores,
					running: view.running,
					waiting: view.waiting,
				};
				write_frame(writer, &answer).await?;
			}
			Message::StopAccepting if holding.is_none() => {
				sched.send(SchedMsg::StopAccepting).await.map_err(|_| Error::SchedulerGone)?;
			}
			Message::End if holding.is_none() => return Ok(()),
			other => {
				return Err(Error::Protocol {
					expected: if holding.is_some() {
						"release"
					} else {
						"acquire, status, stop_accepting or end"
					},
					got: other.kind(),
				});
			}
		}
	}
}
