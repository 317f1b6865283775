// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (c) 2025 Corral

use std::io::ErrorKind;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::{Error, Message, Result};

/// Upper bound on a single frame; larger ones are rejected as malformed.
pub const MAX_FRAME: usize = 1 << 20;

/// Write one message as a `u32` big-endian length followed by JSON bytes.
pub async fn write_frame<W>(writer: &mut W, message: &Message) -> Result<()>
where
	W: AsyncWrite + Unpin,
{
	let body = serde_json::to_vec(message)?;
	if body.len() > MAX_FRAME {
		return Err(Error::Oversized {
			len: body.len(),
		});
	}
	writer.write_u32(body.len() as u32).await?;
	writer.write_all(&body).await?;
	writer.flush().await?;
	Ok(())
}

/// Read one message; `Ok(None)` when the peer closed the stream at a frame
/// boundary. EOF in the middle of a frame is an error.
pub async fn read_frame<R>(reader: &mut R) -> Result<Option<Message>>
where
	R: AsyncRead + Unpin,
{
	let len = match reader.read_u32().await {
		Ok(len) => len as usize,
		Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Ok(None),
		Err(e) => return Err(e.into()),
	};
	if len > MAX_FRAME {
		return Err(Error::Oversized {
			len,
		});
	}
	let mut body = vec![0u8; len];
	reader.read_exact(&mut body).await?;
	Ok(Some(serde_json::from_slice(&body)?))
}
