use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::Error;

/// Upper bound on a declared frame body. Anything larger is treated as a
/// protocol violation without reading a single body byte.
pub const MAX_FRAME_BYTES: u32 = 100 * 1024 * 1024;

/// How long a receive may take end to end (prefix + body + parse).
pub const RECV_TIMEOUT: Duration = Duration::from_secs(10);

/// Serializes `msg` to JSON and writes it as one length-prefixed frame.
///
/// Prefix and body go out in a single `write_all` so a concurrent writer on a
/// shared stream can never interleave between them. Failures are reported to
/// the caller and never retried here.
pub async fn send_message<W, T>(conn: &mut W, msg: &T) -> Result<(), Error>
where
    W: AsyncWrite + Unpin,
    T: Serialize + ?Sized,
{
    let body = serde_json::to_vec(msg)?;

    let mut frame = Vec::with_capacity(4 + body.len());
    frame.extend_from_slice(&(body.len() as u32).to_be_bytes());
    frame.extend_from_slice(&body);

    conn.write_all(&frame).await?;
    Ok(())
}

/// Reads one length-prefixed frame and decodes it as `T`.
///
/// Returns `Ok(None)` on a clean peer close (zero bytes before the prefix).
/// A partial prefix, an oversized length, a truncated body, or a payload that
/// fails to parse are all protocol errors; the caller is expected to drop the
/// connection. The whole read is bounded by [`RECV_TIMEOUT`].
pub async fn recv_message<R, T>(conn: &mut R) -> Result<Option<T>, Error>
where
    R: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    match tokio::time::timeout(RECV_TIMEOUT, recv_inner(conn)).await {
        Ok(result) => result,
        Err(_) => Err(Error::timed_out()),
    }
}

async fn recv_inner<R, T>(conn: &mut R) -> Result<Option<T>, Error>
where
    R: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    let mut prefix = [0u8; 4];
    let mut filled = 0;

    // Filled byte by byte rather than read_exact: zero bytes on the first
    // read is a clean close, fewer than four afterwards is a torn prefix.
    while filled < prefix.len() {
        let n = conn.read(&mut prefix[filled..]).await?;
        if n == 0 {
            if filled == 0 {
                return Ok(None);
            }
            return Err(Error::Protocol(format!(
                "incomplete length prefix ({} of 4 bytes)",
                filled
            )));
        }
        filled += n;
    }

    let declared = u32::from_be_bytes(prefix);
    if declared > MAX_FRAME_BYTES {
        return Err(Error::Protocol(format!(
            "frame of {} bytes exceeds the {} byte limit",
            declared, MAX_FRAME_BYTES
        )));
    }

    let mut body = vec![0u8; declared as usize];
    conn.read_exact(&mut body)
        .await
        .map_err(|e| Error::Protocol(format!("connection closed mid-frame: {}", e)))?;

    let msg = serde_json::from_slice(&body)?;
    Ok(Some(msg))
}
