//! Async MTProto [abridged] framing over any tokio byte stream.
//!
//! `0xef` is written once when the stream opens; every packet is then
//! prefixed with its length in 4-byte words, as one byte when `< 0x7f` or as
//! `0x7f` followed by three little-endian bytes.
//!
//! [abridged]: https://core.telegram.org/mtproto/mtproto-transports#abridged

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::errors::InvocationError;

/// Transport init byte announcing abridged framing.
pub(crate) const ABRIDGED_INIT: u8 = 0xef;

/// Largest packet accepted from the server, in words (128 KiB).
const MAX_WORDS: usize = 0x8000;

/// Length prefix for a payload of `len` bytes.
pub(crate) fn abridged_header(len: usize) -> Vec<u8> {
    let words = len / 4;
    if words < 0x7f {
        vec![words as u8]
    } else {
        vec![
            0x7f,
            (words & 0xff) as u8,
            ((words >> 8) & 0xff) as u8,
            ((words >> 16) & 0xff) as u8,
        ]
    }
}

pub(crate) async fn send_abridged<W>(stream: &mut W, data: &[u8]) -> Result<(), InvocationError>
where
    W: AsyncWrite + Unpin,
{
    stream.write_all(&abridged_header(data.len())).await?;
    stream.write_all(data).await?;
    stream.flush().await?;
    Ok(())
}

pub(crate) async fn recv_abridged<R>(stream: &mut R) -> Result<Vec<u8>, InvocationError>
where
    R: AsyncRead + Unpin,
{
    let mut h = [0u8; 1];
    stream.read_exact(&mut h).await?;
    let words = if h[0] < 0x7f {
        h[0] as usize
    } else {
        let mut b = [0u8; 3];
        stream.read_exact(&mut b).await?;
        b[0] as usize | (b[1] as usize) << 8 | (b[2] as usize) << 16
    };
    if words == 0 || words > MAX_WORDS {
        return Err(InvocationError::Deserialize(format!(
            "abridged: implausible word count {words} (framing mismatch?)"
        )));
    }

    let mut buf = vec![0u8; words * 4];
    stream.read_exact(&mut buf).await?;

    // A lone negative int32 is a transport-level error (-404, -429, …).
    if words == 1 {
        let code = i32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]);
        if code < 0 {
            return Err(InvocationError::Transport(code));
        }
    }
    Ok(buf)
}
