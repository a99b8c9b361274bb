//! One encrypted MTProto connection to a single DC.
//!
//! A [`Connection`] generates a fresh auth key on open (plaintext DH over
//! abridged framing) and then carries one RPC at a time: pack, send, read
//! frames until the matching result arrives.

use std::io::Read;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use layer_mtproto::{EncryptedSession, Session, authentication as auth};
use layer_tl_types as tl;
use layer_tl_types::{Cursor, Deserializable, RemoteCall, Serializable};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

use crate::errors::{InvocationError, RpcError};
use crate::socks5::{Socks5Config, open_tcp};
use crate::transport::{ABRIDGED_INIT, recv_abridged, send_abridged};

// ─── MTProto envelope constructor IDs ────────────────────────────────────────

const ID_RPC_RESULT:       u32 = 0xf35c6d01;
const ID_RPC_ERROR:        u32 = 0x2144ca19;
const ID_MSG_CONTAINER:    u32 = 0x73f1f8dc;
const ID_GZIP_PACKED:      u32 = 0x3072cfa1;
const ID_PONG:             u32 = 0x347773c5;
const ID_MSGS_ACK:         u32 = 0x62d6b459;
const ID_BAD_SERVER_SALT:  u32 = 0xedab447b;
const ID_NEW_SESSION:      u32 = 0x9ec20908;
const ID_BAD_MSG_NOTIFY:   u32 = 0xa7eff811;
const ID_UPDATES:          u32 = 0x74ae4240;
const ID_UPDATE_SHORT:     u32 = 0x78d4dec1;
const ID_UPDATES_COMBINED: u32 = 0x725b04c3;
const ID_UPDATES_TOO_LONG: u32 = 0xe317af7e;
const ID_UPDATE_SHORT_MSG: u32 = 0x313bc7f8;
const ID_UPDATE_SHORT_CHAT_MSG: u32 = 0x4d6deea5;

const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(15);
const RPC_TIMEOUT:       Duration = Duration::from_secs(10);
/// Resends allowed after the server corrects our salt or clock.
const MAX_RESENDS: usize = 3;

pub(crate) struct Connection {
    stream: TcpStream,
    enc:    EncryptedSession,
    dc_id:  i32,
    addr:   String,
}

impl Connection {
    /// Open a TCP stream to `addr` and generate a brand-new auth key.
    pub(crate) async fn connect(
        dc_id:  i32,
        addr:   &str,
        socks5: Option<&Socks5Config>,
    ) -> Result<Self, InvocationError> {
        tracing::info!("[layer-login] Connecting to DC{dc_id} ({addr}) …");
        let fut = Self::handshake(dc_id, addr, socks5);
        tokio::time::timeout(HANDSHAKE_TIMEOUT, fut)
            .await
            .map_err(|_| InvocationError::Timeout("auth key handshake"))?
    }

    async fn handshake(
        dc_id:  i32,
        addr:   &str,
        socks5: Option<&Socks5Config>,
    ) -> Result<Self, InvocationError> {
        let mut stream = open_tcp(addr, socks5).await?;
        stream.write_all(&[ABRIDGED_INIT]).await?;

        let mut plain = Session::new();
        let step_err = |e: auth::Error| InvocationError::Handshake(e.to_string());

        let (req1, s1) = auth::step1().map_err(step_err)?;
        send_abridged(&mut stream, &plain.pack(&req1).to_plaintext_bytes()).await?;
        let res_pq: tl::enums::ResPq = recv_plain(&mut stream).await?;

        let (req2, s2) = auth::step2(s1, res_pq).map_err(step_err)?;
        send_abridged(&mut stream, &plain.pack(&req2).to_plaintext_bytes()).await?;
        let dh: tl::enums::ServerDhParams = recv_plain(&mut stream).await?;

        let (req3, s3) = auth::step3(s2, dh).map_err(step_err)?;
        send_abridged(&mut stream, &plain.pack(&req3).to_plaintext_bytes()).await?;
        let answer: tl::enums::SetClientDhParamsAnswer = recv_plain(&mut stream).await?;

        let done = auth::finish(s3, answer).map_err(step_err)?;
        tracing::info!("[layer-login] DH complete on DC{dc_id} ✓");

        Ok(Self {
            stream,
            enc: EncryptedSession::new(done.auth_key, done.first_salt, done.time_offset),
            dc_id,
            addr: addr.to_string(),
        })
    }

    pub(crate) fn dc_id(&self) -> i32 { self.dc_id }

    pub(crate) fn addr(&self) -> &str { &self.addr }

    pub(crate) fn auth_key(&self) -> [u8; 256] { self.enc.auth_key_bytes() }

    /// Invoke a typed RPC and deserialize its result.
    pub(crate) async fn invoke<R: RemoteCall>(&mut self, req: &R) -> Result<R::Return, InvocationError> {
        let body = self.call(req).await?;
        let mut cur = Cursor::from_slice(&body);
        Ok(R::Return::deserialize(&mut cur)?)
    }

    /// Invoke any serializable request (e.g. `invokeWithLayer` wrappers) and
    /// return the raw result bytes.
    pub(crate) async fn call<S: Serializable>(&mut self, req: &S) -> Result<Vec<u8>, InvocationError> {
        for attempt in 0..=MAX_RESENDS {
            let wire = self.enc.pack_serializable(req);
            send_abridged(&mut self.stream, &wire).await?;

            let reply = tokio::time::timeout(RPC_TIMEOUT, self.recv_reply())
                .await
                .map_err(|_| InvocationError::Timeout("rpc call"))??;

            match reply {
                Reply::Payload(body) => return Ok(body),
                Reply::Resend => {
                    tracing::debug!("[layer-login] resending request (attempt {})", attempt + 1);
                }
            }
        }
        Err(InvocationError::Unexpected(format!(
            "server kept rejecting the request after {MAX_RESENDS} resends"
        )))
    }

    async fn recv_reply(&mut self) -> Result<Reply, InvocationError> {
        loop {
            let mut raw = recv_abridged(&mut self.stream).await?;
            let msg = self.enc.unpack(&mut raw)
                .map_err(|e| InvocationError::Deserialize(e.to_string()))?;

            match unwrap_envelope(msg.body)? {
                Envelope::Payload(body) => return Ok(Reply::Payload(body)),
                Envelope::BadSalt(salt) => {
                    tracing::debug!("[layer-login] bad_server_salt, adopting {salt}");
                    self.enc.salt = salt;
                    return Ok(Reply::Resend);
                }
                Envelope::BadTime => {
                    let offset = clock_offset(msg.msg_id);
                    tracing::debug!("[layer-login] clock skew, time_offset = {offset}s");
                    self.enc.time_offset = offset;
                    return Ok(Reply::Resend);
                }
                Envelope::Ignored => {}
            }
        }
    }

    pub(crate) async fn shutdown(&mut self) {
        let _ = self.stream.shutdown().await;
    }
}

enum Reply {
    Payload(Vec<u8>),
    Resend,
}

/// Seconds between the server clock (taken from a server `msg_id`) and ours.
fn clock_offset(server_msg_id: i64) -> i32 {
    let server = server_msg_id >> 32;
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(server);
    (server - now) as i32
}

/// Receive a plaintext (pre-auth) frame and deserialize its body.
async fn recv_plain<T: Deserializable>(stream: &mut TcpStream) -> Result<T, InvocationError> {
    let raw = recv_abridged(stream).await?;
    let body = plaintext_body(&raw)?;
    let mut cur = Cursor::from_slice(body);
    Ok(T::deserialize(&mut cur)?)
}

fn plaintext_body(frame: &[u8]) -> Result<&[u8], InvocationError> {
    if frame.len() < 20 {
        return Err(InvocationError::Deserialize("plaintext frame too short".into()));
    }
    if frame[..8] != [0u8; 8] {
        return Err(InvocationError::Deserialize("expected auth_key_id=0 in plaintext".into()));
    }
    let len = read_u32(frame, 16) as usize;
    frame.get(20..20 + len)
        .ok_or_else(|| InvocationError::Deserialize("truncated plaintext body".into()))
}

// ─── MTProto envelope ─────────────────────────────────────────────────────────

#[derive(Debug, PartialEq)]
enum Envelope {
    Payload(Vec<u8>),
    /// `bad_server_salt`: resend with this salt.
    BadSalt(i64),
    /// `bad_msg_notify` 16/17: our msg_id clock is off.
    BadTime,
    /// Service message or update frame with nothing for the pending call.
    Ignored,
}

fn read_u32(buf: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]])
}

/// Classify one top-level frame (or container item).
///
/// Only the contents of an `rpc_result` answer the pending call; any other
/// constructor is a service message or an update and is skipped.
fn unwrap_envelope(body: Vec<u8>) -> Result<Envelope, InvocationError> {
    if body.len() < 4 {
        return Err(InvocationError::Deserialize("body < 4 bytes".into()));
    }

    match read_u32(&body, 0) {
        ID_RPC_RESULT => {
            // rpc_result req_msg_id:long result:Object
            if body.len() < 12 {
                return Err(InvocationError::Deserialize("rpc_result too short".into()));
            }
            rpc_result_body(body[12..].to_vec())
        }
        ID_MSG_CONTAINER => {
            if body.len() < 8 {
                return Err(InvocationError::Deserialize("container too short".into()));
            }
            let count = read_u32(&body, 4) as usize;
            let mut pos = 8usize;
            let mut found = Envelope::Ignored;
            // msg_id:long seqno:int bytes:int body
            for _ in 0..count {
                if pos + 16 > body.len() { break; }
                let len = read_u32(&body, pos + 12) as usize;
                pos += 16;
                if pos + len > body.len() { break; }
                let inner = unwrap_envelope(body[pos..pos + len].to_vec())?;
                pos += len;
                found = match (found, inner) {
                    (Envelope::Payload(p), _) | (_, Envelope::Payload(p)) => Envelope::Payload(p),
                    (Envelope::Ignored, other) => other,
                    (kept, _) => kept,
                };
            }
            Ok(found)
        }
        ID_GZIP_PACKED => {
            let packed = Vec::<u8>::deserialize(&mut Cursor::from_slice(&body[4..]))?;
            unwrap_envelope(gz_inflate(&packed)?)
        }
        ID_BAD_SERVER_SALT => {
            // bad_msg_id:long bad_msg_seqno:int error_code:int new_server_salt:long
            if body.len() < 28 {
                return Err(InvocationError::Deserialize("bad_server_salt too short".into()));
            }
            let mut salt = [0u8; 8];
            salt.copy_from_slice(&body[20..28]);
            Ok(Envelope::BadSalt(i64::from_le_bytes(salt)))
        }
        ID_BAD_MSG_NOTIFY => {
            // bad_msg_id:long bad_msg_seqno:int error_code:int
            if body.len() < 20 {
                return Err(InvocationError::Deserialize("bad_msg_notify too short".into()));
            }
            match read_u32(&body, 16) as i32 {
                16 | 17 => Ok(Envelope::BadTime),
                code    => Err(InvocationError::Unexpected(format!("bad_msg_notify code {code}"))),
            }
        }
        ID_PONG | ID_MSGS_ACK | ID_NEW_SESSION
        | ID_UPDATES | ID_UPDATE_SHORT | ID_UPDATES_COMBINED | ID_UPDATES_TOO_LONG
        | ID_UPDATE_SHORT_MSG | ID_UPDATE_SHORT_CHAT_MSG => Ok(Envelope::Ignored),
        other => {
            tracing::debug!("[layer-login] skipping unsolicited frame {other:#010x}");
            Ok(Envelope::Ignored)
        }
    }
}

/// The `result` field of an `rpc_result`: an error, a compressed result or
/// the answer itself.
fn rpc_result_body(result: Vec<u8>) -> Result<Envelope, InvocationError> {
    if result.len() < 4 {
        return Err(InvocationError::Deserialize("rpc_result body < 4 bytes".into()));
    }
    match read_u32(&result, 0) {
        ID_RPC_ERROR => {
            if result.len() < 8 {
                return Err(InvocationError::Deserialize("rpc_error too short".into()));
            }
            let code = read_u32(&result, 4) as i32;
            let message = String::deserialize(&mut Cursor::from_slice(&result[8..]))?;
            Err(RpcError::from_telegram(code, &message).into())
        }
        ID_GZIP_PACKED => {
            let packed = Vec::<u8>::deserialize(&mut Cursor::from_slice(&result[4..]))?;
            rpc_result_body(gz_inflate(&packed)?)
        }
        _ => Ok(Envelope::Payload(result)),
    }
}

fn gz_inflate(data: &[u8]) -> Result<Vec<u8>, InvocationError> {
    let mut out = Vec::new();
    if flate2::read::GzDecoder::new(data).read_to_end(&mut out).is_ok() && !out.is_empty() {
        return Ok(out);
    }
    out.clear();
    flate2::read::ZlibDecoder::new(data)
        .read_to_end(&mut out)
        .map_err(|_| InvocationError::Deserialize("decompression failed".into()))?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn tl_string(s: &str) -> Vec<u8> {
        s.to_string().to_bytes()
    }

    fn rpc_result(payload: &[u8]) -> Vec<u8> {
        let mut b = ID_RPC_RESULT.to_le_bytes().to_vec();
        b.extend(0x1122_3344_5566_7788i64.to_le_bytes());
        b.extend_from_slice(payload);
        b
    }

    fn container(items: &[Vec<u8>]) -> Vec<u8> {
        let mut b = ID_MSG_CONTAINER.to_le_bytes().to_vec();
        b.extend((items.len() as u32).to_le_bytes());
        for (i, item) in items.iter().enumerate() {
            b.extend((i as i64).to_le_bytes());
            b.extend(1i32.to_le_bytes());
            b.extend((item.len() as u32).to_le_bytes());
            b.extend_from_slice(item);
        }
        b
    }

    #[test]
    fn rpc_result_payload_is_unwrapped() {
        let payload = vec![0xde, 0xad, 0xbe, 0xef, 1, 2, 3, 4];
        assert_eq!(unwrap_envelope(rpc_result(&payload)).unwrap(), Envelope::Payload(payload));
    }

    #[test]
    fn rpc_error_becomes_rpc_error() {
        let mut err = ID_RPC_ERROR.to_le_bytes().to_vec();
        err.extend(420i32.to_le_bytes());
        err.extend(tl_string("FLOOD_WAIT_42"));
        match unwrap_envelope(rpc_result(&err)) {
            Err(InvocationError::Rpc(e)) => {
                assert_eq!(e.code, 420);
                assert_eq!(e.name, "FLOOD_WAIT");
                assert_eq!(e.flood_wait_seconds(), Some(42));
            }
            other => panic!("expected rpc error, got {other:?}"),
        }
    }

    #[test]
    fn container_prefers_payload_over_service_messages() {
        let ack = {
            let mut b = ID_MSGS_ACK.to_le_bytes().to_vec();
            b.extend([0u8; 8]);
            b
        };
        let payload = vec![9, 9, 9, 9];
        let body = container(&[ack, rpc_result(&payload)]);
        assert_eq!(unwrap_envelope(body).unwrap(), Envelope::Payload(payload));
    }

    #[test]
    fn bad_server_salt_carries_new_salt() {
        let mut b = ID_BAD_SERVER_SALT.to_le_bytes().to_vec();
        b.extend(1i64.to_le_bytes());
        b.extend(3i32.to_le_bytes());
        b.extend(48i32.to_le_bytes());
        b.extend(0x0102_0304_0506_0708i64.to_le_bytes());
        assert_eq!(unwrap_envelope(b).unwrap(), Envelope::BadSalt(0x0102_0304_0506_0708));
    }

    #[test]
    fn bad_msg_notify_time_codes_request_resend() {
        for (code, want_resend) in [(16i32, true), (17, true), (35, false)] {
            let mut b = ID_BAD_MSG_NOTIFY.to_le_bytes().to_vec();
            b.extend(1i64.to_le_bytes());
            b.extend(3i32.to_le_bytes());
            b.extend(code.to_le_bytes());
            let got = unwrap_envelope(b);
            assert_eq!(matches!(got, Ok(Envelope::BadTime)), want_resend, "code {code}");
        }
    }

    #[test]
    fn gzip_packed_is_inflated() {
        let payload = vec![0x15, 0xc4, 0xb5, 0x1c, 0, 0, 0, 0];
        let mut gz = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        gz.write_all(&payload).unwrap();
        let packed = gz.finish().unwrap();

        let mut b = ID_GZIP_PACKED.to_le_bytes().to_vec();
        b.extend(packed.to_bytes());
        assert_eq!(unwrap_envelope(rpc_result(&b)).unwrap(), Envelope::Payload(payload));
    }

    fn update_short_message() -> Vec<u8> {
        let mut b = ID_UPDATE_SHORT_MSG.to_le_bytes().to_vec();
        b.extend(0i32.to_le_bytes()); // flags
        b.extend(77i32.to_le_bytes()); // id
        b.extend(12345i64.to_le_bytes()); // user_id
        b.extend(tl_string("New login from an unknown device"));
        b
    }

    #[test]
    fn updates_are_ignored() {
        let b = ID_UPDATES_TOO_LONG.to_le_bytes().to_vec();
        assert_eq!(unwrap_envelope(b).unwrap(), Envelope::Ignored);
        assert_eq!(unwrap_envelope(update_short_message()).unwrap(), Envelope::Ignored);

        let mut chat = ID_UPDATE_SHORT_CHAT_MSG.to_le_bytes().to_vec();
        chat.extend([0u8; 16]);
        assert_eq!(unwrap_envelope(chat).unwrap(), Envelope::Ignored);
    }

    #[test]
    fn update_ahead_of_result_does_not_replace_it() {
        let body = container(&[update_short_message(), rpc_result(&[1, 2, 3, 4])]);
        assert_eq!(unwrap_envelope(body).unwrap(), Envelope::Payload(vec![1, 2, 3, 4]));
    }

    #[test]
    fn unknown_top_level_frame_is_not_an_answer() {
        let b = vec![0x44, 0x33, 0x22, 0x11, 0, 0, 0, 0];
        assert_eq!(unwrap_envelope(b).unwrap(), Envelope::Ignored);
    }

    #[test]
    fn plaintext_body_checks() {
        let mut f = vec![0u8; 24];
        f[16..20].copy_from_slice(&4u32.to_le_bytes());
        f[20..24].copy_from_slice(&[1, 2, 3, 4]);
        assert_eq!(plaintext_body(&f).unwrap(), &[1, 2, 3, 4]);

        assert!(plaintext_body(&[0u8; 10]).is_err());

        let mut enc = f.clone();
        enc[0] = 1;
        assert!(plaintext_body(&enc).is_err());

        f[16..20].copy_from_slice(&40u32.to_le_bytes());
        assert!(plaintext_body(&f).is_err());
    }

    #[test]
    fn clock_offset_reads_server_seconds() {
        let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs() as i64;
        let server_msg_id = (now + 100) << 32;
        let off = clock_offset(server_msg_id);
        assert!((99..=101).contains(&off), "offset {off}");
    }
}
