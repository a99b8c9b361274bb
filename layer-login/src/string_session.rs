//! Portable string sessions.
//!
//! A string session packs everything needed to resume an authorized
//! connection (home DC, its address, the 2048-bit auth key) into one line of
//! text. The layout is the one Telethon's `StringSession` uses, so the
//! output can be pasted straight into tools built on it:
//!
//! ```text
//! '1' + urlsafe_base64( dc_id:u8 | ip:4 or 16 bytes | port:u16 BE | auth_key:256 )
//! ```

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE;

/// Format version prefix.
pub const CURRENT_VERSION: char = '1';

const AUTH_KEY_LEN: usize = 256;
const V4_LEN: usize = 1 + 4 + 2 + AUTH_KEY_LEN;
const V6_LEN: usize = 1 + 16 + 2 + AUTH_KEY_LEN;

/// Why a string could not be decoded.
#[derive(Debug, PartialEq)]
pub enum StringSessionError {
    Empty,
    UnsupportedVersion(char),
    Base64(String),
    /// Decoded payload had a length matching neither IPv4 nor IPv6 layout.
    Length(usize),
}

impl fmt::Display for StringSessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty                 => write!(f, "empty session string"),
            Self::UnsupportedVersion(v) => write!(f, "unsupported session string version {v:?}"),
            Self::Base64(e)             => write!(f, "invalid base64: {e}"),
            Self::Length(n)             => write!(f, "unexpected session payload length {n}"),
        }
    }
}

impl std::error::Error for StringSessionError {}

/// An authorized session that can be serialized to a single line.
#[derive(Clone, PartialEq)]
pub struct StringSession {
    pub dc_id:    u8,
    pub addr:     SocketAddr,
    pub auth_key: [u8; AUTH_KEY_LEN],
}

impl fmt::Debug for StringSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Never print the key itself.
        f.debug_struct("StringSession")
            .field("dc_id", &self.dc_id)
            .field("addr", &self.addr)
            .field("auth_key", &format_args!("[{} bytes]", AUTH_KEY_LEN))
            .finish()
    }
}

impl StringSession {
    pub fn encode(&self) -> String {
        let mut buf = Vec::with_capacity(V6_LEN);
        buf.push(self.dc_id);
        match self.addr.ip() {
            IpAddr::V4(ip) => buf.extend_from_slice(&ip.octets()),
            IpAddr::V6(ip) => buf.extend_from_slice(&ip.octets()),
        }
        buf.extend_from_slice(&self.addr.port().to_be_bytes());
        buf.extend_from_slice(&self.auth_key);

        let mut out = String::with_capacity(1 + buf.len() * 4 / 3 + 4);
        out.push(CURRENT_VERSION);
        URL_SAFE.encode_string(&buf, &mut out);
        out
    }

    pub fn decode(s: &str) -> Result<Self, StringSessionError> {
        let s = s.trim();
        let mut chars = s.chars();
        let version = chars.next().ok_or(StringSessionError::Empty)?;
        if version != CURRENT_VERSION {
            return Err(StringSessionError::UnsupportedVersion(version));
        }

        let raw = URL_SAFE
            .decode(chars.as_str())
            .map_err(|e| StringSessionError::Base64(e.to_string()))?;

        let ip_len = match raw.len() {
            V4_LEN => 4,
            V6_LEN => 16,
            n      => return Err(StringSessionError::Length(n)),
        };

        let dc_id = raw[0];
        let ip_bytes = &raw[1..1 + ip_len];
        let ip = if ip_len == 4 {
            let mut o = [0u8; 4];
            o.copy_from_slice(ip_bytes);
            IpAddr::V4(Ipv4Addr::from(o))
        } else {
            let mut o = [0u8; 16];
            o.copy_from_slice(ip_bytes);
            IpAddr::V6(Ipv6Addr::from(o))
        };
        let port = u16::from_be_bytes([raw[1 + ip_len], raw[2 + ip_len]]);
        let mut auth_key = [0u8; AUTH_KEY_LEN];
        auth_key.copy_from_slice(&raw[3 + ip_len..]);

        Ok(Self { dc_id, addr: SocketAddr::new(ip, port), auth_key })
    }
}

impl fmt::Display for StringSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl std::str::FromStr for StringSession {
    type Err = StringSessionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::decode(s)
    }
}
