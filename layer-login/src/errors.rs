//! Error types for layer-login.
//!
//! Every fallible [`crate::Client`] call returns one of these so the caller
//! can decide how to explain the failure to a human.

use std::{fmt, io};

use layer_tl_types as tl;

use crate::sent_code::{CodeDelivery, NextDelivery};

// ─── RpcError ─────────────────────────────────────────────────────────────────

/// An error returned by Telegram's servers in response to an RPC call.
///
/// Numeric values are stripped from the name and placed in [`RpcError::value`].
///
/// # Example
/// `FLOOD_WAIT_30` → `RpcError { code: 420, name: "FLOOD_WAIT", value: Some(30) }`
#[derive(Clone, Debug, PartialEq)]
pub struct RpcError {
    /// HTTP-like status code.
    pub code: i32,
    /// Error name in SCREAMING_SNAKE_CASE with the numeric suffix removed.
    pub name: String,
    /// Numeric suffix extracted from the name, if any.
    pub value: Option<u32>,
}

impl fmt::Display for RpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RPC {}: {}", self.code, self.name)?;
        if let Some(v) = self.value {
            write!(f, " (value: {v})")?;
        }
        Ok(())
    }
}

impl std::error::Error for RpcError {}

impl RpcError {
    /// Parse a raw Telegram error message like `"FLOOD_WAIT_30"` into an `RpcError`.
    pub fn from_telegram(code: i32, message: &str) -> Self {
        let split = message.rsplit_once('_').and_then(|(name, tail)| {
            if tail.is_empty() || !tail.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            tail.parse::<u32>().ok().map(|v| (name, v))
        });
        match split {
            Some((name, v)) => Self { code, name: name.to_string(), value: Some(v) },
            None            => Self { code, name: message.to_string(), value: None },
        }
    }

    /// Match on the error name, with optional wildcard prefix/suffix `'*'`.
    ///
    /// - `err.is("FLOOD_WAIT")`: exact match
    /// - `err.is("PHONE_CODE_*")`: starts-with match
    /// - `err.is("*_MIGRATE")`: ends-with match
    pub fn is(&self, pattern: &str) -> bool {
        if let Some(prefix) = pattern.strip_suffix('*') {
            self.name.starts_with(prefix)
        } else if let Some(suffix) = pattern.strip_prefix('*') {
            self.name.ends_with(suffix)
        } else {
            self.name == pattern
        }
    }

    /// Seconds to wait for `FLOOD_WAIT_X` and `FLOOD_PREMIUM_WAIT_X`.
    pub fn flood_wait_seconds(&self) -> Option<u64> {
        if self.code == 420 && (self.name == "FLOOD_WAIT" || self.name == "FLOOD_PREMIUM_WAIT") {
            self.value.map(u64::from)
        } else {
            None
        }
    }

    /// Target DC for `PHONE_MIGRATE_X`, `NETWORK_MIGRATE_X` and `USER_MIGRATE_X`.
    pub fn migrate_dc(&self) -> Option<i32> {
        if self.code == 303 && self.is("*_MIGRATE") {
            self.value.map(|v| v as i32)
        } else {
            None
        }
    }
}

// ─── InvocationError ──────────────────────────────────────────────────────────

/// The error type returned from any `Client` method that talks to Telegram.
#[derive(Debug)]
pub enum InvocationError {
    /// Telegram rejected the request.
    Rpc(RpcError),
    /// Network / I/O failure.
    Io(io::Error),
    /// The server closed the transport with a raw error code (`-404`, `-429`, …).
    Transport(i32),
    /// Response deserialization failed.
    Deserialize(String),
    /// Auth-key generation failed.
    Handshake(String),
    /// No answer within the allotted time.
    Timeout(&'static str),
    /// Telegram answered with something this client cannot continue from.
    Unexpected(String),
}

impl fmt::Display for InvocationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rpc(e)         => write!(f, "{e}"),
            Self::Io(e)          => write!(f, "I/O error: {e}"),
            Self::Transport(c)   => write!(f, "transport error {c}"),
            Self::Deserialize(s) => write!(f, "deserialize error: {s}"),
            Self::Handshake(s)   => write!(f, "auth key handshake failed: {s}"),
            Self::Timeout(what)  => write!(f, "{what} timed out"),
            Self::Unexpected(s)  => write!(f, "unexpected response: {s}"),
        }
    }
}

impl std::error::Error for InvocationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Rpc(e) => Some(e),
            Self::Io(e)  => Some(e),
            _            => None,
        }
    }
}

impl From<io::Error> for InvocationError {
    fn from(e: io::Error) -> Self { Self::Io(e) }
}

impl From<RpcError> for InvocationError {
    fn from(e: RpcError) -> Self { Self::Rpc(e) }
}

impl From<tl::deserialize::Error> for InvocationError {
    fn from(e: tl::deserialize::Error) -> Self { Self::Deserialize(e.to_string()) }
}

impl InvocationError {
    /// Returns `true` if this is the named RPC error (supports `'*'` wildcards).
    pub fn is(&self, pattern: &str) -> bool {
        match self {
            Self::Rpc(e) => e.is(pattern),
            _            => false,
        }
    }

    /// The wrapped RPC error, if Telegram produced one.
    pub fn rpc(&self) -> Option<&RpcError> {
        match self {
            Self::Rpc(e) => Some(e),
            _            => None,
        }
    }

    /// If this is a flood-wait error, returns how many seconds to wait.
    pub fn flood_wait_seconds(&self) -> Option<u64> {
        self.rpc().and_then(RpcError::flood_wait_seconds)
    }
}

// ─── SignInError ──────────────────────────────────────────────────────────────

/// Errors returned by [`crate::Client::sign_in`].
#[derive(Debug)]
pub enum SignInError {
    /// The phone number is new; an account must be created in an official app first.
    SignUpRequired,
    /// 2FA is enabled; pass the token to [`crate::Client::check_password`].
    PasswordRequired(PasswordToken),
    /// The code was rejected (`PHONE_CODE_INVALID`, `PHONE_CODE_EXPIRED`, …).
    InvalidCode(RpcError),
    /// Any other error.
    Other(InvocationError),
}

impl fmt::Display for SignInError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SignUpRequired      => write!(f, "sign up required"),
            Self::PasswordRequired(_) => write!(f, "2FA password required"),
            Self::InvalidCode(e)      => write!(f, "code rejected: {}", e.name),
            Self::Other(e)            => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for SignInError {}

impl From<InvocationError> for SignInError {
    fn from(e: InvocationError) -> Self { Self::Other(e) }
}

// ─── PasswordToken ────────────────────────────────────────────────────────────

/// Opaque 2FA challenge returned in [`SignInError::PasswordRequired`].
pub struct PasswordToken {
    pub(crate) password: tl::types::account::Password,
}

impl PasswordToken {
    /// The password hint set by the account owner, if any.
    pub fn hint(&self) -> Option<&str> {
        self.password.hint.as_deref()
    }

    /// Whether a recovery email is configured for this password.
    pub fn has_recovery(&self) -> bool {
        self.password.has_recovery
    }
}

impl fmt::Debug for PasswordToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PasswordToken {{ hint: {:?} }}", self.hint())
    }
}

// ─── LoginToken ───────────────────────────────────────────────────────────────

/// Returned by [`crate::Client::request_login_code`] and friends.
///
/// Carries what Telegram said about the code it just sent. Pass it to
/// [`crate::Client::sign_in`] together with the code the user received.
#[derive(Clone, Debug)]
pub struct LoginToken {
    pub(crate) phone:           String,
    pub(crate) phone_code_hash: String,
    pub(crate) delivery:        CodeDelivery,
    pub(crate) next:            Option<NextDelivery>,
    pub(crate) timeout:         Option<u32>,
}

impl LoginToken {
    pub fn phone(&self) -> &str { &self.phone }

    pub fn phone_code_hash(&self) -> &str { &self.phone_code_hash }

    /// Where the code was sent.
    pub fn delivery(&self) -> &CodeDelivery { &self.delivery }

    /// How a resend would be delivered, if Telegram offers one.
    pub fn next_delivery(&self) -> Option<&NextDelivery> { self.next.as_ref() }

    /// Seconds before the code expires, when Telegram says.
    pub fn timeout(&self) -> Option<u32> { self.timeout }
}
