//! # layer-login
//!
//! A small async Telegram client that does exactly one job: take a user
//! account from "phone number" to "authorized", then hand back a portable
//! [`StringSession`].
//!
//! ## Flow
//! 1. [`Client::connect`]: fresh auth key + `initConnection`
//! 2. [`Client::request_login_code`] (or [`Client::resend_code`],
//!    [`Client::request_sms_code`])
//! 3. [`Client::sign_in`] with the received code
//! 4. [`Client::check_password`] when two-step verification is enabled
//! 5. [`Client::export_session`]
//!
//! DC migration (`PHONE_MIGRATE_X` and friends) is followed automatically.
//! Flood waits are *not* slept through: they surface as
//! [`InvocationError::Rpc`] so the caller can tell the user.

#![deny(unsafe_code)]

mod connection;
mod errors;
mod transport;
mod two_factor_auth;
pub mod dc;
pub mod sent_code;
pub mod socks5;
pub mod string_session;

pub use errors::{InvocationError, LoginToken, PasswordToken, RpcError, SignInError};
pub use sent_code::{CodeDelivery, NextDelivery};
pub use socks5::Socks5Config;
pub use string_session::{StringSession, StringSessionError};

/// API layer of the linked TL schema.
pub use layer_tl_types::LAYER;

use std::collections::HashMap;
use std::net::SocketAddr;

use layer_tl_types as tl;
use layer_tl_types::{Cursor, Deserializable, RemoteCall};
use tokio::sync::Mutex;

use connection::Connection;

// ─── Config ───────────────────────────────────────────────────────────────────

/// Configuration for [`Client::connect`].
#[derive(Clone, Debug)]
pub struct Config {
    pub api_id:       i32,
    pub api_hash:     String,
    /// First DC to contact as `(dc_id, "ip:port")`. Defaults to DC2.
    pub dc_addr:      Option<(i32, String)>,
    /// Optional SOCKS5 proxy; every connection is tunnelled through it.
    pub socks5:       Option<Socks5Config>,
    /// Accept IPv6 DC addresses from `help.getConfig` (default: false).
    pub allow_ipv6:   bool,
    /// Reported to Telegram in `initConnection`; shows up in "Active sessions".
    pub device_model: String,
    pub app_version:  String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_id:       0,
            api_hash:     String::new(),
            dc_addr:      None,
            socks5:       None,
            allow_ipv6:   false,
            device_model: std::env::consts::OS.to_string(),
            app_version:  env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

// ─── Client ───────────────────────────────────────────────────────────────────

/// A login-only Telegram client.
pub struct Client {
    conn:       Mutex<Connection>,
    dc_options: Mutex<HashMap<i32, String>>,
    config:     Config,
}

impl Client {
    // ── Connect ────────────────────────────────────────────────────────────

    /// Generate a fresh auth key on the home DC and announce ourselves.
    pub async fn connect(config: Config) -> Result<Self, InvocationError> {
        let mut dc_options = dc::default_dc_addresses();
        let (dc_id, addr) = match &config.dc_addr {
            Some((id, addr)) => {
                dc_options.insert(*id, addr.clone());
                (*id, addr.clone())
            }
            None => (dc::DEFAULT_DC, dc_options[&dc::DEFAULT_DC].clone()),
        };

        let conn = Connection::connect(dc_id, &addr, config.socks5.as_ref()).await?;
        let client = Self {
            conn:       Mutex::new(conn),
            dc_options: Mutex::new(dc_options),
            config,
        };
        client.init_connection().await?;
        Ok(client)
    }

    /// `invokeWithLayer(initConnection(help.getConfig))`, refreshing the DC table.
    async fn init_connection(&self) -> Result<(), InvocationError> {
        use tl::functions::{InitConnection, InvokeWithLayer, help::GetConfig};
        let req = InvokeWithLayer {
            layer: tl::LAYER,
            query: InitConnection {
                api_id:           self.config.api_id,
                device_model:     self.config.device_model.clone(),
                system_version:   std::env::consts::OS.to_string(),
                app_version:      self.config.app_version.clone(),
                system_lang_code: "en".to_string(),
                lang_pack:        String::new(),
                lang_code:        "en".to_string(),
                proxy:            None,
                params:           None,
                query:            GetConfig {},
            },
        };

        let body = self.conn.lock().await.call(&req).await?;
        let mut cur = Cursor::from_slice(&body);
        let tl::enums::Config::Config(cfg) = tl::enums::Config::deserialize(&mut cur)?;
        let applied = dc::merge_config(
            &mut *self.dc_options.lock().await,
            &cfg.dc_options,
            self.config.allow_ipv6,
        );
        tracing::info!("[layer-login] initConnection ✓  ({applied} DC endpoints, layer {})", tl::LAYER);
        Ok(())
    }

    /// Replace the connection with a fresh one on `dc_id`.
    async fn migrate_to(&self, dc_id: i32) -> Result<(), InvocationError> {
        let addr = self.dc_options.lock().await
            .get(&dc_id)
            .cloned()
            .ok_or_else(|| InvocationError::Unexpected(format!("no address known for DC{dc_id}")))?;
        tracing::info!("[layer-login] Migrating to DC{dc_id} ({addr}) …");

        let fresh = Connection::connect(dc_id, &addr, self.config.socks5.as_ref()).await?;
        {
            let mut conn = self.conn.lock().await;
            conn.shutdown().await;
            *conn = fresh;
        }
        self.init_connection().await
    }

    /// Invoke `req`, following one `*_MIGRATE_X` redirect.
    async fn invoke<R: RemoteCall>(&self, req: &R) -> Result<R::Return, InvocationError> {
        let first = self.conn.lock().await.invoke(req).await;
        match first {
            Err(InvocationError::Rpc(ref e)) if e.migrate_dc().is_some() => {
                let dc_id = e.migrate_dc().unwrap_or(dc::DEFAULT_DC);
                self.migrate_to(dc_id).await?;
                self.conn.lock().await.invoke(req).await
            }
            other => other,
        }
    }

    // ── Code request ───────────────────────────────────────────────────────

    fn code_settings() -> tl::enums::CodeSettings {
        tl::enums::CodeSettings::CodeSettings(tl::types::CodeSettings {
            allow_flashcall:   false,
            current_number:    false,
            allow_app_hash:    false,
            allow_missed_call: false,
            allow_firebase:    false,
            unknown_number:    false,
            logout_tokens:     None,
            token:             None,
            app_sandbox:       None,
        })
    }

    fn send_code_req(&self, phone: &str) -> tl::functions::auth::SendCode {
        tl::functions::auth::SendCode {
            phone_number: phone.to_string(),
            api_id:       self.config.api_id,
            api_hash:     self.config.api_hash.clone(),
            settings:     Self::code_settings(),
        }
    }

    /// Ask Telegram to send a login code to `phone`.
    pub async fn request_login_code(&self, phone: &str) -> Result<LoginToken, InvocationError> {
        let sent = self.invoke(&self.send_code_req(phone)).await?;
        let token = sent_code::login_token(phone, sent)?;
        tracing::info!("[layer-login] Login code sent via {}", token.delivery().name());
        Ok(token)
    }

    /// Ask Telegram to deliver the code again, using the token's `next_type`.
    pub async fn resend_code(&self, token: &LoginToken) -> Result<LoginToken, InvocationError> {
        let req = tl::functions::auth::ResendCode {
            phone_number:    token.phone.clone(),
            phone_code_hash: token.phone_code_hash.clone(),
            reason:          None,
        };
        let sent = self.invoke(&req).await?;
        let token = sent_code::login_token(&token.phone, sent)?;
        tracing::info!("[layer-login] Code resent via {}", token.delivery().name());
        Ok(token)
    }

    /// Start over with a brand-new `auth.sendCode` for `phone`.
    ///
    /// Uses the same settings as [`Client::request_login_code`]; Telegram
    /// alone decides the channel, which is often SMS once an app code was
    /// already issued but may be the app again.
    pub async fn request_sms_code(&self, phone: &str) -> Result<LoginToken, InvocationError> {
        let req = self.send_code_req(phone);
        let sent = self.invoke(&req).await?;
        let token = sent_code::login_token(phone, sent)?;
        tracing::info!("[layer-login] Fresh code requested, delivered via {}", token.delivery().name());
        Ok(token)
    }

    // ── Sign in ────────────────────────────────────────────────────────────

    /// Complete sign-in with the code the user received.
    ///
    /// Returns the account's display name.
    pub async fn sign_in(&self, token: &LoginToken, code: &str) -> Result<String, SignInError> {
        let req = tl::functions::auth::SignIn {
            phone_number:       token.phone.clone(),
            phone_code_hash:    token.phone_code_hash.clone(),
            phone_code:         Some(code.trim().to_string()),
            email_verification: None,
        };

        match self.invoke(&req).await {
            Ok(tl::enums::auth::Authorization::Authorization(a)) => {
                let name = display_name(&a.user);
                tracing::info!("[layer-login] Signed in ✓  ({name})");
                Ok(name)
            }
            Ok(tl::enums::auth::Authorization::SignUpRequired(_)) => Err(SignInError::SignUpRequired),
            Err(e) if e.is("SESSION_PASSWORD_NEEDED") => {
                let token = self.password_token().await?;
                Err(SignInError::PasswordRequired(token))
            }
            Err(InvocationError::Rpc(e)) if e.is("PHONE_CODE_*") => Err(SignInError::InvalidCode(e)),
            Err(e) => Err(SignInError::Other(e)),
        }
    }

    async fn password_token(&self) -> Result<PasswordToken, InvocationError> {
        let tl::enums::account::Password::Password(password) =
            self.invoke(&tl::functions::account::GetPassword {}).await?;
        Ok(PasswordToken { password })
    }

    /// Finish a two-step-verification login with the cloud password.
    ///
    /// Returns the account's display name.
    pub async fn check_password(
        &self,
        token:    PasswordToken,
        password: impl AsRef<[u8]>,
    ) -> Result<String, InvocationError> {
        let pw = token.password;
        let algo = pw.current_algo
            .ok_or_else(|| InvocationError::Unexpected("account has no password algorithm".into()))?;
        let tl::enums::PasswordKdfAlgo::Sha256Sha256Pbkdf2Hmacsha512iter100000Sha256ModPow(algo) = algo
        else {
            return Err(InvocationError::Unexpected("unsupported password KDF algorithm".into()));
        };
        let g_b = pw.srp_b
            .ok_or_else(|| InvocationError::Unexpected("password challenge without srp_B".into()))?;
        let srp_id = pw.srp_id
            .ok_or_else(|| InvocationError::Unexpected("password challenge without srp_id".into()))?;

        let a = fresh_secret()?;

        let params = two_factor_auth::SrpParams {
            salt1: &algo.salt1,
            salt2: &algo.salt2,
            p:     &algo.p,
            g:     algo.g,
        };
        let answer = two_factor_auth::calculate(&params, &g_b, &a, password.as_ref());

        let req = tl::functions::auth::CheckPassword {
            password: tl::enums::InputCheckPasswordSrp::InputCheckPasswordSrp(
                tl::types::InputCheckPasswordSrp {
                    srp_id,
                    a:  answer.g_a.to_vec(),
                    m1: answer.m1.to_vec(),
                },
            ),
        };

        match self.invoke(&req).await? {
            tl::enums::auth::Authorization::Authorization(a) => {
                let name = display_name(&a.user);
                tracing::info!("[layer-login] 2FA ✓  ({name})");
                Ok(name)
            }
            tl::enums::auth::Authorization::SignUpRequired(_) => {
                Err(InvocationError::Unexpected("sign-up required after 2FA".into()))
            }
        }
    }

    // ── Session ────────────────────────────────────────────────────────────

    /// DC the connection currently lives on.
    pub async fn home_dc(&self) -> i32 {
        self.conn.lock().await.dc_id()
    }

    /// Snapshot the current connection as a [`StringSession`].
    ///
    /// Only meaningful after a successful [`Client::sign_in`] or
    /// [`Client::check_password`].
    pub async fn export_session(&self) -> Result<StringSession, InvocationError> {
        let conn = self.conn.lock().await;
        let addr: SocketAddr = conn.addr().parse().map_err(|_| {
            InvocationError::Unexpected(format!("DC address {:?} is not ip:port", conn.addr()))
        })?;
        let dc_id = u8::try_from(conn.dc_id())
            .map_err(|_| InvocationError::Unexpected(format!("DC id {} out of range", conn.dc_id())))?;
        Ok(StringSession { dc_id, addr, auth_key: conn.auth_key() })
    }

    /// Close the socket. The auth key stays valid on Telegram's side.
    pub async fn disconnect(&self) {
        self.conn.lock().await.shutdown().await;
        tracing::debug!("[layer-login] Disconnected");
    }
}

fn display_name(user: &tl::enums::User) -> String {
    match user {
        tl::enums::User::User(u) => {
            let name = format!(
                "{} {}",
                u.first_name.as_deref().unwrap_or(""),
                u.last_name.as_deref().unwrap_or(""),
            );
            let name = name.trim();
            if name.is_empty() {
                u.username.clone().unwrap_or_else(|| u.id.to_string())
            } else {
                name.to_string()
            }
        }
        tl::enums::User::Empty(e) => e.id.to_string(),
    }
}

/// 256 random bytes for the SRP client secret `a`.
fn fresh_secret() -> Result<[u8; 256], InvocationError> {
    let mut a = [0u8; 256];
    getrandom::getrandom(&mut a)
        .map_err(|e| InvocationError::Unexpected(format!("no randomness available: {e}")))?;
    Ok(a)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_secret_is_random() {
        let a = fresh_secret().unwrap();
        let b = fresh_secret().unwrap();
        assert!(a.iter().any(|&x| x != 0));
        assert_ne!(a, b);
    }
}
