//! SOCKS5 proxy connector.
//!
//! Attach a [`Socks5Config`] to [`crate::Config`] and every Telegram
//! connection is tunnelled through the proxy.

use tokio::net::TcpStream;
use tokio_socks::tcp::Socks5Stream;

use crate::errors::InvocationError;

/// SOCKS5 proxy configuration.
#[derive(Clone, Debug)]
pub struct Socks5Config {
    /// `host:port` of the proxy server.
    pub proxy_addr: String,
    /// Optional username and password.
    pub auth: Option<(String, String)>,
}

impl Socks5Config {
    /// Unauthenticated proxy.
    pub fn new(proxy_addr: impl Into<String>) -> Self {
        Self { proxy_addr: proxy_addr.into(), auth: None }
    }

    /// Proxy with username/password authentication.
    pub fn with_auth(
        proxy_addr: impl Into<String>,
        username:   impl Into<String>,
        password:   impl Into<String>,
    ) -> Self {
        Self {
            proxy_addr: proxy_addr.into(),
            auth: Some((username.into(), password.into())),
        }
    }

    /// Open a TCP stream to `target` through the proxy.
    pub async fn connect(&self, target: &str) -> Result<TcpStream, InvocationError> {
        tracing::debug!("[socks5] {} → {target}", self.proxy_addr);
        let proxy = self.proxy_addr.as_str();
        let stream = match &self.auth {
            None => Socks5Stream::connect(proxy, target).await,
            Some((user, pass)) => {
                Socks5Stream::connect_with_password(proxy, target, user, pass).await
            }
        }
        .map_err(|e| InvocationError::Io(std::io::Error::other(e)))?;
        Ok(stream.into_inner())
    }
}

/// Connect to `addr` directly or through `socks5`.
pub(crate) async fn open_tcp(
    addr:   &str,
    socks5: Option<&Socks5Config>,
) -> Result<TcpStream, InvocationError> {
    match socks5 {
        Some(proxy) => proxy.connect(addr).await,
        None        => Ok(TcpStream::connect(addr).await?),
    }
}
