//! Harness configuration.
//!
//! # Usage
//!
//! ```rust,ignore
//! use wiretest::{HarnessConfig, Mode, TestClient};
//!
//! let config = HarnessConfig::new()
//!     .peer_addr("10.0.0.7:40000".parse()?)
//!     .default_host("api.internal")
//!     .mode(Mode::Deferred);
//! let client = TestClient::with_config(app, config)?;
//! ```

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

/// Default synthetic peer address reported to handlers.
pub const DEFAULT_PEER_ADDR: SocketAddr = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 12345);

/// Default synthetic local address reported to handlers.
pub const DEFAULT_LOCAL_ADDR: SocketAddr = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 8080);

/// Default `Host` header value.
pub const DEFAULT_HOST: &str = "localhost";

/// How a [`TestClient`](crate::TestClient) hands results back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Block the calling thread until the response is parsed.
    #[default]
    Blocking,
    /// Return the in-flight exchange for the caller to await.
    Deferred,
}

impl Mode {
    pub fn is_deferred(&self) -> bool {
        matches!(self, Self::Deferred)
    }
}

/// Settings shared by every request a client makes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarnessConfig {
    /// Reported as the `peername` extra-info entry.
    pub peer_addr: SocketAddr,
    /// Reported as the `sockname` extra-info entry.
    pub local_addr: SocketAddr,
    /// Injected as `Host` when the caller does not set one.
    pub default_host: String,
    /// Initial execution mode.
    pub mode: Mode,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            peer_addr: DEFAULT_PEER_ADDR,
            local_addr: DEFAULT_LOCAL_ADDR,
            default_host: DEFAULT_HOST.to_string(),
            mode: Mode::Blocking,
        }
    }
}

impl HarnessConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the synthetic peer address.
    pub fn peer_addr(mut self, addr: SocketAddr) -> Self {
        self.peer_addr = addr;
        self
    }

    /// Set the synthetic local address.
    pub fn local_addr(mut self, addr: SocketAddr) -> Self {
        self.local_addr = addr;
        self
    }

    /// Set the default `Host` header value.
    pub fn default_host(mut self, host: impl Into<String>) -> Self {
        self.default_host = host.into();
        self
    }

    /// Set the initial execution mode.
    pub fn mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }
}
