//! Transport surface exposed to handlers.
//!
//! A handler receives a [`TransportHandle`] when its connection is made and
//! writes response bytes through it. The only implementation shipped here is
//! [`SyntheticTransport`], which records writes instead of sending them.

mod synthetic;

use std::net::SocketAddr;
use std::sync::Arc;

pub use synthetic::{SyntheticTransport, WrittenBytesLog};

/// Shared handle a handler keeps for the lifetime of its connection.
pub type TransportHandle = Arc<dyn Transport>;

/// Stand-in for the socket object a real transport would expose.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaceholderSocket {
    pub peer: SocketAddr,
}

/// Value returned by [`Transport::get_extra_info`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtraInfo {
    Addr(SocketAddr),
    Socket(PlaceholderSocket),
    Text(String),
}

impl ExtraInfo {
    pub fn as_addr(&self) -> Option<SocketAddr> {
        match self {
            Self::Addr(addr) => Some(*addr),
            _ => None,
        }
    }

    pub fn as_socket(&self) -> Option<&PlaceholderSocket> {
        match self {
            Self::Socket(sock) => Some(sock),
            _ => None,
        }
    }
}

/// Minimal capability set a connection-oriented handler relies on.
///
/// Only `get_extra_info` and `write` carry behavior; the rest are hooks a
/// handler may probe and default to no-ops.
pub trait Transport: Send + Sync {
    /// Look up connection metadata such as `peername` or `socket`.
    fn get_extra_info(&self, name: &str) -> Option<ExtraInfo>;

    /// Send `data` to the peer.
    fn write(&self, data: &[u8]);

    /// Send several buffers, one write each.
    fn writelines(&self, chunks: &[&[u8]]) {
        for chunk in chunks {
            self.write(chunk);
        }
    }

    fn write_eof(&self) {}

    fn can_write_eof(&self) -> bool {
        false
    }

    fn close(&self) {}

    fn is_closing(&self) -> bool {
        false
    }

    fn pause_reading(&self) {}

    fn resume_reading(&self) {}

    fn set_write_buffer_limits(&self, _high: Option<usize>, _low: Option<usize>) {}

    fn get_write_buffer_size(&self) -> usize {
        0
    }
}
