//! In-memory transport that captures every byte a handler writes.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use bytes::{Bytes, BytesMut};

use super::{ExtraInfo, PlaceholderSocket, Transport};
use crate::config::HarnessConfig;

/// Write chunks in the order the handler issued them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WrittenBytesLog {
    chunks: Vec<Bytes>,
}

impl WrittenBytesLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: Bytes) {
        self.chunks.push(chunk);
    }

    pub fn chunks(&self) -> &[Bytes] {
        &self.chunks
    }

    /// Number of write calls recorded.
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Total bytes across every chunk.
    pub fn total_len(&self) -> usize {
        self.chunks.iter().map(Bytes::len).sum()
    }

    /// The byte stream a socket peer would have received.
    pub fn concat(&self) -> Bytes {
        match self.chunks.as_slice() {
            [] => Bytes::new(),
            [single] => single.clone(),
            many => {
                let mut out = BytesMut::with_capacity(self.total_len());
                for chunk in many {
                    out.extend_from_slice(chunk);
                }
                out.freeze()
            }
        }
    }
}

impl IntoIterator for WrittenBytesLog {
    type Item = Bytes;
    type IntoIter = std::vec::IntoIter<Bytes>;

    fn into_iter(self) -> Self::IntoIter {
        self.chunks.into_iter()
    }
}

/// Transport for exactly one request; never performs I/O.
#[derive(Debug)]
pub struct SyntheticTransport {
    extra: HashMap<String, ExtraInfo>,
    log: Mutex<WrittenBytesLog>,
    closing: AtomicBool,
}

impl SyntheticTransport {
    /// Build a transport reporting the configured peer and local addresses.
    pub fn new(config: &HarnessConfig) -> Self {
        let mut extra = HashMap::new();
        extra.insert("peername".to_string(), ExtraInfo::Addr(config.peer_addr));
        extra.insert("sockname".to_string(), ExtraInfo::Addr(config.local_addr));
        extra.insert(
            "socket".to_string(),
            ExtraInfo::Socket(PlaceholderSocket { peer: config.peer_addr }),
        );
        Self {
            extra,
            log: Mutex::new(WrittenBytesLog::new()),
            closing: AtomicBool::new(false),
        }
    }

    /// Add or replace an extra-info entry.
    pub fn with_extra_info(mut self, name: impl Into<String>, info: ExtraInfo) -> Self {
        self.extra.insert(name.into(), info);
        self
    }

    /// Copy of everything written so far.
    pub fn written(&self) -> WrittenBytesLog {
        self.lock_log().clone()
    }

    /// Take the captured log, leaving an empty one behind.
    pub fn take_log(&self) -> WrittenBytesLog {
        std::mem::take(&mut *self.lock_log())
    }

    fn lock_log(&self) -> MutexGuard<'_, WrittenBytesLog> {
        self.log.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for SyntheticTransport {
    fn default() -> Self {
        Self::new(&HarnessConfig::default())
    }
}

impl Transport for SyntheticTransport {
    fn get_extra_info(&self, name: &str) -> Option<ExtraInfo> {
        self.extra.get(name).cloned()
    }

    fn write(&self, data: &[u8]) {
        tracing::trace!(len = data.len(), "transport write captured");
        self.lock_log().push(Bytes::copy_from_slice(data));
    }

    fn close(&self) {
        self.closing.store(true, Ordering::Release);
    }

    fn is_closing(&self) -> bool {
        self.closing.load(Ordering::Acquire)
    }
}
