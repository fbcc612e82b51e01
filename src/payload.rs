//! Request body as a single-pass readable stream.
//!
//! A [`PayloadSource`] is either fully buffered or explicitly empty. Readers
//! get the buffered bytes, then exactly one [`PayloadItem::Eof`], then
//! nothing. It also implements [`tokio::io::AsyncRead`] for handlers that
//! prefer reader adapters.

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::{Buf, Bytes};
use tokio::io::{AsyncRead, ReadBuf};

/// One step of a payload read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayloadItem {
    Chunk(Bytes),
    Eof,
}

#[derive(Debug)]
enum State {
    Data(Bytes),
    AtEof,
    Finished,
}

/// Request body handed to the handler alongside the raw message.
#[derive(Debug)]
pub struct PayloadSource {
    state: State,
    total: usize,
}

impl PayloadSource {
    /// A stream that yields `data` then end-of-data.
    pub fn buffered(data: impl Into<Bytes>) -> Self {
        let data = data.into();
        let total = data.len();
        let state = if data.is_empty() { State::AtEof } else { State::Data(data) };
        Self { state, total }
    }

    /// A stream with no data that signals end-of-data on first read.
    pub fn empty() -> Self {
        Self { state: State::AtEof, total: 0 }
    }

    /// Number of body bytes this source was created with.
    pub fn total_len(&self) -> usize {
        self.total
    }

    /// True once no more data bytes remain.
    pub fn is_eof(&self) -> bool {
        !matches!(self.state, State::Data(_))
    }

    /// True once the end-of-data signal has been handed out.
    pub fn is_finished(&self) -> bool {
        matches!(self.state, State::Finished)
    }

    /// Read the next item. Returns `None` after [`PayloadItem::Eof`].
    pub fn read_item(&mut self) -> Option<PayloadItem> {
        match std::mem::replace(&mut self.state, State::Finished) {
            State::Data(data) => {
                self.state = State::AtEof;
                Some(PayloadItem::Chunk(data))
            }
            State::AtEof => Some(PayloadItem::Eof),
            State::Finished => None,
        }
    }

    /// Read the next chunk of bytes; empty once the stream is exhausted.
    pub fn read_any(&mut self) -> Bytes {
        match self.read_item() {
            Some(PayloadItem::Chunk(data)) => data,
            _ => Bytes::new(),
        }
    }

    /// Drain the remaining body, consuming the end-of-data signal.
    pub fn read_to_end(&mut self) -> Bytes {
        let mut out = Bytes::new();
        while let Some(item) = self.read_item() {
            match item {
                PayloadItem::Chunk(data) => out = data,
                PayloadItem::Eof => break,
            }
        }
        out
    }
}

impl Default for PayloadSource {
    fn default() -> Self {
        Self::empty()
    }
}

impl AsyncRead for PayloadSource {
    fn poll_read(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        match &mut this.state {
            State::Data(data) => {
                let n = data.len().min(buf.remaining());
                buf.put_slice(&data[..n]);
                data.advance(n);
                if data.is_empty() {
                    this.state = State::AtEof;
                }
            }
            State::AtEof => this.state = State::Finished,
            State::Finished => {}
        }
        Poll::Ready(Ok(()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    #[test]
    fn buffered_yields_data_then_single_eof() {
        let mut payload = PayloadSource::buffered("a=1");
        assert_eq!(payload.total_len(), 3);
        assert_eq!(payload.read_item(), Some(PayloadItem::Chunk(Bytes::from_static(b"a=1"))));
        assert!(payload.is_eof());
        assert_eq!(payload.read_item(), Some(PayloadItem::Eof));
        assert_eq!(payload.read_item(), None);
        assert!(payload.is_finished());
    }

    #[test]
    fn empty_signals_eof_immediately() {
        let mut payload = PayloadSource::empty();
        assert!(payload.is_eof());
        assert_eq!(payload.read_item(), Some(PayloadItem::Eof));
        assert_eq!(payload.read_item(), None);
    }

    #[test]
    fn empty_buffer_is_treated_as_empty_stream() {
        let mut payload = PayloadSource::buffered(Bytes::new());
        assert_eq!(payload.read_item(), Some(PayloadItem::Eof));
    }

    #[test]
    fn read_to_end_consumes_signal() {
        let mut payload = PayloadSource::buffered(vec![1u8, 2, 3]);
        assert_eq!(&payload.read_to_end()[..], &[1, 2, 3]);
        assert!(payload.is_finished());
        assert!(payload.read_any().is_empty());
    }

    #[tokio::test]
    async fn async_read_delivers_all_bytes() {
        let mut payload = PayloadSource::buffered("hello world");
        let mut small = [0u8; 4];
        let n = payload.read(&mut small).await.unwrap();
        assert_eq!(&small[..n], b"hell");
        let mut rest = String::new();
        payload.read_to_string(&mut rest).await.unwrap();
        assert_eq!(rest, "o world");
        assert!(payload.is_finished());
    }
}
