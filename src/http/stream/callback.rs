//! Stream backed by a content producer

use super::{ByteStream, Detached, Producer};
use crate::http::{Error, Result};
use bytes::Bytes;
use std::fmt;
use std::io::SeekFrom;
use tracing::trace;

/// Stream whose content comes from a zero-argument producer
///
/// The producer runs at most once, on the first call to
/// [`contents`](ByteStream::contents); afterwards the stream is exhausted.
/// Chunked reads, writes and seeks are not supported.
pub struct CallbackStream {
    producer: Option<Producer>,
}

impl CallbackStream {
    pub fn new(producer: impl FnOnce() -> String + Send + 'static) -> Self {
        CallbackStream {
            producer: Some(Box::new(producer)),
        }
    }
}

impl ByteStream for CallbackStream {
    fn is_readable(&self) -> bool {
        false
    }

    fn is_writable(&self) -> bool {
        false
    }

    fn is_seekable(&self) -> bool {
        false
    }

    fn read(&mut self, _len: usize) -> Result<Bytes> {
        Err(Error::StreamUnusable("callback streams cannot be read in chunks"))
    }

    fn write(&mut self, _data: &[u8]) -> Result<usize> {
        Err(Error::StreamUnusable("callback streams cannot be written"))
    }

    fn seek(&mut self, _pos: SeekFrom) -> Result<u64> {
        Err(Error::StreamUnusable("callback streams cannot seek"))
    }

    fn rewind(&mut self) -> Result<()> {
        Err(Error::StreamUnusable("callback streams cannot rewind"))
    }

    fn tell(&mut self) -> Result<u64> {
        Err(Error::StreamUnusable("callback streams have no position"))
    }

    fn eof(&mut self) -> bool {
        self.producer.is_none()
    }

    fn size(&self) -> Option<u64> {
        None
    }

    fn contents(&mut self) -> Result<Bytes> {
        Ok(match self.producer.take() {
            Some(producer) => Bytes::from(producer()),
            None => Bytes::new(),
        })
    }

    fn to_bytes(&mut self) -> Bytes {
        self.contents().unwrap_or_default()
    }

    fn close(&mut self) {
        if self.producer.take().is_some() {
            trace!("closing callback stream");
        }
    }

    fn detach(&mut self) -> Option<Detached> {
        self.producer.take().map(Detached::Producer)
    }
}

impl fmt::Debug for CallbackStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackStream")
            .field("exhausted", &self.producer.is_none())
            .finish()
    }
}
