//! Forward-only inbound body stream

use super::{unusable, ByteStream, Detached};
use crate::http::{Error, Result};
use bytes::{Bytes, BytesMut};
use std::fmt;
use std::io::{Read, SeekFrom};
use tracing::trace;

/// Read-once stream over an inbound body
///
/// The source is consumed forward only. Everything read is cached, so once
/// the source is exhausted [`to_bytes`](ByteStream::to_bytes) keeps
/// returning the complete body even though the source cannot be rewound.
pub struct InputStream {
    source: Option<Box<dyn Read + Send>>,
    cache: BytesMut,
    reached_eof: bool,
    closed: bool,
}

impl InputStream {
    pub fn new(source: impl Read + Send + 'static) -> Self {
        InputStream {
            source: Some(Box::new(source)),
            cache: BytesMut::new(),
            reached_eof: false,
            closed: false,
        }
    }

    fn source(&mut self) -> Result<&mut Box<dyn Read + Send>> {
        self.source.as_mut().ok_or_else(unusable)
    }

    /// Drain the source into the cache, returning what was newly read
    fn drain(&mut self) -> Result<Bytes> {
        let mut buf = Vec::new();
        self.source()?.read_to_end(&mut buf)?;
        self.cache.extend_from_slice(&buf);
        self.reached_eof = true;
        Ok(Bytes::from(buf))
    }
}

impl ByteStream for InputStream {
    fn is_readable(&self) -> bool {
        self.source.is_some()
    }

    fn is_writable(&self) -> bool {
        false
    }

    fn is_seekable(&self) -> bool {
        false
    }

    fn read(&mut self, len: usize) -> Result<Bytes> {
        let source = self.source()?;
        let mut buf = Vec::new();
        let n = source.take(len as u64).read_to_end(&mut buf)?;

        if n == 0 && len > 0 {
            self.reached_eof = true;
        }
        self.cache.extend_from_slice(&buf);
        Ok(Bytes::from(buf))
    }

    fn write(&mut self, _data: &[u8]) -> Result<usize> {
        self.source()?;
        Err(Error::StreamUnusable("input stream is not writable"))
    }

    fn seek(&mut self, _pos: SeekFrom) -> Result<u64> {
        self.source()?;
        Err(Error::StreamUnusable("input stream is not seekable"))
    }

    fn tell(&mut self) -> Result<u64> {
        self.source()?;
        Ok(self.cache.len() as u64)
    }

    fn eof(&mut self) -> bool {
        self.reached_eof || self.source.is_none()
    }

    fn size(&self) -> Option<u64> {
        None
    }

    /// Rest of the body; once exhausted, the whole cached body
    fn contents(&mut self) -> Result<Bytes> {
        if self.reached_eof {
            return Ok(Bytes::copy_from_slice(&self.cache));
        }
        self.drain()
    }

    fn to_bytes(&mut self) -> Bytes {
        if !self.reached_eof && self.drain().is_err() {
            return Bytes::new();
        }
        Bytes::copy_from_slice(&self.cache)
    }

    fn close(&mut self) {
        if !self.closed {
            trace!("closing input stream");
            self.closed = true;
            self.source = None;
        }
    }

    fn detach(&mut self) -> Option<Detached> {
        let source = self.source.take()?;
        trace!("detaching input stream");
        Some(Detached::Reader(source))
    }
}

impl fmt::Debug for InputStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InputStream")
            .field("cached", &self.cache.len())
            .field("reached_eof", &self.reached_eof)
            .field("open", &self.source.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_capabilities() {
        let stream = InputStream::new(Cursor::new(b"body".to_vec()));
        assert!(stream.is_readable());
        assert!(!stream.is_writable());
        assert!(!stream.is_seekable());
        assert_eq!(stream.size(), None);
    }

    #[test]
    fn test_chunked_read_then_cached_string() {
        let mut stream = InputStream::new(Cursor::new(b"FOO BAR BAZ".to_vec()));
        assert_eq!(stream.read(4).unwrap(), "FOO ");
        assert_eq!(stream.tell().unwrap(), 4);
        assert!(!stream.eof());

        assert_eq!(stream.to_bytes(), "FOO BAR BAZ");
        assert!(stream.eof());
        assert_eq!(stream.to_bytes(), "FOO BAR BAZ");
        assert_eq!(stream.contents().unwrap(), "FOO BAR BAZ");
        assert_eq!(stream.read(4).unwrap(), "");
    }

    #[test]
    fn test_read_huge_len_returns_remainder() {
        let mut stream = InputStream::new(Cursor::new(b"abc".to_vec()));
        assert_eq!(stream.read(1).unwrap(), "a");
        assert_eq!(stream.read(usize::MAX).unwrap(), "bc");
        assert_eq!(stream.read(usize::MAX).unwrap(), "");
        assert!(stream.eof());
        assert_eq!(stream.to_bytes(), "abc");
    }

    #[test]
    fn test_contents_returns_remainder_first() {
        let mut stream = InputStream::new(Cursor::new(b"abcdef".to_vec()));
        stream.read(2).unwrap();
        assert_eq!(stream.contents().unwrap(), "cdef");
        assert_eq!(stream.contents().unwrap(), "abcdef");
    }

    #[test]
    fn test_read_loop_until_eof() {
        let mut stream = InputStream::new(Cursor::new(b"FOO BAR".to_vec()));
        let mut collected = Vec::new();
        while !stream.eof() {
            collected.extend_from_slice(&stream.read(2).unwrap());
        }
        assert_eq!(collected, b"FOO BAR");
        assert_eq!(stream.to_bytes(), "FOO BAR");
    }

    #[test]
    fn test_write_and_seek_fail() {
        let mut stream = InputStream::new(Cursor::new(Vec::new()));
        assert!(matches!(stream.write(b"x"), Err(Error::StreamUnusable(_))));
        assert!(matches!(
            stream.seek(SeekFrom::Start(0)),
            Err(Error::StreamUnusable(_))
        ));
        assert!(matches!(stream.rewind(), Err(Error::StreamUnusable(_))));
    }

    #[test]
    fn test_close_and_detach() {
        let mut stream = InputStream::new(Cursor::new(b"x".to_vec()));
        assert!(stream.detach().is_some());
        assert!(stream.detach().is_none());
        assert!(matches!(stream.read(1), Err(Error::StreamUnusable(_))));

        let mut stream = InputStream::new(Cursor::new(b"x".to_vec()));
        stream.close();
        stream.close();
        assert!(!stream.is_readable());
        assert!(stream.eof());
        assert!(stream.detach().is_none());
    }
}
