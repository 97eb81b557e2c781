//! Body streams
//!
//! This module defines [`ByteStream`], the uniform read/write/seek contract
//! over message bodies, and its variants:
//!
//! - [`Stream`]: memory or file backed, capabilities chosen by an
//!   fopen-style mode
//! - [`InputStream`]: forward-only inbound body that caches what it read
//! - [`CallbackStream`]: produces its whole content from a closure, once
//! - [`RelativeStream`]: a window over another stream starting at an offset
//!
//! Every stream follows the same lifecycle: it is open until [`close`] or
//! [`detach`] is called, after which I/O fails with
//! [`Error::StreamUnusable`](super::Error::StreamUnusable).
//!
//! A stream carries a cursor and must be driven by one caller at a time.
//!
//! [`close`]: ByteStream::close
//! [`detach`]: ByteStream::detach

mod callback;
mod input;
mod memory;
mod relative;

pub use callback::CallbackStream;
pub use input::InputStream;
pub use memory::{Mode, Stream};
pub use relative::RelativeStream;

use super::{Error, Result};
use bytes::Bytes;
use std::fmt;
use std::fs::File;
use std::io::{Read, SeekFrom};
use std::sync::{Arc, Mutex, MutexGuard};

/// Uniform stream contract over a message body
pub trait ByteStream: fmt::Debug {
    fn is_readable(&self) -> bool;

    fn is_writable(&self) -> bool;

    fn is_seekable(&self) -> bool;

    /// Read at most `len` bytes from the cursor
    ///
    /// Returns an empty buffer at end of stream.
    fn read(&mut self, len: usize) -> Result<Bytes>;

    /// Write `data` at the cursor, returning the number of bytes written
    fn write(&mut self, data: &[u8]) -> Result<usize>;

    /// Move the cursor, returning its new position
    fn seek(&mut self, pos: SeekFrom) -> Result<u64>;

    /// Move the cursor to the start
    fn rewind(&mut self) -> Result<()> {
        self.seek(SeekFrom::Start(0)).map(|_| ())
    }

    /// Current cursor position
    fn tell(&mut self) -> Result<u64>;

    /// Whether the cursor has reached the known end
    fn eof(&mut self) -> bool;

    /// Total size, when known
    fn size(&self) -> Option<u64>;

    /// Everything from the cursor to the end
    fn contents(&mut self) -> Result<Bytes>;

    /// Whole content, as used when a body is rendered to a string
    ///
    /// Seekable streams are rewound first. Errors yield an empty buffer.
    fn to_bytes(&mut self) -> Bytes {
        if self.is_seekable() && self.rewind().is_err() {
            return Bytes::new();
        }
        self.contents().unwrap_or_default()
    }

    /// Release the underlying resource; a no-op once closed or detached
    fn close(&mut self);

    /// Hand the underlying resource to the caller without closing it
    ///
    /// Returns `None` when there is nothing left to hand over.
    fn detach(&mut self) -> Option<Detached>;
}

/// Producer wrapped by a [`CallbackStream`]
pub type Producer = Box<dyn FnOnce() -> String + Send>;

/// Resource released by [`ByteStream::detach`]
pub enum Detached {
    /// In-memory buffer
    Buffer(Vec<u8>),
    /// Open file handle
    File(File),
    /// Forward-only reader
    Reader(Box<dyn Read + Send>),
    /// Content producer that was never invoked
    Producer(Producer),
}

impl fmt::Debug for Detached {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Detached::Buffer(buf) => f.debug_tuple("Buffer").field(&buf.len()).finish(),
            Detached::File(file) => f.debug_tuple("File").field(file).finish(),
            Detached::Reader(_) => f.write_str("Reader(..)"),
            Detached::Producer(_) => f.write_str("Producer(..)"),
        }
    }
}

/// Shared handle to a message body
///
/// Messages derived from one another share their body through this handle.
/// The lock only makes the handle sendable; callers still need to agree on
/// who drives the cursor.
#[derive(Clone)]
pub struct Body {
    inner: Arc<Mutex<Box<dyn ByteStream + Send>>>,
}

impl Body {
    /// Wrap a stream
    pub fn new(stream: impl ByteStream + Send + 'static) -> Self {
        Body {
            inner: Arc::new(Mutex::new(Box::new(stream))),
        }
    }

    /// Empty, readable and writable in-memory body
    pub fn empty() -> Self {
        Body::new(Stream::memory())
    }

    /// In-memory body holding `data`, cursor at the start
    pub fn from_bytes(data: impl AsRef<[u8]>) -> Self {
        Body::new(Stream::from_bytes(data))
    }

    /// Build a body from any accepted source
    pub fn from_source(source: BodySource) -> Result<Self> {
        match source {
            BodySource::Stream(body) => Ok(body),
            BodySource::Identifier(id) => {
                let mode = if is_memory_identifier(&id) { "w+b" } else { "r" };
                Ok(Body::new(Stream::open(&id, mode)?))
            }
            BodySource::Handle(file, mode) => Ok(Body::new(Stream::from_file(file, &mode)?)),
        }
    }

    /// Lock the stream for a sequence of operations
    pub fn lock(&self) -> MutexGuard<'_, Box<dyn ByteStream + Send>> {
        // A panic while holding the lock leaves the cursor wherever it was,
        // which is no worse than any other interleaving
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Whole content; see [`ByteStream::to_bytes`]
    pub fn to_bytes(&self) -> Bytes {
        self.lock().to_bytes()
    }

    /// Size of the stream, when known
    pub fn size(&self) -> Option<u64> {
        self.lock().size()
    }

    /// Whether both handles point at the same stream
    pub fn ptr_eq(&self, other: &Body) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Default for Body {
    fn default() -> Self {
        Body::empty()
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.inner.try_lock() {
            Ok(stream) => f.debug_tuple("Body").field(&*stream).finish(),
            Err(_) => f.write_str("Body(<locked>)"),
        }
    }
}

impl From<Stream> for Body {
    fn from(stream: Stream) -> Self {
        Body::new(stream)
    }
}

/// Accepted shapes of a message body at construction
#[derive(Debug)]
pub enum BodySource {
    /// An existing body, shared as is
    Stream(Body),
    /// `"memory"`, `"temp"` or a filesystem path
    Identifier(String),
    /// An open file handle and the fopen-style mode it was opened with
    Handle(File, String),
}

impl From<Body> for BodySource {
    fn from(body: Body) -> Self {
        BodySource::Stream(body)
    }
}

impl From<&str> for BodySource {
    fn from(id: &str) -> Self {
        BodySource::Identifier(id.to_string())
    }
}

/// Handles of unknown mode are treated as read-only
impl From<File> for BodySource {
    fn from(file: File) -> Self {
        BodySource::Handle(file, "r".to_string())
    }
}

impl From<(File, &str)> for BodySource {
    fn from((file, mode): (File, &str)) -> Self {
        BodySource::Handle(file, mode.to_string())
    }
}

pub(crate) fn is_memory_identifier(id: &str) -> bool {
    matches!(id, "memory" | "temp")
}

/// Error for I/O attempted after close or detach
pub(crate) fn unusable() -> Error {
    Error::StreamUnusable("stream is closed or detached")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_body_shares_stream() {
        let body = Body::from_bytes("shared");
        let copy = body.clone();
        assert!(body.ptr_eq(&copy));
        assert!(!body.ptr_eq(&Body::from_bytes("shared")));

        copy.lock().seek(SeekFrom::Start(3)).unwrap();
        assert_eq!(body.lock().tell().unwrap(), 3);
    }

    #[test]
    fn test_body_to_bytes_rewinds() {
        let body = Body::from_bytes("FOO BAR");
        body.lock().seek(SeekFrom::End(0)).unwrap();
        assert_eq!(body.to_bytes(), "FOO BAR");
        assert_eq!(body.size(), Some(7));
    }

    #[test]
    fn test_body_from_source() {
        let body = Body::from_source(BodySource::from("memory")).unwrap();
        assert!(body.lock().is_writable());
        assert!(body.lock().is_readable());

        let shared = Body::from_bytes("x");
        let same = Body::from_source(BodySource::from(shared.clone())).unwrap();
        assert!(same.ptr_eq(&shared));

        assert!(matches!(
            Body::from_source(BodySource::from("")),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_body_from_handle() {
        let mut file = tempfile::tempfile().unwrap();
        std::io::Write::write_all(&mut file, b"on disk").unwrap();
        let body = Body::from_source(BodySource::from(file)).unwrap();
        assert_eq!(body.to_bytes(), "on disk");
        assert!(!body.lock().is_writable());
        assert!(matches!(
            body.lock().write(b"x"),
            Err(Error::StreamUnusable(_))
        ));
    }

    #[test]
    fn test_body_from_handle_with_mode() {
        let file = tempfile::tempfile().unwrap();
        let body = Body::from_source(BodySource::from((file, "w+"))).unwrap();
        assert!(body.lock().is_writable());
        assert_eq!(body.lock().write(b"written").unwrap(), 7);
        assert_eq!(body.to_bytes(), "written");

        let file = tempfile::tempfile().unwrap();
        assert!(matches!(
            Body::from_source(BodySource::from((file, "bogus"))),
            Err(Error::InvalidArgument(_))
        ));
    }
}
