//! Offset window over another stream

use super::{Body, ByteStream, Detached};
use crate::http::{Error, Result};
use bytes::Bytes;
use std::fmt;
use std::io::SeekFrom;

/// View of a stream that starts `offset` bytes into it
///
/// Positions and sizes are reported relative to the offset. Reads and writes
/// happen at the decorated stream's cursor, which must not be behind the
/// offset; otherwise they fail with
/// [`Error::InvalidPointerPosition`](crate::http::Error::InvalidPointerPosition).
pub struct RelativeStream {
    decorated: Body,
    offset: u64,
}

impl RelativeStream {
    pub fn new(decorated: Body, offset: u64) -> Self {
        RelativeStream { decorated, offset }
    }

    /// Offset of the window in the decorated stream
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// The decorated stream
    pub fn decorated(&self) -> &Body {
        &self.decorated
    }

    fn check_position(&self, stream: &mut Box<dyn ByteStream + Send>) -> Result<()> {
        let position = stream.tell()?;
        if position < self.offset {
            return Err(Error::InvalidPointerPosition {
                position,
                offset: self.offset,
            });
        }
        Ok(())
    }
}

impl ByteStream for RelativeStream {
    fn is_readable(&self) -> bool {
        self.decorated.lock().is_readable()
    }

    fn is_writable(&self) -> bool {
        self.decorated.lock().is_writable()
    }

    fn is_seekable(&self) -> bool {
        self.decorated.lock().is_seekable()
    }

    fn read(&mut self, len: usize) -> Result<Bytes> {
        let mut stream = self.decorated.lock();
        self.check_position(&mut stream)?;
        stream.read(len)
    }

    fn write(&mut self, data: &[u8]) -> Result<usize> {
        let mut stream = self.decorated.lock();
        self.check_position(&mut stream)?;
        stream.write(data)
    }

    /// Seek within the window
    ///
    /// A target before the window fails with
    /// [`Error::InvalidPointerPosition`] and leaves the cursor where it was.
    fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        let pos = match pos {
            SeekFrom::Start(offset) => {
                SeekFrom::Start(offset.checked_add(self.offset).ok_or_else(|| {
                    Error::InvalidArgument(format!(
                        "seek to {} overflows window at offset {}",
                        offset, self.offset
                    ))
                })?)
            }
            other => other,
        };

        let mut stream = self.decorated.lock();
        let previous = stream.tell()?;
        let position = stream.seek(pos)?;
        match position.checked_sub(self.offset) {
            Some(relative) => Ok(relative),
            None => {
                stream.seek(SeekFrom::Start(previous))?;
                Err(Error::InvalidPointerPosition {
                    position,
                    offset: self.offset,
                })
            }
        }
    }

    fn tell(&mut self) -> Result<u64> {
        let position = self.decorated.lock().tell()?;
        position
            .checked_sub(self.offset)
            .ok_or(Error::InvalidPointerPosition {
                position,
                offset: self.offset,
            })
    }

    fn eof(&mut self) -> bool {
        self.decorated.lock().eof()
    }

    fn size(&self) -> Option<u64> {
        self.decorated
            .lock()
            .size()
            .map(|size| size.saturating_sub(self.offset))
    }

    fn contents(&mut self) -> Result<Bytes> {
        let mut stream = self.decorated.lock();
        self.check_position(&mut stream)?;
        stream.contents()
    }

    fn to_bytes(&mut self) -> Bytes {
        if self.is_seekable() && self.rewind().is_err() {
            return Bytes::new();
        }
        self.contents().unwrap_or_default()
    }

    fn close(&mut self) {
        self.decorated.lock().close()
    }

    fn detach(&mut self) -> Option<Detached> {
        self.decorated.lock().detach()
    }
}

impl fmt::Debug for RelativeStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelativeStream")
            .field("offset", &self.offset)
            .field("decorated", &self.decorated)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decorated(size: usize) -> Body {
        let data: Vec<u8> = (0..size).map(|i| b'a' + (i % 26) as u8).collect();
        Body::from_bytes(data)
    }

    #[test]
    fn test_size_and_tell_are_relative() {
        let body = decorated(250);
        let mut stream = RelativeStream::new(body.clone(), 100);
        assert_eq!(stream.size(), Some(150));

        body.lock().seek(SeekFrom::Start(180)).unwrap();
        assert_eq!(stream.tell().unwrap(), 80);
    }

    #[test]
    fn test_seek_maps_into_window() {
        let body = decorated(250);
        let mut stream = RelativeStream::new(body.clone(), 100);

        assert_eq!(stream.seek(SeekFrom::Start(10)).unwrap(), 10);
        assert_eq!(body.lock().tell().unwrap(), 110);

        stream.rewind().unwrap();
        assert_eq!(body.lock().tell().unwrap(), 100);

        assert_eq!(stream.seek(SeekFrom::End(0)).unwrap(), 150);
        assert!(stream.eof());
    }

    #[test]
    fn test_seek_before_window_fails() {
        let body = decorated(250);
        let mut stream = RelativeStream::new(body.clone(), 100);
        stream.seek(SeekFrom::Start(10)).unwrap();

        assert!(matches!(
            stream.seek(SeekFrom::Current(-60)),
            Err(Error::InvalidPointerPosition {
                position: 50,
                offset: 100
            })
        ));
        assert_eq!(body.lock().tell().unwrap(), 110);
        assert_eq!(stream.tell().unwrap(), 10);

        assert!(matches!(
            stream.seek(SeekFrom::End(-200)),
            Err(Error::InvalidPointerPosition { .. })
        ));
        assert_eq!(stream.tell().unwrap(), 10);
    }

    #[test]
    fn test_seek_start_overflow_fails() {
        let body = decorated(250);
        let mut stream = RelativeStream::new(body.clone(), 100);
        assert!(matches!(
            stream.seek(SeekFrom::Start(u64::MAX)),
            Err(Error::InvalidArgument(_))
        ));
        assert_eq!(body.lock().tell().unwrap(), 0);
    }

    #[test]
    fn test_read_within_window() {
        let body = Body::from_bytes("HEADERS|payload");
        let mut stream = RelativeStream::new(body, 8);
        stream.rewind().unwrap();
        assert_eq!(stream.read(3).unwrap(), "pay");
        assert_eq!(stream.contents().unwrap(), "load");
        assert_eq!(stream.to_bytes(), "payload");
    }

    #[test]
    fn test_access_behind_offset_fails() {
        let body = decorated(250);
        let mut stream = RelativeStream::new(body.clone(), 100);
        body.lock().seek(SeekFrom::Start(50)).unwrap();

        assert!(matches!(
            stream.read(1),
            Err(Error::InvalidPointerPosition {
                position: 50,
                offset: 100
            })
        ));
        assert!(matches!(
            stream.write(b"x"),
            Err(Error::InvalidPointerPosition { .. })
        ));
        assert!(matches!(
            stream.contents(),
            Err(Error::InvalidPointerPosition { .. })
        ));
        assert!(matches!(
            stream.tell(),
            Err(Error::InvalidPointerPosition { .. })
        ));
    }

    #[test]
    fn test_write_within_window() {
        let body = Body::from_bytes("0123456789");
        let mut stream = RelativeStream::new(body.clone(), 5);
        stream.seek(SeekFrom::Start(2)).unwrap();
        assert_eq!(stream.write(b"XY").unwrap(), 2);
        assert_eq!(body.to_bytes(), "0123456XY9");
    }

    #[test]
    fn test_close_reaches_decorated() {
        let body = decorated(10);
        let mut stream = RelativeStream::new(body.clone(), 2);
        stream.close();
        assert!(!body.lock().is_readable());
        assert!(matches!(stream.read(1), Err(Error::StreamUnusable(_))));
    }
}
