//! Memory and file backed streams

use super::{is_memory_identifier, unusable, ByteStream, Detached};
use crate::http::{Error, Result};
use bytes::Bytes;
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{Cursor, Read, Seek, SeekFrom, Write};
use tracing::trace;

/// Capabilities requested by an fopen-style mode string
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Mode {
    pub read: bool,
    pub write: bool,
    pub append: bool,
    pub truncate: bool,
    pub create: bool,
    pub create_new: bool,
}

impl Mode {
    /// Parse `r`, `w`, `a`, `x` or `c`, optionally followed by `+`, `b`, `t`
    pub fn parse(mode: &str) -> Result<Self> {
        let mut chars = mode.chars();
        let base = chars
            .next()
            .ok_or_else(|| Error::InvalidArgument("empty stream mode".to_string()))?;
        let mut plus = false;
        for c in chars {
            match c {
                '+' => plus = true,
                'b' | 't' => {}
                _ => {
                    return Err(Error::InvalidArgument(format!(
                        "invalid stream mode {:?}",
                        mode
                    )))
                }
            }
        }

        let mut m = Mode::default();
        match base {
            'r' => m.read = true,
            'w' => {
                m.write = true;
                m.create = true;
                m.truncate = true;
            }
            'a' => {
                m.write = true;
                m.append = true;
                m.create = true;
            }
            'x' => {
                m.write = true;
                m.create_new = true;
            }
            'c' => {
                m.write = true;
                m.create = true;
            }
            _ => {
                return Err(Error::InvalidArgument(format!(
                    "invalid stream mode {:?}",
                    mode
                )))
            }
        }
        if plus {
            m.read = true;
            m.write = true;
        }
        Ok(m)
    }

    fn open_options(&self) -> OpenOptions {
        let mut options = OpenOptions::new();
        options
            .read(self.read)
            .write(self.write && !self.append)
            .append(self.append)
            .truncate(self.truncate)
            .create(self.create)
            .create_new(self.create_new);
        options
    }
}

enum Backing {
    Memory(Cursor<Vec<u8>>),
    File(File),
}

enum State {
    Open(Backing),
    Detached,
    Closed,
}

/// Seekable stream over an in-memory buffer or a file
pub struct Stream {
    state: State,
    mode: Mode,
}

impl Stream {
    /// Empty in-memory stream, readable and writable
    pub fn memory() -> Self {
        Stream {
            state: State::Open(Backing::Memory(Cursor::new(Vec::new()))),
            mode: Mode {
                read: true,
                write: true,
                ..Mode::default()
            },
        }
    }

    /// In-memory stream holding `data`, cursor at the start
    pub fn from_bytes(data: impl AsRef<[u8]>) -> Self {
        let mut stream = Stream::memory();
        stream.state = State::Open(Backing::Memory(Cursor::new(data.as_ref().to_vec())));
        stream
    }

    /// Open a stream by identifier
    ///
    /// `"memory"` and `"temp"` give an in-memory buffer; anything else is a
    /// filesystem path opened according to `mode`.
    pub fn open(identifier: &str, mode: &str) -> Result<Self> {
        let mode = Mode::parse(mode)?;

        if identifier.is_empty() {
            return Err(Error::InvalidArgument(
                "stream identifier must not be empty".to_string(),
            ));
        }

        if is_memory_identifier(identifier) {
            return Ok(Stream {
                state: State::Open(Backing::Memory(Cursor::new(Vec::new()))),
                mode,
            });
        }

        let file = mode.open_options().open(identifier).map_err(|e| {
            Error::InvalidArgument(format!("cannot open stream {:?}: {}", identifier, e))
        })?;
        Ok(Stream {
            state: State::Open(Backing::File(file)),
            mode,
        })
    }

    /// Wrap an already open file handle
    ///
    /// `mode` only describes the handle; nothing is reopened.
    pub fn from_file(file: File, mode: &str) -> Result<Self> {
        Ok(Stream {
            state: State::Open(Backing::File(file)),
            mode: Mode::parse(mode)?,
        })
    }

    fn backing(&mut self) -> Result<&mut Backing> {
        match &mut self.state {
            State::Open(backing) => Ok(backing),
            State::Detached | State::Closed => Err(unusable()),
        }
    }

    fn is_open(&self) -> bool {
        matches!(self.state, State::Open(_))
    }
}

impl ByteStream for Stream {
    fn is_readable(&self) -> bool {
        self.is_open() && self.mode.read
    }

    fn is_writable(&self) -> bool {
        self.is_open() && self.mode.write
    }

    fn is_seekable(&self) -> bool {
        self.is_open()
    }

    fn read(&mut self, len: usize) -> Result<Bytes> {
        let readable = self.mode.read;
        let backing = self.backing()?;
        if !readable {
            return Err(Error::StreamUnusable("stream is not readable"));
        }

        // Bounded by what the backing holds, not by `len`
        let mut buf = Vec::new();
        match backing {
            Backing::Memory(cursor) => cursor.take(len as u64).read_to_end(&mut buf)?,
            Backing::File(file) => file.take(len as u64).read_to_end(&mut buf)?,
        };
        Ok(Bytes::from(buf))
    }

    fn write(&mut self, data: &[u8]) -> Result<usize> {
        let writable = self.mode.write;
        let append = self.mode.append;
        let backing = self.backing()?;
        if !writable {
            return Err(Error::StreamUnusable("stream is not writable"));
        }

        match backing {
            Backing::Memory(cursor) => {
                if append {
                    cursor.seek(SeekFrom::End(0))?;
                }
                cursor.write_all(data)?;
            }
            Backing::File(file) => file.write_all(data)?,
        }
        Ok(data.len())
    }

    fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        let position = match self.backing()? {
            Backing::Memory(cursor) => cursor.seek(pos)?,
            Backing::File(file) => file.seek(pos)?,
        };
        Ok(position)
    }

    fn tell(&mut self) -> Result<u64> {
        let position = match self.backing()? {
            Backing::Memory(cursor) => cursor.position(),
            Backing::File(file) => file.stream_position()?,
        };
        Ok(position)
    }

    fn eof(&mut self) -> bool {
        let size = self.size();
        match (self.tell(), size) {
            (Ok(position), Some(size)) => position >= size,
            _ => true,
        }
    }

    fn size(&self) -> Option<u64> {
        match &self.state {
            State::Open(Backing::Memory(cursor)) => Some(cursor.get_ref().len() as u64),
            State::Open(Backing::File(file)) => file.metadata().ok().map(|m| m.len()),
            State::Detached | State::Closed => None,
        }
    }

    fn contents(&mut self) -> Result<Bytes> {
        let readable = self.mode.read;
        let backing = self.backing()?;
        if !readable {
            return Err(Error::StreamUnusable("stream is not readable"));
        }

        let mut buf = Vec::new();
        match backing {
            Backing::Memory(cursor) => cursor.read_to_end(&mut buf)?,
            Backing::File(file) => file.read_to_end(&mut buf)?,
        };
        Ok(Bytes::from(buf))
    }

    fn close(&mut self) {
        if self.is_open() {
            trace!("closing stream");
            self.state = State::Closed;
        }
    }

    fn detach(&mut self) -> Option<Detached> {
        match std::mem::replace(&mut self.state, State::Detached) {
            State::Open(Backing::Memory(cursor)) => {
                trace!("detaching memory stream");
                Some(Detached::Buffer(cursor.into_inner()))
            }
            State::Open(Backing::File(file)) => {
                trace!("detaching file stream");
                Some(Detached::File(file))
            }
            State::Closed => {
                self.state = State::Closed;
                None
            }
            State::Detached => None,
        }
    }
}

impl fmt::Debug for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let backing = match &self.state {
            State::Open(Backing::Memory(_)) => "memory",
            State::Open(Backing::File(_)) => "file",
            State::Detached => "detached",
            State::Closed => "closed",
        };
        f.debug_struct("Stream")
            .field("backing", &backing)
            .field("mode", &self.mode)
            .finish()
    }
}
