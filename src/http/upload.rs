//! Uploaded files
//!
//! An [`UploadedFile`] describes one file received with a request: where its
//! bytes are, what the client called it, and whether the upload succeeded.
//! Files arrive in trees mirroring the form field names, see
//! [`UploadedFiles`].

use super::stream::{Body, ByteStream, Stream};
use super::{Error, Result};
use indexmap::IndexMap;
use std::fmt;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

const COPY_CHUNK: usize = 8192;

/// Upload status code, `0..=8` as reported by CGI-style servers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UploadErrorCode(u8);

impl UploadErrorCode {
    pub const OK: UploadErrorCode = UploadErrorCode(0);
    pub const INI_SIZE: UploadErrorCode = UploadErrorCode(1);
    pub const FORM_SIZE: UploadErrorCode = UploadErrorCode(2);
    pub const PARTIAL: UploadErrorCode = UploadErrorCode(3);
    pub const NO_FILE: UploadErrorCode = UploadErrorCode(4);
    pub const NO_TMP_DIR: UploadErrorCode = UploadErrorCode(6);
    pub const CANT_WRITE: UploadErrorCode = UploadErrorCode(7);
    pub const EXTENSION: UploadErrorCode = UploadErrorCode(8);

    pub fn new(code: u8) -> Result<Self> {
        if code <= 8 {
            Ok(UploadErrorCode(code))
        } else {
            Err(Error::InvalidArgument(format!(
                "upload error code {} is not within 0-8",
                code
            )))
        }
    }

    pub fn code(&self) -> u8 {
        self.0
    }

    pub fn is_ok(&self) -> bool {
        self.0 == 0
    }

    pub fn message(&self) -> &'static str {
        match self.0 {
            0 => "There is no error, the file uploaded with success",
            1 => "The uploaded file exceeds the upload_max_filesize directive",
            2 => "The uploaded file exceeds the MAX_FILE_SIZE directive of the form",
            3 => "The uploaded file was only partially uploaded",
            4 => "No file was uploaded",
            6 => "Missing a temporary folder",
            7 => "Failed to write file to disk",
            8 => "A server extension stopped the file upload",
            _ => "Unknown upload error",
        }
    }
}

impl fmt::Display for UploadErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message(), self.0)
    }
}

/// Where the bytes of an upload live
#[derive(Debug, Clone)]
pub enum UploadSource {
    /// Temporary file written by the server
    Path(PathBuf),
    /// Already opened stream
    Stream(Body),
}

impl From<PathBuf> for UploadSource {
    fn from(path: PathBuf) -> Self {
        UploadSource::Path(path)
    }
}

impl From<&str> for UploadSource {
    fn from(path: &str) -> Self {
        UploadSource::Path(PathBuf::from(path))
    }
}

impl From<Body> for UploadSource {
    fn from(body: Body) -> Self {
        UploadSource::Stream(body)
    }
}

/// One uploaded file
///
/// Clones share the "moved" state: once any clone has been moved, all of
/// them refuse further access.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    source: UploadSource,
    size: Option<u64>,
    error: UploadErrorCode,
    client_filename: Option<String>,
    client_media_type: Option<String>,
    moved: Arc<AtomicBool>,
}

impl UploadedFile {
    /// Describe an upload; `error` must be a valid upload status code
    pub fn new(
        source: impl Into<UploadSource>,
        size: Option<u64>,
        error: u8,
        client_filename: Option<String>,
        client_media_type: Option<String>,
    ) -> Result<Self> {
        Ok(UploadedFile {
            source: source.into(),
            size,
            error: UploadErrorCode::new(error)?,
            client_filename,
            client_media_type,
            moved: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn size(&self) -> Option<u64> {
        self.size
    }

    pub fn error(&self) -> UploadErrorCode {
        self.error
    }

    /// File name sent by the client; not to be trusted
    pub fn client_filename(&self) -> Option<&str> {
        self.client_filename.as_deref()
    }

    /// Media type sent by the client; not to be trusted
    pub fn client_media_type(&self) -> Option<&str> {
        self.client_media_type.as_deref()
    }

    pub fn is_moved(&self) -> bool {
        self.moved.load(Ordering::SeqCst)
    }

    fn ensure_available(&self, action: &str) -> Result<()> {
        if !self.error.is_ok() {
            return Err(Error::Upload(format!(
                "cannot {} due to upload error: {}",
                action, self.error
            )));
        }
        if self.is_moved() {
            return Err(Error::Upload(format!(
                "cannot {} after the file has been moved",
                action
            )));
        }
        Ok(())
    }

    /// Stream over the uploaded bytes
    pub fn stream(&self) -> Result<Body> {
        self.ensure_available("retrieve stream")?;
        match &self.source {
            UploadSource::Stream(body) => Ok(body.clone()),
            UploadSource::Path(path) => {
                let path = path.to_str().ok_or_else(|| {
                    Error::Upload(format!("non UTF-8 upload path {}", path.display()))
                })?;
                Ok(Body::new(Stream::open(path, "r")?))
            }
        }
    }

    /// Move the upload to `target`; allowed once
    pub fn move_to(&self, target: impl AsRef<Path>) -> Result<()> {
        self.ensure_available("move file")?;
        let target = target.as_ref();
        if target.as_os_str().is_empty() {
            return Err(Error::InvalidArgument(
                "upload target path must not be empty".to_string(),
            ));
        }

        // Claim the move before touching the filesystem so clones cannot race
        if self
            .moved
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(Error::Upload(
                "cannot move file after the file has been moved".to_string(),
            ));
        }

        let moved = match &self.source {
            UploadSource::Path(path) => move_file(path, target),
            UploadSource::Stream(body) => copy_stream(body, target),
        };
        if let Err(e) = moved {
            self.moved.store(false, Ordering::SeqCst);
            return Err(e);
        }

        debug!(path = %target.display(), "moved uploaded file");
        Ok(())
    }
}

fn move_file(from: &Path, to: &Path) -> Result<()> {
    if fs::rename(from, to).is_ok() {
        return Ok(());
    }
    // rename fails across filesystems
    fs::copy(from, to)
        .and_then(|_| fs::remove_file(from))
        .map_err(|e| Error::Upload(format!("error moving uploaded file: {}", e)))
}

fn copy_stream(body: &Body, to: &Path) -> Result<()> {
    let mut file = File::create(to)
        .map_err(|e| Error::Upload(format!("unable to write to {}: {}", to.display(), e)))?;
    let mut stream = body.lock();
    if stream.is_seekable() {
        stream.rewind()?;
    }
    while !stream.eof() {
        let chunk = stream.read(COPY_CHUNK)?;
        if chunk.is_empty() {
            break;
        }
        file.write_all(&chunk)?;
    }
    Ok(())
}

/// Tree of uploaded files keyed like the form fields that carried them
#[derive(Debug, Clone)]
pub enum UploadedFiles {
    File(UploadedFile),
    List(Vec<UploadedFiles>),
    Map(IndexMap<String, UploadedFiles>),
}

impl UploadedFiles {
    /// Child by field name, or by index for lists
    pub fn get(&self, key: &str) -> Option<&UploadedFiles> {
        match self {
            UploadedFiles::File(_) => None,
            UploadedFiles::List(items) => key.parse::<usize>().ok().and_then(|i| items.get(i)),
            UploadedFiles::Map(map) => map.get(key),
        }
    }

    pub fn as_file(&self) -> Option<&UploadedFile> {
        match self {
            UploadedFiles::File(file) => Some(file),
            _ => None,
        }
    }

    /// Number of direct children; a single file counts as one
    pub fn len(&self) -> usize {
        match self {
            UploadedFiles::File(_) => 1,
            UploadedFiles::List(items) => items.len(),
            UploadedFiles::Map(map) => map.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All files in the tree, depth first
    pub fn files(&self) -> Vec<&UploadedFile> {
        let mut out = Vec::new();
        self.collect(&mut out);
        out
    }

    fn collect<'a>(&'a self, out: &mut Vec<&'a UploadedFile>) {
        match self {
            UploadedFiles::File(file) => out.push(file),
            UploadedFiles::List(items) => items.iter().for_each(|i| i.collect(out)),
            UploadedFiles::Map(map) => map.values().for_each(|i| i.collect(out)),
        }
    }
}

impl From<UploadedFile> for UploadedFiles {
    fn from(file: UploadedFile) -> Self {
        UploadedFiles::File(file)
    }
}
