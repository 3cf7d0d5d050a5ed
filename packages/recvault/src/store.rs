//! The recording directory: write-once uploads, listings and reads.

use std::{
    io::{self, ErrorKind},
    path::{Path, PathBuf},
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use bytes::Bytes;
use rand::Rng;
use thiserror::Error;
use tokio::{
    fs,
    io::{AsyncWriteExt, BufWriter},
};
use tokio_stream::{Stream, StreamExt};
use tracing::{debug, info, warn};

pub const CUSTOM_DIR: &str = "custom";
pub const UPLOAD_BUFFER_SIZE: usize = 8 * 1024;
pub const MAX_NAME_ATTEMPTS: u32 = 16;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("not found")]
    NotFound,
    #[error("read timed out after {written} bytes of {name}")]
    Timeout { name: String, written: u64 },
    #[error("body ended after {written} of {expected} bytes of {name}")]
    Incomplete {
        name: String,
        written: u64,
        expected: u64,
    },
    #[error("no free upload name after {0} attempts")]
    NameExhausted(u32),
    #[error("io: {0}")]
    Io(#[from] io::Error),
}

impl StoreError {
    /// Whether a (possibly partial) file was left on disk.
    pub fn wrote_file(&self) -> bool {
        matches!(self, StoreError::Timeout { .. } | StoreError::Incomplete { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stored {
    pub name: String,
    pub written: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListedFile {
    pub name: String,
    pub size: u64,
    pub modified: SystemTime,
}

#[derive(Debug)]
pub struct OpenedFile {
    pub file: fs::File,
    pub len: u64,
    pub modified: Option<SystemTime>,
}

pub fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_millis() as i64
}

pub fn upload_name(millis: i64, hint: &str) -> String {
    format!("{millis}_{hint}")
}

#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Creates `root` (recursively) and binds to it.
    pub fn activate(root: impl Into<PathBuf>) -> io::Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn custom_dir(&self) -> PathBuf {
        self.root.join(CUSTOM_DIR)
    }

    /// Opens `<millis>_<hint>` with exclusive create, bumping the millisecond
    /// stamp by a random offset while the name is taken.
    pub async fn create_unique(&self, hint: &str, millis: i64) -> Result<(String, fs::File), StoreError> {
        let mut stamp = millis;
        for _ in 0..MAX_NAME_ATTEMPTS {
            let name = upload_name(stamp, hint);
            let open = fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(self.root.join(&name))
                .await;
            match open {
                Ok(file) => return Ok((name, file)),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    debug!(name = %name, "upload name taken, retrying");
                    stamp = millis + rand::thread_rng().gen_range(1..100i64);
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(StoreError::NameExhausted(MAX_NAME_ATTEMPTS))
    }

    /// Streams exactly `content_length` bytes of `body` into a freshly named
    /// file. Partial data is kept on timeout, short bodies and write errors.
    pub async fn store<S, E>(
        &self,
        name_hint: Option<&str>,
        content_length: Option<i64>,
        mut body: S,
        read_timeout: Duration,
    ) -> Result<Stored, StoreError>
    where
        S: Stream<Item = Result<Bytes, E>> + Unpin,
        E: std::fmt::Display,
    {
        let expected = match content_length {
            Some(n) if n > 0 => n as u64,
            _ => {
                return Err(StoreError::BadRequest(
                    "Content-Length header required.".to_string(),
                ))
            }
        };

        let (name, file) = self.create_unique(name_hint.unwrap_or(""), now_ms()).await?;
        let mut out = BufWriter::with_capacity(UPLOAD_BUFFER_SIZE, file);
        let mut remaining = expected;
        let mut timed_out = false;

        while remaining > 0 {
            let chunk = match tokio::time::timeout(read_timeout, body.next()).await {
                Err(_) => {
                    timed_out = true;
                    break;
                }
                Ok(None) => break,
                Ok(Some(Err(e))) => {
                    warn!(name = %name, error = %e, "upload body failed");
                    break;
                }
                Ok(Some(Ok(chunk))) => chunk,
            };
            let take = chunk.len().min(usize::try_from(remaining).unwrap_or(usize::MAX));
            if let Err(e) = out.write_all(&chunk[..take]).await {
                warn!(name = %name, written = expected - remaining, error = %e, "upload write failed");
                return Err(e.into());
            }
            remaining -= take as u64;
        }
        out.flush().await?;

        let written = expected - remaining;
        if timed_out {
            info!(name = %name, written, "socket timed out, kept partial file");
            return Err(StoreError::Timeout { name, written });
        }
        if remaining > 0 {
            warn!(name = %name, written, expected, "upload ended early, kept partial file");
            return Err(StoreError::Incomplete {
                name,
                written,
                expected,
            });
        }
        info!(name = %name, path = %self.root.join(&name).display(), written, "saved upload");
        Ok(Stored { name, written })
    }

    /// Regular files only, newest first. Never fails: an unreadable
    /// directory lists as empty.
    pub async fn list(&self) -> Vec<ListedFile> {
        let mut entries = match fs::read_dir(&self.root).await {
            Ok(e) => e,
            Err(e) => {
                warn!(dir = %self.root.display(), error = %e, "cannot list recording directory");
                return Vec::new();
            }
        };
        let mut out = Vec::new();
        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    warn!(dir = %self.root.display(), error = %e, "listing interrupted");
                    break;
                }
            };
            // Entries may vanish between readdir and stat.
            let Ok(meta) = entry.metadata().await else {
                continue;
            };
            if !meta.is_file() {
                continue;
            }
            out.push(ListedFile {
                name: entry.file_name().to_string_lossy().into_owned(),
                size: meta.len(),
                modified: meta.modified().unwrap_or(UNIX_EPOCH),
            });
        }
        out.sort_by(|a, b| b.modified.cmp(&a.modified).then_with(|| a.name.cmp(&b.name)));
        out
    }

    pub async fn open_for_read(&self, name: &str) -> Result<OpenedFile, StoreError> {
        open_regular(&self.root.join(name)).await
    }

    pub async fn open_custom_for_read(&self, name: &str) -> Result<OpenedFile, StoreError> {
        let dir = self.custom_dir();
        match fs::metadata(&dir).await {
            Ok(meta) if meta.is_dir() => {}
            Ok(_) => return Err(StoreError::NotFound),
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(StoreError::NotFound),
            Err(e) => return Err(e.into()),
        }
        open_regular(&dir.join(name)).await
    }
}

pub(crate) async fn open_regular(path: &Path) -> Result<OpenedFile, StoreError> {
    match fs::metadata(path).await {
        Ok(meta) if meta.is_file() => {}
        Ok(_) => return Err(StoreError::NotFound),
        Err(e) if e.kind() == ErrorKind::NotFound => return Err(StoreError::NotFound),
        Err(e) => return Err(e.into()),
    }
    let file = fs::File::open(path).await.map_err(|e| match e.kind() {
        ErrorKind::NotFound => StoreError::NotFound,
        _ => StoreError::Io(e),
    })?;
    let meta = file.metadata().await?;
    Ok(OpenedFile {
        file,
        len: meta.len(),
        modified: meta.modified().ok(),
    })
}

/// Best-effort removal; a miss (including an already-deleted file) is logged.
pub fn delete(path: &Path) -> bool {
    match std::fs::remove_file(path) {
        Ok(()) => true,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to delete file");
            false
        }
    }
}
