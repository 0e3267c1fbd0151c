//! Transient on-disk staging of uploaded files.
//!
//! Every upload is written to the scratch directory under a freshly generated token before it is
//! relayed to the pinning service. The token, not the user-supplied file name, determines the
//! path, so concurrent uploads never share a scratch file.
//!
//! A [`StagedFile`] owns its scratch file. Call [`StagedFile::release`] once the relay call has
//! finished; if the guard is dropped instead (a panic, or the handler future being cancelled when
//! the client disconnects) the file is unlinked synchronously in `Drop`.

use bytes::Bytes;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};
use uuid::Uuid;

/// Extension given to every staged file.
const STAGED_EXTENSION: &str = "upload";

/// The directory uploads are staged into.
#[derive(Debug, Clone)]
pub struct ScratchDir {
    root: PathBuf,
}

impl ScratchDir {
    /// Use `root` as scratch storage, creating it (and any parents) if necessary.
    pub async fn create(root: impl Into<PathBuf>) -> io::Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root).await?;
        debug!(path = %root.display(), "Scratch directory ready");
        Ok(Self { root })
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Write `content` to a new, uniquely named file in the scratch directory.
    ///
    /// The file is opened with `create_new`, so an existing file is never overwritten. A write
    /// that fails part way removes whatever was written before returning the error.
    pub async fn stage(&self, content: &Bytes) -> io::Result<StagedFile> {
        let token = Uuid::new_v4();
        let path = self.root.join(format!("{token}.{STAGED_EXTENSION}"));

        let mut file = fs::OpenOptions::new().write(true).create_new(true).open(&path).await?;

        // From here on the guard owns the path and cleans up on every exit
        let staged = StagedFile {
            token,
            path,
            released: false,
        };

        file.write_all(content).await?;
        file.flush().await?;
        file.sync_all().await?;

        debug!(token = %staged.token, size_bytes = content.len(), "Staged upload");
        Ok(staged)
    }
}

/// An uploaded file held in scratch storage for the lifetime of one request.
#[derive(Debug)]
pub struct StagedFile {
    token: Uuid,
    path: PathBuf,
    released: bool,
}

impl StagedFile {
    /// Per-request token the scratch file is named after.
    pub fn token(&self) -> Uuid {
        self.token
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Unlink the scratch file.
    ///
    /// Failures are logged, not returned. A file that is already gone counts as removed.
    pub async fn release(mut self) {
        self.released = true;
        match fs::remove_file(&self.path).await {
            Ok(()) => debug!(token = %self.token, "Removed staged upload"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(token = %self.token, path = %self.path.display(), error = %e, "Failed to remove staged upload"),
        }
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!(token = %self.token, "Removed staged upload on drop"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(token = %self.token, path = %self.path.display(), error = %e, "Failed to remove staged upload on drop"),
        }
    }
}
