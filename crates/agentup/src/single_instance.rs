use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use thiserror::Error;

const LOCK_FILE_NAME: &str = ".agentup.lock";

#[derive(Debug, Error)]
pub enum AcquireError {
    #[error("another agentup run holds {}", .path.display())]
    AlreadyHeld { path: PathBuf },
    #[error("{context}: {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },
}

impl AcquireError {
    fn io(context: &'static str, source: std::io::Error) -> Self {
        Self::Io { context, source }
    }
}

/// Exclusive claim on an install directory, released on drop.
#[derive(Debug)]
pub struct InstallLock {
    path: PathBuf,
    _file: File,
}

impl InstallLock {
    pub fn acquire(install_dir: &Path) -> Result<Self, AcquireError> {
        std::fs::create_dir_all(install_dir)
            .map_err(|error| AcquireError::io("failed to create install directory", error))?;

        let path = install_dir.join(LOCK_FILE_NAME);
        let mut lock_file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&path)
            .map_err(|error| AcquireError::io("failed to open install lock file", error))?;

        if let Err(error) = lock_file.try_lock_exclusive() {
            if error.raw_os_error() == fs2::lock_contended_error().raw_os_error()
                || error.kind() == std::io::ErrorKind::WouldBlock
            {
                return Err(AcquireError::AlreadyHeld { path });
            }
            return Err(AcquireError::io("failed to acquire install lock", error));
        }

        lock_file
            .set_len(0)
            .and_then(|()| lock_file.seek(SeekFrom::Start(0)).map(|_| ()))
            .and_then(|()| writeln!(lock_file, "{}", std::process::id()))
            .map_err(|error| AcquireError::io("failed to write install lock metadata", error))?;

        Ok(Self {
            path,
            _file: lock_file,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
