use std::io::Read;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use thiserror::Error;

const DIGEST_PREFIX: &str = "sha256:";

#[derive(Debug, Error)]
pub enum VerifyError {
    #[error("expected sha256 is empty")]
    MissingDigest,
    #[error("failed to read {} for checksum: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("sha256 mismatch got={actual} expected={expected}")]
    Mismatch { actual: String, expected: String },
}

/// Normalize a manifest digest: trim, lowercase, drop a `sha256:` prefix.
#[must_use]
pub fn normalize_digest(expected: &str) -> String {
    let lower = expected.trim().to_ascii_lowercase();
    match lower.strip_prefix(DIGEST_PREFIX) {
        Some(hex) => hex.trim().to_string(),
        None => lower,
    }
}

/// Hex-encoded SHA-256 of the file at `path`, read in one streaming pass.
///
/// # Errors
/// Returns an error when the file cannot be opened or read.
pub fn sha256_file(path: &Path) -> Result<String, VerifyError> {
    let io_error = |source| VerifyError::Io {
        path: path.to_path_buf(),
        source,
    };

    let mut file = std::fs::File::open(path).map_err(io_error)?;
    let mut hasher = Sha256::new();
    let mut buffer = [0_u8; 8192];

    loop {
        let read = file.read(&mut buffer).map_err(io_error)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

/// Check that the file at `path` hashes to `expected`.
///
/// An empty expectation is an error, never a skipped check.
///
/// # Errors
/// Returns [`VerifyError::MissingDigest`] for an empty expectation,
/// [`VerifyError::Mismatch`] with both digests when they differ, or an I/O
/// error if the file cannot be read.
pub fn verify_sha256(path: &Path, expected: &str) -> Result<(), VerifyError> {
    let expected = normalize_digest(expected);
    if expected.is_empty() {
        return Err(VerifyError::MissingDigest);
    }

    let actual = sha256_file(path)?;
    if actual == expected {
        Ok(())
    } else {
        Err(VerifyError::Mismatch { actual, expected })
    }
}
