//! Platform/file-layout support (§6): resolving the per-host directory
//! a PKCS #15 key store and its random seed live in. The actual file
//! I/O — locking, symlink rejection, atomic replace, secure erase —
//! is `pki_stream::file::FileStream`'s job; this module only answers
//! "where".

use std::path::PathBuf;

#[cfg(unix)]
mod unix;
#[cfg(windows)]
mod windows;
#[cfg(not(any(unix, windows)))]
mod fallback;

/// Name of the flat-file PKCS #15 token every key store resolves to.
pub const KEYSET_FILENAME: &str = "default.p15";
/// Name of the persisted random seed file alongside it.
pub const RANDSEED_FILENAME: &str = "randseed.dat";

/// Resolves the directory a host's cryptlib-compatible key store and
/// random seed live in, per §6's table. Returns `None` on hosts with
/// no addressable filesystem (the embedded no-FS row), where a caller
/// must fall back to an in-memory blob committed on explicit flush.
pub fn resolve_store_dir() -> Option<PathBuf> {
    #[cfg(windows)]
    {
        windows::resolve_store_dir()
    }
    #[cfg(unix)]
    {
        unix::resolve_store_dir()
    }
    #[cfg(not(any(unix, windows)))]
    {
        fallback::resolve_store_dir()
    }
}

pub fn keyset_path() -> Option<PathBuf> {
    resolve_store_dir().map(|dir| dir.join(KEYSET_FILENAME))
}

pub fn randseed_path() -> Option<PathBuf> {
    resolve_store_dir().map(|dir| dir.join(RANDSEED_FILENAME))
}

/// Ensures the resolved store directory exists, creating it (and any
/// parents) if necessary.
pub fn ensure_store_dir() -> crate::error::Result<PathBuf> {
    let dir = resolve_store_dir().ok_or(crate::error::ErrorKind::NotAvail)?;
    std::fs::create_dir_all(&dir).map_err(|_| crate::error::ErrorKind::Open)?;
    Ok(dir)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolved_paths_end_in_expected_filenames() {
        if let Some(keyset) = keyset_path() {
            assert_eq!(keyset.file_name().unwrap(), KEYSET_FILENAME);
        }
        if let Some(randseed) = randseed_path() {
            assert_eq!(randseed.file_name().unwrap(), RANDSEED_FILENAME);
        }
    }
}
