//! Hosts with no addressable filesystem (§6, "Embedded no-FS": in-
//! memory blob committed on explicit flush). There is no directory to
//! resolve to, so callers fall back to an in-memory store.

use std::path::PathBuf;

pub fn resolve_store_dir() -> Option<PathBuf> {
    None
}
