//! Windows directory resolution (§6): `%APPDATA%\cryptlib\`, falling
//! back to `%WINDIR%\cryptlib\` when roaming app data isn't set.

use std::path::PathBuf;

pub fn resolve_store_dir() -> Option<PathBuf> {
    let base = std::env::var_os("APPDATA").or_else(|| std::env::var_os("WINDIR"))?;
    let mut dir = PathBuf::from(base);
    dir.push("cryptlib");
    Some(dir)
}
