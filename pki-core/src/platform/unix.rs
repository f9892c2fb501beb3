//! POSIX / Unix and OS X directory resolution (§6): `$HOME/.cryptlib/`.

use std::path::PathBuf;

pub fn resolve_store_dir() -> Option<PathBuf> {
    let home = std::env::var_os("HOME")?;
    let mut dir = PathBuf::from(home);
    dir.push(".cryptlib");
    Some(dir)
}
