use std::path::{Component, Path, PathBuf};

use crate::PathEncodingError;

/// Lexically normalize a path: drop `.` components and fold `..` into
/// the preceding component. Does not touch the filesystem, so symlinks
/// are not resolved and the path need not exist.
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::with_capacity(path.as_os_str().len());
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                // can't go above the root; keep leading '..' on relative paths:
                match out.components().next_back() {
                    Some(Component::Normal(_)) => {
                        out.pop();
                    }
                    Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                    _ => out.push(".."),
                }
            }
            other => out.push(other),
        }
    }
    out
}

/// Borrow a path as `&str`, or fail if it isn't UTF-8.
pub fn path_str(path: &Path) -> Result<&str, PathEncodingError> {
    path.to_str().ok_or(PathEncodingError)
}

/// Final component of a path as `&str`, if it has one.
pub fn file_name_str(path: &Path) -> Result<Option<&str>, PathEncodingError> {
    match path.file_name() {
        Some(name) => name.to_str().map(Some).ok_or(PathEncodingError),
        None => Ok(None),
    }
}
