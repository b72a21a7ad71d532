use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use util::PathEncodingError;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Can't perform IO operation: \"{0}\" is not inside the box directory")]
    NotWhitelisted(String),
}

/// All file operations made on behalf of a runner go through this struct.
///
/// Destructive operations check that the path in question is inside the
/// single whitelisted prefix (the box root), otherwise they are refused.
/// Commands run from the implementation descriptor can break this rule;
/// it is up to the box author to make sure they don't.
#[derive(Debug, Clone)]
pub struct Fs {
    /// The directory we are allowed to modify
    prefix: PathBuf,
}

impl Fs {
    /// Create a new `Fs` that may modify anything under `prefix`.
    pub fn new(prefix: &Path) -> Self {
        Self {
            prefix: util::normalize(prefix),
        }
    }

    /// Check if path exists on disk.
    pub fn exists<T: AsRef<Path>>(&self, path: T) -> bool {
        let path = path.as_ref();
        path.exists() || path.is_symlink()
    }

    /// Create a directory (uses `std::fs::create_dir_all`, so an entire tree of dirs can be created).
    pub fn create_dir<T: AsRef<Path>>(&self, path: T) -> Result<()> {
        let path = path.as_ref();
        self.check_whitelist(path)?;
        fs::create_dir_all(path).with_context(|| format!("creating dir {path:?}"))?;
        Ok(())
    }

    /// Recursively delete a directory.
    pub fn delete_dir<T: AsRef<Path>>(&self, path: T) -> Result<()> {
        let path = path.as_ref();
        self.check_whitelist(path)?;
        fs::remove_dir_all(path).with_context(|| format!("deleting dir {path:?}"))?;
        Ok(())
    }

    /// Read entire file into a String.
    pub fn read_to_string<T: AsRef<Path>>(&self, path: T) -> Result<String> {
        let path = path.as_ref();
        fs::read_to_string(path).with_context(|| format!("reading file {path:?}"))
    }

    fn is_whitelisted(&self, path: &Path) -> bool {
        // the prefix itself may not be removed:
        let path = util::normalize(path);
        path.starts_with(&self.prefix) && path != self.prefix
    }

    fn check_whitelist(&self, path: &Path) -> Result<()> {
        if self.is_whitelisted(path) {
            Ok(())
        } else {
            Err(Error::NotWhitelisted(path.to_str().ok_or(PathEncodingError)?.to_owned()).into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_whitelist() -> Result<()> {
        let dir = tempdir()?;
        let fs = Fs::new(dir.path());

        let env = dir.path().join("env/lib");
        fs.create_dir(&env)?;
        assert!(fs.exists(&env));
        fs.delete_dir(dir.path().join("env"))?;
        assert!(!fs.exists(&env));

        assert!(fs.delete_dir(dir.path()).is_err());
        assert!(fs.create_dir(dir.path().join("../outside")).is_err());
        Ok(())
    }
}
