use std::path::{Path, PathBuf};

/// A named set of default values for a task's parameters.
/// Paths are relative to the workspace directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    pub name: String,
    defaults: Vec<(String, PathBuf)>,
}

impl Profile {
    pub fn new<T: Into<String>>(name: T, defaults: Vec<(String, PathBuf)>) -> Self {
        Self {
            name: name.into(),
            defaults,
        }
    }

    /// Default path for parameter `name`, if this profile has one.
    pub fn get(&self, name: &str) -> Option<&Path> {
        self.defaults
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_path())
    }

    /// All defaults, in the order they appear in the profile file.
    pub fn defaults(&self) -> &[(String, PathBuf)] {
        &self.defaults
    }
}
