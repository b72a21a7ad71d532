use std::path::{Path, PathBuf};

const MLBOX_FILE: &str = "mlbox.yaml";
const README_FILE: &str = "README.md";
const IMPLEMENTATION_DIR: &str = "implementation";
const IMPLEMENTATION_FILE: &str = "mlbox_implementation.yaml";
const WORKSPACE_DIR: &str = "workspace";
const TASKS_DIR: &str = "tasks";

/// Paths to the standard files and directories of a box.
/// Every path is derived from the (absolute) box root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoxLayout {
    root: PathBuf,
}

impl BoxLayout {
    pub fn new<T: Into<PathBuf>>(root: T) -> Self {
        Self { root: root.into() }
    }

    /// $BOX
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// $BOX/mlbox.yaml
    pub fn mlbox_file(&self) -> PathBuf {
        self.root.join(MLBOX_FILE)
    }

    /// $BOX/README.md
    pub fn readme_file(&self) -> PathBuf {
        self.root.join(README_FILE)
    }

    /// $BOX/implementation
    pub fn implementation_dir(&self) -> PathBuf {
        self.root.join(IMPLEMENTATION_DIR)
    }

    /// $BOX/implementation/mlbox_implementation.yaml
    pub fn implementation_file(&self) -> PathBuf {
        let mut buf = self.implementation_dir();
        buf.push(IMPLEMENTATION_FILE);
        buf
    }

    /// $BOX/workspace
    pub fn workspace_dir(&self) -> PathBuf {
        self.root.join(WORKSPACE_DIR)
    }

    /// $BOX/tasks
    pub fn tasks_dir(&self) -> PathBuf {
        self.root.join(TASKS_DIR)
    }

    /// Resolve a path given relative to the box root.
    /// Absolute paths are returned unchanged.
    pub fn join<T: AsRef<Path>>(&self, rel: T) -> PathBuf {
        self.root.join(rel)
    }
}
