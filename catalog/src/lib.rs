/// Standard file locations inside a box directory
mod layout;
pub use layout::BoxLayout;

/// Helpers for reading yaml files into typed values
mod yaml;

/// Tasks and their input/output descriptors
mod task;
pub use task::{Direction, Param, Task};

/// Named sets of default parameter values
mod profile;
pub use profile::Profile;

/// The `mlbox_implementation.yaml` descriptor
mod implementation;
pub use implementation::{
    CondaEnv, DockerImpl, ExecImpl, ImagePolicy, Implementation, PythonEnv, PythonImpl,
    SingularityImpl, VirtualEnv,
};

/// Runner (platform) configuration files
mod platform;
pub use platform::{DockerRunnerConfig, RunnerConfig, RunnerRef, SshConfig};

/// Whole-box metadata
mod catalog;
pub use catalog::Catalog;

/// Name of the profile used when an invocation doesn't specify one.
pub const DEFAULT_PROFILE: &str = "default";

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Malformed catalog file \"{file}\": {msg}")]
    MalformedCatalog { file: String, msg: String },
    #[error("Unsupported implementation type \"{0}\"")]
    UnsupportedImplementation(String),
    #[error("Box directory does not exist: {0}")]
    BoxNotFound(String),
    #[error("Task \"{0}\" is not defined in this box")]
    TaskNotFound(String),
    #[error("Task \"{0}\" has no parameter profile named \"{1}\"")]
    ProfileNotFound(String, String),
    #[error("Runner \"{0}\" not found in runner configuration file \"{1}\"")]
    RunnerNotFound(String, String),
}

impl Error {
    pub(crate) fn malformed<T: ToString>(file: &std::path::Path, msg: T) -> Self {
        Self::MalformedCatalog {
            file: file.display().to_string(),
            msg: msg.to_string(),
        }
    }
}
