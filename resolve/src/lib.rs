/// Overlay user overrides on profile defaults to get concrete host paths
mod resolver;
pub use resolver::{Invocation, ResolvedArg, ResolvedArgs, Resolver};

/// Map host paths onto a minimal set of container mount points
mod virtualizer;
pub use virtualizer::{virtualize, Mount, Virtualization, MOUNT_PREFIX};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Task \"{0}\" is not defined in this box")]
    UnknownTask(String),
    #[error(
        "No value for parameter \"{name}\" of task \"{task}\": \
        no override given and profile \"{profile}\" doesn't provide one"
    )]
    MissingParameter {
        task: String,
        profile: String,
        name: String,
    },
    #[error("Task \"{0}\" has no parameter named \"{1}\"")]
    UnknownParameter(String, String),
    #[error(transparent)]
    PathEncoding(#[from] util::PathEncodingError),
}
