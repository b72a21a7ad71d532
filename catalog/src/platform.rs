use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_yaml::Value;

use crate::{yaml, Error, Implementation};

const DEFAULT_KEY: &str = "default";
const RUNNER_KEY: &str = "runner";

const DEFAULT_REMOTE_RUNTIME_DIR: &str = ".mlbox";
const DEFAULT_REMOTE_PROGRAM: &str = "mlbox";

/// Reference to a runner configuration on the command line:
/// either `platforms.yaml` (use the file's `default` runner)
/// or `platforms.yaml:name`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerRef {
    pub file: PathBuf,
    pub name: Option<String>,
}

impl RunnerRef {
    pub fn parse(s: &str) -> Self {
        if s.ends_with(".yaml") || s.ends_with(".yml") {
            return Self {
                file: PathBuf::from(s),
                name: None,
            };
        }
        match s.rsplit_once(':') {
            Some((file, name)) if !name.is_empty() => Self {
                file: PathBuf::from(file),
                name: Some(name.to_owned()),
            },
            _ => Self {
                file: PathBuf::from(s),
                name: None,
            },
        }
    }
}

/// Settings for one runner, selected by its `runner` tag.
#[derive(Debug, Clone)]
pub enum RunnerConfig {
    Python,
    Exec,
    Docker(DockerRunnerConfig),
    Singularity,
    Ssh(SshConfig),
}

impl RunnerConfig {
    /// Load the runner named by `runner_ref` from its configuration file.
    /// Returns the runner's name along with its settings.
    pub fn load(runner_ref: &RunnerRef) -> Result<(String, Self), Error> {
        let file = &runner_ref.file;
        let value: Value = yaml::read(file)?;

        let name = match &runner_ref.name {
            Some(name) => name.clone(),
            None => value
                .get(DEFAULT_KEY)
                .and_then(Value::as_str)
                .ok_or_else(|| {
                    Error::malformed(file, format!("no runner given and no \"{DEFAULT_KEY}\" key"))
                })?
                .to_owned(),
        };

        let section = value
            .get(name.as_str())
            .cloned()
            .ok_or_else(|| Error::RunnerNotFound(name.clone(), file.display().to_string()))?;

        log::debug!("using runner \"{name}\" from {file:?}");
        Ok((name, Self::from_value(section, file)?))
    }

    /// Parse one runner section.
    pub fn from_value(value: Value, file: &Path) -> Result<Self, Error> {
        let tag = value
            .get(RUNNER_KEY)
            .and_then(Value::as_str)
            .ok_or_else(|| Error::malformed(file, format!("runner has no \"{RUNNER_KEY}\" tag")))?
            .to_owned();

        #[rustfmt::skip]
        let config = match tag.as_str() {
            "python"      => Self::Python,
            "exec"        => Self::Exec,
            "docker"      => Self::Docker(yaml::convert(value, file)?),
            "singularity" => Self::Singularity,
            "ssh"         => Self::Ssh(yaml::convert(value, file)?),
            _ => return Err(Error::UnsupportedImplementation(tag)),
        };
        Ok(config)
    }

    /// Runner to use when no configuration file was given:
    /// the one matching the box's own implementation, with default settings.
    pub fn for_implementation(implementation: &Implementation) -> Self {
        match implementation {
            Implementation::Docker(_) => Self::Docker(DockerRunnerConfig::default()),
            Implementation::Singularity(_) => Self::Singularity,
            Implementation::Python(_) => Self::Python,
            Implementation::Exec(_) => Self::Exec,
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            Self::Python => "python",
            Self::Exec => "exec",
            Self::Docker(_) => "docker",
            Self::Singularity => "singularity",
            Self::Ssh(_) => "ssh",
        }
    }
}

/// Platform-level docker settings, merged over the box's own.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DockerRunnerConfig {
    #[serde(default)]
    pub build_args: BTreeMap<String, String>,
    #[serde(default)]
    pub run_args: BTreeMap<String, String>,
    /// Overrides the box's `docker_runtime`.
    pub docker_runtime: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SshConfig {
    pub host: String,
    pub user: Option<String>,
    pub port: Option<u16>,
    #[serde(default)]
    pub runtime: RemoteRuntime,
    #[serde(default)]
    pub mlbox: RemoteBox,
}

impl SshConfig {
    /// `user@host`, or just `host` when no user is configured.
    pub fn connection(&self) -> String {
        match &self.user {
            Some(user) => format!("{user}@{}", self.host),
            None => self.host.clone(),
        }
    }
}

/// Where mlbox lives on the remote host.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteRuntime {
    #[serde(default = "default_remote_runtime_dir")]
    pub remote_dir: String,
    /// Command used to invoke mlbox remotely.
    #[serde(default = "default_remote_program")]
    pub program: String,
}

impl Default for RemoteRuntime {
    fn default() -> Self {
        Self {
            remote_dir: default_remote_runtime_dir(),
            program: default_remote_program(),
        }
    }
}

/// Where the box is copied to on the remote host.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteBox {
    /// Defaults to `<runtime dir>/mlboxes/<box name>/<implementation type>`.
    pub remote_dir: Option<String>,
    #[serde(default = "default_true")]
    pub sync: bool,
}

impl Default for RemoteBox {
    fn default() -> Self {
        Self {
            remote_dir: None,
            sync: true,
        }
    }
}

fn default_remote_runtime_dir() -> String {
    DEFAULT_REMOTE_RUNTIME_DIR.to_owned()
}

fn default_remote_program() -> String {
    DEFAULT_REMOTE_PROGRAM.to_owned()
}

fn default_true() -> bool {
    true
}
