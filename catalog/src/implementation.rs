use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_yaml::Value;

use crate::{yaml, Error};

const TYPE_KEY: &str = "implementation_type";

const DEFAULT_DOCKER_RUNTIME: &str = "docker";
const DEFAULT_DOCKERFILE: &str = "implementation/docker/dockerfiles/Dockerfile";
const DEFAULT_SINGULARITY_IMAGE: &str = "implementation/singularity/recipes/mlbox.simg";
const DEFAULT_SINGULARITY_RECIPE: &str = "implementation/singularity/recipes/Singularity.recipe";
const DEFAULT_PYTHON: &str = "python3";
const DEFAULT_CONDA: &str = "conda";

/// How a box's code is packaged, as declared in `mlbox_implementation.yaml`.
/// Each variant is validated when the descriptor is loaded.
#[derive(Debug, Clone)]
pub enum Implementation {
    Docker(DockerImpl),
    Singularity(SingularityImpl),
    Python(PythonImpl),
    Exec(ExecImpl),
}

impl Implementation {
    /// Load and validate an implementation descriptor.
    pub fn load(file: &Path) -> Result<Self, Error> {
        let value: Value = yaml::read(file)?;
        let ty = value
            .get(TYPE_KEY)
            .and_then(Value::as_str)
            .ok_or_else(|| Error::malformed(file, format!("missing \"{TYPE_KEY}\"")))?
            .to_owned();

        log::debug!("loading {ty} implementation from {file:?}");

        #[rustfmt::skip]
        let implementation = match ty.as_str() {
            "docker"      => Self::Docker(yaml::convert(value, file)?),
            "singularity" => Self::Singularity(yaml::convert(value, file)?),
            "python"      => Self::Python(yaml::convert::<RawPythonImpl>(value, file)?.validate(file)?),
            "exec"        => Self::Exec(yaml::convert(value, file)?),
            _ => return Err(Error::UnsupportedImplementation(ty)),
        };
        Ok(implementation)
    }

    /// The `implementation_type` tag this was loaded from.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Docker(_) => "docker",
            Self::Singularity(_) => "singularity",
            Self::Python(_) => "python",
            Self::Exec(_) => "exec",
        }
    }
}

// DOCKER ////////////////////

/// What `configure` does when the image isn't available locally.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImagePolicy {
    #[default]
    Build,
    Pull,
    Load,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DockerImpl {
    pub image: String,
    /// Preferred engine binary (`docker`, `nvidia-docker`, ...)
    #[serde(default = "default_docker_runtime")]
    pub docker_runtime: String,
    #[serde(default)]
    pub configure: ImagePolicy,
    /// Relative to the box root.
    #[serde(default = "default_dockerfile")]
    pub dockerfile: PathBuf,
    #[serde(default)]
    pub build_args: BTreeMap<String, String>,
    /// Environment variables passed to `docker run` with `-e`.
    #[serde(default)]
    pub run_args: BTreeMap<String, String>,
}

fn default_docker_runtime() -> String {
    DEFAULT_DOCKER_RUNTIME.to_owned()
}

fn default_dockerfile() -> PathBuf {
    PathBuf::from(DEFAULT_DOCKERFILE)
}

// SINGULARITY ///////////////

#[derive(Debug, Clone, Deserialize)]
pub struct SingularityImpl {
    /// Image file, relative to the box root.
    #[serde(default = "default_singularity_image")]
    pub image: PathBuf,
    /// Recipe the image is built from, relative to the box root.
    #[serde(default = "default_singularity_recipe")]
    pub recipe: PathBuf,
}

fn default_singularity_image() -> PathBuf {
    PathBuf::from(DEFAULT_SINGULARITY_IMAGE)
}

fn default_singularity_recipe() -> PathBuf {
    PathBuf::from(DEFAULT_SINGULARITY_RECIPE)
}

// PYTHON ////////////////////

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum InterpreterKind {
    #[default]
    #[serde(alias = "current")]
    System,
    Virtualenv,
    Conda,
}

#[derive(Debug, Clone, Deserialize)]
struct SystemSection {
    #[serde(default = "default_python")]
    interpreter: String,
}

impl Default for SystemSection {
    fn default() -> Self {
        Self {
            interpreter: default_python(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct RawPythonImpl {
    #[serde(default)]
    interpreter: InterpreterKind,
    #[serde(default)]
    system: SystemSection,
    virtualenv: Option<VirtualEnv>,
    conda: Option<CondaEnv>,
    requirements: Option<String>,
    entrypoint: PathBuf,
    #[serde(default)]
    force_reconfigure: bool,
}

impl RawPythonImpl {
    fn validate(self, file: &Path) -> Result<PythonImpl, Error> {
        let env = match self.interpreter {
            InterpreterKind::System => PythonEnv::System {
                interpreter: self.system.interpreter,
            },
            InterpreterKind::Virtualenv => PythonEnv::Virtualenv(self.virtualenv.ok_or_else(
                || Error::malformed(file, "interpreter is virtualenv but no \"virtualenv\" section"),
            )?),
            InterpreterKind::Conda => PythonEnv::Conda(self.conda.ok_or_else(|| {
                Error::malformed(file, "interpreter is conda but no \"conda\" section")
            })?),
        };
        let requirements = self.requirements.filter(|r| !r.trim().is_empty());
        Ok(PythonImpl {
            env,
            requirements,
            entrypoint: self.entrypoint,
            force_reconfigure: self.force_reconfigure,
        })
    }
}

/// A box whose entrypoint is a python script run directly on the host.
#[derive(Debug, Clone)]
pub struct PythonImpl {
    pub env: PythonEnv,
    /// Either a `.txt` requirements file relative to the box root,
    /// or a whitespace-separated list of package specs.
    pub requirements: Option<String>,
    /// Script to run, relative to the box root.
    pub entrypoint: PathBuf,
    /// Destroy and recreate the environment on `configure`.
    pub force_reconfigure: bool,
}

/// Interpreter environment a python box runs in.
#[derive(Debug, Clone)]
pub enum PythonEnv {
    System { interpreter: String },
    Virtualenv(VirtualEnv),
    Conda(CondaEnv),
}

#[derive(Debug, Clone, Deserialize)]
pub struct VirtualEnv {
    /// Relative to the box root.
    pub location: PathBuf,
    #[serde(default = "default_python")]
    pub base_interpreter: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CondaEnv {
    #[serde(default = "default_conda")]
    pub conda: String,
    pub name: String,
    pub version: String,
}

fn default_python() -> String {
    DEFAULT_PYTHON.to_owned()
}

fn default_conda() -> String {
    DEFAULT_CONDA.to_owned()
}

// EXEC //////////////////////

/// A box driven by plain shell commands.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExecImpl {
    /// Directories to create (relative to the box root) on `configure`.
    #[serde(default)]
    pub directories: Vec<PathBuf>,
    /// Shell commands run on `configure`.
    #[serde(default)]
    pub configure: Vec<String>,
    /// Shell commands run on `run`. `$name` and `${name}` are replaced
    /// with resolved parameter values.
    #[serde(default)]
    pub run: Vec<String>,
}
