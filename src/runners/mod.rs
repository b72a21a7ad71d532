use anyhow::Result;

use catalog::{Catalog, Implementation, RunnerConfig};
use resolve::{Invocation, ResolvedArgs};

use crate::exec::{CommandLine, ExitStatus, Shell};
use crate::settings::Environment;

/// Python entrypoint run on the host
mod python;
pub use python::PythonRunner;

/// Shell commands listed in the implementation descriptor
mod exec_script;
pub use exec_script::ExecRunner;

/// Docker and nvidia-docker containers
mod docker;
pub use docker::DockerRunner;

/// Singularity containers
mod singularity;
pub use singularity::SingularityRunner;

/// Relay to mlbox on a remote host over ssh/rsync
mod ssh;
pub use ssh::SshRunner;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Required tool is not available: {0}")]
    EnvironmentUnavailable(String),
    #[error("Image configure policy \"{0}\" is not supported")]
    UnsupportedPolicy(String),
    #[error("Unknown docker runtime \"{0}\"")]
    UnknownDockerRuntime(String),
    #[error("Parameter overrides can't be used with the {0} runner")]
    UnsupportedOverrides(&'static str),
    #[error("A {runner} runner can't run a box with a {implementation} implementation")]
    IncompatibleRunner {
        runner: &'static str,
        implementation: &'static str,
    },
}

/// Lifecycle of a runner within one invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Unconfigured,
    /// `configure` completed successfully.
    Ready,
}

/// Runners that start the box's code as a host process.
#[derive(Debug)]
pub enum DirectProcess {
    Python(PythonRunner),
    Exec(ExecRunner),
}

/// Runners that start the box's code in a container.
#[derive(Debug)]
pub enum Container {
    Docker(DockerRunner),
    Singularity(SingularityRunner),
}

/// The back-end a box is configured and run with.
#[derive(Debug)]
pub enum Runner {
    DirectProcess(DirectProcess),
    Container(Container),
    RemoteRelay(SshRunner),
}

impl Runner {
    /// Pick the runner for `config` and check it can handle the box's implementation.
    pub fn create(catalog: &Catalog, config: &RunnerConfig, env: &Environment) -> Result<Self, Error> {
        let incompatible = || Error::IncompatibleRunner {
            runner: config.tag(),
            implementation: catalog.implementation.type_name(),
        };

        #[rustfmt::skip]
        let runner = match (config, &catalog.implementation) {
            (RunnerConfig::Python, Implementation::Python(imp)) => {
                Self::DirectProcess(DirectProcess::Python(PythonRunner::new(&catalog.layout, imp)))
            }
            (RunnerConfig::Exec, Implementation::Exec(imp)) => {
                Self::DirectProcess(DirectProcess::Exec(ExecRunner::new(&catalog.layout, imp)))
            }
            (RunnerConfig::Docker(platform), Implementation::Docker(imp)) => {
                Self::Container(Container::Docker(DockerRunner::new(&catalog.layout, imp, platform, env)?))
            }
            (RunnerConfig::Singularity, Implementation::Singularity(imp)) => {
                Self::Container(Container::Singularity(SingularityRunner::new(&catalog.layout, imp)))
            }
            (RunnerConfig::Ssh(ssh), _) => Self::RemoteRelay(SshRunner::new(catalog, ssh)),
            _ => return Err(incompatible()),
        };

        log::debug!("created {} runner for box \"{}\"", config.tag(), catalog.name);
        Ok(runner)
    }

    pub fn state(&self) -> State {
        match self {
            Self::DirectProcess(DirectProcess::Python(r)) => r.state,
            Self::DirectProcess(DirectProcess::Exec(r)) => r.state,
            Self::Container(Container::Docker(r)) => r.state,
            Self::Container(Container::Singularity(r)) => r.state,
            Self::RemoteRelay(r) => r.state,
        }
    }

    /// Prepare whatever the box needs before it can run.
    pub fn configure(&mut self, shell: &mut dyn Shell) -> Result<()> {
        match self {
            Self::DirectProcess(DirectProcess::Python(r)) => r.configure(shell),
            Self::DirectProcess(DirectProcess::Exec(r)) => r.configure(shell),
            Self::Container(Container::Docker(r)) => r.configure(shell),
            Self::Container(Container::Singularity(r)) => r.configure(shell),
            Self::RemoteRelay(r) => r.configure(shell),
        }
    }

    /// Run one task with already-resolved arguments.
    /// Returns the exit status of the task's process.
    pub fn execute(
        &mut self,
        shell: &mut dyn Shell,
        invocation: &Invocation,
        args: &ResolvedArgs,
    ) -> Result<ExitStatus> {
        match self {
            Self::DirectProcess(DirectProcess::Python(r)) => r.execute(shell, args),
            Self::DirectProcess(DirectProcess::Exec(r)) => r.execute(shell, args),
            Self::Container(Container::Docker(r)) => r.execute(shell, args),
            Self::Container(Container::Singularity(r)) => r.execute(shell, args),
            Self::RemoteRelay(r) => r.execute(shell, invocation),
        }
    }
}

/// Fail with `EnvironmentUnavailable` unless `<program> --version` succeeds.
fn require_program(shell: &mut dyn Shell, program: &str) -> Result<()> {
    if shell.probe(&CommandLine::new(program).arg("--version"))? {
        Ok(())
    } else {
        Err(Error::EnvironmentUnavailable(program.to_owned()).into())
    }
}

/// Add each proxy variable to `map` unless it's already set there.
fn add_proxies(map: &mut std::collections::BTreeMap<String, String>, env: &Environment, what: &str) {
    for (k, v) in env.proxies() {
        if !map.contains_key(k) {
            log::warn!("Setting docker {what} from env variable: {k} = {v}");
            map.insert(k.to_owned(), v.to_owned());
        }
    }
}
