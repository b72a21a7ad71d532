use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{Context, Result};

use catalog::{BoxLayout, DockerImpl, DockerRunnerConfig, ImagePolicy};
use resolve::ResolvedArgs;

use super::{add_proxies, Error, State};
use crate::exec::{CommandLine, ExitStatus, Shell};
use crate::settings::Environment;

const DOCKER: &str = "docker";
const NVIDIA_DOCKER: &str = "nvidia-docker";
const TASK_FLAG: &str = "mlbox_task";

/// Container engine invocation styles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Engine {
    /// Plain `docker`
    Docker,
    /// The `nvidia-docker` wrapper
    NvidiaDocker,
    /// `docker --runtime=nvidia` (nvidia-docker2)
    NvidiaRuntime,
}

impl Engine {
    #[rustfmt::skip]
    fn parse(runtime: &str) -> Result<Self, Error> {
        match runtime {
            "docker" | "runc"                                => Ok(Self::Docker),
            "nvidia-docker" | "nvidia_docker"                => Ok(Self::NvidiaDocker),
            "nvidia" | "nvidia-docker2" | "nvidia_docker2"   => Ok(Self::NvidiaRuntime),
            _ => Err(Error::UnknownDockerRuntime(runtime.to_owned())),
        }
    }

    fn program(&self) -> &'static str {
        match self {
            Self::NvidiaDocker => NVIDIA_DOCKER,
            Self::Docker | Self::NvidiaRuntime => DOCKER,
        }
    }

    /// True if this engine can be used on the current host.
    fn is_available(&self, shell: &mut dyn Shell) -> Result<bool> {
        match self {
            Self::Docker => shell.probe(&CommandLine::new(DOCKER).arg("--version")),
            Self::NvidiaDocker => shell.probe(&CommandLine::new(NVIDIA_DOCKER).arg("--version")),
            Self::NvidiaRuntime => {
                let info = shell.capture(&CommandLine::new(DOCKER).arg("info"))?;
                Ok(info.status.success() && has_nvidia_runtime(&info.stdout))
            }
        }
    }
}

/// Looks for `nvidia` in the `Runtimes:` line of `docker info` output.
fn has_nvidia_runtime(info: &str) -> bool {
    info.lines()
        .filter_map(|line| line.trim().strip_prefix("Runtimes:"))
        .any(|runtimes| runtimes.split_whitespace().any(|r| r == "nvidia"))
}

/// Builds or pulls a docker image on `configure`, and runs a task in
/// a fresh container on `execute`, with each parameter's parent
/// directory mounted at an `/inputN` label.
#[derive(Debug)]
pub struct DockerRunner {
    root: PathBuf,
    image: String,
    policy: ImagePolicy,
    dockerfile: PathBuf,
    build_args: BTreeMap<String, String>,
    run_args: BTreeMap<String, String>,
    /// Engine asked for by the box or platform
    preferred: Engine,
    /// Engine found on this host, once probed
    engine: Option<Engine>,
    pub(super) state: State,
}

impl DockerRunner {
    /// Merge the box's docker settings with the platform's; platform values win.
    pub fn new(
        layout: &BoxLayout,
        imp: &DockerImpl,
        platform: &DockerRunnerConfig,
        env: &Environment,
    ) -> Result<Self, Error> {
        let runtime = platform.docker_runtime.as_ref().unwrap_or(&imp.docker_runtime);
        let preferred = Engine::parse(runtime)?;

        let mut build_args = imp.build_args.clone();
        build_args.extend(platform.build_args.clone());
        add_proxies(&mut build_args, env, "build arg");

        let mut run_args = imp.run_args.clone();
        run_args.extend(platform.run_args.clone());
        add_proxies(&mut run_args, env, "run arg");

        Ok(Self {
            root: layout.root().to_path_buf(),
            image: imp.image.clone(),
            policy: imp.configure,
            dockerfile: imp.dockerfile.clone(),
            build_args,
            run_args,
            preferred,
            engine: None,
            state: State::Unconfigured,
        })
    }

    pub fn configure(&mut self, shell: &mut dyn Shell) -> Result<()> {
        self.engine(shell)?;

        let inspect = CommandLine::new(DOCKER).args(["inspect", "--type=image", self.image.as_str()]);
        if shell.probe(&inspect)? {
            log::info!("image found ({})", self.image);
        } else {
            match self.policy {
                ImagePolicy::Build => {
                    log::info!("image does not exist, building...");
                    shell
                        .run_checked(&self.build_command()?)
                        .context("while building docker image")?;
                }
                ImagePolicy::Pull => {
                    log::info!("image does not exist, pulling...");
                    let pull = CommandLine::new(DOCKER).args(["pull", self.image.as_str()]);
                    shell.run_checked(&pull).context("while pulling docker image")?;
                }
                ImagePolicy::Load => return Err(Error::UnsupportedPolicy("load".to_owned()).into()),
            }
        }

        self.state = State::Ready;
        Ok(())
    }

    pub fn execute(&mut self, shell: &mut dyn Shell, args: &ResolvedArgs) -> Result<ExitStatus> {
        let engine = self.engine(shell)?;
        let cmd = self.run_command(engine, args)?;
        shell
            .run_checked(&cmd)
            .with_context(|| format!("while running task \"{}\"", args.task))
    }

    /// Probe for the preferred engine once, falling back to plain docker
    /// if an nvidia engine was asked for but isn't installed.
    fn engine(&mut self, shell: &mut dyn Shell) -> Result<Engine> {
        if let Some(engine) = self.engine {
            return Ok(engine);
        }

        log::info!("checking if can run docker...");
        let engine = if self.preferred.is_available(shell)? {
            self.preferred
        } else if self.preferred != Engine::Docker && Engine::Docker.is_available(shell)? {
            log::warn!(
                "NVIDIA docker runtime is requested, it is not available, \
                but docker runtime is installed. Will continue to use docker."
            );
            Engine::Docker
        } else {
            return Err(Error::EnvironmentUnavailable(self.preferred.program().to_owned()).into());
        };

        self.engine = Some(engine);
        Ok(engine)
    }

    fn build_command(&self) -> Result<CommandLine> {
        let mut cmd = CommandLine::new(DOCKER).arg("build");
        for (k, v) in &self.build_args {
            cmd = cmd.arg("--build-arg").arg(format!("{k}={v}"));
        }
        Ok(cmd
            .args(["-t", self.image.as_str(), "-f"])
            .arg(util::path_str(&self.dockerfile)?)
            .arg(".")
            .current_dir(&self.root))
    }

    fn run_command(&self, engine: Engine, args: &ResolvedArgs) -> Result<CommandLine> {
        let virt = args.virtualize()?;

        let mut cmd = CommandLine::new(engine.program()).arg("run");
        if engine == Engine::NvidiaRuntime {
            cmd = cmd.arg("--runtime=nvidia");
        }
        for mount in virt.mounts() {
            let host = util::path_str(&mount.host)?;
            cmd = cmd.arg("-v").arg(format!("{host}:{}", mount.label));
        }
        for (k, v) in &self.run_args {
            cmd = cmd.arg("-e").arg(format!("{k}={v}"));
        }
        cmd = cmd
            .args(["--rm", "--net=host", "--privileged=true", "-t", self.image.as_str()])
            .flag(TASK_FLAG, &args.task);

        for arg in args {
            let path = virt
                .virtual_path(&arg.path)
                .with_context(|| format!("no container path for {:?}", arg.path))?;
            cmd = cmd.flag(&arg.name, path);
        }
        Ok(cmd)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nvidia_runtime_detection() {
        let info = "Server Version: 24.0\n Runtimes: io.containerd.runc.v2 nvidia runc\n";
        assert!(has_nvidia_runtime(info));
        assert!(!has_nvidia_runtime(" Runtimes: runc\n"));
        assert!(!has_nvidia_runtime("nvidia\n"));
    }

    #[test]
    fn test_engine_parse() {
        assert_eq!(Engine::parse("runc").unwrap(), Engine::Docker);
        assert_eq!(Engine::parse("nvidia-docker").unwrap(), Engine::NvidiaDocker);
        assert_eq!(Engine::parse("nvidia_docker2").unwrap().program(), "docker");
        assert!(matches!(
            Engine::parse("podman"),
            Err(Error::UnknownDockerRuntime(_))
        ));
    }
}
