use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use anyhow::Result;
use mlbox::exec::{Captured, CommandLine, Error as ExecError, ExitStatus, Shell};
use mlbox::runners::Error as RunnerError;
use mlbox::{describe, App, Args, Command, Environment, Settings, Target};
use tempfile::{tempdir, TempDir};

const MLBOX_YAML: &str = "\
name: hello_world
tasks:
  hello:
    inputs:
      name: {description: file containing a name}
    outputs:
      greeting: {description: where to write the greeting}
";

/// Records every command instead of running it.
/// Commands starting with one of `failing` exit with status 1.
/// Captured commands starting with a prefix in `outputs` print its text.
#[derive(Clone, Default)]
struct Spy {
    runs: Rc<RefCell<Vec<CommandLine>>>,
    probes: Rc<RefCell<Vec<CommandLine>>>,
    failing: Vec<String>,
    outputs: Vec<(String, String)>,
}

impl Spy {
    fn failing(prefixes: &[&str]) -> Self {
        Self {
            failing: prefixes.iter().map(|p| p.to_string()).collect(),
            ..Default::default()
        }
    }

    fn with_output(mut self, prefix: &str, stdout: &str) -> Self {
        self.outputs.push((prefix.to_owned(), stdout.to_owned()));
        self
    }

    fn status(&self, cmd: &CommandLine) -> ExitStatus {
        let line = cmd.to_string();
        if self.failing.iter().any(|p| line.starts_with(p.as_str())) {
            ExitStatus::from_code(1)
        } else {
            ExitStatus::SUCCESS
        }
    }

    fn runs(&self) -> Vec<CommandLine> {
        self.runs.borrow().clone()
    }

    fn run_lines(&self) -> Vec<String> {
        self.runs.borrow().iter().map(|c| c.to_string()).collect()
    }

    fn num_probes(&self) -> usize {
        self.probes.borrow().len()
    }

    fn probe_lines(&self) -> Vec<String> {
        self.probes.borrow().iter().map(|c| c.to_string()).collect()
    }
}

impl Shell for Spy {
    fn run(&mut self, cmd: &CommandLine) -> Result<ExitStatus> {
        self.runs.borrow_mut().push(cmd.clone());
        Ok(self.status(cmd))
    }

    fn capture(&mut self, cmd: &CommandLine) -> Result<Captured> {
        self.probes.borrow_mut().push(cmd.clone());
        let line = cmd.to_string();
        let stdout = self
            .outputs
            .iter()
            .find(|(prefix, _)| line.starts_with(prefix.as_str()))
            .map(|(_, out)| out.clone())
            .unwrap_or_default();
        Ok(Captured {
            status: self.status(cmd),
            stdout,
        })
    }
}

fn write(root: &Path, rel: &str, text: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, text).unwrap();
}

/// A box with one task and a complete default profile.
fn hello_box(implementation: &str) -> TempDir {
    let dir = tempdir().unwrap();
    let root = dir.path();
    write(root, "mlbox.yaml", MLBOX_YAML);
    write(root, "implementation/mlbox_implementation.yaml", implementation);
    write(
        root,
        "tasks/hello/default.yaml",
        "name: names/alice.txt\ngreeting: greetings/alice.txt\n",
    );
    dir
}

fn docker_box() -> TempDir {
    hello_box("implementation_type: docker\nimage: mlbox/hello:0.1\n")
}

fn env(cwd: &Path) -> Environment {
    Environment {
        cwd: cwd.to_path_buf(),
        http_proxy: None,
        https_proxy: None,
    }
}

fn args(command: Command) -> Args {
    Args {
        command,
        verbose: 1,
        workspace: None,
        platform: None,
    }
}

fn run_app(args: Args, env: Environment, spy: &Spy) -> Result<()> {
    simple_logging::log_to_stderr(log::LevelFilter::Debug);
    let settings: Settings = args.try_into()?;
    let app = App::with_shell(settings, env, Box::new(spy.clone()));
    app.run()
}

fn root_of(dir: &TempDir) -> PathBuf {
    dir.path().canonicalize().unwrap()
}

fn box_arg(dir: &TempDir, target: &str) -> String {
    format!("{}{target}", dir.path().display())
}

#[test]
fn test_docker_run_command() -> Result<()> {
    let dir = docker_box();
    let root = root_of(&dir);
    let spy = Spy::default();

    let target = Target::new([box_arg(&dir, ":hello/default")]);
    run_app(args(Command::Run(target)), env(dir.path()), &spy)?;

    let runs = spy.runs();
    assert_eq!(runs.len(), 1);
    let ws = root.join("workspace");
    let expected = vec![
        "run".to_owned(),
        "-v".to_owned(),
        format!("{}:/input0", ws.join("names").display()),
        "-v".to_owned(),
        format!("{}:/input1", ws.join("greetings").display()),
        "--rm".to_owned(),
        "--net=host".to_owned(),
        "--privileged=true".to_owned(),
        "-t".to_owned(),
        "mlbox/hello:0.1".to_owned(),
        "--mlbox_task=hello".to_owned(),
        "--name=/input0/alice.txt".to_owned(),
        "--greeting=/input1/alice.txt".to_owned(),
    ];
    assert_eq!(runs[0].program, "docker");
    assert_eq!(runs[0].args, expected);
    Ok(())
}

#[test]
fn test_docker_run_with_override_and_proxy() -> Result<()> {
    let dir = docker_box();
    let root = root_of(&dir);
    let spy = Spy::default();

    let target = Target::new([
        box_arg(&dir, ":hello"),
        "--greeting=out/greeting.txt".to_owned(),
    ]);
    let mut env = env(dir.path());
    env.http_proxy = Some("http://proxy:3128".into());
    run_app(args(Command::Run(target)), env, &spy)?;

    let line = &spy.run_lines()[0];
    // relative overrides are relative to the working directory:
    let out_dir = dir.path().join("out");
    assert!(line.contains(&format!("-v {}:/input1", out_dir.display())));
    assert!(line.contains(&format!("-v {}:/input0", root.join("workspace/names").display())));
    assert!(line.contains("-e http_proxy=http://proxy:3128"));
    assert!(line.ends_with("--greeting=/input1/greeting.txt"));
    Ok(())
}

#[test]
fn test_missing_parameter_spawns_nothing() -> Result<()> {
    let dir = docker_box();
    let spy = Spy::default();

    let target = Target::new([box_arg(&dir, ":hello/big")]);
    let err = run_app(args(Command::Run(target)), env(dir.path()), &spy).unwrap_err();

    assert!(matches!(
        err.downcast_ref::<resolve::Error>(),
        Some(resolve::Error::MissingParameter { .. })
    ));
    assert!(spy.runs().is_empty());
    assert_eq!(spy.num_probes(), 0);
    Ok(())
}

#[test]
fn test_unknown_parameter_spawns_nothing() -> Result<()> {
    let dir = docker_box();
    let spy = Spy::default();

    let target = Target::new([box_arg(&dir, ":hello"), "--epochs=3".to_owned()]);
    let err = run_app(args(Command::Run(target)), env(dir.path()), &spy).unwrap_err();

    assert!(matches!(
        err.downcast_ref::<resolve::Error>(),
        Some(resolve::Error::UnknownParameter(..))
    ));
    assert!(spy.runs().is_empty());
    Ok(())
}

#[test]
fn test_failed_command_reports_command_line() -> Result<()> {
    let dir = hello_box(
        "implementation_type: exec\nrun:\n  - ./greet.sh $name > ${greeting}\n",
    );
    let root = root_of(&dir);
    let spy = Spy::failing(&["sh -c"]);

    let target = Target::new([box_arg(&dir, ":hello")]);
    let err = run_app(args(Command::Run(target)), env(dir.path()), &spy).unwrap_err();

    let Some(ExecError::ExternalCommandFailed { command, status }) = err.downcast_ref::<ExecError>()
    else {
        panic!("expected ExternalCommandFailed, got {err:?}");
    };
    assert_eq!(*status, ExitStatus::from_code(1));
    let ws = root.join("workspace");
    assert_eq!(
        *command,
        format!(
            "sh -c './greet.sh {} > {}'",
            ws.join("names/alice.txt").display(),
            ws.join("greetings/alice.txt").display()
        )
    );
    assert_eq!(spy.runs()[0].cwd.as_deref(), Some(root.as_path()));
    Ok(())
}

#[test]
fn test_docker_configure_builds_missing_image() -> Result<()> {
    let dir = docker_box();
    let root = root_of(&dir);
    let spy = Spy::failing(&["docker inspect"]);

    let mut env = env(dir.path());
    env.https_proxy = Some("http://proxy:3128".into());
    let target = Target::new([box_arg(&dir, "")]);
    run_app(args(Command::Configure(target)), env, &spy)?;

    assert_eq!(
        spy.run_lines(),
        ["docker build --build-arg https_proxy=http://proxy:3128 -t mlbox/hello:0.1 \
        -f implementation/docker/dockerfiles/Dockerfile ."]
    );
    assert_eq!(spy.runs()[0].cwd.as_deref(), Some(root.as_path()));
    Ok(())
}

#[test]
fn test_docker_configure_load_unsupported() -> Result<()> {
    let dir = hello_box("implementation_type: docker\nimage: a/b\nconfigure: load\n");
    let spy = Spy::failing(&["docker inspect"]);

    let target = Target::new([box_arg(&dir, "")]);
    let err = run_app(args(Command::Configure(target)), env(dir.path()), &spy).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<RunnerError>(),
        Some(RunnerError::UnsupportedPolicy(_))
    ));
    assert!(spy.runs().is_empty());
    Ok(())
}

#[test]
fn test_nvidia_docker_fallback() -> Result<()> {
    let dir = hello_box(
        "implementation_type: docker\nimage: a/b\ndocker_runtime: nvidia-docker\n",
    );
    let spy = Spy::failing(&["nvidia-docker"]);

    let target = Target::new([box_arg(&dir, ":hello")]);
    run_app(args(Command::Run(target)), env(dir.path()), &spy)?;
    assert_eq!(spy.runs()[0].program, "docker");
    Ok(())
}

#[test]
fn test_no_docker_is_environment_unavailable() -> Result<()> {
    let dir = hello_box(
        "implementation_type: docker\nimage: a/b\ndocker_runtime: nvidia-docker\n",
    );
    let spy = Spy::failing(&["nvidia-docker", "docker"]);

    let target = Target::new([box_arg(&dir, "")]);
    let err = run_app(args(Command::Configure(target)), env(dir.path()), &spy).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<RunnerError>(),
        Some(RunnerError::EnvironmentUnavailable(_))
    ));
    assert!(spy.runs().is_empty());
    Ok(())
}

#[test]
fn test_singularity_run_command() -> Result<()> {
    let dir = hello_box("implementation_type: singularity\n");
    let root = root_of(&dir);
    let spy = Spy::default();

    let target = Target::new([box_arg(&dir, ":hello")]);
    run_app(args(Command::Run(target)), env(dir.path()), &spy)?;

    let ws = root.join("workspace");
    let image = root.join("implementation/singularity/recipes/mlbox.simg");
    assert_eq!(
        spy.run_lines(),
        [format!(
            "singularity run --bind {}:/input0 --bind {}:/input1 {} \
            --mlbox_task=hello --name=/input0/alice.txt --greeting=/input1/alice.txt",
            ws.join("names").display(),
            ws.join("greetings").display(),
            image.display()
        )]
    );
    Ok(())
}

#[test]
fn test_exec_configure() -> Result<()> {
    let dir = hello_box(
        "implementation_type: exec\ndirectories: [workspace/greetings]\nconfigure:\n  - make all\n",
    );
    let root = root_of(&dir);
    let spy = Spy::default();

    let target = Target::new([box_arg(&dir, "")]);
    run_app(args(Command::Configure(target)), env(dir.path()), &spy)?;

    assert!(root.join("workspace/greetings").is_dir());
    assert_eq!(spy.run_lines(), ["sh -c 'make all'"]);
    Ok(())
}

#[test]
fn test_exec_parameters_file() -> Result<()> {
    let dir = tempdir()?;
    let root = dir.path();
    write(
        root,
        "mlbox.yaml",
        "name: trainer\ntasks:\n  train:\n    inputs:\n      parameters_file: {description: hyperparameters}\n",
    );
    write(
        root,
        "implementation/mlbox_implementation.yaml",
        "implementation_type: exec\nrun:\n  - train --epochs=$epochs --lr=${lr}\n",
    );
    write(root, "tasks/train/default.yaml", "parameters_file: params.yaml\n");
    write(root, "workspace/params.yaml", "epochs: 10\nlr: 0.5\n");
    let spy = Spy::default();

    let target = Target::new([format!("{}:train", root.display())]);
    run_app(args(Command::Run(target)), env(root), &spy)?;

    assert_eq!(spy.run_lines(), ["sh -c 'train --epochs=10 --lr=0.5'"]);
    Ok(())
}

#[test]
fn test_python_virtualenv_configure_and_run() -> Result<()> {
    let dir = hello_box(
        "implementation_type: python\ninterpreter: virtualenv\n\
        virtualenv: {location: env}\nrequirements: requirements.txt\nentrypoint: src/hello.py\n",
    );
    let root = root_of(&dir);
    let spy = Spy::default();

    let target = Target::new([box_arg(&dir, "")]);
    run_app(args(Command::Configure(target)), env(dir.path()), &spy)?;

    let venv = root.join("env");
    let python = venv.join("bin/python");
    assert_eq!(
        spy.run_lines(),
        [
            format!("virtualenv -p python3 {}", venv.display()),
            format!(
                "{} -m pip install -r {}",
                python.display(),
                root.join("requirements.txt").display()
            ),
        ]
    );

    let target = Target::new([box_arg(&dir, ":hello")]);
    run_app(args(Command::Run(target)), env(dir.path()), &spy)?;
    let ws = root.join("workspace");
    assert_eq!(
        spy.run_lines()[2],
        format!(
            "{} {} --task=hello --name={} --greeting={}",
            python.display(),
            root.join("src/hello.py").display(),
            ws.join("names/alice.txt").display(),
            ws.join("greetings/alice.txt").display()
        )
    );
    Ok(())
}

#[test]
fn test_ssh_relay() -> Result<()> {
    let dir = docker_box();
    let root = root_of(&dir);
    write(
        dir.path(),
        "platforms.yaml",
        "default: gpu\ngpu:\n  runner: ssh\n  host: gpu01\n  user: alice\n",
    );
    let spy = Spy::default();

    let target = Target::new(["platforms.yaml".to_owned(), box_arg(&dir, ":hello/default")]);
    run_app(args(Command::Run(target)), env(dir.path()), &spy)?;

    assert_eq!(
        spy.run_lines(),
        [
            "ssh -o StrictHostKeyChecking=no alice@gpu01 \
            'cd .mlbox; mlbox run mlboxes/hello_world/docker:hello/default'"
                .to_owned(),
            format!(
                "rsync -r alice@gpu01:.mlbox/mlboxes/hello_world/docker/workspace/ {}/workspace/",
                root.display()
            ),
        ]
    );
    Ok(())
}

#[test]
fn test_ssh_configure_syncs_box() -> Result<()> {
    let dir = docker_box();
    let root = root_of(&dir);
    write(
        dir.path(),
        "platforms.yaml",
        "gpu:\n  runner: ssh\n  host: gpu01\n  port: 2222\n  mlbox: {remote_dir: /srv/boxes/hello}\n",
    );
    let spy = Spy::default();

    let target = Target::new(["platforms.yaml:gpu".to_owned(), box_arg(&dir, "")]);
    run_app(args(Command::Configure(target)), env(dir.path()), &spy)?;

    assert_eq!(
        spy.run_lines(),
        [
            "ssh -o StrictHostKeyChecking=no -p 2222 gpu01 'mkdir -p /srv/boxes/hello'".to_owned(),
            format!(
                "rsync -r -e 'ssh -p 2222' {}/ gpu01:/srv/boxes/hello/",
                root.display()
            ),
            "ssh -o StrictHostKeyChecking=no -p 2222 gpu01 \
            'cd .mlbox; mlbox configure /srv/boxes/hello'"
                .to_owned(),
        ]
    );
    Ok(())
}

#[test]
fn test_ssh_rejects_overrides() -> Result<()> {
    let dir = docker_box();
    write(dir.path(), "platforms.yaml", "gpu:\n  runner: ssh\n  host: gpu01\n");
    let spy = Spy::default();

    let target = Target::new([
        "platforms.yaml:gpu".to_owned(),
        box_arg(&dir, ":hello"),
        "--name=/tmp/bob.txt".to_owned(),
    ]);
    let err = run_app(args(Command::Run(target)), env(dir.path()), &spy).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<RunnerError>(),
        Some(RunnerError::UnsupportedOverrides("ssh"))
    ));
    assert!(spy.runs().is_empty());
    Ok(())
}

#[test]
fn test_ssh_configure_without_sync() -> Result<()> {
    let dir = docker_box();
    write(
        dir.path(),
        "platforms.yaml",
        "gpu:\n  runner: ssh\n  host: gpu01\n  mlbox: {sync: false}\n",
    );
    let spy = Spy::default();

    let target = Target::new(["platforms.yaml:gpu".to_owned(), box_arg(&dir, "")]);
    run_app(args(Command::Configure(target)), env(dir.path()), &spy)?;

    assert_eq!(
        spy.run_lines(),
        ["ssh -o StrictHostKeyChecking=no gpu01 \
        'cd .mlbox; mlbox configure mlboxes/hello_world/docker'"]
    );
    Ok(())
}

#[test]
fn test_ssh_quotes_remote_dirs() -> Result<()> {
    let dir = docker_box();
    write(
        dir.path(),
        "platforms.yaml",
        "gpu:\n  runner: ssh\n  host: gpu01\n  runtime: {remote_dir: my runtime}\n  \
        mlbox: {remote_dir: /srv/my boxes/hello}\n",
    );
    let spy = Spy::default();

    let target = Target::new(["platforms.yaml:gpu".to_owned(), box_arg(&dir, "")]);
    run_app(args(Command::Configure(target)), env(dir.path()), &spy)?;

    let runs = spy.runs();
    assert_eq!(runs.len(), 3);
    assert_eq!(runs[0].args.last().unwrap(), "mkdir -p '/srv/my boxes/hello'");
    assert_eq!(
        runs[2].args.last().unwrap(),
        "cd 'my runtime'; mlbox configure '/srv/my boxes/hello'"
    );
    Ok(())
}

#[test]
fn test_incompatible_runner() -> Result<()> {
    let dir = docker_box();
    write(dir.path(), "platforms.yaml", "local:\n  runner: python\n");
    let spy = Spy::default();

    let target = Target::new(["platforms.yaml:local".to_owned(), box_arg(&dir, "")]);
    let err = run_app(args(Command::Configure(target)), env(dir.path()), &spy).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<RunnerError>(),
        Some(RunnerError::IncompatibleRunner { .. })
    ));
    Ok(())
}

#[test]
fn test_describe() -> Result<()> {
    let dir = docker_box();
    let root = root_of(&dir);
    let catalog = catalog::Catalog::load(dir.path())?;

    let text = describe(&catalog, &root.join("workspace"));
    assert!(text.starts_with("Box: hello_world\n"));
    assert!(text.contains("implementation: docker (image mlbox/hello:0.1"));
    assert!(text.contains("    input name: file containing a name\n"));
    assert!(text.contains("    output greeting: where to write the greeting\n"));
    assert!(text.contains("    profiles: default\n"));
    Ok(())
}

#[test]
fn test_docker_configure_pulls_missing_image() -> Result<()> {
    let dir = hello_box("implementation_type: docker\nimage: a/b\nconfigure: pull\n");
    let spy = Spy::failing(&["docker inspect"]);

    let target = Target::new([box_arg(&dir, "")]);
    run_app(args(Command::Configure(target)), env(dir.path()), &spy)?;
    assert_eq!(spy.run_lines(), ["docker pull a/b"]);
    Ok(())
}

#[test]
fn test_docker_existing_image_not_rebuilt() -> Result<()> {
    let dir = docker_box();
    let spy = Spy::default();

    let target = Target::new([box_arg(&dir, "")]);
    run_app(args(Command::Configure(target)), env(dir.path()), &spy)?;
    assert!(spy.runs().is_empty());
    assert_eq!(
        spy.probe_lines(),
        ["docker --version", "docker inspect --type=image mlbox/hello:0.1"]
    );
    Ok(())
}

#[test]
fn test_nvidia_runtime_run() -> Result<()> {
    let dir = hello_box("implementation_type: docker\nimage: a/b\ndocker_runtime: nvidia-docker2\n");
    let spy = Spy::default().with_output("docker info", "Server:\n Runtimes: nvidia runc\n");

    let target = Target::new([box_arg(&dir, ":hello")]);
    run_app(args(Command::Run(target)), env(dir.path()), &spy)?;

    let runs = spy.runs();
    assert_eq!(runs[0].program, "docker");
    assert_eq!(runs[0].args[..2], ["run", "--runtime=nvidia"]);
    Ok(())
}

#[test]
fn test_nvidia_runtime_missing_falls_back() -> Result<()> {
    let dir = hello_box("implementation_type: docker\nimage: a/b\ndocker_runtime: nvidia\n");
    let spy = Spy::default().with_output("docker info", "Runtimes: runc\n");

    let target = Target::new([box_arg(&dir, ":hello")]);
    run_app(args(Command::Run(target)), env(dir.path()), &spy)?;

    let runs = spy.runs();
    assert_eq!(runs[0].program, "docker");
    assert!(!runs[0].args.iter().any(|a| a == "--runtime=nvidia"));
    Ok(())
}

#[test]
fn test_python_system_pip_install() -> Result<()> {
    let dir = hello_box(
        "implementation_type: python\nrequirements: numpy pandas\nentrypoint: hello.py\n",
    );
    let spy = Spy::default();

    let target = Target::new([box_arg(&dir, "")]);
    run_app(args(Command::Configure(target)), env(dir.path()), &spy)?;

    assert_eq!(spy.probe_lines(), ["python3 --version"]);
    assert_eq!(spy.run_lines(), ["python3 -m pip install numpy pandas"]);
    Ok(())
}

#[test]
fn test_python_missing_interpreter() -> Result<()> {
    let dir = hello_box("implementation_type: python\nentrypoint: hello.py\n");
    let spy = Spy::failing(&["python3"]);

    let target = Target::new([box_arg(&dir, "")]);
    let err = run_app(args(Command::Configure(target)), env(dir.path()), &spy).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<RunnerError>(),
        Some(RunnerError::EnvironmentUnavailable(p)) if p == "python3"
    ));
    assert!(spy.runs().is_empty());
    Ok(())
}

#[test]
fn test_virtualenv_missing_tool() -> Result<()> {
    let dir = hello_box(
        "implementation_type: python\ninterpreter: virtualenv\nvirtualenv: {location: env}\nentrypoint: hello.py\n",
    );
    let spy = Spy::failing(&["virtualenv"]);

    let target = Target::new([box_arg(&dir, "")]);
    let err = run_app(args(Command::Configure(target)), env(dir.path()), &spy).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<RunnerError>(),
        Some(RunnerError::EnvironmentUnavailable(p)) if p == "virtualenv"
    ));
    assert!(spy.runs().is_empty());
    Ok(())
}

#[test]
fn test_virtualenv_exists_not_recreated() -> Result<()> {
    let dir = hello_box(
        "implementation_type: python\ninterpreter: virtualenv\nvirtualenv: {location: env}\n\
        requirements: numpy\nentrypoint: hello.py\n",
    );
    let root = root_of(&dir);
    fs::create_dir_all(root.join("env/bin"))?;
    let spy = Spy::default();

    let target = Target::new([box_arg(&dir, "")]);
    run_app(args(Command::Configure(target)), env(dir.path()), &spy)?;

    assert!(spy.runs().is_empty());
    assert_eq!(
        spy.probe_lines(),
        [format!("{} --version", root.join("env/bin/python").display())]
    );
    Ok(())
}

#[test]
fn test_virtualenv_force_reconfigure() -> Result<()> {
    let dir = hello_box(
        "implementation_type: python\ninterpreter: virtualenv\nvirtualenv: {location: env}\n\
        force_reconfigure: true\nentrypoint: hello.py\n",
    );
    let root = root_of(&dir);
    write(&root, "env/bin/stale", "");
    let spy = Spy::default();

    let target = Target::new([box_arg(&dir, "")]);
    run_app(args(Command::Configure(target)), env(dir.path()), &spy)?;

    assert!(!root.join("env").exists());
    assert_eq!(
        spy.run_lines(),
        [format!("virtualenv -p python3 {}", root.join("env").display())]
    );
    Ok(())
}

const CONDA_BOX: &str = "\
implementation_type: python
interpreter: conda
conda: {name: hello, version: '3.10'}
entrypoint: hello.py
";

const CONDA_ENV_LIST: &str = "\
# conda environments:
#
base                  *  /opt/conda
hello                    /opt/conda/envs/hello
";

#[test]
fn test_conda_creates_missing_env() -> Result<()> {
    let dir = hello_box(&format!("{CONDA_BOX}requirements: numpy scipy\n"));
    let spy = Spy::default().with_output("conda env list", "base  *  /opt/conda\n");

    let target = Target::new([box_arg(&dir, "")]);
    run_app(args(Command::Configure(target)), env(dir.path()), &spy)?;

    assert_eq!(spy.probe_lines(), ["conda --version", "conda env list"]);
    assert_eq!(
        spy.run_lines(),
        [
            "conda create --name hello python=3.10 --no-default-packages --yes",
            "conda install --name hello --yes numpy scipy",
        ]
    );
    Ok(())
}

#[test]
fn test_conda_existing_env_kept() -> Result<()> {
    let dir = hello_box(CONDA_BOX);
    let spy = Spy::default().with_output("conda env list", CONDA_ENV_LIST);

    let target = Target::new([box_arg(&dir, "")]);
    run_app(args(Command::Configure(target)), env(dir.path()), &spy)?;
    assert!(spy.runs().is_empty());
    Ok(())
}

#[test]
fn test_conda_force_reconfigure() -> Result<()> {
    let dir = hello_box(&format!(
        "{CONDA_BOX}force_reconfigure: true\nrequirements: requirements.txt\n"
    ));
    let root = root_of(&dir);
    let spy = Spy::default().with_output("conda env list", CONDA_ENV_LIST);

    let target = Target::new([box_arg(&dir, "")]);
    run_app(args(Command::Configure(target)), env(dir.path()), &spy)?;

    assert_eq!(
        spy.run_lines(),
        [
            "conda env remove --name hello --yes".to_owned(),
            "conda create --name hello python=3.10 --no-default-packages --yes".to_owned(),
            format!(
                "conda install --name hello --yes --file {}",
                root.join("requirements.txt").display()
            ),
        ]
    );
    Ok(())
}

#[test]
fn test_missing_conda() -> Result<()> {
    let dir = hello_box(CONDA_BOX);
    let spy = Spy::failing(&["conda"]);

    let target = Target::new([box_arg(&dir, "")]);
    let err = run_app(args(Command::Configure(target)), env(dir.path()), &spy).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<RunnerError>(),
        Some(RunnerError::EnvironmentUnavailable(p)) if p == "conda"
    ));
    assert!(spy.runs().is_empty());
    Ok(())
}
