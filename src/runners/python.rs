use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use catalog::{BoxLayout, CondaEnv, PythonEnv, PythonImpl, VirtualEnv};
use resolve::ResolvedArgs;

use super::{require_program, State};
use crate::exec::{CommandLine, ExitStatus, Shell};
use crate::fs::Fs;

const REQUIREMENTS_FILE_EXT: &str = ".txt";
const VIRTUALENV: &str = "virtualenv";

/// Runs a box's python entrypoint directly on the host, in a system
/// interpreter, a virtualenv inside the box, or a named conda environment.
#[derive(Debug)]
pub struct PythonRunner {
    root: PathBuf,
    imp: PythonImpl,
    fs: Fs,
    pub(super) state: State,
}

impl PythonRunner {
    pub fn new(layout: &BoxLayout, imp: &PythonImpl) -> Self {
        Self {
            root: layout.root().to_path_buf(),
            imp: imp.clone(),
            fs: Fs::new(layout.root()),
            state: State::Unconfigured,
        }
    }

    pub fn configure(&mut self, shell: &mut dyn Shell) -> Result<()> {
        match &self.imp.env {
            PythonEnv::System { interpreter } => {
                require_program(shell, interpreter)?;
                self.pip_install(shell, interpreter)?
            }
            PythonEnv::Virtualenv(venv) => self.configure_virtualenv(shell, venv)?,
            PythonEnv::Conda(conda) => self.configure_conda(shell, conda)?,
        }
        self.state = State::Ready;
        Ok(())
    }

    pub fn execute(&self, shell: &mut dyn Shell, args: &ResolvedArgs) -> Result<ExitStatus> {
        let entrypoint = self.root.join(&self.imp.entrypoint);
        let mut cmd = self
            .python()
            .arg(util::path_str(&entrypoint)?)
            .flag("task", &args.task);
        for arg in args {
            cmd = cmd.flag(&arg.name, util::path_str(&arg.path)?);
        }
        shell
            .run_checked(&cmd)
            .with_context(|| format!("while running task \"{}\"", args.task))
    }

    /// Command that starts the configured interpreter.
    fn python(&self) -> CommandLine {
        match &self.imp.env {
            PythonEnv::System { interpreter } => CommandLine::new(interpreter),
            PythonEnv::Virtualenv(venv) => CommandLine::new(self.venv_python(venv)),
            PythonEnv::Conda(conda) => {
                CommandLine::new(&conda.conda).args(["run", "--name", conda.name.as_str(), "python"])
            }
        }
    }

    fn venv_dir(&self, venv: &VirtualEnv) -> PathBuf {
        util::normalize(&self.root.join(&venv.location))
    }

    fn venv_python(&self, venv: &VirtualEnv) -> String {
        let mut python = self.venv_dir(venv);
        python.push("bin");
        python.push("python");
        python.display().to_string()
    }

    fn configure_virtualenv(&self, shell: &mut dyn Shell, venv: &VirtualEnv) -> Result<()> {
        let dir = self.venv_dir(venv);
        let exists = self.fs.exists(&dir);
        if exists && !self.imp.force_reconfigure {
            log::info!("virtualenv {dir:?} exists; not reconfiguring");
            return require_program(shell, &self.venv_python(venv));
        }

        require_program(shell, VIRTUALENV)?;
        require_program(shell, &venv.base_interpreter)?;
        if exists {
            log::info!("force_reconfigure is set; deleting virtualenv {dir:?}");
            self.fs.delete_dir(&dir)?;
        }

        let create = CommandLine::new(VIRTUALENV)
            .arg("-p")
            .arg(&venv.base_interpreter)
            .arg(util::path_str(&dir)?);
        shell
            .run_checked(&create)
            .context("while creating virtualenv")?;

        self.pip_install(shell, &self.venv_python(venv))
    }

    fn configure_conda(&self, shell: &mut dyn Shell, conda: &CondaEnv) -> Result<()> {
        require_program(shell, &conda.conda)?;

        let list = CommandLine::new(&conda.conda).args(["env", "list"]);
        let exists = shell
            .capture(&list)?
            .stdout
            .lines()
            .any(|line| line.split_whitespace().next() == Some(conda.name.as_str()));

        if exists && self.imp.force_reconfigure {
            log::info!("force_reconfigure is set; removing conda env \"{}\"", conda.name);
            let remove =
                CommandLine::new(&conda.conda).args(["env", "remove", "--name", conda.name.as_str(), "--yes"]);
            shell.run_checked(&remove)?;
        }

        if !exists || self.imp.force_reconfigure {
            let create = CommandLine::new(&conda.conda)
                .args(["create", "--name", conda.name.as_str()])
                .arg(format!("python={}", conda.version))
                .args(["--no-default-packages", "--yes"]);
            shell
                .run_checked(&create)
                .context("while creating conda environment")?;
        } else {
            log::info!("conda env \"{}\" exists", conda.name);
        }

        let Some(requirements) = &self.imp.requirements else {
            log::info!("no python requirements; configuration done");
            return Ok(());
        };
        let mut install = CommandLine::new(&conda.conda).args(["install", "--name", conda.name.as_str(), "--yes"]);
        install = match self.requirements_file(requirements)? {
            Some(file) => install.arg("--file").arg(file),
            None => install.args(requirements.split_whitespace()),
        };
        shell
            .run_checked(&install)
            .context("while installing python requirements")?;
        Ok(())
    }

    fn pip_install(&self, shell: &mut dyn Shell, python: &str) -> Result<()> {
        let Some(requirements) = &self.imp.requirements else {
            log::info!("no python requirements; configuration done");
            return Ok(());
        };
        let mut cmd = CommandLine::new(python).args(["-m", "pip", "install"]);
        cmd = match self.requirements_file(requirements)? {
            Some(file) => cmd.arg("-r").arg(file),
            None => cmd.args(requirements.split_whitespace()),
        };
        shell
            .run_checked(&cmd)
            .context("while installing python requirements")?;
        Ok(())
    }

    /// Absolute path of `requirements` if it names a requirements file.
    fn requirements_file(&self, requirements: &str) -> Result<Option<String>> {
        if !requirements.ends_with(REQUIREMENTS_FILE_EXT) {
            return Ok(None);
        }
        let file = self.root.join(Path::new(requirements));
        Ok(Some(util::path_str(&file)?.to_owned()))
    }
}
