use std::path::PathBuf;

use anyhow::{Context, Result};

use catalog::{BoxLayout, SingularityImpl};
use resolve::ResolvedArgs;

use super::{require_program, State};
use crate::exec::{CommandLine, ExitStatus, Shell};

const SINGULARITY: &str = "singularity";
const TASK_FLAG: &str = "mlbox_task";

/// Builds a singularity image from the box's recipe on `configure`,
/// and runs a task in it on `execute`.
#[derive(Debug)]
pub struct SingularityRunner {
    root: PathBuf,
    image: PathBuf,
    recipe: PathBuf,
    pub(super) state: State,
}

impl SingularityRunner {
    pub fn new(layout: &BoxLayout, imp: &SingularityImpl) -> Self {
        Self {
            root: layout.root().to_path_buf(),
            image: layout.join(&imp.image),
            recipe: layout.join(&imp.recipe),
            state: State::Unconfigured,
        }
    }

    pub fn configure(&mut self, shell: &mut dyn Shell) -> Result<()> {
        require_program(shell, SINGULARITY)?;

        if self.image.exists() {
            log::info!("image found ({:?})", self.image);
        } else {
            let build = CommandLine::new(SINGULARITY)
                .args(["build", "--fakeroot"])
                .arg(util::path_str(&self.image)?)
                .arg(util::path_str(&self.recipe)?)
                .current_dir(&self.root);
            shell
                .run_checked(&build)
                .context("while building singularity image")?;
        }

        self.state = State::Ready;
        Ok(())
    }

    pub fn execute(&self, shell: &mut dyn Shell, args: &ResolvedArgs) -> Result<ExitStatus> {
        let virt = args.virtualize()?;

        let mut cmd = CommandLine::new(SINGULARITY).arg("run");
        for mount in virt.mounts() {
            let host = util::path_str(&mount.host)?;
            cmd = cmd.arg("--bind").arg(format!("{host}:{}", mount.label));
        }
        cmd = cmd
            .arg(util::path_str(&self.image)?)
            .flag(TASK_FLAG, &args.task);
        for arg in args {
            let path = virt
                .virtual_path(&arg.path)
                .with_context(|| format!("no container path for {:?}", arg.path))?;
            cmd = cmd.flag(&arg.name, path);
        }

        shell
            .run_checked(&cmd)
            .with_context(|| format!("while running task \"{}\"", args.task))
    }
}
