use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use catalog::{Catalog, SshConfig};
use resolve::Invocation;

use super::{Error, State};
use crate::exec::{shell_quote, CommandLine, ExitStatus, Shell};

const SSH: &str = "ssh";
const RSYNC: &str = "rsync";
const WORKSPACE_DIR: &str = "workspace";

/// Relays `configure` and `run` to mlbox on a remote host: the box is
/// copied over with rsync, the command is repeated there over ssh, and
/// the remote workspace is copied back after a run.
#[derive(Debug)]
pub struct SshRunner {
    local_root: PathBuf,
    config: SshConfig,
    /// Where the box lives on the remote host.
    remote_box: String,
    pub(super) state: State,
}

impl SshRunner {
    pub fn new(catalog: &Catalog, config: &SshConfig) -> Self {
        let remote_box = match &config.mlbox.remote_dir {
            Some(dir) => dir.clone(),
            None => format!(
                "{}/mlboxes/{}/{}",
                config.runtime.remote_dir.trim_end_matches('/'),
                catalog.name,
                catalog.implementation.type_name()
            ),
        };
        log::info!("remote runtime = {}, remote box = {remote_box}", config.runtime.remote_dir);
        Self {
            local_root: catalog.layout.root().to_path_buf(),
            config: config.clone(),
            remote_box,
            state: State::Unconfigured,
        }
    }

    pub fn configure(&mut self, shell: &mut dyn Shell) -> Result<()> {
        if self.config.mlbox.sync {
            shell.run_checked(&self.ssh(format!("mkdir -p {}", shell_quote(&self.remote_box))))?;
            let local = format!("{}/", util::path_str(&self.local_root)?);
            let remote = format!("{}:{}/", self.config.connection(), self.remote_box);
            shell
                .run_checked(&self.rsync(local, remote))
                .context("while copying box to remote host")?;
        }

        let remote_cmd = format!("configure {}", shell_quote(&self.relative_box()?));
        shell
            .run_checked(&self.ssh(self.in_runtime(&remote_cmd)))
            .context("while configuring box on remote host")?;

        self.state = State::Ready;
        Ok(())
    }

    /// Overrides name local paths, so they are rejected before anything runs.
    pub fn execute(&self, shell: &mut dyn Shell, invocation: &Invocation) -> Result<ExitStatus> {
        if !invocation.overrides.is_empty() {
            return Err(Error::UnsupportedOverrides("ssh").into());
        }

        let target = format!(
            "{}:{}/{}",
            self.relative_box()?,
            invocation.task,
            invocation.profile
        );
        let remote_cmd = format!("run {}", shell_quote(&target));
        let status = shell
            .run_checked(&self.ssh(self.in_runtime(&remote_cmd)))
            .with_context(|| format!("while running task \"{}\" on remote host", invocation.task))?;

        let remote = format!(
            "{}:{}/{WORKSPACE_DIR}/",
            self.config.connection(),
            self.remote_box
        );
        let local = format!("{}/{WORKSPACE_DIR}/", util::path_str(&self.local_root)?);
        shell
            .run_checked(&self.rsync(remote, local))
            .context("while copying workspace back from remote host")?;
        Ok(status)
    }

    /// `cd <runtime dir>; <program> <args>`
    fn in_runtime(&self, args: &str) -> String {
        format!(
            "cd {}; {} {args}",
            shell_quote(&self.config.runtime.remote_dir),
            shell_quote(&self.config.runtime.program)
        )
    }

    /// Remote box directory relative to the remote runtime directory,
    /// since remote commands run from there.
    fn relative_box(&self) -> Result<String> {
        let runtime = Path::new(&self.config.runtime.remote_dir);
        let remote_box = Path::new(&self.remote_box);
        let rel = remote_box.strip_prefix(runtime).unwrap_or(remote_box);
        Ok(util::path_str(rel)?.to_owned())
    }

    fn ssh(&self, remote_cmd: String) -> CommandLine {
        let mut cmd = CommandLine::new(SSH).args(["-o", "StrictHostKeyChecking=no"]);
        if let Some(port) = self.config.port {
            cmd = cmd.arg("-p").arg(port.to_string());
        }
        cmd.arg(self.config.connection()).arg(remote_cmd)
    }

    fn rsync(&self, src: String, dst: String) -> CommandLine {
        let mut cmd = CommandLine::new(RSYNC).arg("-r");
        if let Some(port) = self.config.port {
            cmd = cmd.arg("-e").arg(format!("ssh -p {port}"));
        }
        cmd.arg(src).arg(dst)
    }
}
