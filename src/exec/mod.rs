/// Rendering external command lines
mod command_line;
pub(crate) use command_line::shell_quote;
pub use command_line::CommandLine;

/// Running commands as real subprocesses
mod system_shell;
pub use system_shell::SystemShell;

use anyhow::Result;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Command failed with {status}: {command}")]
    ExternalCommandFailed { command: String, status: ExitStatus },
    #[error("Unable to start command \"{command}\": {source}")]
    Spawn {
        command: String,
        source: std::io::Error,
    },
}

/// Exit status of an external command.
/// `code` is `None` when the process was killed by a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitStatus {
    pub code: Option<i32>,
}

/// Conventional exit code of a shell when a program can't be found.
pub const NOT_FOUND: i32 = 127;

impl ExitStatus {
    pub const SUCCESS: Self = Self { code: Some(0) };

    pub fn from_code(code: i32) -> Self {
        Self { code: Some(code) }
    }

    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

impl From<std::process::ExitStatus> for ExitStatus {
    fn from(status: std::process::ExitStatus) -> Self {
        Self {
            code: status.code(),
        }
    }
}

impl std::fmt::Display for ExitStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.code {
            Some(code) => write!(f, "exit code {code}"),
            None => write!(f, "termination by signal"),
        }
    }
}

/// Output of a command run with `Shell::capture`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Captured {
    pub status: ExitStatus,
    pub stdout: String,
}

/// Everything that spawns an external process goes through this trait,
/// so that runners can be driven without touching the system.
pub trait Shell {
    /// Run `cmd` to completion, mirroring its stdout and stderr line by line.
    fn run(&mut self, cmd: &CommandLine) -> Result<ExitStatus>;

    /// Run `cmd` to completion without mirroring, collecting its stdout.
    /// Used for probes like `docker --version`.
    fn capture(&mut self, cmd: &CommandLine) -> Result<Captured>;

    /// Run `cmd`, failing with `ExternalCommandFailed` on a non-zero exit.
    fn run_checked(&mut self, cmd: &CommandLine) -> Result<ExitStatus> {
        let status = self.run(cmd)?;
        if status.success() {
            Ok(status)
        } else {
            Err(Error::ExternalCommandFailed {
                command: cmd.to_string(),
                status,
            }
            .into())
        }
    }

    /// True if `cmd` can be started and exits successfully.
    fn probe(&mut self, cmd: &CommandLine) -> Result<bool> {
        Ok(self.capture(cmd)?.status.success())
    }
}
