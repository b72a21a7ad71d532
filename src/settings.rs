use std::path::PathBuf;

use anyhow::{Context, Result};

use catalog::{RunnerRef, DEFAULT_PROFILE};
use resolve::Invocation;

use crate::args::{Args, Command};

const OVERRIDE_PREFIX: &str = "--";
const HTTP_PROXY: &str = "http_proxy";
const HTTPS_PROXY: &str = "https_proxy";

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("No task specified (should be formatted 'BOX:TASK[/PROFILE]')")]
    NoTaskSpecified,
    #[error("Invalid box reference '{0}' (should be formatted 'BOX[:TASK[/PROFILE]]')")]
    InvalidBoxRef(String),
    #[error("Invalid parameter override '{0}' (should be formatted '--NAME=VALUE')")]
    InvalidOverride(String),
    #[error("Expected '[RUNNER_CONFIG] BOX', got {0} positional arguments")]
    WrongNumberOfArgs(usize),
}

/// Which operation to perform on the box.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Describe,
    Configure,
    Run,
}

/// Settings are like Args, except all the logic has
/// been applied so e.g. defaults are added in.
#[derive(Debug)]
pub struct Settings {
    pub action: Action,
    pub box_dir: PathBuf,
    pub task: Option<String>,
    pub profile: String,
    pub overrides: Vec<(String, PathBuf)>,
    /// `None` means use the runner matching the box's implementation.
    pub runner: Option<RunnerRef>,
    pub workspace: Option<PathBuf>,
    pub verbose: u8,
}

impl Settings {
    /// The task invocation these settings describe.
    pub fn invocation(&self) -> Result<Invocation, Error> {
        let task = self.task.as_ref().ok_or(Error::NoTaskSpecified)?;
        Ok(Invocation {
            task: task.clone(),
            profile: self.profile.clone(),
            overrides: self.overrides.clone(),
        })
    }

    /// Overrides given to an action that doesn't use them.
    pub fn ignored_overrides(&self) -> &[(String, PathBuf)] {
        match self.action {
            Action::Run => &[],
            Action::Describe | Action::Configure => &self.overrides,
        }
    }
}

impl TryFrom<Args> for Settings {
    type Error = anyhow::Error;
    fn try_from(args: Args) -> Result<Self, Self::Error> {
        let action = match &args.command {
            Command::Describe(_) => Action::Describe,
            Command::Configure(_) => Action::Configure,
            Command::Run(_) => Action::Run,
        };

        let mut positional = Vec::with_capacity(2);
        let mut overrides = Vec::with_capacity(4);
        for arg in &args.command.target().args {
            if let Some(kv) = arg.strip_prefix(OVERRIDE_PREFIX) {
                let (k, v) = kv
                    .split_once('=')
                    .filter(|(k, _)| !k.is_empty())
                    .ok_or_else(|| Error::InvalidOverride(arg.clone()))?;
                overrides.push((k.to_owned(), PathBuf::from(v)));
            } else {
                positional.push(arg.as_str());
            }
        }

        let (runner, box_ref) = match positional[..] {
            [box_ref] => (args.platform.as_deref().map(RunnerRef::parse), box_ref),
            [runner, box_ref] => (Some(RunnerRef::parse(runner)), box_ref),
            _ => return Err(Error::WrongNumberOfArgs(positional.len()).into()),
        };

        let (box_dir, task, profile) = parse_box_ref(box_ref)?;
        if action == Action::Run && task.is_none() {
            return Err(Error::NoTaskSpecified.into());
        }
        Ok(Self {
            action,
            box_dir,
            task,
            profile,
            overrides,
            runner,
            workspace: args.workspace.map(PathBuf::from),
            verbose: args.verbose,
        })
    }
}

/// Split `BOX[:TASK[/PROFILE]]`.
fn parse_box_ref(s: &str) -> Result<(PathBuf, Option<String>, String), Error> {
    let Some((dir, task_ref)) = s.rsplit_once(':') else {
        return Ok((PathBuf::from(s), None, DEFAULT_PROFILE.to_owned()));
    };

    let (task, profile) = match task_ref.split_once('/') {
        Some((task, profile)) => (task, profile),
        None => (task_ref, DEFAULT_PROFILE),
    };
    if dir.is_empty() || task.is_empty() || profile.is_empty() {
        return Err(Error::InvalidBoxRef(s.to_owned()));
    }
    Ok((PathBuf::from(dir), Some(task.to_owned()), profile.to_owned()))
}

/// Process-level facts captured once at startup and passed down explicitly.
#[derive(Debug, Clone, Default)]
pub struct Environment {
    /// Relative paths on the command line are relative to this.
    pub cwd: PathBuf,
    pub http_proxy: Option<String>,
    pub https_proxy: Option<String>,
}

impl Environment {
    /// Read the current process's working directory and proxy variables.
    pub fn capture() -> Result<Self> {
        let cwd = std::env::current_dir().context("while reading current directory")?;
        Ok(Self {
            cwd,
            http_proxy: std::env::var(HTTP_PROXY).ok(),
            https_proxy: std::env::var(HTTPS_PROXY).ok(),
        })
    }

    /// Proxy variables that are set, as `(name, value)`.
    pub fn proxies(&self) -> impl Iterator<Item = (&'static str, &str)> {
        [
            (HTTP_PROXY, self.http_proxy.as_deref()),
            (HTTPS_PROXY, self.https_proxy.as_deref()),
        ]
        .into_iter()
        .filter_map(|(k, v)| v.map(|v| (k, v)))
    }
}
