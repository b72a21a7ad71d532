use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Command;

/// A program with its arguments, working directory and extra environment.
/// Arguments are kept as separate strings and are never re-split by a shell;
/// `Display` renders a quoted line that could be pasted into one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub env: Vec<(String, String)>,
}

impl CommandLine {
    pub fn new<T: Into<String>>(program: T) -> Self {
        Self {
            program: program.into(),
            args: Vec::with_capacity(8),
            cwd: None,
            env: Vec::with_capacity(0),
        }
    }

    /// `sh -c <script>`, for commands written as shell text.
    pub fn shell<T: Into<String>>(script: T) -> Self {
        Self::new("sh").arg("-c").arg(script)
    }

    pub fn arg<T: Into<String>>(mut self, arg: T) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, T>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// `--name=value`
    pub fn flag<N: fmt::Display, V: fmt::Display>(self, name: N, value: V) -> Self {
        self.arg(format!("--{name}={value}"))
    }

    pub fn current_dir<T: AsRef<Path>>(mut self, dir: T) -> Self {
        self.cwd = Some(dir.as_ref().to_path_buf());
        self
    }

    pub fn env<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Build the `std::process::Command` this describes.
    pub fn to_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        if let Some(cwd) = &self.cwd {
            cmd.current_dir(cwd);
        }
        for (k, v) in &self.env {
            cmd.env(k, v);
        }
        cmd
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", shell_quote(&self.program))?;
        for arg in &self.args {
            write!(f, " {}", shell_quote(arg))?;
        }
        Ok(())
    }
}

/// Quote `s` for a POSIX shell, leaving it bare when that's safe.
pub(crate) fn shell_quote(s: &str) -> String {
    if s.is_empty() {
        "''".to_string()
    } else if s
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || "-_./:=@%+,".contains(c))
    {
        s.to_string()
    } else {
        format!("'{}'", s.replace('\'', "'\"'\"'"))
    }
}
