use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde_yaml::Value;

use catalog::{BoxLayout, ExecImpl};
use resolve::ResolvedArgs;

use super::State;
use crate::exec::{CommandLine, ExitStatus, Shell};
use crate::fs::Fs;

/// Parameter whose file is expanded into more substitution variables.
const PARAMETERS_FILE: &str = "parameters_file";

/// Runs the shell commands listed in an `exec` implementation, from the box root.
#[derive(Debug)]
pub struct ExecRunner {
    root: PathBuf,
    imp: ExecImpl,
    fs: Fs,
    pub(super) state: State,
}

impl ExecRunner {
    pub fn new(layout: &BoxLayout, imp: &ExecImpl) -> Self {
        Self {
            root: layout.root().to_path_buf(),
            imp: imp.clone(),
            fs: Fs::new(layout.root()),
            state: State::Unconfigured,
        }
    }

    pub fn configure(&mut self, shell: &mut dyn Shell) -> Result<()> {
        for dir in &self.imp.directories {
            self.fs.create_dir(self.root.join(dir))?;
        }
        for script in &self.imp.configure {
            log::info!("configure step: {script}");
            shell.run_checked(&self.command(script))?;
        }
        self.state = State::Ready;
        Ok(())
    }

    /// Run each step in order; the status returned is the last step's.
    pub fn execute(&self, shell: &mut dyn Shell, args: &ResolvedArgs) -> Result<ExitStatus> {
        let vars = self.variables(args)?;
        let mut status = ExitStatus::SUCCESS;
        for script in &self.imp.run {
            let script = substitute(script, &vars);
            log::info!("run step: {script}");
            status = shell
                .run_checked(&self.command(&script))
                .with_context(|| format!("while running task \"{}\"", args.task))?;
        }
        Ok(status)
    }

    fn command(&self, script: &str) -> CommandLine {
        CommandLine::shell(script).current_dir(&self.root)
    }

    /// Substitution variables: every resolved parameter, plus the scalar
    /// entries of the parameters file if the task has one.
    fn variables(&self, args: &ResolvedArgs) -> Result<Vec<(String, String)>> {
        let mut vars = Vec::with_capacity(args.len());
        for arg in args {
            if arg.name == PARAMETERS_FILE {
                vars.extend(self.load_parameters_file(&arg.path)?);
            } else {
                vars.push((arg.name.clone(), util::path_str(&arg.path)?.to_owned()));
            }
        }
        Ok(vars)
    }

    fn load_parameters_file(&self, path: &Path) -> Result<Vec<(String, String)>> {
        let text = self.fs.read_to_string(path)?;
        let value: Value = serde_yaml::from_str(&text)
            .with_context(|| format!("while parsing parameters file {path:?}"))?;

        let mut vars = Vec::with_capacity(8);
        let Value::Mapping(mapping) = value else {
            log::warn!("parameters file {path:?} is not a mapping; ignoring it");
            return Ok(vars);
        };
        for (k, v) in mapping {
            let (Some(k), Some(v)) = (k.as_str(), scalar_str(&v)) else {
                log::debug!("skipping non-scalar entry {k:?} in {path:?}");
                continue;
            };
            vars.push((k.to_owned(), v));
        }
        Ok(vars)
    }
}

fn scalar_str(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Replace `${name}` and `$name` with each variable's value.
/// Longer names go first so `$data_dir` isn't clobbered by `$data`.
fn substitute(script: &str, vars: &[(String, String)]) -> String {
    let mut sorted: Vec<&(String, String)> = vars.iter().collect();
    sorted.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then_with(|| a.0.cmp(&b.0)));

    let mut out = script.to_owned();
    for (name, value) in sorted {
        out = out.replace(&format!("${{{name}}}"), value);
        out = out.replace(&format!("${name}"), value);
    }
    out
}
