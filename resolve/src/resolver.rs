use std::path::{Path, PathBuf};

use catalog::{Catalog, Direction};

use crate::{virtualize, Error, Virtualization};

/// An abstract request to run one task of a box.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub task: String,
    /// Name of the parameter profile supplying defaults.
    pub profile: String,
    /// Values given explicitly on the command line, in the order given.
    pub overrides: Vec<(String, PathBuf)>,
}

impl Invocation {
    pub fn new<T: Into<String>, P: Into<String>>(task: T, profile: P) -> Self {
        Self {
            task: task.into(),
            profile: profile.into(),
            overrides: Vec::with_capacity(0),
        }
    }

    pub fn with_override<N: Into<String>, V: Into<PathBuf>>(mut self, name: N, value: V) -> Self {
        self.overrides.push((name.into(), value.into()));
        self
    }

    fn get_override(&self, name: &str) -> Option<&Path> {
        // last one wins if a name is given twice:
        self.overrides
            .iter()
            .rev()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_path())
    }
}

/// One task parameter with its concrete host path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedArg {
    pub name: String,
    pub direction: Direction,
    pub path: PathBuf,
}

/// All of a task's parameters, resolved to absolute host paths.
/// Ordered inputs first, then outputs, each in declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedArgs {
    pub task: String,
    pub profile: String,
    args: Vec<ResolvedArg>,
}

impl ResolvedArgs {
    pub fn iter(&self) -> std::slice::Iter<'_, ResolvedArg> {
        self.args.iter()
    }

    pub fn len(&self) -> usize {
        self.args.len()
    }

    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }

    /// Host path of parameter `name`.
    pub fn get(&self, name: &str) -> Option<&Path> {
        self.args
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.path.as_path())
    }

    /// Host paths in resolution order.
    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.args.iter().map(|a| a.path.as_path())
    }

    /// Compute container mount points for these paths.
    pub fn virtualize(&self) -> Result<Virtualization, Error> {
        virtualize(self.paths())
    }
}

impl<'a> IntoIterator for &'a ResolvedArgs {
    type Item = &'a ResolvedArg;
    type IntoIter = std::slice::Iter<'a, ResolvedArg>;
    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Turns an `Invocation` into `ResolvedArgs` for a particular box.
///
/// Each parameter takes its value from the invocation's overrides if present
/// (relative overrides are taken relative to the working directory), or else
/// from the selected profile, relative to the workspace directory.
/// Nothing here touches the filesystem, so a failed resolution never leaves
/// partial side effects behind.
pub struct Resolver<'a> {
    catalog: &'a Catalog,
    /// Root for profile paths
    workspace: PathBuf,
    /// Root for relative overrides
    cwd: PathBuf,
}

impl<'a> Resolver<'a> {
    /// Create a new `Resolver`. If `workspace` is `None`, the box's own
    /// `workspace` directory is used.
    pub fn new(catalog: &'a Catalog, workspace: Option<&Path>, cwd: &Path) -> Self {
        let workspace = match workspace {
            Some(ws) => util::normalize(&cwd.join(ws)),
            None => catalog.layout.workspace_dir(),
        };
        Self {
            catalog,
            workspace,
            cwd: cwd.to_path_buf(),
        }
    }

    pub fn workspace(&self) -> &Path {
        &self.workspace
    }

    pub fn resolve(&self, invocation: &Invocation) -> Result<ResolvedArgs, Error> {
        let task = self
            .catalog
            .task(&invocation.task)
            .ok_or_else(|| Error::UnknownTask(invocation.task.clone()))?;

        for (name, _) in &invocation.overrides {
            if !task.declares(name) {
                return Err(Error::UnknownParameter(task.name.clone(), name.clone()));
            }
        }

        let profile = task.profile(&invocation.profile);
        if profile.is_none() {
            log::debug!(
                "task \"{}\" has no profile \"{}\"; every parameter must be overridden",
                task.name,
                invocation.profile
            );
        }

        let mut args = Vec::with_capacity(task.num_params());
        for (direction, param) in task.params() {
            let path = if let Some(value) = invocation.get_override(&param.name) {
                log::debug!("{} {}: override {:?}", direction, param.name, value);
                self.cwd.join(value)
            } else if let Some(default) = profile.and_then(|p| p.get(&param.name)) {
                log::debug!("{} {}: default {:?}", direction, param.name, default);
                self.workspace.join(default)
            } else {
                return Err(Error::MissingParameter {
                    task: task.name.clone(),
                    profile: invocation.profile.clone(),
                    name: param.name.clone(),
                });
            };
            args.push(ResolvedArg {
                name: param.name.clone(),
                direction,
                path: util::normalize(&path),
            });
        }

        Ok(ResolvedArgs {
            task: task.name.clone(),
            profile: invocation.profile.clone(),
            args,
        })
    }
}
