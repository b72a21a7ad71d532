use std::path::Path;

use util::{HashSet, Hasher};

use crate::{Error, Profile};

/// Whether a parameter is read or written by a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Input,
    Output,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Input => write!(f, "input"),
            Self::Output => write!(f, "output"),
        }
    }
}

/// A single input or output declared by a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    pub name: String,
    pub description: String,
}

impl Param {
    pub fn new<N: Into<String>, D: Into<String>>(name: N, description: D) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
        }
    }
}

/// A named operation supported by a box, with its declared inputs and outputs
/// (both kept in declaration order) and the parameter profiles found for it.
#[derive(Debug, Clone)]
pub struct Task {
    pub name: String,
    pub inputs: Vec<Param>,
    pub outputs: Vec<Param>,
    profiles: Vec<Profile>,
}

impl Task {
    /// Create a task from its declared inputs and outputs,
    /// checking that no name is declared twice.
    pub fn create<T: Into<String>>(
        name: T,
        inputs: Vec<Param>,
        outputs: Vec<Param>,
        file: &Path,
    ) -> Result<Self, Error> {
        let task = Self {
            name: name.into(),
            inputs,
            outputs,
            profiles: Vec::with_capacity(2),
        };

        task.check_unique_names(file)?;
        Ok(task)
    }

    fn check_unique_names(&self, file: &Path) -> Result<(), Error> {
        let mut seen = HashSet::with_capacity_and_hasher(self.num_params(), Hasher::default());
        for (_, param) in self.params() {
            if !seen.insert(param.name.as_str()) {
                return Err(Error::malformed(
                    file,
                    format!(
                        "task \"{}\" declares parameter \"{}\" more than once",
                        self.name, param.name
                    ),
                ));
            }
        }
        Ok(())
    }

    /// All parameters, inputs first, each group in declaration order.
    /// This ordering is relied on for deterministic mount labels.
    pub fn params(&self) -> impl Iterator<Item = (Direction, &Param)> {
        self.inputs
            .iter()
            .map(|p| (Direction::Input, p))
            .chain(self.outputs.iter().map(|p| (Direction::Output, p)))
    }

    pub fn num_params(&self) -> usize {
        self.inputs.len() + self.outputs.len()
    }

    /// True if `name` is one of this task's inputs or outputs.
    pub fn declares(&self, name: &str) -> bool {
        self.params().any(|(_, p)| p.name == name)
    }

    pub fn profiles(&self) -> &[Profile] {
        &self.profiles
    }

    pub fn profile(&self, name: &str) -> Option<&Profile> {
        self.profiles.iter().find(|p| p.name == name)
    }

    /// Attach a profile, checking that it gives a default for every parameter
    /// of this task and for nothing else. `file` is only used for errors.
    pub fn add_profile(&mut self, profile: Profile, file: &Path) -> Result<(), Error> {
        for (name, _) in profile.defaults() {
            if !self.declares(name) {
                return Err(Error::malformed(
                    file,
                    format!(
                        "profile \"{}\" sets \"{name}\", which task \"{}\" doesn't declare",
                        profile.name, self.name
                    ),
                ));
            }
        }
        for (_, param) in self.params() {
            if profile.get(&param.name).is_none() {
                return Err(Error::malformed(
                    file,
                    format!(
                        "profile \"{}\" has no value for \"{}\"",
                        profile.name, param.name
                    ),
                ));
            }
        }
        self.add_profile_unchecked(profile);
        Ok(())
    }

    /// Attach a profile without checking it against the task's parameters.
    pub fn add_profile_unchecked(&mut self, profile: Profile) {
        self.profiles.retain(|p| p.name != profile.name);
        self.profiles.push(profile);
    }
}
