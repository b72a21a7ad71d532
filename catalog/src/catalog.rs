use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_yaml::{Mapping, Value};

use crate::{yaml, BoxLayout, Error, Implementation, Param, Profile, Task};

const PROFILE_EXT: &str = "yaml";

/// `mlbox.yaml` as written on disk, before validation.
#[derive(Deserialize)]
struct RawBox {
    name: String,
    tasks: Mapping,
}

#[derive(Deserialize)]
struct RawTask {
    inputs: Option<Value>,
    outputs: Option<Value>,
}

#[derive(Deserialize)]
struct RawParam {
    description: String,
}

/// Everything mlbox knows about a box: its name, tasks, profiles and
/// implementation. Loaded once per invocation and read-only afterward.
#[derive(Debug, Clone)]
pub struct Catalog {
    pub name: String,
    pub layout: BoxLayout,
    pub implementation: Implementation,
    tasks: Vec<Task>,
}

impl Catalog {
    /// Create a catalog directly, without reading anything from disk.
    pub fn new<T: Into<String>>(name: T, layout: BoxLayout, implementation: Implementation) -> Self {
        Self {
            name: name.into(),
            layout,
            implementation,
            tasks: Vec::with_capacity(4),
        }
    }

    /// Load the box rooted at `dir`.
    pub fn load(dir: &Path) -> Result<Self, Error> {
        if !dir.is_dir() {
            return Err(Error::BoxNotFound(dir.display().to_string()));
        }
        let root = dir
            .canonicalize()
            .map_err(|_| Error::BoxNotFound(dir.display().to_string()))?;
        let layout = BoxLayout::new(root);

        let mlbox_file = layout.mlbox_file();
        let raw: RawBox = yaml::read(&mlbox_file)?;
        let implementation = Implementation::load(&layout.implementation_file())?;

        let mut catalog = Self::new(raw.name, layout, implementation);
        for (name, raw_task) in yaml::entries::<RawTask>(raw.tasks, &mlbox_file, "task")? {
            let inputs = load_params(raw_task.inputs, &mlbox_file, &name, "inputs")?;
            let outputs = load_params(raw_task.outputs, &mlbox_file, &name, "outputs")?;
            catalog.add_task(Task::create(name, inputs, outputs, &mlbox_file)?);
        }

        catalog.load_profiles()?;

        log::info!(
            "loaded box \"{}\" with {} tasks ({} implementation)",
            catalog.name,
            catalog.tasks.len(),
            catalog.implementation.type_name()
        );
        Ok(catalog)
    }

    /// Add a task, replacing any existing task of the same name.
    pub fn add_task(&mut self, task: Task) {
        self.tasks.retain(|t| t.name != task.name);
        self.tasks.push(task);
    }

    /// All tasks, in the order they're declared.
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn task(&self, name: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.name == name)
    }

    /// Default relative paths of `profile` for `task`.
    pub fn profile_paths(&self, task: &str, profile: &str) -> Result<&[(String, PathBuf)], Error> {
        let t = self
            .task(task)
            .ok_or_else(|| Error::TaskNotFound(task.to_owned()))?;
        let p = t
            .profile(profile)
            .ok_or_else(|| Error::ProfileNotFound(task.to_owned(), profile.to_owned()))?;
        Ok(p.defaults())
    }

    /// Read every `tasks/<task>/<profile>.yaml` file.
    fn load_profiles(&mut self) -> Result<(), Error> {
        let tasks_dir = self.layout.tasks_dir();
        if !tasks_dir.is_dir() {
            log::debug!("no tasks directory at {tasks_dir:?}; box has no profiles");
            return Ok(());
        }

        for task_dir in sorted_entries(&tasks_dir)? {
            if !task_dir.is_dir() {
                log::debug!("skipping {task_dir:?}: not a directory");
                continue;
            }
            let task_name = util::file_name_str(&task_dir)
                .map_err(|e| Error::malformed(&task_dir, e))?
                .unwrap_or_default()
                .to_owned();

            let task = self
                .tasks
                .iter_mut()
                .find(|t| t.name == task_name)
                .ok_or_else(|| {
                    Error::malformed(
                        &task_dir,
                        format!("found tasks/{task_name} but no such task in mlbox.yaml"),
                    )
                })?;

            for file in sorted_entries(&task_dir)? {
                if file.extension().and_then(|e| e.to_str()) != Some(PROFILE_EXT) || !file.is_file()
                {
                    continue;
                }
                let profile_name = file
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .ok_or_else(|| Error::malformed(&file, util::PathEncodingError))?
                    .to_owned();

                let mapping =
                    yaml::mapping_or_empty(Some(yaml::read::<Value>(&file)?), &file, "profile")?;
                let defaults = yaml::entries::<PathBuf>(mapping, &file, "parameter")?;
                task.add_profile(Profile::new(profile_name, defaults), &file)?;
            }
        }
        Ok(())
    }
}

fn load_params(
    section: Option<Value>,
    file: &Path,
    task: &str,
    what: &str,
) -> Result<Vec<Param>, Error> {
    let mapping = yaml::mapping_or_empty(section, file, &format!("{task}.{what}"))?;
    let params = yaml::entries::<RawParam>(mapping, file, &format!("{task}.{what}"))?;
    Ok(params
        .into_iter()
        .map(|(name, raw)| Param::new(name, raw.description))
        .collect())
}

/// Directory entries sorted by path, so that load order doesn't depend on the filesystem.
fn sorted_entries(dir: &Path) -> Result<Vec<PathBuf>, Error> {
    let mut entries = fs::read_dir(dir)
        .map_err(|e| Error::malformed(dir, e))?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| Error::malformed(dir, e))?;
    entries.sort();
    Ok(entries)
}
