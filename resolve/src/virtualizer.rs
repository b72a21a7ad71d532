use std::path::{Path, PathBuf};

use util::{HashMap, Hasher};

use crate::Error;

/// Mount labels are this prefix followed by a counter: `/input0`, `/input1`, ...
pub const MOUNT_PREFIX: &str = "/input";

/// One host directory bound into a container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mount {
    pub host: PathBuf,
    pub label: String,
}

/// Result of mapping host paths into a container's filesystem.
#[derive(Debug, Clone, Default)]
pub struct Virtualization {
    /// In order of first appearance.
    mounts: Vec<Mount>,
    /// Each distinct host path with its in-container path, in order.
    paths: Vec<(PathBuf, String)>,
    mount_index: HashMap<PathBuf, usize>,
    path_index: HashMap<PathBuf, usize>,
}

impl Virtualization {
    pub fn mounts(&self) -> &[Mount] {
        &self.mounts
    }

    pub fn paths(&self) -> &[(PathBuf, String)] {
        &self.paths
    }

    /// Label a host directory is mounted at, if it is mounted.
    pub fn label_for(&self, dir: &Path) -> Option<&str> {
        self.mount_index
            .get(dir)
            .map(|i| self.mounts[*i].label.as_str())
    }

    /// In-container path for a host path that was virtualized.
    pub fn virtual_path(&self, path: &Path) -> Option<&str> {
        self.path_index.get(path).map(|i| self.paths[*i].1.as_str())
    }

    fn mount(&mut self, dir: &Path) -> usize {
        if let Some(i) = self.mount_index.get(dir) {
            return *i;
        }
        let i = self.mounts.len();
        self.mounts.push(Mount {
            host: dir.to_path_buf(),
            label: format!("{MOUNT_PREFIX}{i}"),
        });
        self.mount_index.insert(dir.to_path_buf(), i);
        i
    }
}

/// Map each host path onto a container path, mounting every distinct
/// parent directory once. Labels are assigned in the order parents are
/// first seen, so the same input always produces the same result.
pub fn virtualize<'a, I>(paths: I) -> Result<Virtualization, Error>
where
    I: IntoIterator<Item = &'a Path>,
{
    let paths = paths.into_iter();
    let (lower, _) = paths.size_hint();
    let mut v = Virtualization {
        mounts: Vec::with_capacity(lower),
        paths: Vec::with_capacity(lower),
        mount_index: HashMap::with_capacity_and_hasher(lower, Hasher::default()),
        path_index: HashMap::with_capacity_and_hasher(lower, Hasher::default()),
    };

    for path in paths {
        if v.path_index.contains_key(path) {
            continue;
        }

        let virtual_path = match (path.parent(), util::file_name_str(path)?) {
            (Some(parent), Some(name)) => {
                let i = v.mount(parent);
                format!("{}/{name}", v.mounts[i].label)
            }
            // no parent (i.e. "/"): mount the path itself
            _ => {
                let i = v.mount(path);
                v.mounts[i].label.clone()
            }
        };

        log::trace!("{path:?} -> {virtual_path}");
        v.path_index.insert(path.to_path_buf(), v.paths.len());
        v.paths.push((path.to_path_buf(), virtual_path));
    }

    Ok(v)
}
