mod timer;
pub use timer::Timer;

mod paths;
pub use paths::{file_name_str, normalize, path_str};

#[derive(thiserror::Error, Debug)]
#[error("Filesystem path is not valid UTF-8")]
pub struct PathEncodingError;

pub type Hasher = std::hash::BuildHasherDefault<rustc_hash::FxHasher>;
pub type HashMap<K, V> = std::collections::HashMap<K, V, Hasher>;
pub type HashSet<T> = std::collections::HashSet<T, Hasher>;
