use std::path::Path;

use serde::de::DeserializeOwned;
use serde_yaml::{Mapping, Value};

use crate::Error;

/// Read a yaml file and deserialize it into `T`.
pub fn read<T: DeserializeOwned>(file: &Path) -> Result<T, Error> {
    let text = std::fs::read_to_string(file).map_err(|e| Error::malformed(file, e))?;
    serde_yaml::from_str(&text).map_err(|e| Error::malformed(file, e))
}

/// Deserialize an already-parsed yaml value into `T`.
pub fn convert<T: DeserializeOwned>(value: Value, file: &Path) -> Result<T, Error> {
    serde_yaml::from_value(value).map_err(|e| Error::malformed(file, e))
}

/// Convert a yaml mapping into a list of `(key, value)` pairs, keeping
/// the order in which keys appear in the file. `what` names the section
/// for error messages.
pub fn entries<T: DeserializeOwned>(
    mapping: Mapping,
    file: &Path,
    what: &str,
) -> Result<Vec<(String, T)>, Error> {
    let mut out = Vec::with_capacity(mapping.len());
    for (k, v) in mapping {
        let key = match k {
            Value::String(s) => s,
            other => {
                return Err(Error::malformed(
                    file,
                    format!("{what} key must be a string, found {other:?}"),
                ))
            }
        };
        let val = serde_yaml::from_value(v)
            .map_err(|e| Error::malformed(file, format!("{what} \"{key}\": {e}")))?;
        out.push((key, val));
    }
    Ok(out)
}

/// A mapping that may be written as `~` or left out entirely.
pub fn mapping_or_empty(value: Option<Value>, file: &Path, what: &str) -> Result<Mapping, Error> {
    match value {
        None | Some(Value::Null) => Ok(Mapping::new()),
        Some(Value::Mapping(m)) => Ok(m),
        Some(other) => Err(Error::malformed(
            file,
            format!("{what} must be a mapping, found {other:?}"),
        )),
    }
}
