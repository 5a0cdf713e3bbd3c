use std::path::Path;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::permissions::MappingRecord;

#[derive(Clone, Debug, PartialEq, Deserialize)]
struct MappingFile {
    mappings: Vec<MappingRecord>,
}

/// Reads the permission-mapping file. Happens exactly once, before any
/// network or git call; any failure here aborts with nothing to undo.
pub fn load_mappings(path: &Path) -> Result<Vec<MappingRecord>, ConfigError> {
    let content = std::fs::read_to_string(path)
        .map_err(|_| ConfigError::MissingFile(path.to_path_buf()))?;
    read_mappings(&content)
}

pub fn read_mappings(content: &str) -> Result<Vec<MappingRecord>, ConfigError> {
    let file: MappingFile = serde_yaml::from_str(content)
        .map_err(|err| ConfigError::MalformedMapping(err.to_string()))?;
    Ok(file.mappings)
}
