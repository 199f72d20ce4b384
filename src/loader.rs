//! Source file access for `LOAD-FILE`.

use std::fs;

use crate::Error;

/// Provides the full text of a named source
pub trait SourceLoader {
    fn load(&self, path: &str) -> Result<String, Error>;
}

/// Reads sources from the local filesystem
#[derive(Debug, Default, Clone, Copy)]
pub struct FsLoader;

impl SourceLoader for FsLoader {
    fn load(&self, path: &str) -> Result<String, Error> {
        read_whole_file(path)
    }
}

/// Read the whole file at `path` as UTF-8 text.
/// The file is closed before returning on every path.
pub fn read_whole_file(path: &str) -> Result<String, Error> {
    fs::read_to_string(path).map_err(|e| Error::IoError {
        path: path.to_owned(),
        message: e.to_string(),
    })
}
