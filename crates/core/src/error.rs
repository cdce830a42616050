use std::{
    io,
    path::{Path, PathBuf},
};

/// An `io::Error` together with the path that produced it.
///
/// Plain io errors are useless in a tool that touches hundreds of files per
/// run; every filesystem helper in this crate reports which path failed.
#[derive(Debug, thiserror::Error)]
#[error("\"{path}\": {source}", path = .path.display())]
pub struct IoError {
    path: PathBuf,
    #[source]
    source: io::Error,
}

impl IoError {
    pub fn new(source: io::Error, path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), source }
    }

    /// The path the failed operation was performed on.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn io_error(&self) -> &io::Error {
        &self.source
    }

    pub fn kind(&self) -> io::ErrorKind {
        self.source.kind()
    }
}
