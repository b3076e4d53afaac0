use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum IoError {
    #[error("file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("cannot open {}: {message}", path.display())]
    Open { path: PathBuf, message: String },

    #[error("{} has no sheet named '{sheet}'", path.display())]
    MissingSheet { path: PathBuf, sheet: String },

    #[error("cannot read {}: {message}", path.display())]
    Read { path: PathBuf, message: String },

    #[error("cannot write {}: {message}", path.display())]
    Write { path: PathBuf, message: String },
}
