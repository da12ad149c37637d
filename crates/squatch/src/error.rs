use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SquatchError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("IO error while {action} {path}: {source}")]
    IoAt {
        action: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("JSON parse error in {path}: {message}")]
    JsonParse { path: PathBuf, message: String },

    #[error("Template error in {path}: {message}")]
    Template { path: PathBuf, message: String },

    #[error("Missing required field '{field}' in file: {path}")]
    MissingField { field: &'static str, path: PathBuf },

    #[error("No site template (layout.html) found under {path}")]
    MissingSiteTemplate { path: PathBuf },

    #[error("Output directory {path} would overwrite the source directory")]
    InvalidOutputDir { path: PathBuf },

    #[error("Invalid path: {path}")]
    InvalidPath { path: PathBuf },

    #[error("Directory walk error in {path}: {message}")]
    WalkDir { path: PathBuf, message: String },
}

impl SquatchError {
    /// Errors that exclude a single document from the build without failing it.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, SquatchError::MissingField { .. })
    }

    pub(crate) fn template(path: &Path, error: &tera::Error) -> Self {
        let mut message = error.to_string();
        let mut source = std::error::Error::source(error);
        while let Some(cause) = source {
            message.push_str(": ");
            message.push_str(&cause.to_string());
            source = cause.source();
        }
        SquatchError::Template {
            path: path.to_path_buf(),
            message,
        }
    }
}

pub type Result<T> = std::result::Result<T, SquatchError>;

pub trait IoContext<T> {
    fn io_context(self, action: &'static str, path: &Path) -> Result<T>;
}

impl<T> IoContext<T> for std::io::Result<T> {
    fn io_context(self, action: &'static str, path: &Path) -> Result<T> {
        self.map_err(|source| SquatchError::IoAt {
            action,
            path: path.to_path_buf(),
            source,
        })
    }
}
