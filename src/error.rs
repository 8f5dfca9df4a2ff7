use std::path::PathBuf;

use thiserror::Error;

use crate::dsl::error::LocatedError;
use crate::template::TemplateError;

/// Application-level errors surfaced by the library entry points and the CLI.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// `path` is the JSON path of the offending value, e.g. `actions[0].name`.
    #[error("JSON error at '{path}': {message}")]
    Json { path: String, message: String },
    #[error(transparent)]
    Compile(#[from] LocatedError),
    #[error(transparent)]
    Template(#[from] TemplateError),
    #[error("Delivery error: {message}")]
    Delivery { message: String },
    #[error("{message}")]
    Validation { message: String },
}

impl AppError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        AppError::Io {
            path: path.into(),
            source,
        }
    }

    /// Map a path-tracking deserialization failure, prefixing the file when known.
    pub fn json<E: std::fmt::Display>(
        err: &serde_path_to_error::Error<E>,
        file: Option<&std::path::Path>,
    ) -> Self {
        let message = match file {
            Some(file) => format!("{}: {}", file.display(), err.inner()),
            None => err.inner().to_string(),
        };
        AppError::Json {
            path: err.path().to_string(),
            message,
        }
    }
}
