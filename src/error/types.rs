use std::path::PathBuf;

use thiserror::Error;

use crate::runtime::SessionStateError;

/// Unified result type for the session navigation crate.
pub type Result<T> = std::result::Result<T, RerunError>;

/// Coarse classification of [`RerunError`] variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Programming mistake in how pages or fragments were declared. Aborts the rerun.
    Configuration,
    /// Lookup of an absent key through a storage API.
    NotFound,
    /// Failure raised by page or fragment code.
    Script,
    /// I/O, serialization, or lock failures.
    Internal,
}

/// Errors surfaced while resolving pages and running fragments.
#[derive(Debug, Error)]
pub enum RerunError {
    #[error("`navigation` must be called with at least one page")]
    NoPages,
    #[error("multiple pages specified with `default = true`; at most one page can be the default")]
    MultipleDefaults,
    #[error(
        "multiple pages specified with URL pathname `{0}`; URL pathnames must be unique and may be inferred from the filename, callable name, or title"
    )]
    DuplicateUrlPath(String),
    #[error("invalid page type: {0}")]
    InvalidPageType(String),
    #[error("unable to create page: the file `{}` could not be found", .0.display())]
    PageFileMissing(PathBuf),
    #[error("cannot infer page title for callable; set an explicit title")]
    UntitledCallable,
    #[error("the URL path cannot be empty unless the page is the default page")]
    EmptyUrlPath,
    #[error("invalid page icon `{0}`; use a single emoji or `:material/icon_name:`")]
    InvalidIcon(String),
    #[error("invalid navigation position `{0}`; expected `sidebar` or `hidden`")]
    InvalidPosition(String),
    #[error("invalid run interval `{0}`")]
    InvalidInterval(String),
    #[error("fragments cannot write to elements outside of their container")]
    FragmentOutsideContainer,
    #[error(
        "this page cannot be called directly; only the page returned from navigation can be called once"
    )]
    PageNotCallable,
    #[error("invalid configuration file: {0}")]
    Config(#[from] toml::de::Error),
    #[error("fragment `{0}` not found")]
    FragmentNotFound(String),
    #[error(transparent)]
    SessionState(#[from] SessionStateError),
    #[error("script failed: {0}")]
    Script(String),
    #[error("no script executor configured to run `{}`", .0.display())]
    NoScriptExecutor(PathBuf),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl RerunError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RerunError::NoPages
            | RerunError::MultipleDefaults
            | RerunError::DuplicateUrlPath(_)
            | RerunError::InvalidPageType(_)
            | RerunError::PageFileMissing(_)
            | RerunError::UntitledCallable
            | RerunError::EmptyUrlPath
            | RerunError::InvalidIcon(_)
            | RerunError::InvalidPosition(_)
            | RerunError::InvalidInterval(_)
            | RerunError::FragmentOutsideContainer
            | RerunError::PageNotCallable
            | RerunError::Config(_) => ErrorKind::Configuration,
            RerunError::FragmentNotFound(_)
            | RerunError::SessionState(SessionStateError::Missing(_)) => ErrorKind::NotFound,
            RerunError::Script(_) | RerunError::NoScriptExecutor(_) => ErrorKind::Script,
            RerunError::Serialization(_) | RerunError::SessionState(_) | RerunError::Io(_) => {
                ErrorKind::Internal
            }
        }
    }

    pub fn is_configuration(&self) -> bool {
        self.kind() == ErrorKind::Configuration
    }

    /// Convenience constructor for failures raised from page or fragment bodies.
    pub fn script(message: impl Into<String>) -> Self {
        RerunError::Script(message.into())
    }
}
