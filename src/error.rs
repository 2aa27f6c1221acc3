//! Error type shared by the whole crate.

use thiserror::Error;

/// Boxed error produced by a fusion engine; carried through untouched.
pub type EngineError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid settings: {0}")]
    Settings(String),

    #[error("malformed block key {0:?}")]
    MalformedKey(String),

    #[error("missing data: {0}")]
    MissingData(String),

    #[error("fusion pipeline is already running")]
    AlreadyRunning,

    #[error("fusion pipeline is not running")]
    NotRunning,

    #[error("fusion pipeline has not stopped")]
    NotStopped,

    #[error("stop was not requested before waiting for the fusion worker")]
    StopNotRequested,

    #[error("fusion pipeline must be cleared before it is started again")]
    NotCleared,

    #[error("fusion worker panicked")]
    WorkerPanicked,

    #[error("fusion engine error: {0}")]
    Engine(EngineError),
}

pub type Result<T> = std::result::Result<T, Error>;
