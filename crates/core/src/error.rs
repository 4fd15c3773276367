use thiserror::Error;

/// Top-level error type used across the entire application.
#[derive(Debug, Error)]
pub enum LavaError {
    #[error("config error: {0}")]
    Config(String),

    #[error("wayland error: {0}")]
    Wayland(String),

    #[error("IPC error: {0}")]
    Ipc(String),

    #[error("image error: {0}")]
    Image(String),

    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
}

pub type Result<T, E = LavaError> = std::result::Result<T, E>;
