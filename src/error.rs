use std::io;

#[derive(Debug, thiserror::Error)]
pub enum TerpError {
    #[error("microphone permission denied")]
    PermissionDenied,

    #[error("no audio input device found")]
    DeviceNotFound,

    #[error("audio setup error: {0}")]
    Setup(String),

    #[error("no audio recorded")]
    EmptyCapture,

    #[error("server connection lost")]
    Disconnected,

    #[error("audio error: {0}")]
    Audio(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("output error: {0}")]
    Output(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, TerpError>;
