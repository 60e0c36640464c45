/// Errors raised while talking to the simulator or writing point clouds.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("zenoh error: {0}")]
    Zenoh(String),

    #[error("CDR error: {0}")]
    Cdr(#[from] cdr::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("settings error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("no reply from simulator for {0}")]
    NoReply(String),

    #[error("simulator replied with an error for {key}: {message}")]
    ReplyError { key: String, message: String },

    #[error("malformed scan from {sensor}: {len} values is not a multiple of 3")]
    MalformedScan { sensor: String, len: usize },

    #[error("vehicle {0} not found in settings")]
    UnknownVehicle(String),

    #[error("failed to install signal handler: {0}")]
    Signal(#[from] ctrlc::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn zenoh(err: impl std::fmt::Display) -> Self {
        Error::Zenoh(err.to_string())
    }
}
