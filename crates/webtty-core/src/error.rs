use thiserror::Error;

/// Errors produced by the webtty session broker.
#[derive(Debug, Error)]
pub enum WebttyError {
    #[error("invalid token length: {0}")]
    InvalidLength(i64),

    #[error("insufficient entropy: {0}")]
    InsufficientEntropy(String),

    #[error("unknown profile: {0}")]
    UnknownProfile(String),

    #[error("malformed startup command #{index}: {command:?}")]
    MalformedCommand { index: usize, command: String },

    #[error("home directory unavailable")]
    HomeDirUnavailable,

    #[error("spawn failed: {0}")]
    SpawnFailed(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl From<rand::Error> for WebttyError {
    fn from(e: rand::Error) -> Self {
        WebttyError::InsufficientEntropy(e.to_string())
    }
}

pub type WebttyResult<T> = Result<T, WebttyError>;
