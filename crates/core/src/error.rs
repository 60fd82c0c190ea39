/// Result alias that carries the custom [`SlipnoteError`] type.
pub type Result<T> = std::result::Result<T, SlipnoteError>;

/// Common error type for the core crate.
///
/// The session layer turns these into notices; see
/// [`SlipnoteError::is_recoverable`] for the one exception.
#[derive(Debug, thiserror::Error)]
pub enum SlipnoteError {
    /// Raw pixel data or a frame operation did not match the canvas geometry.
    #[error("malformed frame data: {0}")]
    Format(String),
    /// A project file could not be parsed or failed validation.
    #[error("corrupt project file: {0}")]
    CorruptProject(String),
    /// The selected input device could not be opened or stopped delivering
    /// samples.
    #[error("audio device error: {0}")]
    Device(String),
    #[error("a recording is already in progress")]
    AlreadyRecording,
    #[error("no recording is in progress")]
    NotRecording,
    /// An audio file could not be decoded or sent to the output device.
    #[error("audio playback failed: {0}")]
    Playback(String),
    /// Session configuration contains an unusable value.
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("{0}")]
    Message(String),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    #[error("wav encoding failed: {0}")]
    Wav(#[from] hound::Error),
    #[error("{0}")]
    Json(#[from] serde_json::Error),
}

impl SlipnoteError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }

    /// Returns false only for resource exhaustion, which the session treats as
    /// fatal.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Io(err) => err.kind() != std::io::ErrorKind::OutOfMemory,
            _ => true,
        }
    }
}

impl From<&str> for SlipnoteError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for SlipnoteError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}
