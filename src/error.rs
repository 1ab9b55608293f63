use thiserror::Error;

/// Failures a music command can run into. The `Display` text is sent back to
/// the channel as-is, so keep it readable.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlayerError {
    #[error("Could not find anything to play: {0}")]
    ExtractionFailure(String),

    #[error("You are not connected to a voice channel.")]
    NotConnected,

    #[error("The queue is empty.")]
    EmptyQueue,

    #[error("The queue is full ({0} tracks).")]
    QueueFull(usize),

    #[error("Voice connection error: {0}")]
    Transport(String),
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("DISCORD_TOKEN must be set in the environment")]
    MissingToken,

    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
}

pub type Result<T> = std::result::Result<T, PlayerError>;
