use thiserror::Error;

/// Errors raised while converting a recording.
///
/// Every variant is fatal for the run that produced it; nothing in the
/// pipeline retries.
#[derive(Error, Debug)]
pub enum ConvertError {
    /// The source extension has no registered decoder
    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    /// Channel selection produced an empty set
    #[error("No channels selected for conversion")]
    NoChannelsSelected,

    /// The decoder returned a degenerate read for a channel
    #[error("Failed to read channel {channel}: {reason}")]
    ChannelReadFailure { channel: String, reason: String },

    /// Fragment metadata violates positivity or length invariants
    #[error("Malformed fragment sequence at fragment {index}: {reason}")]
    MalformedFragmentSequence { index: usize, reason: String },

    /// A selected channel's sample count disagrees with the first channel's
    #[error("Channel {channel} has {actual} samples, expected {expected}")]
    MismatchedChannelLength {
        channel: String,
        expected: usize,
        actual: usize,
    },

    /// A time map no longer has one entry per sample column
    #[error("Time map has {timestamps} entries for {samples} sample columns")]
    MisalignedTimeMap { samples: usize, timestamps: usize },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Decoder error: {0}")]
    Decoder(String),

    /// A binary sample file cannot be split into the requested channel count
    #[error("Binary file of {len} bytes does not hold whole i16 samples for {n_channels} channels")]
    InvalidBinaryLayout { len: u64, n_channels: usize },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ConvertError>;
