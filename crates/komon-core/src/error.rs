//! Error types for the komon core library.
//!
//! Uses hierarchical domain-specific errors following the thiserror pattern.

use thiserror::Error;

/// Result type alias for komon operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type for komon.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Kafka-related error
    #[error("Kafka error: {0}")]
    Kafka(#[from] KafkaError),

    /// Decode error from the `__consumer_offsets` wire formats
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Shutdown requested
    #[error("Shutdown requested")]
    Shutdown,
}

/// Kafka-specific errors.
#[derive(Error, Debug)]
pub enum KafkaError {
    /// Failed to create a client against the bootstrap brokers
    #[error("Connection failed to {broker}: {message}")]
    ConnectionFailed { broker: String, message: String },

    /// Subscribe call failed
    #[error("Subscribe failed: {0}")]
    Subscribe(String),

    /// Poll returned an error
    #[error("Poll failed: {0}")]
    Poll(String),

    /// Consumer-group listing or describe failed
    #[error("Group listing failed: {0}")]
    GroupListing(String),

    /// Cluster metadata fetch failed
    #[error("Metadata fetch failed: {0}")]
    Metadata(String),

    /// Watermark fetch failed for a partition
    #[error("Watermark fetch failed for {topic}/{partition}: {message}")]
    Watermarks {
        topic: String,
        partition: i32,
        message: String,
    },

    /// A poll cycle exceeded its deadline
    #[error("Cycle deadline exceeded after {0:?}")]
    DeadlineExceeded(std::time::Duration),
}

/// Errors from decoding `__consumer_offsets` keys, values and member
/// assignments. These never escape the poller loops; a failed decode is
/// logged and the record skipped.
#[derive(Error, Debug)]
pub enum DecodeError {
    /// Buffer ended before a fixed-width field
    #[error("Truncated buffer: needed {needed} bytes, {remaining} remaining")]
    Truncated { needed: usize, remaining: usize },

    /// A length-prefixed string was not valid UTF-8
    #[error("Invalid UTF-8 in string field: {0}")]
    InvalidString(String),

    /// A length prefix pointed past the end of the buffer
    #[error("String length {length} exceeds {remaining} remaining bytes")]
    StringOverrun { length: i16, remaining: usize },

    /// Offset-commit value schema version this decoder does not know
    #[error("Unsupported offset value schema version {0}")]
    UnsupportedValueVersion(i16),
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Config(err.to_string())
    }
}
