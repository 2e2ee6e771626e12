/*!
 * Error types for the bookcast application.
 *
 * This module contains custom error types for the different stages of the
 * audiobook pipeline, using the thiserror crate for ergonomic error definitions.
 * Failures are meant to be resolved as close to where they happen as possible:
 * per paragraph during synthesis, per input file and per segment during export.
 */

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur on a single call to a speech backend
#[derive(Error, Debug)]
pub enum ProviderError {
    /// Error when building or sending a request fails
    #[error("API request failed: {0}")]
    RequestFailed(String),

    /// Error returned by the API itself
    #[error("API responded with error: {status_code} - {message}")]
    ApiError {
        /// HTTP status code
        status_code: u16,
        /// Error message from the API
        message: String,
    },

    /// Error establishing or maintaining a connection
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// Error related to rate limiting
    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    /// Error with authentication
    #[error("Authentication error: {0}")]
    AuthenticationError(String),

    /// The backend answered but produced no audio
    #[error("Backend returned no audio data")]
    EmptyAudio,

    /// Writing the streamed audio to disk failed
    #[error("Audio write error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProviderError {
    /// Whether another attempt has a chance of succeeding
    pub fn is_transient(&self) -> bool {
        match self {
            Self::ConnectionError(_)
            | Self::RateLimitExceeded(_)
            | Self::EmptyAudio
            | Self::Io(_)
            | Self::RequestFailed(_) => true,
            Self::ApiError { status_code, .. } => *status_code >= 500 || *status_code == 408,
            Self::AuthenticationError(_) => false,
        }
    }
}

/// Terminal outcome of a synthesis call, after the backend's retry policy ran
#[derive(Error, Debug)]
pub enum SynthesisError {
    /// Every attempt failed with a transient error
    #[error("Synthesis failed after {attempts} attempts: {last}")]
    Exhausted {
        /// Number of attempts made
        attempts: u32,
        /// Error of the final attempt
        last: ProviderError,
    },

    /// The backend rejected the request in a way retrying cannot fix
    #[error("Synthesis rejected: {0}")]
    Rejected(ProviderError),

    /// Voice id not known to the backend
    #[error("Unknown voice: {0}")]
    UnknownVoice(String),
}

/// Errors raised while merging paragraph audio into one segment file
#[derive(Error, Debug)]
pub enum MergeError {
    /// A referenced audio file does not exist or is empty
    #[error("Audio file missing: {0:?}")]
    MissingAudio(PathBuf),

    /// A referenced audio file could not be decoded
    #[error("Audio file unreadable: {path:?}: {reason}")]
    UnreadableAudio {
        /// The offending file
        path: PathBuf,
        /// Decoder message
        reason: String,
    },

    /// None of the inputs produced usable audio
    #[error("No usable audio segments to merge")]
    EmptyMerge,

    /// Encoding the combined audio failed
    #[error("Audio encoding failed: {0}")]
    Encode(String),

    /// File system error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while decoding a source book
#[derive(Error, Debug)]
pub enum DecodeError {
    /// No decoder is registered for the file type
    #[error("Unsupported book format: {0}")]
    UnsupportedFormat(String),

    /// The text could not be decoded with any supported encoding
    #[error("Could not detect text encoding of {0:?}")]
    Encoding(PathBuf),

    /// File system error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while preparing caption data
#[derive(Error, Debug)]
pub enum CaptionError {
    /// Stored word timing data is not valid JSON of the expected shape
    #[error("Invalid word timing data: {0}")]
    InvalidTimings(#[from] serde_json::Error),
}

/// Main application error type that wraps all other errors
#[derive(Error, Debug)]
pub enum AppError {
    /// Error from a file operation
    #[error("File error: {0}")]
    File(String),

    /// Configuration is missing or inconsistent
    #[error("Configuration error: {0}")]
    Config(String),

    /// Error from the paragraph store
    #[error("Database error: {0}")]
    Database(String),

    /// A requested record does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Error from a speech backend
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Terminal synthesis error
    #[error("Synthesis error: {0}")]
    Synthesis(#[from] SynthesisError),

    /// Error from audio merging
    #[error("Merge error: {0}")]
    Merge(#[from] MergeError),

    /// Error from book decoding
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Error from caption preparation
    #[error("Caption error: {0}")]
    Caption(#[from] CaptionError),

    /// Any other error
    #[error("Unknown error: {0}")]
    Unknown(String),
}

// Utility functions for error conversion
impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        Self::Unknown(error.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(error: std::io::Error) -> Self {
        Self::File(error.to_string())
    }
}

impl From<rusqlite::Error> for AppError {
    fn from(error: rusqlite::Error) -> Self {
        Self::Database(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_isTransient_withServerError_shouldBeTrue() {
        let error = ProviderError::ApiError { status_code: 503, message: "busy".to_string() };
        assert!(error.is_transient());
    }

    #[test]
    fn test_isTransient_withClientError_shouldBeFalse() {
        let error = ProviderError::ApiError { status_code: 400, message: "bad input".to_string() };
        assert!(!error.is_transient());
        assert!(!ProviderError::AuthenticationError("key".to_string()).is_transient());
    }

    #[test]
    fn test_isTransient_withRateLimit_shouldBeTrue() {
        assert!(ProviderError::RateLimitExceeded("slow down".to_string()).is_transient());
        assert!(ProviderError::EmptyAudio.is_transient());
    }

    #[test]
    fn test_synthesisError_exhausted_shouldMentionAttempts() {
        let error = SynthesisError::Exhausted {
            attempts: 3,
            last: ProviderError::ConnectionError("reset".to_string()),
        };
        let display = error.to_string();
        assert!(display.contains("3 attempts"));
        assert!(display.contains("reset"));
    }
}
