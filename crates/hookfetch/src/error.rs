//! Error types for the request pipeline
//!
//! Every error raised by a hook or by the bound fetch function reaches the
//! caller exactly as it was returned: the pipeline never wraps, downgrades or
//! swallows errors.

use std::time::Duration;
use thiserror::Error;

use crate::plugins::Phase;

/// Errors that can occur while building, sending or post-processing a request
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum FetchError {
    /// A plugin hook failed
    #[error("{phase} hook of plugin '{plugin}' failed: {message}")]
    Hook {
        plugin: String,
        phase: Phase,
        message: String,
    },

    /// The bound fetch function failed
    #[error("Transport error: {message}")]
    Transport { message: String, retryable: bool },

    /// An `on_response` hook rejected an otherwise successful exchange
    #[error("Response rejected with status {status}: {message}")]
    ResponseAbort { status: u16, message: String },

    /// A timeout wrapper gave up waiting
    #[error("Request timed out after {after:?}")]
    Timeout { after: Duration },

    /// The caller cancelled the request
    #[error("Request cancelled")]
    Cancelled,

    /// The request could not be assembled
    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    /// The client could not be constructed
    #[error("Invalid client configuration: {message}")]
    Configuration { message: String },

    /// A response body could not be decoded
    #[error("Failed to decode response body: {message}")]
    Decode { message: String },

    /// External system error
    #[error("External system error: {source}")]
    External {
        #[from]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl FetchError {
    /// Create a hook failure error
    pub fn hook(plugin: impl Into<String>, phase: Phase, message: impl Into<String>) -> Self {
        Self::Hook {
            plugin: plugin.into(),
            phase,
            message: message.into(),
        }
    }

    /// Create a transport error that retry wrappers may retry
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: true,
        }
    }

    /// Create a transport error that must not be retried
    pub fn transport_fatal(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: false,
        }
    }

    /// Create a response abort error
    pub fn response_abort(status: u16, message: impl Into<String>) -> Self {
        Self::ResponseAbort {
            status,
            message: message.into(),
        }
    }

    /// Create an invalid request error
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a decode error
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    /// Whether a retry wrapper may re-issue the request after this error
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport { retryable, .. } => *retryable,
            Self::Timeout { .. } => true,
            _ => false,
        }
    }
}

pub type FetchResult<T> = Result<T, FetchError>;
