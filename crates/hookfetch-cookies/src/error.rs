//! Errors produced while parsing cookie headers or validating cookie input.

use thiserror::Error;

/// Errors that can occur while decoding or storing cookies
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CookieError {
    /// A `Set-Cookie` header carried no `name=value` pair
    #[error("Set-Cookie header has no name=value pair: {header}")]
    MissingPair { header: String },

    /// The cookie name was empty
    #[error("Cookie name must not be empty")]
    EmptyName,

    /// The cookie name contains a character outside the allowed token set
    #[error("Invalid cookie name: {name:?}")]
    InvalidName { name: String },

    /// The cookie value contains a separator, whitespace or control character
    #[error("Invalid value for cookie '{name}'")]
    InvalidValue { name: String },
}

impl CookieError {
    /// Create a missing pair error
    pub fn missing_pair(header: impl Into<String>) -> Self {
        Self::MissingPair {
            header: header.into(),
        }
    }

    /// Create an invalid name error
    pub fn invalid_name(name: impl Into<String>) -> Self {
        Self::InvalidName { name: name.into() }
    }

    /// Create an invalid value error
    pub fn invalid_value(name: impl Into<String>) -> Self {
        Self::InvalidValue { name: name.into() }
    }
}

pub type CookieResult<T> = Result<T, CookieError>;
