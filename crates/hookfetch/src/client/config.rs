//! Client configuration

use serde::{Deserialize, Serialize};
use url::Url;

/// Defaults applied to every request issued by a client
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL that relative request targets are appended to
    pub base_url: Option<Url>,

    /// Headers set on every request before per-call overrides
    pub default_headers: Vec<(String, String)>,

    /// `User-Agent` value
    pub user_agent: Option<String>,
}
