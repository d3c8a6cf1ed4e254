//! Cookie record type and its matching rules
//!
//! A [`CookieRecord`] is identified by its `(name, domain, path)` triple. Two
//! records with the same triple are the same cookie; storing the second one
//! replaces the first.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{CookieError, CookieResult};

/// Default path assigned to cookies that do not carry a `Path` attribute
pub const DEFAULT_PATH: &str = "/";

/// `SameSite` attribute values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SameSite {
    Strict,
    Lax,
    None,
}

impl SameSite {
    /// Attribute value as written in a `Set-Cookie` header
    pub fn as_str(self) -> &'static str {
        match self {
            SameSite::Strict => "Strict",
            SameSite::Lax => "Lax",
            SameSite::None => "None",
        }
    }

    /// Parse an attribute value, case-insensitively
    pub fn parse(value: &str) -> Option<Self> {
        if value.eq_ignore_ascii_case("strict") {
            Some(SameSite::Strict)
        } else if value.eq_ignore_ascii_case("lax") {
            Some(SameSite::Lax)
        } else if value.eq_ignore_ascii_case("none") {
            Some(SameSite::None)
        } else {
            None
        }
    }
}

impl fmt::Display for SameSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single cookie with its attributes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CookieRecord {
    /// Cookie name
    pub name: String,

    /// Cookie value
    pub value: String,

    /// Domain the cookie is scoped to; `None` matches any host
    pub domain: Option<String>,

    /// `domain` is the only host the cookie is sent to, subdomains excluded
    #[serde(default)]
    pub host_only: bool,

    /// Path the cookie is scoped to
    pub path: String,

    /// Expiry instant; `None` is a session cookie
    pub expires: Option<DateTime<Utc>>,

    /// Only send over secure transports
    pub secure: bool,

    /// Not exposed to scripts
    pub http_only: bool,

    /// Cross-site sending policy
    pub same_site: Option<SameSite>,
}

impl CookieRecord {
    /// Create a session cookie with default attributes
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            domain: None,
            host_only: false,
            path: DEFAULT_PATH.to_string(),
            expires: None,
            secure: false,
            http_only: false,
            same_site: None,
        }
    }

    /// Scope the cookie to a domain. A leading dot is dropped and the domain is lower-cased.
    pub fn with_domain(mut self, domain: impl AsRef<str>) -> Self {
        let domain = domain.as_ref().trim().trim_start_matches('.');
        self.domain = if domain.is_empty() {
            None
        } else {
            Some(domain.to_ascii_lowercase())
        };
        self.host_only = false;
        self
    }

    /// Scope the cookie to exactly `host`, as for a `Set-Cookie` without `Domain`
    pub fn with_host_only(mut self, host: impl AsRef<str>) -> Self {
        self = self.with_domain(host.as_ref().trim_end_matches('.'));
        self.host_only = self.domain.is_some();
        self
    }

    /// Scope the cookie to a path
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        let path = path.into();
        self.path = if path.starts_with('/') {
            path
        } else {
            DEFAULT_PATH.to_string()
        };
        self
    }

    /// Set an absolute expiry instant
    pub fn with_expires(mut self, expires: DateTime<Utc>) -> Self {
        self.expires = Some(expires);
        self
    }

    /// Set the expiry relative to `now`. Zero or negative ages expire immediately.
    pub fn with_max_age(mut self, seconds: i64, now: DateTime<Utc>) -> Self {
        self.expires = Some(expiry_from_max_age(seconds, now));
        self
    }

    /// Set the `Secure` flag
    pub fn with_secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    /// Set the `HttpOnly` flag
    pub fn with_http_only(mut self, http_only: bool) -> Self {
        self.http_only = http_only;
        self
    }

    /// Set the `SameSite` policy
    pub fn with_same_site(mut self, same_site: SameSite) -> Self {
        self.same_site = Some(same_site);
        self
    }

    /// Whether this record and `other` identify the same cookie
    pub fn same_identity(&self, other: &CookieRecord) -> bool {
        self.name == other.name && self.domain == other.domain && self.path == other.path
    }

    /// Whether the cookie has expired at `now`
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires.is_some_and(|expires| expires <= now)
    }

    /// Whether the cookie has expired
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Whether this cookie should be sent on a request to `host` + `path`
    pub fn matches(&self, host: &str, path: &str, secure: bool) -> bool {
        if self.secure && !secure {
            return false;
        }
        self.accepts_host(host) && path_matches(path, &self.path)
    }

    /// Whether `host` may set or receive this cookie; unscoped records accept any host
    pub fn accepts_host(&self, host: &str) -> bool {
        match &self.domain {
            None => true,
            Some(domain) if self.host_only => host_equals(host, domain),
            Some(domain) => domain_matches(host, domain),
        }
    }

    /// Check that name and value can be carried in a `Cookie` header
    pub fn validate(&self) -> CookieResult<()> {
        if self.name.is_empty() {
            return Err(CookieError::EmptyName);
        }
        if self.name.chars().any(|c| is_separator(c) || c == '=') {
            return Err(CookieError::invalid_name(&self.name));
        }
        if self.value.chars().any(is_separator) {
            return Err(CookieError::invalid_value(&self.name));
        }
        Ok(())
    }

    /// `name=value` as sent in a `Cookie` header
    pub fn to_pair(&self) -> String {
        format!("{}={}", self.name, self.value)
    }

    /// Render the record as a `Set-Cookie` header value
    pub fn to_set_cookie(&self) -> String {
        let mut out = self.to_pair();
        if let Some(domain) = self.domain.as_ref().filter(|_| !self.host_only) {
            out.push_str("; Domain=");
            out.push_str(domain);
        }
        out.push_str("; Path=");
        out.push_str(&self.path);
        if let Some(expires) = &self.expires {
            out.push_str("; Expires=");
            out.push_str(&expires.format("%a, %d %b %Y %H:%M:%S GMT").to_string());
        }
        if self.secure {
            out.push_str("; Secure");
        }
        if self.http_only {
            out.push_str("; HttpOnly");
        }
        if let Some(same_site) = self.same_site {
            out.push_str("; SameSite=");
            out.push_str(same_site.as_str());
        }
        out
    }
}

impl fmt::Display for CookieRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.name, self.value)
    }
}

pub(crate) fn expiry_from_max_age(seconds: i64, now: DateTime<Utc>) -> DateTime<Utc> {
    if seconds <= 0 {
        return DateTime::<Utc>::MIN_UTC;
    }
    TimeDelta::try_seconds(seconds)
        .and_then(|delta| now.checked_add_signed(delta))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

fn is_separator(c: char) -> bool {
    c == ';' || c == ',' || c.is_whitespace() || c.is_control()
}

fn host_equals(host: &str, domain: &str) -> bool {
    host.trim_end_matches('.').eq_ignore_ascii_case(domain)
}

fn domain_matches(host: &str, domain: &str) -> bool {
    let host = host.trim_end_matches('.').to_ascii_lowercase();
    host == domain
        || host
            .strip_suffix(domain)
            .is_some_and(|prefix| prefix.ends_with('.'))
}

// RFC 6265 section 5.1.4
fn path_matches(request_path: &str, cookie_path: &str) -> bool {
    let request_path = if request_path.is_empty() {
        DEFAULT_PATH
    } else {
        request_path
    };
    if request_path == cookie_path {
        return true;
    }
    request_path.starts_with(cookie_path)
        && (cookie_path.ends_with('/') || request_path[cookie_path.len()..].starts_with('/'))
}
