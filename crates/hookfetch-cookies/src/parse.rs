//! `Cookie` and `Set-Cookie` header codec
//!
//! Parsing follows RFC 6265 section 5.2: unknown attributes are ignored, an
//! unparseable `Expires` is ignored, and `Max-Age` wins over `Expires`.

use chrono::{DateTime, NaiveDateTime, Utc};

use crate::error::{CookieError, CookieResult};
use crate::record::{CookieRecord, SameSite, expiry_from_max_age};

/// Parse a `Set-Cookie` header value
///
/// # Errors
///
/// Returns [`CookieError::MissingPair`] when the header has no `name=value`
/// pair and [`CookieError::EmptyName`] when the name is empty.
pub fn parse_set_cookie(header: &str) -> CookieResult<CookieRecord> {
    parse_set_cookie_at(header, Utc::now())
}

/// Parse a `Set-Cookie` header value, resolving `Max-Age` against `now`
///
/// # Errors
///
/// See [`parse_set_cookie`].
pub fn parse_set_cookie_at(header: &str, now: DateTime<Utc>) -> CookieResult<CookieRecord> {
    let mut parts = header.split(';');
    let pair = parts.next().unwrap_or_default();
    let (name, value) = pair
        .split_once('=')
        .ok_or_else(|| CookieError::missing_pair(header))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(CookieError::EmptyName);
    }

    let mut record = CookieRecord::new(name, value.trim());
    let mut max_age = None;

    for attribute in parts {
        let (key, value) = match attribute.split_once('=') {
            Some((key, value)) => (key.trim(), value.trim()),
            None => (attribute.trim(), ""),
        };

        if key.eq_ignore_ascii_case("expires") {
            if let Some(expires) = parse_cookie_date(value) {
                record.expires = Some(expires);
            }
        } else if key.eq_ignore_ascii_case("max-age") {
            if let Ok(seconds) = value.parse::<i64>() {
                max_age = Some(seconds);
            }
        } else if key.eq_ignore_ascii_case("domain") {
            record = record.with_domain(value);
        } else if key.eq_ignore_ascii_case("path") {
            record = record.with_path(value);
        } else if key.eq_ignore_ascii_case("secure") {
            record.secure = true;
        } else if key.eq_ignore_ascii_case("httponly") {
            record.http_only = true;
        } else if key.eq_ignore_ascii_case("samesite") {
            record.same_site = SameSite::parse(value);
        }
    }

    if let Some(seconds) = max_age {
        record.expires = Some(expiry_from_max_age(seconds, now));
    }

    Ok(record)
}

/// Parse a `Cookie` header (or `document.cookie` style) string such as `a=1; b=2`
///
/// Segments without `=` or with an empty name are skipped.
pub fn parse_cookie_string(input: &str) -> Vec<CookieRecord> {
    input
        .split(';')
        .filter_map(|segment| {
            let (name, value) = segment.split_once('=')?;
            let name = name.trim();
            if name.is_empty() {
                return None;
            }
            Some(CookieRecord::new(name, value.trim()))
        })
        .collect()
}

/// Serialize records into a `Cookie` header value
pub fn serialize_cookie_string<'a>(records: impl IntoIterator<Item = &'a CookieRecord>) -> String {
    records
        .into_iter()
        .map(CookieRecord::to_pair)
        .collect::<Vec<_>>()
        .join("; ")
}

fn parse_cookie_date(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(date) = DateTime::parse_from_rfc2822(value) {
        return Some(date.with_timezone(&Utc));
    }
    // Netscape format, still sent by some servers
    NaiveDateTime::parse_from_str(value, "%a, %d-%b-%Y %H:%M:%S GMT")
        .ok()
        .map(|naive| naive.and_utc())
}
