use anyhow::{Context, Result};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

use crate::server::authn::UserInfo;

pub const HEADER_IMPERSONATE_USER: &str = "Impersonate-User";
pub const HEADER_IMPERSONATE_UID: &str = "Impersonate-Uid";
pub const HEADER_IMPERSONATE_GROUP: &str = "Impersonate-Group";
pub const HEADER_IMPERSONATE_EXTRA_PREFIX: &str = "Impersonate-Extra-";

/// Reports whether an inbound header could change the identity seen by the
/// upstream. Such headers are never forwarded.
pub fn is_impersonation_header(name: &str) -> bool {
    let prefix = b"impersonate-";
    name.len() >= prefix.len() && name.as_bytes()[..prefix.len()].eq_ignore_ascii_case(prefix)
}

/// Expresses `user` as impersonation headers.
pub fn impersonation_headers(user: &UserInfo) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();

    headers.insert(
        HeaderName::from_static("impersonate-user"),
        header_value(HEADER_IMPERSONATE_USER, &user.name)?,
    );
    if let Some(uid) = user.uid.as_ref() {
        headers.insert(
            HeaderName::from_static("impersonate-uid"),
            header_value(HEADER_IMPERSONATE_UID, uid)?,
        );
    }
    for group in user.groups.iter() {
        headers.append(
            HeaderName::from_static("impersonate-group"),
            header_value(HEADER_IMPERSONATE_GROUP, group)?,
        );
    }
    for (key, values) in user.extra.iter() {
        let name = format!("{HEADER_IMPERSONATE_EXTRA_PREFIX}{}", escape_extra_key(key));
        let header = HeaderName::from_bytes(name.as_bytes())
            .with_context(|| format!("invalid impersonation header '{name}'"))?;
        for value in values.iter() {
            headers.append(header.clone(), header_value(&name, value)?);
        }
    }

    Ok(headers)
}

fn header_value(name: &str, value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value).with_context(|| format!("invalid value for header '{name}'"))
}

/// Bytes of an extra key that are not HTTP token characters, plus `%` so
/// the upstream can decode the key.
const EXTRA_KEY_ESCAPE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'!')
    .remove(b'#')
    .remove(b'$')
    .remove(b'&')
    .remove(b'\'')
    .remove(b'*')
    .remove(b'+')
    .remove(b'-')
    .remove(b'.')
    .remove(b'^')
    .remove(b'_')
    .remove(b'`')
    .remove(b'|')
    .remove(b'~');

fn escape_extra_key(key: &str) -> String {
    utf8_percent_encode(key, EXTRA_KEY_ESCAPE).to_string()
}
