//! Request and response headers.

use std::collections::HashMap;

/// A list of headers present in requests and responses.
///
/// Keys manipulated through [`set`](Header::set), [`get`](Header::get), and
/// [`del`](Header::del) are standardized to the canonical MIME header form
/// (`content-type` becomes `Content-Type`). Keys inserted through
/// [`insert_raw`](Header::insert_raw) or conversion from a plain map are
/// stored verbatim.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Header(HashMap<String, String>);

impl Header {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a key, canonicalizing it first.
    pub fn set(&mut self, key: impl AsRef<str>, value: impl Into<String>) {
        self.0.insert(canonical_key(key.as_ref()), value.into());
    }

    /// Returns the value for a key, or an empty string when absent.
    pub fn get(&self, key: impl AsRef<str>) -> &str {
        self.0
            .get(&canonical_key(key.as_ref()))
            .map(String::as_str)
            .unwrap_or("")
    }

    /// Removes a key.
    pub fn del(&mut self, key: impl AsRef<str>) {
        self.0.remove(&canonical_key(key.as_ref()));
    }

    /// Inserts a key exactly as given, without canonicalization.
    pub fn insert_raw(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.0.iter()
    }

    pub(crate) fn as_map(&self) -> &HashMap<String, String> {
        &self.0
    }
}

impl From<HashMap<String, String>> for Header {
    fn from(map: HashMap<String, String>) -> Self {
        Self(map)
    }
}

impl From<Header> for HashMap<String, String> {
    fn from(h: Header) -> Self {
        h.0
    }
}

impl FromIterator<(String, String)> for Header {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Converts a key to its canonical MIME header form: the first letter of
/// each dash-separated word upper-cased, the rest lower-cased. Keys
/// containing bytes that are not valid in a header field name are returned
/// unchanged.
fn canonical_key(key: &str) -> String {
    if key.bytes().any(|b| !valid_field_byte(b)) {
        return key.to_string();
    }
    let mut out = String::with_capacity(key.len());
    let mut upper = true;
    for c in key.chars() {
        if upper && c.is_ascii_lowercase() {
            out.push(c.to_ascii_uppercase());
        } else if !upper && c.is_ascii_uppercase() {
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
        upper = c == '-';
    }
    out
}

fn valid_field_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_and_get_canonicalize() {
        let mut h = Header::new();
        h.set("content-type", "text/plain");
        assert_eq!(h.get("CONTENT-TYPE"), "text/plain");
        assert_eq!(h.get("Content-Type"), "text/plain");
        assert!(h.as_map().contains_key("Content-Type"));
    }

    #[test]
    fn canonical_form() {
        assert_eq!(canonical_key("requestID"), "Requestid");
        assert_eq!(canonical_key("x-request-id"), "X-Request-Id");
        assert_eq!(canonical_key("Test"), "Test");
    }

    #[test]
    fn invalid_bytes_left_alone() {
        assert_eq!(canonical_key("weird key"), "weird key");
    }

    #[test]
    fn del_removes() {
        let mut h = Header::new();
        h.set("test", "ok");
        h.del("TEST");
        assert_eq!(h.get("test"), "");
        assert!(h.is_empty());
    }

    #[test]
    fn raw_insert_preserves_case() {
        let mut h = Header::new();
        h.insert_raw("RequestID", "1");
        assert!(h.as_map().contains_key("RequestID"));
    }
}
