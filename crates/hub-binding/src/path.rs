//! Route templates.
//!
//! A template is a `/`-separated path in which any segment starting with
//! `:` (named) or `*` (wildcard) is a placeholder. Injection replaces the
//! whole segment with the parameter value; placeholders without a matching
//! parameter are left untouched.

use std::collections::BTreeMap;
use std::fmt;

/// Query parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    pub key: String,
    pub value: String,
}

impl Param {
    pub fn new(key: impl Into<String>, value: impl fmt::Display) -> Self {
        Self {
            key: key.into(),
            value: value.to_string(),
        }
    }
}

/// Named template parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params(BTreeMap<String, String>);

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl fmt::Display) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl fmt::Display) {
        self.0.insert(key.into(), value.to_string());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }
}

/// API path template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Path<'a>(&'a str);

impl<'a> Path<'a> {
    pub const fn new(template: &'a str) -> Self {
        Self(template)
    }

    pub fn as_str(&self) -> &'a str {
        self.0
    }

    /// Inject named parameters.
    pub fn inject(&self, params: &Params) -> String {
        self.0
            .split('/')
            .map(|segment| match placeholder(segment) {
                Some(key) => params.get(key).unwrap_or(segment),
                None => segment,
            })
            .collect::<Vec<_>>()
            .join("/")
    }
}

impl fmt::Display for Path<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

fn placeholder(segment: &str) -> Option<&str> {
    segment
        .strip_prefix(':')
        .or_else(|| segment.strip_prefix('*'))
}

/// Append `relative` to `root` with a single separator at the junction.
///
/// No normalization is applied; a trailing separator on `relative` (or on
/// `root` when `relative` is empty) is preserved.
pub fn join(root: &str, relative: &str) -> String {
    if relative.is_empty() {
        return root.to_string();
    }
    if root.is_empty() {
        return relative.to_string();
    }
    format!(
        "{}/{}",
        root.trim_end_matches('/'),
        relative.trim_start_matches('/')
    )
}
