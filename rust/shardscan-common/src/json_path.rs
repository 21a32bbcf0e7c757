//! Dotted paths into JSON documents.
//!
//! A path is a sequence of object keys separated by `.`. The characters `.`, `*`
//! and `?` are path metacharacters; a backslash makes the following character
//! literal, so `logs\.2024\.\*.settings` addresses the key `logs.2024.*` and
//! then its `settings` member. Wildcards are never expanded: an unescaped `*`
//! or `?` is matched literally as well, but callers embedding user-supplied
//! names are expected to [`escape`] them first.

use serde_json::Value;

/// Characters that carry meaning inside a path and must be escaped when a
/// literal key contains them.
pub const PATH_METACHARACTERS: [char; 3] = ['.', '*', '?'];

/// Escapes every path metacharacter (and the escape character itself) in `key`,
/// so that it can be embedded as a single path segment.
pub fn escape(key: &str) -> String {
    let mut escaped = String::with_capacity(key.len() + 4);
    for c in key.chars() {
        if c == '\\' || PATH_METACHARACTERS.contains(&c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// A parsed path: the list of literal object keys to descend through.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JsonPath {
    segments: Vec<String>,
}

impl JsonPath {
    /// Parses a dotted path, honoring backslash escapes.
    ///
    /// An empty string parses to the empty path, which addresses the root.
    pub fn parse(path: &str) -> JsonPath {
        let mut segments = Vec::new();
        if path.is_empty() {
            return JsonPath { segments };
        }
        let mut current = String::new();
        let mut chars = path.chars();
        while let Some(c) = chars.next() {
            match c {
                '\\' => match chars.next() {
                    Some(next) => current.push(next),
                    None => current.push('\\'),
                },
                '.' => segments.push(std::mem::take(&mut current)),
                _ => current.push(c),
            }
        }
        segments.push(current);
        JsonPath { segments }
    }

    /// Builds a path from already-literal segments.
    pub fn from_segments<I, S>(segments: I) -> JsonPath
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        JsonPath {
            segments: segments.into_iter().map(Into::into).collect(),
        }
    }

    /// Returns a new path with `prefix` segments placed in front of this one.
    pub fn prefixed(&self, prefix: &JsonPath) -> JsonPath {
        let mut segments = prefix.segments.clone();
        segments.extend(self.segments.iter().cloned());
        JsonPath { segments }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Resolves the path against `value`. Returns `None` when any segment is
    /// missing or an intermediate value is not an object.
    pub fn lookup<'a>(&self, value: &'a Value) -> Option<&'a Value> {
        let mut current = value;
        for segment in &self.segments {
            current = current.as_object()?.get(segment)?;
        }
        Some(current)
    }
}

impl std::fmt::Display for JsonPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let rendered = self
            .segments
            .iter()
            .map(|s| escape(s))
            .collect::<Vec<_>>()
            .join(".");
        f.write_str(&rendered)
    }
}
