//! Link cell values.
//!
//! A link cell holds an ordered set of referenced row ids. In storage it is a
//! comma-joined string (`"2,3"`), with `NULL` for no links; everything else in
//! the engine works on [`LinkValue`].

use std::fmt;

/// Separator between row ids in the stored form.
pub const DELIMITER: char = ',';

/// Ordered, duplicate-free sequence of referenced row ids.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct LinkValue(Vec<String>);

impl LinkValue {
    /// An empty value.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a value from ids, dropping repeats (first occurrence wins).
    pub fn from_ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut out: Vec<String> = Vec::new();
        for id in ids {
            let id = id.into();
            if !out.contains(&id) {
                out.push(id);
            }
        }
        Self(out)
    }

    /// Parse the stored form.
    ///
    /// `NULL`, the empty string, and anything that is not a clean delimited
    /// id list all parse to the empty value, so a bad cell never spreads into
    /// relation writes.
    pub fn parse(raw: Option<&str>) -> Self {
        let Some(raw) = raw else {
            return Self::new();
        };
        if raw.trim().is_empty() {
            return Self::new();
        }

        let mut ids = Vec::new();
        for part in raw.split(DELIMITER) {
            let id = part.trim();
            if !is_valid_id(id) {
                return Self::new();
            }
            ids.push(id);
        }
        Self::from_ids(ids)
    }

    /// The stored form: `None` when empty.
    pub fn to_storage(&self) -> Option<String> {
        if self.0.is_empty() {
            None
        } else {
            Some(self.0.join(","))
        }
    }

    /// Row ids in order.
    pub fn ids(&self) -> &[String] {
        &self.0
    }

    /// Iterate row ids in order.
    pub fn iter(&self) -> std::slice::Iter<'_, String> {
        self.0.iter()
    }

    /// Check whether `id` is referenced.
    pub fn contains(&self, id: &str) -> bool {
        self.0.iter().any(|x| x == id)
    }

    /// Number of referenced rows.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if nothing is referenced.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Append an id unless already present.
    pub fn push(&mut self, id: impl Into<String>) {
        let id = id.into();
        if !self.contains(&id) {
            self.0.push(id);
        }
    }
}

fn is_valid_id(id: &str) -> bool {
    !id.is_empty()
        && !id
            .chars()
            .any(|c| c.is_whitespace() || c.is_control() || c == DELIMITER)
}

impl fmt::Display for LinkValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join(","))
    }
}

impl<S: Into<String>> FromIterator<S> for LinkValue {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self::from_ids(iter)
    }
}

impl<'a> IntoIterator for &'a LinkValue {
    type Item = &'a String;
    type IntoIter = std::slice::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
