//! Path-based field relocation.
//!
//! A [`PathMap`] lists `(from, to)` pairs of dot-separated paths. [`remap`]
//! builds a fresh row holding only the mapped destinations, creating nested
//! objects along `to` as needed. Source paths that do not resolve are skipped.

use crate::row::{Row, Value};
use serde::{Deserialize, Serialize};
use serde_json::Map;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathMap {
    entries: Vec<(String, String)>,
}

impl PathMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.entries.push((from.into(), to.into()));
        self
    }

    pub fn entries(&self) -> &[(String, String)] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<A: Into<String>, B: Into<String>> FromIterator<(A, B)> for PathMap {
    fn from_iter<I: IntoIterator<Item = (A, B)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().map(|(a, b)| (a.into(), b.into())).collect(),
        }
    }
}

/// Relocate the fields of `row` according to `map`.
pub fn remap(row: &Row, map: &PathMap) -> Row {
    let mut out = Map::new();
    for (from, to) in &map.entries {
        if let Some(v) = lookup(row, from) {
            place(&mut out, to, v.clone());
        }
    }
    Row::from(out)
}

fn lookup<'a>(row: &'a Row, path: &str) -> Option<&'a Value> {
    let mut parts = path.split('.');
    let mut cur = row.get(parts.next()?)?;
    for part in parts {
        cur = match cur {
            Value::Object(m) => m.get(part)?,
            Value::Array(items) => items.get(part.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(cur)
}

fn place(out: &mut Map<String, Value>, path: &str, value: Value) {
    let mut parts: Vec<&str> = path.split('.').collect();
    let Some(leaf) = parts.pop() else {
        return;
    };
    let mut cur = out;
    for part in parts {
        let slot = cur
            .entry(part.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !slot.is_object() {
            // A scalar already sits on the way; the deeper path wins.
            *slot = Value::Object(Map::new());
        }
        let Value::Object(next) = slot else {
            return;
        };
        cur = next;
    }
    cur.insert(leaf.to_string(), value);
}
