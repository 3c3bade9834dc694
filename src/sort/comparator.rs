//! Comparator descriptors and the named-rule registry.
//!
//! A [`Comparator`] is data, not code: it names a column or a registered rule
//! plus a direction. That is what lets it cross the worker boundary as a
//! serialized string and be re-bound on the other side. Rules are plain `fn`
//! pointers, so they cannot capture state.
//!
//! ```
//! use rowflow::sort::{register_rule, Comparator};
//! use rowflow::{row, Row};
//! use std::cmp::Ordering;
//!
//! fn by_name_len(a: &Row, b: &Row) -> Ordering {
//!     let len = |r: &Row| r.get_str("name").map_or(0, str::len);
//!     len(a).cmp(&len(b))
//! }
//!
//! register_rule("by_name_len", by_name_len);
//! let cmp = Comparator::custom("by_name_len").reversed();
//! let bound = cmp.bind()?;
//! assert!(bound.compare(&row!({"name": "abc"}), &row!({"name": "a"})).is_lt());
//! # Ok::<(), rowflow::SortError>(())
//! ```

use crate::error::SortError;
use crate::row::{Row, Value};
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use serde_json::Number;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

/// A stateless comparison rule.
pub type RuleFn = fn(&Row, &Row) -> Ordering;

static RULES: RwLock<Option<HashMap<String, RuleFn>>> = RwLock::new(None);

/// Register `rule` under `name`, returning the rule it replaced.
pub fn register_rule(name: impl Into<String>, rule: RuleFn) -> Option<RuleFn> {
    let mut lock = RULES.write().unwrap_or_else(PoisonError::into_inner);
    lock.get_or_insert_with(HashMap::new).insert(name.into(), rule)
}

pub fn unregister_rule(name: &str) -> Option<RuleFn> {
    let mut lock = RULES.write().unwrap_or_else(PoisonError::into_inner);
    lock.as_mut().and_then(|rules| rules.remove(name))
}

pub(crate) fn lookup_rule(name: &str) -> Option<RuleFn> {
    let lock = RULES.read().unwrap_or_else(PoisonError::into_inner);
    lock.as_ref().and_then(|rules| rules.get(name).copied())
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

impl Direction {
    fn apply(self, ord: Ordering) -> Ordering {
        match self {
            Direction::Asc => ord,
            Direction::Desc => ord.reverse(),
        }
    }

    fn flip(self) -> Self {
        match self {
            Direction::Asc => Direction::Desc,
            Direction::Desc => Direction::Asc,
        }
    }
}

/// Serializable description of a row ordering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Comparator {
    /// Order by one column's value; see [`compare_values`].
    Column {
        column: String,
        #[serde(default)]
        direction: Direction,
    },
    /// Order by a rule registered with [`register_rule`].
    Custom {
        rule: String,
        #[serde(default)]
        direction: Direction,
    },
}

impl Comparator {
    pub fn asc(column: impl Into<String>) -> Self {
        Self::Column {
            column: column.into(),
            direction: Direction::Asc,
        }
    }

    pub fn desc(column: impl Into<String>) -> Self {
        Self::Column {
            column: column.into(),
            direction: Direction::Desc,
        }
    }

    pub fn custom(rule: impl Into<String>) -> Self {
        Self::Custom {
            rule: rule.into(),
            direction: Direction::Asc,
        }
    }

    #[must_use]
    pub fn reversed(self) -> Self {
        match self {
            Self::Column { column, direction } => Self::Column {
                column,
                direction: direction.flip(),
            },
            Self::Custom { rule, direction } => Self::Custom {
                rule,
                direction: direction.flip(),
            },
        }
    }

    pub fn direction(&self) -> Direction {
        match self {
            Self::Column { direction, .. } | Self::Custom { direction, .. } => *direction,
        }
    }

    /// Resolve into something that can compare rows.
    ///
    /// # Errors
    /// [`SortError::UnknownRule`] when a custom rule is not registered.
    pub fn bind(&self) -> Result<BoundComparator, SortError> {
        Ok(match self {
            Self::Column { column, direction } => BoundComparator {
                key: Key::Column(column.clone()),
                direction: *direction,
            },
            Self::Custom { rule, direction } => BoundComparator {
                key: Key::Rule(lookup_rule(rule).ok_or_else(|| SortError::UnknownRule(rule.clone()))?),
                direction: *direction,
            },
        })
    }

    pub(crate) fn to_descriptor(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub(crate) fn from_descriptor(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }
}

#[derive(Clone)]
enum Key {
    Column(String),
    Rule(RuleFn),
}

/// A [`Comparator`] resolved in the current thread.
#[derive(Clone)]
pub struct BoundComparator {
    key: Key,
    direction: Direction,
}

impl BoundComparator {
    pub fn compare(&self, a: &Row, b: &Row) -> Ordering {
        let ord = match &self.key {
            Key::Column(c) => compare_values(a.get(c).unwrap_or(&Value::Null), b.get(c).unwrap_or(&Value::Null)),
            Key::Rule(f) => f(a, b),
        };
        self.direction.apply(ord)
    }
}

fn type_rank(v: &Value) -> u8 {
    match v {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

/// Total order over JSON values: `null < bool < number < string < array < object`.
///
/// Numbers compare by exact value: integers against floats are never rounded
/// through `f64`, so the order stays transitive past 2^53.
/// Arrays compare element by element; objects by their JSON text.
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => compare_numbers(x, y),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Array(x), Value::Array(y)) => {
            for (l, r) in x.iter().zip(y) {
                let ord = compare_values(l, r);
                if ord.is_ne() {
                    return ord;
                }
            }
            x.len().cmp(&y.len())
        }
        (Value::Object(_), Value::Object(_)) => a.to_string().cmp(&b.to_string()),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

fn as_integer(n: &Number) -> Option<i128> {
    n.as_i64()
        .map(i128::from)
        .or_else(|| n.as_u64().map(i128::from))
}

fn as_float(n: &Number) -> OrderedFloat<f64> {
    OrderedFloat(n.as_f64().unwrap_or(f64::NAN))
}

fn compare_numbers(x: &Number, y: &Number) -> Ordering {
    match (as_integer(x), as_integer(y)) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(a), None) => compare_int_float(a, as_float(y)),
        (None, Some(b)) => compare_int_float(b, as_float(x)).reverse(),
        (None, None) => as_float(x).cmp(&as_float(y)),
    }
}

/// Exact comparison of an integer with a float, without rounding the integer.
/// NaN sorts above every number, as in [`OrderedFloat`].
fn compare_int_float(i: i128, f: OrderedFloat<f64>) -> Ordering {
    let f = f.into_inner();
    if f.is_nan() {
        return Ordering::Less;
    }
    let whole = f.trunc();
    // Saturates past the i128 range, which every i64/u64 is far inside.
    i.cmp(&(whole as i128)).then_with(|| OrderedFloat(whole).cmp(&OrderedFloat(f)))
}
