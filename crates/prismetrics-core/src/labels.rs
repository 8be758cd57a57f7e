//! Label sets and the canonical Label Key encoder.
//!
//! A [`LabelSet`] keeps insertion order (it drives rendering order inside the
//! braces) but compares order-independently. A [`LabelKey`] is the canonical
//! identity of a label set and the only key ever used for storage slots.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::value::format_value;

/// A label value: string or number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LabelValue {
    Str(String),
    Num(f64),
}

impl fmt::Display for LabelValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LabelValue::Str(s) => f.write_str(s),
            LabelValue::Num(n) => f.write_str(&format_value(*n)),
        }
    }
}

impl From<&str> for LabelValue {
    fn from(v: &str) -> Self {
        LabelValue::Str(v.to_string())
    }
}

impl From<String> for LabelValue {
    fn from(v: String) -> Self {
        LabelValue::Str(v)
    }
}

impl From<&String> for LabelValue {
    fn from(v: &String) -> Self {
        LabelValue::Str(v.clone())
    }
}

impl From<f64> for LabelValue {
    fn from(v: f64) -> Self {
        LabelValue::Num(v)
    }
}

impl From<i64> for LabelValue {
    fn from(v: i64) -> Self {
        LabelValue::Num(v as f64)
    }
}

impl From<i32> for LabelValue {
    fn from(v: i32) -> Self {
        LabelValue::Num(f64::from(v))
    }
}

impl From<u32> for LabelValue {
    fn from(v: u32) -> Self {
        LabelValue::Num(f64::from(v))
    }
}

impl From<u64> for LabelValue {
    fn from(v: u64) -> Self {
        LabelValue::Num(v as f64)
    }
}

impl From<usize> for LabelValue {
    fn from(v: usize) -> Self {
        LabelValue::Num(v as f64)
    }
}

/// Unordered mapping from label name to value.
///
/// Equality ignores insertion order; iteration follows it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LabelSet(IndexMap<String, LabelValue>);

impl LabelSet {
    pub fn new() -> Self {
        Self(IndexMap::new())
    }

    /// Insert or replace a label, returning the previous value.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<LabelValue>) -> Option<LabelValue> {
        self.0.insert(name.into(), value.into())
    }

    /// Builder-style insert.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<LabelValue>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&LabelValue> {
        self.0.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    /// Remove a label, keeping the order of the remaining ones.
    pub fn remove(&mut self, name: &str) -> Option<LabelValue> {
        self.0.shift_remove(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &LabelValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Copy of `self` with every label from `defaults` it does not already define
    /// appended, in `defaults` order.
    pub fn with_defaults(&self, defaults: &LabelSet) -> LabelSet {
        let mut out = self.clone();
        for (name, value) in defaults.iter() {
            if !out.contains(name) {
                out.insert(name, value.clone());
            }
        }
        out
    }

    /// Canonical storage identity of this label set.
    pub fn key(&self) -> LabelKey {
        LabelKey::encode(self)
    }
}

impl<K, V> FromIterator<(K, V)> for LabelSet
where
    K: Into<String>,
    V: Into<LabelValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut set = LabelSet::new();
        for (k, v) in iter {
            set.insert(k, v);
        }
        set
    }
}

impl<K, V, const N: usize> From<[(K, V); N]> for LabelSet
where
    K: Into<String>,
    V: Into<LabelValue>,
{
    fn from(pairs: [(K, V); N]) -> Self {
        pairs.into_iter().collect()
    }
}

/// Canonical, order-independent identity of a [`LabelSet`].
///
/// Label names are sorted and joined as `name1:value1,name2:value2`; the empty
/// set encodes to the empty string. This is an identity function, not a hash.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LabelKey(String);

impl LabelKey {
    pub fn encode(labels: &LabelSet) -> Self {
        let mut pairs: Vec<(&str, &LabelValue)> = labels.iter().collect();
        pairs.sort_by(|a, b| a.0.cmp(b.0));

        let key = pairs
            .iter()
            .map(|(k, v)| format!("{k}:{v}"))
            .collect::<Vec<_>>()
            .join(",");
        Self(key)
    }

    /// Key of the label-less slot.
    pub fn empty() -> Self {
        Self(String::new())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LabelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
