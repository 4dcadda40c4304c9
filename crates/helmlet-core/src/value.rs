//! Values tree types
//!
//! Represents merged values before they are handed to the renderer.
//! Values can be scalars (string, int, float, bool, null),
//! sequences (arrays), or mappings (objects) keyed by strings.
//!
//! Layering works through two operations:
//! - [`Value::merge`] folds one tree into another, later source wins
//! - [`Value::set_path`] writes a single dotted-path override
//!
//! Both resolve type conflicts by letting the incoming value win, unless a
//! caller opts into [`ConflictPolicy::Strict`].

use indexmap::IndexMap;
use serde::Serialize;
use std::fmt;

use crate::error::{Error, Result};

/// String-keyed mapping used for every mapping node
pub type Mapping = IndexMap<String, Value>;

/// A node in the values tree
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
#[serde(untagged)]
pub enum Value {
    /// Null value
    #[default]
    Null,
    /// Boolean value
    Bool(bool),
    /// Integer value
    Integer(i64),
    /// Floating point value
    Float(f64),
    /// String value
    String(String),
    /// Sequence of values
    Sequence(Vec<Value>),
    /// Mapping of string keys to values
    Mapping(Mapping),
}

/// How merge and override treat a mapping colliding with a non-mapping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConflictPolicy {
    /// The incoming value replaces the existing one, whatever its type
    #[default]
    OverrideWins,
    /// Replacing a mapping with a non-mapping (or the reverse) is an error.
    /// Null on either side never conflicts.
    Strict,
}

impl Value {
    /// An empty mapping
    pub fn mapping() -> Self {
        Value::Mapping(Mapping::new())
    }

    /// Check if this value is null
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Check if this value is a mapping
    pub fn is_mapping(&self) -> bool {
        matches!(self, Value::Mapping(_))
    }

    /// Get as i64 if this is an Integer
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Get as str if this is a String
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get as mapping if this is a Mapping
    pub fn as_mapping(&self) -> Option<&Mapping> {
        match self {
            Value::Mapping(m) => Some(m),
            _ => None,
        }
    }

    /// Look up a direct child of a mapping
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_mapping().and_then(|m| m.get(key))
    }

    /// Get a value by dotted path (e.g., "image.tag")
    pub fn get_path(&self, path: &str) -> Option<&Value> {
        if path.is_empty() {
            return Some(self);
        }
        split_path(path)
            .into_iter()
            .try_fold(self, |current, segment| current.get(segment))
    }

    /// Returns the type name of this value
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Sequence(_) => "sequence",
            Value::Mapping(_) => "mapping",
        }
    }

    /// Deep merge `other` into this value, `other` winning on conflicts
    ///
    /// Merge semantics:
    /// - Mappings: merged recursively, key by key
    /// - Scalars and null: `other` wins
    /// - Sequences: `other` replaces entirely
    /// - Type mismatch: `other` wins
    pub fn merge(&mut self, other: Value) {
        match (self, other) {
            (Value::Mapping(base), Value::Mapping(overlay)) => {
                for (key, overlay_value) in overlay {
                    match base.get_mut(&key) {
                        Some(base_value) => base_value.merge(overlay_value),
                        None => {
                            base.insert(key, overlay_value);
                        }
                    }
                }
            }
            (this, other) => *this = other,
        }
    }

    /// Deep merge under an explicit conflict policy
    ///
    /// Under [`ConflictPolicy::Strict`] the whole of `other` is checked
    /// first, so on error `self` is unchanged.
    pub fn try_merge(&mut self, other: Value, policy: ConflictPolicy) -> Result<()> {
        if policy == ConflictPolicy::Strict {
            self.check_merge(&other, "")?;
        }
        self.merge(other);
        Ok(())
    }

    fn check_merge(&self, other: &Value, path: &str) -> Result<()> {
        match (self, other) {
            (Value::Mapping(base), Value::Mapping(overlay)) => {
                for (key, overlay_value) in overlay {
                    if let Some(base_value) = base.get(key) {
                        base_value.check_merge(overlay_value, &join_path(path, key))?;
                    }
                }
                Ok(())
            }
            (this, other) if conflicts(this, other) => Err(Error::type_conflict(
                path,
                this.type_name(),
                other.type_name(),
            )),
            _ => Ok(()),
        }
    }

    /// Set a value at a path, creating intermediate mappings as needed
    ///
    /// The last segment is overwritten unconditionally. Intermediate
    /// segments holding a scalar or a sequence are replaced by an empty
    /// mapping, discarding the old value.
    pub fn set_path(&mut self, segments: &[&str], value: Value) {
        // Override-wins has no failure path.
        let _ = self.set_path_at(segments, 0, value, ConflictPolicy::OverrideWins);
    }

    /// Set a value at a path under an explicit conflict policy
    pub fn try_set_path(
        &mut self,
        segments: &[&str],
        value: Value,
        policy: ConflictPolicy,
    ) -> Result<()> {
        self.set_path_at(segments, 0, value, policy)
    }

    fn set_path_at(
        &mut self,
        segments: &[&str],
        depth: usize,
        value: Value,
        policy: ConflictPolicy,
    ) -> Result<()> {
        let Some(key) = segments.get(depth) else {
            return Ok(());
        };

        let map = self.ensure_mapping(policy, || segments[..depth].join("."))?;

        if depth + 1 == segments.len() {
            if policy == ConflictPolicy::Strict {
                if let Some(existing) = map.get(*key) {
                    if conflicts(existing, &value) {
                        return Err(Error::type_conflict(
                            segments.join("."),
                            existing.type_name(),
                            value.type_name(),
                        ));
                    }
                }
            }
            map.insert((*key).to_string(), value);
            return Ok(());
        }

        map.entry((*key).to_string())
            .or_insert_with(Value::mapping)
            .set_path_at(segments, depth + 1, value, policy)
    }

    /// Make this node a mapping, replacing scalars and sequences
    fn ensure_mapping(
        &mut self,
        policy: ConflictPolicy,
        path: impl FnOnce() -> String,
    ) -> Result<&mut Mapping> {
        if !matches!(self, Value::Mapping(_) | Value::Null) {
            let path = path();
            if policy == ConflictPolicy::Strict {
                return Err(Error::type_conflict(path, self.type_name(), "mapping"));
            }
            log::debug!(
                "replacing {} at '{}' with a mapping for an override",
                self.type_name(),
                path
            );
        }

        if !self.is_mapping() {
            *self = Value::mapping();
        }
        match self {
            Value::Mapping(map) => Ok(map),
            _ => unreachable!("node was just made a mapping"),
        }
    }

    /// Convert a deserialized YAML document into a values tree
    ///
    /// YAML allows mapping keys of any type (`1: one`, `true: yes`). Those
    /// mappings are coerced here, once, into string-keyed mappings so the
    /// rest of the engine only ever sees [`Mapping`]. Tags are dropped.
    pub fn from_yaml(value: serde_yaml::Value) -> Value {
        match value {
            serde_yaml::Value::Null => Value::Null,
            serde_yaml::Value::Bool(b) => Value::Bool(b),
            serde_yaml::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Integer(i)
                } else if let Some(f) = n.as_f64() {
                    Value::Float(f)
                } else {
                    Value::String(n.to_string())
                }
            }
            serde_yaml::Value::String(s) => Value::String(s),
            serde_yaml::Value::Sequence(seq) => {
                Value::Sequence(seq.into_iter().map(Value::from_yaml).collect())
            }
            serde_yaml::Value::Mapping(map) => Value::Mapping(coerce_mapping(map)),
            serde_yaml::Value::Tagged(tagged) => Value::from_yaml(tagged.value),
        }
    }
}

/// Split a dotted key such as `"a.b.c"` into its segments
pub fn split_path(path: &str) -> Vec<&str> {
    path.split('.').collect()
}

fn join_path(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", prefix, key)
    }
}

fn conflicts(existing: &Value, incoming: &Value) -> bool {
    if existing.is_null() || incoming.is_null() {
        return false;
    }
    existing.is_mapping() != incoming.is_mapping()
}

fn coerce_mapping(map: serde_yaml::Mapping) -> Mapping {
    let mut coerced = Mapping::with_capacity(map.len());
    for (key, value) in map {
        let key = match key {
            serde_yaml::Value::String(s) => s,
            other => Value::from_yaml(other).to_string(),
        };
        if coerced.contains_key(&key) {
            log::warn!("duplicate key '{}' after key conversion, keeping the later one", key);
        }
        coerced.insert(key, Value::from_yaml(value));
    }
    coerced
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Float(n) => write!(f, "{}", n),
            Value::String(s) => write!(f, "{}", s),
            Value::Sequence(seq) => {
                write!(f, "[")?;
                for (i, v) in seq.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", v)?;
                }
                write!(f, "]")
            }
            Value::Mapping(map) => {
                write!(f, "{{")?;
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", k, v)?;
                }
                write!(f, "}}")
            }
        }
    }
}

impl From<serde_yaml::Value> for Value {
    fn from(value: serde_yaml::Value) -> Self {
        Value::from_yaml(value)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::Sequence(v.into_iter().map(Into::into).collect())
    }
}

impl From<Mapping> for Value {
    fn from(m: Mapping) -> Self {
        Value::Mapping(m)
    }
}
