//! Loading and layering values
//!
//! Values files are merged in the order given, lowest priority first, and
//! `--set` overrides are applied last so they always win.
//!
//! ```rust
//! use helmlet_core::ValuesBuilder;
//!
//! let values = ValuesBuilder::new()
//!     .merge_yaml("image: {repo: nginx, tag: '1.25'}")
//!     .unwrap()
//!     .apply_set("image.tag=1.27,replicas=2")
//!     .unwrap()
//!     .build();
//!
//! assert_eq!(values.get_path("image.tag").and_then(|v| v.as_str()), Some("1.27"));
//! assert_eq!(values.get_path("image.repo").and_then(|v| v.as_str()), Some("nginx"));
//! ```

use std::path::Path;

use crate::encoding::read_utf8_file;
use crate::error::{Error, Result, SourceLocation};
use crate::overrides::{parse_set_values, Override};
use crate::value::{ConflictPolicy, Mapping, Value};

/// Key under which values are exposed to templates
pub const VALUES_KEY: &str = "Values";

/// Parse a YAML (or JSON) document into a values mapping
///
/// An empty document is an empty mapping. Any other top-level type is an
/// error, since the root of the values tree is always a mapping.
pub fn parse_values(yaml: &str) -> Result<Value> {
    let doc: serde_yaml::Value =
        serde_yaml::from_str(yaml).map_err(|e| Error::parse(e.to_string()))?;

    match Value::from_yaml(doc) {
        Value::Null => Ok(Value::mapping()),
        value @ Value::Mapping(_) => Ok(value),
        other => Err(Error::parse(format!(
            "values document must be a mapping, found {}",
            other.type_name()
        ))
        .with_help("Put values under top-level keys, e.g. 'replicas: 3'")),
    }
}

/// Read and parse a values file
pub fn load_values_file(path: impl AsRef<Path>) -> Result<Value> {
    let path = path.as_ref();
    let file = path.display().to_string();
    let decoded = read_utf8_file(path)?;

    parse_values(&decoded.text).map_err(|e| e.with_source_location(SourceLocation::file(file)))
}

/// Wrap values as the data handed to templates: `{"Values": values}`
pub fn template_context(values: Value) -> Value {
    let mut context = Mapping::new();
    context.insert(VALUES_KEY.to_string(), values);
    Value::Mapping(context)
}

/// Folds values sources into one tree
#[derive(Debug, Clone)]
pub struct ValuesBuilder {
    values: Value,
    policy: ConflictPolicy,
}

impl Default for ValuesBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ValuesBuilder {
    /// Start from an empty mapping with the override-wins policy
    pub fn new() -> Self {
        Self {
            values: Value::mapping(),
            policy: ConflictPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: ConflictPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Merge a values file over what has been loaded so far
    pub fn merge_file(self, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let value = load_values_file(path)?;
        log::debug!("merging values file {}", path.display());
        self.merge(value).map_err(|e| {
            e.with_source_location(SourceLocation::file(path.display().to_string()))
        })
    }

    /// Merge a YAML document given as a string
    pub fn merge_yaml(self, yaml: &str) -> Result<Self> {
        let value = parse_values(yaml)?;
        self.merge(value)
    }

    /// Merge an already-built tree
    pub fn merge(mut self, value: Value) -> Result<Self> {
        self.values.try_merge(value, self.policy)?;
        Ok(self)
    }

    /// Parse a `--set` string and apply its overrides
    pub fn apply_set(self, input: &str) -> Result<Self> {
        let overrides = parse_set_values(input);
        log::debug!("parsed {} overrides from --set", overrides.len());
        self.apply_overrides(&overrides)
    }

    /// Apply overrides in order, so later duplicates win
    pub fn apply_overrides(mut self, overrides: &[Override]) -> Result<Self> {
        for o in overrides {
            log::debug!("override {}={}", o.path, o.value);
            o.try_apply(&mut self.values, self.policy)?;
        }
        Ok(self)
    }

    pub fn build(self) -> Value {
        self.values
    }
}
