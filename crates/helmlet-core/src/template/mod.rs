//! Text templates over a values tree
//!
//! Templates use the Go `text/template` action syntax with a small function
//! set. The data passed to [`Template::render`] is reachable as `.` at the
//! top level and as `$` everywhere.
//!
//! ```rust
//! use helmlet_core::template::{Delimiters, Template};
//! use helmlet_core::{template_context, Value};
//!
//! let mut values = Value::mapping();
//! values.set_path(&["name"], Value::from("web"));
//!
//! let template = Template::parse("svc.yaml", "name: {{ .Values.name | quote }}", &Delimiters::default()).unwrap();
//! let out = template.render(&template_context(values), false).unwrap();
//! assert_eq!(out, "name: \"web\"");
//! ```

mod ast;
mod eval;
mod funcs;
mod parser;

use crate::error::{Error, Result};
use crate::value::Value;
use ast::Node;

/// Left and right action delimiters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delimiters {
    pub left: String,
    pub right: String,
}

impl Default for Delimiters {
    fn default() -> Self {
        Self::new("{{", "}}")
    }
}

impl Delimiters {
    pub fn new(left: impl Into<String>, right: impl Into<String>) -> Self {
        Self {
            left: left.into(),
            right: right.into(),
        }
    }

    /// Parse a `"left,right"` pair such as `"{{,}}"` or `"[[,]]"`
    pub fn parse(pair: &str) -> Result<Self> {
        let parts: Vec<&str> = pair.split(',').collect();
        match parts.as_slice() {
            [left, right] if !left.is_empty() && !right.is_empty() => {
                Ok(Self::new(*left, *right))
            }
            _ => Err(Error::parse(format!("invalid delimiter pair '{}'", pair))
                .with_help("Use two non-empty delimiters separated by a comma, e.g. \"{{,}}\"")),
        }
    }
}

/// Options that control how templates are rendered
#[derive(Debug, Clone, Default)]
pub struct RenderOptions {
    pub delimiters: Delimiters,
    /// Treat missing keys as errors
    pub strict: bool,
}

impl RenderOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delimiters(mut self, delimiters: Delimiters) -> Self {
        self.delimiters = delimiters;
        self
    }

    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }
}

/// A parsed template
#[derive(Debug, Clone)]
pub struct Template {
    name: String,
    nodes: Vec<Node>,
}

impl Template {
    /// Parse template source; `name` appears in error locations
    pub fn parse(name: impl Into<String>, source: &str, delimiters: &Delimiters) -> Result<Self> {
        let name = name.into();
        let nodes = parser::parse(&name, source, delimiters)?;
        log::debug!("parsed template {} ({} nodes)", name, nodes.len());
        Ok(Self { name, nodes })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Execute against `data`
    ///
    /// With `strict`, a missing key is an error instead of `<no value>`.
    pub fn render(&self, data: &Value, strict: bool) -> Result<String> {
        eval::Renderer {
            name: &self.name,
            root: data,
            strict,
            depth: 0,
        }
        .render(&self.nodes)
    }
}

/// Parse and render in one step
pub fn render_str(name: &str, source: &str, data: &Value, options: &RenderOptions) -> Result<String> {
    Template::parse(name, source, &options.delimiters)?.render(data, options.strict)
}
