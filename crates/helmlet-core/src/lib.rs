//! helmlet-core: layered values and text templates
//!
//! This crate merges values files into one tree, applies `--set` style
//! overrides on top, and renders Go-style text templates against the
//! result.
//!
//! # Example
//!
//! ```rust
//! use helmlet_core::template::{RenderOptions, render_str};
//! use helmlet_core::{template_context, ValuesBuilder};
//!
//! let values = ValuesBuilder::new()
//!     .merge_yaml("replicas: 1\nimage: {repo: nginx}")
//!     .unwrap()
//!     .apply_set("replicas=3")
//!     .unwrap()
//!     .build();
//!
//! let out = render_str(
//!     "deploy.yaml",
//!     "replicas: {{ .Values.replicas }}\nimage: {{ .Values.image.repo }}",
//!     &template_context(values),
//!     &RenderOptions::default(),
//! )
//! .unwrap();
//! assert_eq!(out, "replicas: 3\nimage: nginx");
//! ```

pub mod discover;
pub mod encoding;
pub mod error;
pub mod overrides;
pub mod template;
pub mod value;

mod values;

pub use discover::find_templates;
pub use encoding::{read_utf8_file, Decoded};
pub use error::{Error, ErrorKind, Result};
pub use overrides::{apply_overrides, parse_set_values, Override};
pub use template::{Delimiters, RenderOptions, Template};
pub use value::{ConflictPolicy, Mapping, Value};
pub use values::{load_values_file, parse_values, template_context, ValuesBuilder, VALUES_KEY};
