//! Error types for helmlet
//!
//! Merging and overriding values never fail under the default policy, so
//! every error here comes from a collaborator: reading files, parsing YAML
//! or templates, and rendering. Errors carry the path or source location
//! they relate to and an actionable help message.

use std::fmt;

/// Result type alias for helmlet operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for helmlet operations
#[derive(Debug, Clone)]
pub struct Error {
    /// The kind of error that occurred
    pub kind: ErrorKind,
    /// Dotted values path the error relates to (e.g., "Values.image.tag")
    pub path: Option<String>,
    /// Source location (file, line) if available
    pub source_location: Option<SourceLocation>,
    /// Actionable help message
    pub help: Option<String>,
    /// Underlying cause (as string for Clone compatibility)
    pub cause: Option<String>,
}

/// Location in a source file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocation {
    pub file: String,
    pub line: Option<usize>,
    pub column: Option<usize>,
}

/// Categories of errors that can occur
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// Error parsing a values document or option string
    Parse,
    /// Syntax error in a template
    TemplateSyntax,
    /// Error while executing a template
    Render,
    /// Key missing from the context while rendering in strict mode
    MissingKey,
    /// Mapping and non-mapping collided under the strict conflict policy
    TypeConflict { existing: String, incoming: String },
    /// I/O error (file not found, permission denied, etc.)
    Io,
}

impl Error {
    fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            path: None,
            source_location: None,
            help: None,
            cause: None,
        }
    }

    /// Create a new parse error
    pub fn parse(message: impl Into<String>) -> Self {
        Self {
            cause: Some(message.into()),
            ..Self::new(ErrorKind::Parse)
        }
    }

    /// Create an I/O error for a file
    pub fn io(file: impl Into<String>, err: &std::io::Error) -> Self {
        let file = file.into();
        let help = match err.kind() {
            std::io::ErrorKind::NotFound => Some(format!("Check that '{}' exists", file)),
            std::io::ErrorKind::PermissionDenied => {
                Some(format!("Check the permissions of '{}'", file))
            }
            _ => None,
        };
        Self {
            source_location: Some(SourceLocation::file(file)),
            help,
            cause: Some(err.to_string()),
            ..Self::new(ErrorKind::Io)
        }
    }

    /// Create a template syntax error
    pub fn template_syntax(message: impl Into<String>) -> Self {
        Self {
            cause: Some(message.into()),
            ..Self::new(ErrorKind::TemplateSyntax)
        }
    }

    /// Create a template execution error
    pub fn render(message: impl Into<String>) -> Self {
        Self {
            cause: Some(message.into()),
            ..Self::new(ErrorKind::Render)
        }
    }

    /// Create a missing key error (strict rendering only)
    pub fn missing_key(path: impl Into<String>) -> Self {
        let path_str = path.into();
        Self {
            help: Some(format!(
                "Define '{}' in a values file or with --set, or render without --strict",
                path_str
            )),
            path: Some(path_str),
            ..Self::new(ErrorKind::MissingKey)
        }
    }

    /// Create a type conflict error (strict conflict policy only)
    pub fn type_conflict(
        path: impl Into<String>,
        existing: impl Into<String>,
        incoming: impl Into<String>,
    ) -> Self {
        Self {
            path: Some(path.into()),
            help: Some("Make both layers agree on the shape of this key, or drop --strict-merge".into()),
            ..Self::new(ErrorKind::TypeConflict {
                existing: existing.into(),
                incoming: incoming.into(),
            })
        }
    }

    /// Add path context to the error
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Add source location to the error
    pub fn with_source_location(mut self, loc: SourceLocation) -> Self {
        self.source_location = Some(loc);
        self
    }

    /// Add help message to the error
    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }
}

impl SourceLocation {
    /// A location naming only a file
    pub fn file(file: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            line: None,
            column: None,
        }
    }

    /// A location naming a file and a line
    pub fn line(file: impl Into<String>, line: usize) -> Self {
        Self {
            file: file.into(),
            line: Some(line),
            column: None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ErrorKind::Parse => write!(f, "Parse error")?,
            ErrorKind::TemplateSyntax => write!(f, "Template syntax error")?,
            ErrorKind::Render => write!(f, "Template execution error")?,
            ErrorKind::MissingKey => write!(f, "Missing key")?,
            ErrorKind::TypeConflict { existing, incoming } => {
                write!(f, "Type conflict: cannot replace {} with {}", existing, incoming)?
            }
            ErrorKind::Io => write!(f, "I/O error")?,
        }

        if let Some(path) = &self.path {
            write!(f, "\n  Path: {}", path)?;
        }

        if let Some(loc) = &self.source_location {
            write!(f, "\n  File: {}", loc.file)?;
            if let Some(line) = loc.line {
                write!(f, ":{}", line)?;
            }
        }

        if let Some(cause) = &self.cause {
            write!(f, "\n  {}", cause)?;
        }

        if let Some(help) = &self.help {
            write!(f, "\n  Help: {}", help)?;
        }

        Ok(())
    }
}

impl std::error::Error for Error {}
