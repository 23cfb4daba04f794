//! Error Types
//!
//! Structural errors travel through the compiled tree as `Element::Error` values, so
//! the error type is `Clone`. Path annotations build a breadcrumb back to the
//! component that failed.

use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    #[error("missing required {0}")]
    Missing(String),

    #[error("{0} was already set")]
    AlreadySet(String),

    #[error("reference used before it was compiled")]
    NotCompiled,

    #[error("expected exactly one tag, found {0}")]
    TagCount(usize),

    #[error("tag is missing a name")]
    MissingTagName,

    #[error("<{0}> cannot have content")]
    VoidContent(String),

    #[error("interaction '{name}': {source}")]
    Interaction { name: String, source: Box<Error> },

    #[error("an interaction is already registered at '{0}'")]
    DuplicateInteraction(String),

    #[error("failed to parse template for '{path}': {message}")]
    Template { path: String, message: String },

    #[error("failed to validate '{path}': {source}")]
    Invalid { path: String, source: Box<Error> },

    #[error("{0}")]
    Path(PathError),

    #[error("{}", join_errors(.0))]
    Multiple(Vec<Error>),
}

fn join_errors(errors: &[Error]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("\n")
}

impl Error {
    pub fn missing(what: impl Into<String>) -> Self {
        Error::Missing(what.into())
    }

    pub fn already_set(what: impl Into<String>) -> Self {
        Error::AlreadySet(what.into())
    }

    pub fn interaction(name: impl Into<String>, source: Error) -> Self {
        Error::Interaction { name: name.into(), source: Box::new(source) }
    }

    /// Folds a list of errors into a single result. Nested aggregates are flattened.
    pub fn collect(errors: Vec<Error>) -> Result<(), Error> {
        let mut flat = Vec::with_capacity(errors.len());
        for error in errors {
            match error {
                Error::Multiple(inner) => flat.extend(inner),
                other => flat.push(other),
            }
        }
        match flat.len() {
            0 => Ok(()),
            1 => Err(flat.remove(0)),
            _ => Err(Error::Multiple(flat)),
        }
    }

    /// Adds ancestor segments in front of the error's path.
    pub fn prepend_path<S: AsRef<str>>(self, segments: &[S]) -> Self {
        let segments: Vec<String> = segments.iter().map(|s| s.as_ref().to_string()).collect();
        match self {
            Error::Path(pe) => Error::Path(pe.prepend(segments)),
            Error::Multiple(errors) => Error::Multiple(
                errors.into_iter().map(|e| e.prepend_path(segments.as_slice())).collect(),
            ),
            other => Error::Path(PathError { path: segments, source: Box::new(other) }),
        }
    }

    /// Collapses the existing path into one parenthesised segment, then prepends.
    pub fn enclose_path<S: AsRef<str>>(self, segments: &[S]) -> Self {
        let segments: Vec<String> = segments.iter().map(|s| s.as_ref().to_string()).collect();
        match self {
            Error::Path(pe) => Error::Path(pe.enclose().prepend(segments)),
            Error::Multiple(errors) => Error::Multiple(
                errors.into_iter().map(|e| e.enclose_path(segments.as_slice())).collect(),
            ),
            other => Error::Path(PathError { path: segments, source: Box::new(other) }),
        }
    }
}

/// An error annotated with the chain of components it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct PathError {
    pub path: Vec<String>,
    pub source: Box<Error>,
}

impl PathError {
    pub fn prepend(mut self, mut segments: Vec<String>) -> Self {
        segments.append(&mut self.path);
        PathError { path: segments, source: self.source }
    }

    pub fn enclose(self) -> Self {
        PathError { path: vec![format!("({})", self.path_string())], source: self.source }
    }

    pub fn path_string(&self) -> String {
        let mut out = String::new();
        for (i, segment) in self.path.iter().enumerate() {
            if i > 0 && !segment.starts_with('(') && !segment.ends_with(')') {
                out.push('.');
            }
            out.push_str(segment);
        }
        out
    }
}

impl fmt::Display for PathError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.path_string(), self.source)
    }
}

// ─── VALIDATE ───

/// Gathers required-field failures so a component can report all of them at once.
#[derive(Debug, Default)]
pub struct Validate {
    errors: Vec<Error>,
}

impl Validate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `Missing(what)` unless `check` holds.
    pub fn require(&mut self, check: bool, what: &str) -> bool {
        if !check {
            self.errors.push(Error::missing(what));
        }
        check
    }

    pub fn require_id(&mut self, id: &str) -> bool {
        self.require(!id.is_empty(), "id")
    }

    pub fn check(&mut self, result: Result<(), Error>) -> bool {
        match result {
            Ok(()) => true,
            Err(e) => {
                self.errors.push(e);
                false
            }
        }
    }

    pub fn has_error(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn finish(self) -> Result<(), Error> {
        Error::collect(self.errors)
    }
}
