//! Internal, programmer-facing error types.
//!
//! These are distinct from [`crate::diagnostics::Message`]: a `Message` reports a
//! mistake in the *user's* source text, rendered with a source location. An
//! [`InternalError`] reports misuse of this crate's own API, or a broken invariant
//! inside the pipeline itself (a compiler bug, not a user error).

use thiserror::Error;

#[derive(Error, Debug)]
pub enum InternalError {
    #[error("no object with canonical name {module}:{path:?}")]
    UnknownCanonicalName { module: String, path: Vec<String> },

    #[error("dependency ordering pass failed to place all fields of {0}:{1:?}")]
    DependencyOrderingIncomplete(String, Vec<String>),

    #[error("attribute registry has no entry for ({back_end:?}, {name}, {context})")]
    UnknownAttributeContext {
        back_end: Option<String>,
        name: String,
        context: String,
    },

    #[error("expected an integer-typed expression bound but found {0:?}")]
    NotAnIntegerBound(String),

    #[error("malformed write-method inference input: {0}")]
    Uninvertible(String),
}

pub type Result<T> = std::result::Result<T, InternalError>;
