//! The small error taxonomy described in spec §7.
//!
//! EWC is errorless by contract: malformed markup degrades to literal text.
//! These are the only ways a parse can fail the caller.

/// Attempted to place a node inside a container whose allowed-contents set
/// rejects it.
#[derive(Clone, Copy, Debug, Eq, PartialEq, thiserror::Error)]
#[error("{child} is not allowed inside {parent}")]
pub struct NestingError {
    /// The kind of the container that rejected the child.
    pub parent: &'static str,
    /// The kind of the node that was rejected.
    pub child: &'static str,
}

/// A malformed `prop:value` declaration was passed to
/// [`AttributeMap::add_style`](crate::attrs::AttributeMap::add_style).
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
#[error("malformed style declaration: {0:?}")]
pub struct StyleFormatError(pub String);

/// The extension stack exceeded the configured recursion depth.
#[derive(Clone, Copy, Debug, Eq, PartialEq, thiserror::Error)]
#[error("extension recursion limit ({limit}) exceeded")]
pub struct RecursionLimit {
    /// The configured depth limit that was exceeded.
    pub limit: usize,
}

/// The `include` extension could not satisfy a request.
///
/// Unlike the other three members of the taxonomy, this error is recovered
/// locally: the extension driver turns it into a diagnostic placeholder line
/// instead of propagating it to the caller.
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum IncludeError {
    /// No `include_path` was configured, so `include` is disabled.
    #[error("include is disabled (no include_path configured)")]
    Disabled,
    /// The named file could not be opened.
    #[error("can't open {0:?}")]
    NotFound(String),
    /// No filename argument was given to `include`.
    #[error("no filename")]
    MissingName,
}

/// Errors that can propagate out of a [`Parser`](crate::parser::Parser).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// See [`NestingError`].
    #[error(transparent)]
    Nesting(#[from] NestingError),
    /// See [`StyleFormatError`].
    #[error(transparent)]
    StyleFormat(#[from] StyleFormatError),
    /// See [`RecursionLimit`].
    #[error(transparent)]
    Recursion(#[from] RecursionLimit),
}
