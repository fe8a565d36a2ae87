//! Error types.
//!
//! Failures are split the way the runtime recovers from them:
//!
//! - [`EvalError`] is returned by every binding evaluation. The binding that
//!   receives it logs it and falls back to a safe default.
//! - [`DirectiveError`] is a structural problem with a directive. The compiler
//!   renders an inline marker in place of the directive's output.
//! - [`ProviderError`], [`ParseError`] and [`ScriptError`] come from the
//!   external collaborators and surface through [`MountError`].

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Failure while evaluating a template expression.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    #[error("'{name}' is not defined")]
    UnknownName { name: String },

    #[error("syntax error in `{expression}` at offset {offset}: {message}")]
    Syntax {
        expression: String,
        offset: usize,
        message: String,
    },

    #[error("type error: {0}")]
    Type(String),

    #[error("'{name}' is not callable")]
    NotCallable { name: String },

    #[error("'{name}' belongs to an enclosing scope and is read-only here")]
    ReadOnly { name: String },

    #[error("{0}")]
    Custom(String),
}

impl EvalError {
    pub fn custom(message: impl Into<String>) -> Self {
        Self::Custom(message.into())
    }
}

/// A directive whose own syntax is unusable.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DirectiveError {
    #[error("malformed list expression `{0}` (expected `item in items` or `(item, index) in items`)")]
    MalformedList(String),

    #[error("`{first}` and `{second}` cannot be combined on one element")]
    Conflicting { first: String, second: String },
}

/// The component source provider could not supply text.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProviderError {
    #[error("source not found: {0}")]
    NotFound(String),

    #[error("failed to load {url}: {message}")]
    Failed { url: String, message: String },
}

/// The structural parser rejected a component source.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("failed to parse component source: {0}")]
pub struct ParseError(pub String);

/// The script executor failed.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("script failed: {0}")]
pub struct ScriptError(pub String);

/// A renderer capability could not create its backing object.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("renderer failed: {0}")]
pub struct RenderError(pub String);

/// Failure of [`Runtime::mount_component`](crate::Runtime::mount_component).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MountError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Script(#[from] ScriptError),

    #[error("mount target {0:?} is not attached to the document")]
    InvalidTarget(crate::dom::NodeId),

    #[error("mount was cancelled before the component finished loading")]
    Cancelled,
}

/// Top-level error for APIs that can fail in more than one layer.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    #[error(transparent)]
    Eval(#[from] EvalError),

    #[error(transparent)]
    Directive(#[from] DirectiveError),

    #[error(transparent)]
    Mount(#[from] MountError),

    #[error("invalid configuration: {0}")]
    Config(String),
}
