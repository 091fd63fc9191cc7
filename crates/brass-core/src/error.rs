//! Unified error types for the Brass core.
//!
//! Declaration errors are raised while the application is being composed and
//! are meant to abort startup. Resolution errors are raised while instances
//! are being obtained and are recoverable by picking the right resolution
//! mode (`resolve_async` / `preload` before `resolve`).

use std::sync::Arc;

use thiserror::Error;

/// Boxed error type used for user-supplied constructors and initializers.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Shareable form of [`BoxError`].
///
/// Pending initializations are awaited by several callers at once, so their
/// failure has to be cloneable.
pub type SharedError = Arc<dyn std::error::Error + Send + Sync>;

// =============================================================================
// Declaration Errors
// =============================================================================

/// Errors raised while declaring targets.
#[derive(Debug, Clone, Error)]
pub enum DeclarationError {
    /// The target already carries a declaration of this kind.
    #[error("failed to declare '{target}' as {kind}: already declared")]
    AlreadyDeclared {
        /// Name of the target.
        target: String,
        /// Kind of declaration (injectable, controller, ...).
        kind: &'static str,
    },

    /// The target was never declared as this kind.
    #[error("failed to access {kind} metadata of '{target}': not declared")]
    NotDeclared {
        /// Name of the target.
        target: String,
        /// Kind of declaration (injectable, controller, ...).
        kind: &'static str,
    },

    /// The declaration is structurally invalid (e.g. a pattern that cannot be compiled).
    #[error("invalid declaration of '{target}': {reason}")]
    Invalid {
        /// Name of the target.
        target: String,
        /// Reason for rejection.
        reason: String,
    },
}

impl DeclarationError {
    /// Creates an [`AlreadyDeclared`](Self::AlreadyDeclared) error.
    pub fn already_declared(target: impl ToString, kind: &'static str) -> Self {
        Self::AlreadyDeclared {
            target: target.to_string(),
            kind,
        }
    }

    /// Creates a [`NotDeclared`](Self::NotDeclared) error.
    pub fn not_declared(target: impl ToString, kind: &'static str) -> Self {
        Self::NotDeclared {
            target: target.to_string(),
            kind,
        }
    }

    /// Creates an [`Invalid`](Self::Invalid) error.
    pub fn invalid(target: impl ToString, reason: impl Into<String>) -> Self {
        Self::Invalid {
            target: target.to_string(),
            reason: reason.into(),
        }
    }
}

// =============================================================================
// Resolution Errors
// =============================================================================

/// Errors raised while resolving instances.
#[derive(Debug, Clone, Error)]
pub enum ResolutionError {
    /// A synchronous resolve hit a resolution that is still in flight.
    #[error(
        "failed to resolve async injectable '{target}' synchronously: a resolution is already pending, use `resolve_async` instead"
    )]
    Pending {
        /// Name of the target.
        target: String,
    },

    /// A synchronous resolve started an asynchronous initializer.
    #[error(
        "failed to resolve async injectable '{target}' synchronously: its initializer is asynchronous, use `resolve_async` or `preload` first"
    )]
    AsyncInitializer {
        /// Name of the target.
        target: String,
    },

    /// The constructor or initializer of the target failed.
    #[error("failed to initialize '{target}': {source}")]
    Initializer {
        /// Name of the target.
        target: String,
        /// Error returned by user code.
        #[source]
        source: SharedError,
    },

    /// The resolved instance does not have the requested type.
    #[error("resolved instance of '{target}' is not a '{expected}'")]
    TypeMismatch {
        /// Name of the target.
        target: String,
        /// Requested type name.
        expected: &'static str,
    },

    /// A factory resolved its own target and scope while running.
    #[error("'{target}' was resolved recursively in scope '{scope}' from inside its own factory")]
    Recursive {
        /// Name of the target.
        target: String,
        /// The scope being constructed.
        scope: String,
    },

    /// A dependency was requested at a position the declaration does not have.
    #[error("'{target}' has {len} dependencies, index {index} is out of range")]
    DependencyIndex {
        /// Name of the target being constructed.
        target: String,
        /// Requested index.
        index: usize,
        /// Number of declared dependencies.
        len: usize,
    },
}

impl ResolutionError {
    /// Wraps a user error raised while constructing `target`.
    pub fn initializer(target: impl ToString, source: BoxError) -> Self {
        Self::Initializer {
            target: target.to_string(),
            source: Arc::from(source),
        }
    }
}

// =============================================================================
// Umbrella Error
// =============================================================================

/// Any error produced by the core.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// See [`DeclarationError`].
    #[error(transparent)]
    Declaration(#[from] DeclarationError),

    /// See [`ResolutionError`].
    #[error(transparent)]
    Resolution(#[from] ResolutionError),
}

impl Error {
    /// Returns `true` for declaration errors.
    pub fn is_declaration(&self) -> bool {
        matches!(self, Self::Declaration(_))
    }

    /// Returns `true` for resolution errors.
    pub fn is_resolution(&self) -> bool {
        matches!(self, Self::Resolution(_))
    }
}

/// Result type for core operations.
pub type CoreResult<T> = Result<T, Error>;
