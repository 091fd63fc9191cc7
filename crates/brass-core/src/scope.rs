//! Resolution scopes.

use std::fmt;
use std::sync::Arc;

/// Opaque key partitioning the instance cache.
///
/// Distinct scopes yield distinct singletons of the same target.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum Scope {
    /// The process-wide default scope.
    #[default]
    Default,
    /// A scope identified by a name.
    Named(Arc<str>),
    /// A scope identified by a number.
    Id(u64),
}

impl Scope {
    /// The process-wide default scope.
    pub const DEFAULT: Scope = Scope::Default;

    /// Creates a named scope.
    pub fn named(name: impl AsRef<str>) -> Self {
        Self::Named(Arc::from(name.as_ref()))
    }

    /// Returns `true` for the default scope.
    pub fn is_default(&self) -> bool {
        matches!(self, Self::Default)
    }
}

impl From<&str> for Scope {
    fn from(name: &str) -> Self {
        Self::named(name)
    }
}

impl From<String> for Scope {
    fn from(name: String) -> Self {
        Self::Named(Arc::from(name))
    }
}

impl From<u64> for Scope {
    fn from(id: u64) -> Self {
        Self::Id(id)
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Default => f.write_str("default"),
            Self::Named(name) => f.write_str(name),
            Self::Id(id) => write!(f, "#{id}"),
        }
    }
}
