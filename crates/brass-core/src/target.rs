//! Stable identities for everything that can carry metadata.
//!
//! Types are identified by their [`TypeId`]; controller methods are
//! identified by their owning controller plus the method name they were
//! registered under.

use std::any::TypeId;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Identity of a type that can be declared (injectable, controller,
/// middleware, interceptor, ...).
#[derive(Clone, Copy)]
pub struct Target {
    id: TypeId,
    name: &'static str,
}

impl Target {
    /// Returns the identity of `T`.
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// Returns the underlying [`TypeId`].
    pub fn type_id(&self) -> TypeId {
        self.id
    }

    /// Returns the full type name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Returns `true` if this is the identity of `T`.
    pub fn is<T: ?Sized + 'static>(&self) -> bool {
        self.id == TypeId::of::<T>()
    }
}

impl PartialEq for Target {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Target {}

impl Hash for Target {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Target").field(&self.name).finish()
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Identity of a controller method.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct MethodTarget {
    owner: Target,
    name: &'static str,
}

impl MethodTarget {
    /// Identity of the method `name` on controller `C`.
    pub fn of<C: 'static>(name: &'static str) -> Self {
        Self::new(Target::of::<C>(), name)
    }

    /// Identity of the method `name` on the controller `owner`.
    pub fn new(owner: Target, name: &'static str) -> Self {
        Self { owner, name }
    }

    /// The controller owning this method.
    pub fn owner(&self) -> Target {
        self.owner
    }

    /// The method name.
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl fmt::Debug for MethodTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MethodTarget({}::{})", self.owner.name, self.name)
    }
}

impl fmt::Display for MethodTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.owner.name, self.name)
    }
}

/// Anything metadata can be attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetadataTarget {
    /// A type.
    Type(Target),
    /// A controller method.
    Method(MethodTarget),
}

impl From<Target> for MetadataTarget {
    fn from(target: Target) -> Self {
        Self::Type(target)
    }
}

impl From<MethodTarget> for MetadataTarget {
    fn from(target: MethodTarget) -> Self {
        Self::Method(target)
    }
}

impl fmt::Display for MetadataTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Type(t) => t.fmt(f),
            Self::Method(m) => m.fmt(f),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Alpha;
    struct Beta;

    #[test]
    fn test_target_identity() {
        assert_eq!(Target::of::<Alpha>(), Target::of::<Alpha>());
        assert_ne!(Target::of::<Alpha>(), Target::of::<Beta>());
        assert!(Target::of::<Alpha>().is::<Alpha>());
        assert!(Target::of::<Alpha>().name().ends_with("Alpha"));
    }

    #[test]
    fn test_method_target_identity() {
        let a = MethodTarget::of::<Alpha>("list");
        assert_eq!(a, MethodTarget::of::<Alpha>("list"));
        assert_ne!(a, MethodTarget::of::<Alpha>("show"));
        assert_ne!(a, MethodTarget::of::<Beta>("list"));
        assert_eq!(a.owner(), Target::of::<Alpha>());
        assert!(a.to_string().ends_with("Alpha::list"));
    }
}
