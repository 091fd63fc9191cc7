//! # Brass Core
//!
//! Declaration metadata and the scoped injectable resolver of the Brass
//! framework.
//!
//! ## Building Blocks
//!
//! - **Identities**: [`Target`] for types, [`MethodTarget`] for controller
//!   methods, [`MetadataTarget`] for either.
//! - **Metadata**: [`MetadataStore`], a side table keyed by
//!   `(target, scope, key)` on which every registry is built.
//! - **Injection**: [`Injector`] declares injectables and resolves one
//!   instance per `(target, scope)`, synchronously or asynchronously.
//!
//! ```text
//! ┌────────────┐  declare   ┌───────────────┐
//! │  Registry  │──────────▶│ MetadataStore │
//! └────────────┘            └───────────────┘
//!       │ resolve                  ▲
//!       ▼                          │ slots
//! ┌────────────┐  single-flight    │
//! │  Injector  │───────────────────┘
//! └────────────┘
//! ```

pub mod error;
pub mod injectable;
pub mod metadata;
pub mod scope;
pub mod target;

pub use error::{BoxError, CoreResult, DeclarationError, Error, ResolutionError, SharedError};
pub use injectable::{
    Dependencies, Factory, INJECTABLE_KEY, Initialization, InjectableDeclaration, Injector, Instance,
    downcast,
};
pub use metadata::{MetadataKey, MetadataStore};
pub use scope::Scope;
pub use target::{MetadataTarget, MethodTarget, Target};
