//! # gqlmod-di
//!
//! Scoped singleton container for the gqlmod composition engine.
//!
//! Modules register [`Provider`]s (constants, constructible types, or
//! constructible types bound under another key) into a shared [`Injector`]
//! and resolve them later by [`ProviderKey`]. Constructed values are
//! singletons: they are built once, on first resolution or when forced with
//! [`Injector::init`], and shared from then on.
//!
//! ```ignore
//! use gqlmod_di::{Injectable, Injector, Provider, ProviderKey, ResolutionError, Resolver};
//!
//! struct Blog {
//!     db: Arc<Database>,
//! }
//!
//! impl Injectable for Blog {
//!     fn construct(resolver: &Resolver<'_>) -> Result<Self, ResolutionError> {
//!         Ok(Self { db: resolver.resolve::<Database>()? })
//!     }
//! }
//!
//! let injector = Injector::new();
//! injector.provide(&Provider::of::<Database>())?;
//! injector.provide(&Provider::of::<Blog>())?;
//! let blog = injector.resolve::<Blog>()?;
//! ```

pub mod error;
pub mod injector;
pub mod key;
pub mod provider;

pub use error::{ProviderError, ResolutionError};
pub use injector::{Injector, Resolver};
pub use key::ProviderKey;
pub use provider::{Injectable, Instance, Provider, ProviderKind};
