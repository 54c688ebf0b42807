//! # gqlmod
//!
//! Composes independently authored GraphQL modules into one schema, one
//! resolver map and one per-request context.
//!
//! A [`Module`] declares its type definitions, resolvers, dependencies on
//! other modules, container providers and lifecycle hooks. The
//! [`CompositionEngine`] orders modules by dependency, runs their init hooks,
//! merges their schema fragments, builds their implementations and, for
//! every request, assembles a [`Context`] from their context builders.
//!
//! ```ignore
//! use gqlmod::{CompositionEngine, ContextPatch, Module, NetworkRequest, ResolverMap, Resolver};
//!
//! let users = Module::new("users")
//!     .with_type_defs("type Query { me: String }")
//!     .with_resolvers(ResolverMap::new().field(
//!         "Query",
//!         "me",
//!         Resolver::new(|params| async move {
//!             Ok(params.context.value("user").cloned().unwrap_or_default())
//!         }),
//!     ))
//!     .with_context_builder(|_, _, _| async { Ok(ContextPatch::new().value("user", "ada")) });
//!
//! let mut engine = CompositionEngine::new([users])?;
//! engine.init(serde_json::json!({})).await?;
//! let response = engine.execute("{ me }", NetworkRequest::none()).await?;
//! ```
//!
//! ## Modules
//!
//! - [`graph`]: dependency ordering and cycle detection
//! - [`module`]: the module definition
//! - [`engine`]: init lifecycle and per-request context assembly
//! - [`schema`]: SDL merging, resolver maps and the executable schema
//! - [`context`]: the request context and its task-local binding
//! - [`bridge`]: publish/subscribe between module implementations
//! - [`config`], [`observability`]: configuration and tracing setup
//!
//! The container lives in the `gqlmod-di` crate and is re-exported as
//! [`di`].

pub mod bridge;
pub mod config;
pub mod context;
pub mod deferred;
pub mod engine;
pub mod error;
pub mod graph;
pub mod implementation;
pub mod module;
pub mod observability;
pub mod schema;

pub use gqlmod_di as di;

pub use bridge::{CommunicationBridge, EventBridge, Message, SharedBridge, Subscription};
pub use config::{ComposeConfig, LoggingConfig, SchemaConfig};
pub use context::{Context, ContextAccessor, ContextEntry, ContextPatch, NetworkRequest};
pub use deferred::Deferred;
pub use engine::{CompositionEngine, EngineBuilder, EngineState, InitParams, NonModules};
pub use error::{ComposeError, HookError, SchemaError};
pub use graph::DependencyGraph;
pub use implementation::{Implementation, ImplementationParams, Implementations};
pub use module::{Module, ModuleDependency, ModuleImplementation};
pub use schema::{
    Composer, ExecutableSchemaBuilder, FieldInfo, ResolveParams, Resolver, ResolverMap,
    ResolverResult, ResolversComposition, SchemaDocument, TypeDefs,
};

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, ComposeError>;
