//! The unit of composition.
//!
//! A [`Module`] owns a schema fragment, its resolvers, container providers
//! and up to three hooks:
//!
//! - `on_init(init_params, config)`, run once during engine init, in
//!   declaration order. Its result is recorded under the module's name.
//! - an implementation factory, run once after init, in dependency order.
//! - `context_builder(request, implementations, context)`, run for every
//!   request, in dependency order.
//!
//! ```ignore
//! let users = Module::new("users")
//!     .with_type_defs("type Query { me: User } type User { id: ID! }")
//!     .with_resolvers(ResolverMap::new().field("Query", "me", me_resolver))
//!     .with_context_builder(|request, _, _| async move {
//!         Ok(ContextPatch::new().value("user", current_user(&request)))
//!     });
//!
//! let posts = Module::new("posts").with_dependency(&users);
//! ```

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use gqlmod_di::Provider;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::context::{Context, ContextPatch, NetworkRequest};
use crate::deferred::Deferred;
use crate::error::HookError;
use crate::implementation::{Implementation, ImplementationParams, Implementations};
use crate::schema::{ResolverMap, TypeDefs};

/// Future returned by module hooks.
pub type HookFuture<T> = BoxFuture<'static, Result<T, HookError>>;

/// `on_init(init_params, config)`.
pub type OnInitFn = Arc<dyn Fn(Arc<Value>, Value) -> HookFuture<Value> + Send + Sync>;

/// `context_builder(request, implementations, context_so_far)`.
pub type ContextBuilderFn = Arc<
    dyn Fn(NetworkRequest, Arc<Implementations>, Arc<Context>) -> HookFuture<ContextPatch>
        + Send
        + Sync,
>;

/// Builds a module implementation.
pub type ImplementationFactory =
    Arc<dyn Fn(ImplementationParams) -> HookFuture<Implementation> + Send + Sync>;

/// A module's implementation, given as is or built by a factory.
#[derive(Clone)]
pub enum ModuleImplementation {
    Value(Implementation),
    Factory(ImplementationFactory),
}

impl fmt::Debug for ModuleImplementation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(_) => f.write_str("Value(..)"),
            Self::Factory(_) => f.write_str("Factory(..)"),
        }
    }
}

/// A dependency on another module, by name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModuleDependency(String);

impl ModuleDependency {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ModuleDependency {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl From<String> for ModuleDependency {
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl From<&Module> for ModuleDependency {
    fn from(module: &Module) -> Self {
        Self(module.name.clone())
    }
}

/// A named unit of schema, resolvers, providers and hooks.
pub struct Module {
    name: String,
    dependencies: Vec<ModuleDependency>,
    type_defs: Deferred<TypeDefs>,
    resolvers: Deferred<ResolverMap>,
    providers: Vec<Provider>,
    on_init: Option<OnInitFn>,
    context_builder: Option<ContextBuilderFn>,
    implementation: Option<ModuleImplementation>,
    config: Value,
}

impl Module {
    /// Creates an empty module. Nothing is validated or run here.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            dependencies: Vec::new(),
            type_defs: Deferred::default(),
            resolvers: Deferred::default(),
            providers: Vec::new(),
            on_init: None,
            context_builder: None,
            implementation: None,
            config: Value::Null,
        }
    }

    #[must_use]
    pub fn with_type_defs(mut self, type_defs: impl Into<TypeDefs>) -> Self {
        self.type_defs = Deferred::Resolved(type_defs.into());
        self
    }

    /// Type definitions computed during init from
    /// `(init_params, own_init_result)`.
    #[must_use]
    pub fn with_type_defs_fn<F, T>(mut self, type_defs: F) -> Self
    where
        F: Fn(&Value, &Value) -> T + Send + Sync + 'static,
        T: Into<TypeDefs>,
    {
        self.type_defs = Deferred::pending(move |params, init| type_defs(params, init).into());
        self
    }

    #[must_use]
    pub fn with_resolvers(mut self, resolvers: ResolverMap) -> Self {
        self.resolvers = Deferred::Resolved(resolvers);
        self
    }

    /// Resolvers computed during init from `(init_params, own_init_result)`.
    #[must_use]
    pub fn with_resolvers_fn<F>(mut self, resolvers: F) -> Self
    where
        F: Fn(&Value, &Value) -> ResolverMap + Send + Sync + 'static,
    {
        self.resolvers = Deferred::pending(resolvers);
        self
    }

    #[must_use]
    pub fn with_dependency(mut self, dependency: impl Into<ModuleDependency>) -> Self {
        self.dependencies.push(dependency.into());
        self
    }

    #[must_use]
    pub fn with_dependencies<D: Into<ModuleDependency>>(
        mut self,
        dependencies: impl IntoIterator<Item = D>,
    ) -> Self {
        self.dependencies.extend(dependencies.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn with_provider(mut self, provider: Provider) -> Self {
        self.providers.push(provider);
        self
    }

    #[must_use]
    pub fn with_providers(mut self, providers: impl IntoIterator<Item = Provider>) -> Self {
        self.providers.extend(providers);
        self
    }

    #[must_use]
    pub fn with_on_init<F, Fut>(mut self, on_init: F) -> Self
    where
        F: Fn(Arc<Value>, Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, HookError>> + Send + 'static,
    {
        self.on_init = Some(Arc::new(move |params, config| on_init(params, config).boxed()));
        self
    }

    #[must_use]
    pub fn with_context_builder<F, Fut>(mut self, builder: F) -> Self
    where
        F: Fn(NetworkRequest, Arc<Implementations>, Arc<Context>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<ContextPatch, HookError>> + Send + 'static,
    {
        self.context_builder = Some(Arc::new(move |request, implementations, context| {
            builder(request, implementations, context).boxed()
        }));
        self
    }

    /// Uses `implementation` as is.
    #[must_use]
    pub fn with_implementation<T: Any + Send + Sync>(self, implementation: T) -> Self {
        self.with_shared_implementation(Arc::new(implementation))
    }

    #[must_use]
    pub fn with_shared_implementation<T: Any + Send + Sync>(
        mut self,
        implementation: Arc<T>,
    ) -> Self {
        self.implementation = Some(ModuleImplementation::Value(implementation));
        self
    }

    /// Builds the implementation during init. The factory sees the
    /// implementations of the modules ordered before this one.
    #[must_use]
    pub fn with_implementation_factory<F, Fut, T>(mut self, factory: F) -> Self
    where
        F: Fn(ImplementationParams) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, HookError>> + Send + 'static,
        T: Any + Send + Sync,
    {
        let factory = Arc::new(factory);
        self.implementation = Some(ModuleImplementation::Factory(Arc::new(move |params| {
            let factory = Arc::clone(&factory);
            async move {
                let implementation: Implementation = Arc::new(factory(params).await?);
                Ok(implementation)
            }
            .boxed()
        })));
        self
    }

    /// Attaches configuration. It is passed to `on_init`, to the
    /// implementation factory and bound in the container under
    /// `ProviderKey::module_config(name)`.
    #[must_use]
    pub fn with_config(mut self, config: impl Into<Value>) -> Self {
        self.config = config.into();
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn dependencies(&self) -> &[ModuleDependency] {
        &self.dependencies
    }

    pub fn dependency_names(&self) -> impl Iterator<Item = &str> {
        self.dependencies.iter().map(ModuleDependency::name)
    }

    /// Type definitions, `None` until a deferred value is resolved.
    #[must_use]
    pub fn type_defs(&self) -> Option<&TypeDefs> {
        self.type_defs.get()
    }

    /// Resolvers, `None` until a deferred value is resolved.
    #[must_use]
    pub fn resolvers(&self) -> Option<&ResolverMap> {
        self.resolvers.get()
    }

    #[must_use]
    pub fn providers(&self) -> &[Provider] {
        &self.providers
    }

    #[must_use]
    pub fn config(&self) -> &Value {
        &self.config
    }

    /// Deserializes the attached configuration.
    ///
    /// # Errors
    ///
    /// Returns the deserialization error if the configuration does not have
    /// the shape of `T`.
    pub fn config_as<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(&self.config)
    }

    #[must_use]
    pub fn on_init(&self) -> Option<&OnInitFn> {
        self.on_init.as_ref()
    }

    #[must_use]
    pub fn context_builder(&self) -> Option<&ContextBuilderFn> {
        self.context_builder.as_ref()
    }

    #[must_use]
    pub fn implementation(&self) -> Option<&ModuleImplementation> {
        self.implementation.as_ref()
    }

    /// Whether type definitions or resolvers still wait for init.
    #[must_use]
    pub fn is_deferred(&self) -> bool {
        self.type_defs.is_pending() || self.resolvers.is_pending()
    }

    pub(crate) fn resolve_deferred(&mut self, init_params: &Value, init_result: &Value) {
        self.type_defs = std::mem::take(&mut self.type_defs).resolve(init_params, init_result);
        self.resolvers = std::mem::take(&mut self.resolvers).resolve(init_params, init_result);
    }
}

impl fmt::Debug for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Module")
            .field("name", &self.name)
            .field("dependencies", &self.dependencies)
            .field("type_defs", &self.type_defs)
            .field("resolvers", &self.resolvers)
            .field("providers", &self.providers)
            .field("on_init", &self.on_init.is_some())
            .field("context_builder", &self.context_builder.is_some())
            .field("implementation", &self.implementation)
            .field("config", &self.config)
            .finish()
    }
}
