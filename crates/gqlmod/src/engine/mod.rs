//! The composition engine.
//!
//! [`CompositionEngine`] owns the module set. [`CompositionEngine::init`]
//! runs once and moves the engine from `Constructed` to `Ready` (or
//! `Failed`); after that [`CompositionEngine::build_context`] and
//! [`CompositionEngine::execute`] serve any number of concurrent requests.

mod init;
mod request;

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use async_graphql::dynamic::Schema;
use gqlmod_di::{Injector, Provider};
use indexmap::{IndexMap, IndexSet};
use once_cell::sync::OnceCell;
use serde_json::Value;
use tracing::debug;

pub use init::InitParams;

use crate::bridge::SharedBridge;
use crate::config::{ComposeConfig, SchemaConfig};
use crate::error::ComposeError;
use crate::graph::DependencyGraph;
use crate::implementation::Implementations;
use crate::module::Module;
use crate::schema::{
    ExecutableSchemaBuilder, ResolverMap, ResolversComposition, SchemaDocument, TypeDefs,
};

/// Lifecycle of an engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// Built, `init` not called yet.
    Constructed,
    /// `init` is running.
    Initializing,
    /// `init` succeeded.
    Ready,
    /// `init` failed. The engine cannot be used.
    Failed,
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Constructed => "constructed",
            Self::Initializing => "initializing",
            Self::Ready => "ready",
            Self::Failed => "failed",
        })
    }
}

/// Schema and resolvers that do not belong to any module.
///
/// They are merged after every module, so their resolvers win clashes.
#[derive(Debug, Clone, Default)]
pub struct NonModules {
    pub type_defs: TypeDefs,
    pub resolvers: ResolverMap,
}

impl NonModules {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_type_defs(mut self, type_defs: impl Into<TypeDefs>) -> Self {
        self.type_defs = type_defs.into();
        self
    }

    #[must_use]
    pub fn with_resolvers(mut self, resolvers: ResolverMap) -> Self {
        self.resolvers = resolvers;
        self
    }
}

/// Builder for [`CompositionEngine`].
#[derive(Default)]
pub struct EngineBuilder {
    modules: Vec<Module>,
    non_modules: Option<NonModules>,
    bridge: Option<SharedBridge>,
    composition: Option<ResolversComposition>,
    providers: Vec<Provider>,
    schema_config: SchemaConfig,
}

impl EngineBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn module(mut self, module: Module) -> Self {
        self.modules.push(module);
        self
    }

    #[must_use]
    pub fn modules(mut self, modules: impl IntoIterator<Item = Module>) -> Self {
        self.modules.extend(modules);
        self
    }

    #[must_use]
    pub fn non_modules(mut self, non_modules: NonModules) -> Self {
        self.non_modules = Some(non_modules);
        self
    }

    /// Bridge handed to implementation factories and bound in the container
    /// under `ProviderKey::of::<SharedBridge>()`.
    #[must_use]
    pub fn communication_bridge(mut self, bridge: SharedBridge) -> Self {
        self.bridge = Some(bridge);
        self
    }

    #[must_use]
    pub fn resolvers_composition(mut self, composition: ResolversComposition) -> Self {
        self.composition = Some(composition);
        self
    }

    /// Global provider, bound before any module provider.
    #[must_use]
    pub fn provider(mut self, provider: Provider) -> Self {
        self.providers.push(provider);
        self
    }

    #[must_use]
    pub fn providers(mut self, providers: impl IntoIterator<Item = Provider>) -> Self {
        self.providers.extend(providers);
        self
    }

    #[must_use]
    pub fn schema_config(mut self, config: SchemaConfig) -> Self {
        self.schema_config = config;
        self
    }

    /// Takes the schema section of a loaded [`ComposeConfig`].
    #[must_use]
    pub fn config(self, config: &ComposeConfig) -> Self {
        self.schema_config(config.schema.clone())
    }

    /// Builds the engine.
    ///
    /// # Errors
    ///
    /// Returns [`ComposeError::DuplicateModule`] if two modules share a name.
    pub fn build(self) -> Result<CompositionEngine, ComposeError> {
        let mut names = IndexSet::new();
        for module in &self.modules {
            if !names.insert(module.name()) {
                return Err(ComposeError::DuplicateModule(module.name().to_string()));
            }
        }
        debug!(modules = ?names, "Composition engine constructed");

        Ok(CompositionEngine {
            modules: self.modules,
            non_modules: self.non_modules.unwrap_or_default(),
            bridge: self.bridge,
            composition: self.composition,
            providers: self.providers,
            schema_config: self.schema_config,
            injector: Injector::new(),
            state: EngineState::Constructed,
            init_params: Arc::new(Value::Null),
            init_result: IndexMap::new(),
            module_order: Vec::new(),
            type_defs: SchemaDocument::default(),
            resolvers: ResolverMap::new(),
            implementations: Arc::new(Implementations::new()),
            schema: OnceCell::new(),
        })
    }
}

/// Orders, initializes and merges modules into one schema, resolver map and
/// request context.
pub struct CompositionEngine {
    modules: Vec<Module>,
    non_modules: NonModules,
    bridge: Option<SharedBridge>,
    composition: Option<ResolversComposition>,
    providers: Vec<Provider>,
    schema_config: SchemaConfig,
    injector: Injector,
    state: EngineState,
    init_params: Arc<Value>,
    init_result: IndexMap<String, Value>,
    /// Dependency order computed, and its cycles logged, during `init`.
    module_order: Vec<String>,
    type_defs: SchemaDocument,
    resolvers: ResolverMap,
    implementations: Arc<Implementations>,
    schema: OnceCell<Schema>,
}

impl CompositionEngine {
    #[must_use]
    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    /// Engine over `modules` with no other options.
    ///
    /// # Errors
    ///
    /// See [`EngineBuilder::build`].
    pub fn new(modules: impl IntoIterator<Item = Module>) -> Result<Self, ComposeError> {
        EngineBuilder::new().modules(modules).build()
    }

    #[must_use]
    pub fn state(&self) -> EngineState {
        self.state
    }

    /// Module names in dependency order.
    ///
    /// Recomputed on every call, logging any cycle. Names of undeclared dependencies are
    /// included; [`CompositionEngine::module`] returns `None` for them.
    #[must_use]
    pub fn order(&self) -> Vec<String> {
        DependencyGraph::from_modules(&self.modules).order()
    }

    /// Modules in declaration order.
    #[must_use]
    pub fn modules(&self) -> &[Module] {
        &self.modules
    }

    #[must_use]
    pub fn module(&self, name: &str) -> Option<&Module> {
        self.modules.iter().find(|module| module.name() == name)
    }

    /// `on_init` contributions by module name.
    #[must_use]
    pub fn init_result(&self) -> &IndexMap<String, Value> {
        &self.init_result
    }

    /// Resolved init params, `Null` if none were given.
    #[must_use]
    pub fn init_params(&self) -> &Value {
        &self.init_params
    }

    /// The merged schema document.
    #[must_use]
    pub fn type_defs(&self) -> &SchemaDocument {
        &self.type_defs
    }

    /// The merged and composed resolver map.
    #[must_use]
    pub fn resolvers(&self) -> &ResolverMap {
        &self.resolvers
    }

    #[must_use]
    pub fn implementations(&self) -> &Arc<Implementations> {
        &self.implementations
    }

    /// Implementation of `module` if it is a `T`.
    #[must_use]
    pub fn implementation<T: Any + Send + Sync>(&self, module: &str) -> Option<Arc<T>> {
        self.implementations.get(module)
    }

    #[must_use]
    pub fn injector(&self) -> &Injector {
        &self.injector
    }

    /// The executable schema, built on first access.
    ///
    /// # Errors
    ///
    /// [`ComposeError::InvalidState`] before a successful init,
    /// [`ComposeError::Schema`] if the schema cannot be built.
    pub fn schema(&self) -> Result<&Schema, ComposeError> {
        self.expect_state(EngineState::Ready)?;
        self.schema.get_or_try_init(|| {
            ExecutableSchemaBuilder::new(&self.type_defs, &self.resolvers, &self.schema_config)
                .build()
                .map_err(ComposeError::from)
        })
    }

    fn expect_state(&self, expected: EngineState) -> Result<(), ComposeError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(ComposeError::InvalidState {
                expected,
                actual: self.state,
            })
        }
    }
}

impl fmt::Debug for CompositionEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositionEngine")
            .field("state", &self.state)
            .field("modules", &self.modules.iter().map(Module::name).collect::<Vec<_>>())
            .field("providers", &self.providers.len())
            .field("bridge", &self.bridge.is_some())
            .field("composition", &self.composition)
            .finish()
    }
}
