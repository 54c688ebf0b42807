//! Per-request context.
//!
//! A [`Context`] is assembled by the engine for every request. Its root
//! entries are the module implementations, followed by the init
//! contributions and whatever context builders returned. Implementations
//! always win a name clash; the losing keys are kept in
//! [`Context::collisions`].
//!
//! While a request is being served the context is bound to the running task
//! with [`Context::scope`]. Implementations read it back through a
//! [`ContextAccessor`], so two requests in flight never see each other's
//! context.

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use gqlmod_di::{Injector, Instance};
use indexmap::IndexMap;
use serde_json::Value;

tokio::task_local! {
    static CURRENT_CONTEXT: Arc<Context>;
}

/// One context value.
#[derive(Clone)]
pub enum ContextEntry {
    /// Plain data, e.g. an init contribution or the current user.
    Value(Value),
    /// A shared object, e.g. a module implementation.
    Shared(Instance),
}

impl ContextEntry {
    /// Wraps a shared object.
    pub fn shared<T: Any + Send + Sync>(value: Arc<T>) -> Self {
        Self::Shared(value)
    }

    #[must_use]
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Self::Value(value) => Some(value),
            Self::Shared(_) => None,
        }
    }

    /// Returns the shared object if it is a `T`.
    #[must_use]
    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        match self {
            Self::Shared(instance) => Arc::clone(instance).downcast::<T>().ok(),
            Self::Value(_) => None,
        }
    }
}

impl fmt::Debug for ContextEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Self::Shared(_) => f.write_str("Shared(..)"),
        }
    }
}

impl From<Value> for ContextEntry {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

/// Keys a context builder adds to the request context.
#[derive(Debug, Clone, Default)]
pub struct ContextPatch {
    entries: IndexMap<String, ContextEntry>,
}

impl ContextPatch {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a data entry.
    #[must_use]
    pub fn value(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.entries.insert(key.into(), ContextEntry::Value(value.into()));
        self
    }

    /// Adds a shared object.
    #[must_use]
    pub fn shared<T: Any + Send + Sync>(mut self, key: impl Into<String>, value: Arc<T>) -> Self {
        self.entries.insert(key.into(), ContextEntry::shared(value));
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, entry: ContextEntry) {
        self.entries.insert(key.into(), entry);
    }

    /// Builds a patch from a JSON value. Anything but an object is an empty
    /// patch.
    #[must_use]
    pub fn from_json(value: Value) -> Self {
        match value {
            Value::Object(map) => map.into(),
            _ => Self::default(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl From<serde_json::Map<String, Value>> for ContextPatch {
    fn from(map: serde_json::Map<String, Value>) -> Self {
        Self {
            entries: map
                .into_iter()
                .map(|(key, value)| (key, ContextEntry::Value(value)))
                .collect(),
        }
    }
}

impl IntoIterator for ContextPatch {
    type Item = (String, ContextEntry);
    type IntoIter = indexmap::map::IntoIter<String, ContextEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

/// The assembled request context.
#[derive(Clone)]
pub struct Context {
    entries: IndexMap<String, ContextEntry>,
    init_params: Arc<Value>,
    injector: Injector,
    collisions: Vec<String>,
}

impl Context {
    pub(crate) fn new(
        entries: IndexMap<String, ContextEntry>,
        init_params: Arc<Value>,
        injector: Injector,
        collisions: Vec<String>,
    ) -> Self {
        Self {
            entries,
            init_params,
            injector,
            collisions,
        }
    }

    /// Looks up a root entry.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&ContextEntry> {
        self.entries.get(key)
    }

    /// Looks up a data entry.
    #[must_use]
    pub fn value(&self, key: &str) -> Option<&Value> {
        self.entries.get(key).and_then(ContextEntry::as_value)
    }

    /// Looks up a shared entry of type `T`, e.g. a module implementation.
    #[must_use]
    pub fn shared<T: Any + Send + Sync>(&self, key: &str) -> Option<Arc<T>> {
        self.entries.get(key).and_then(ContextEntry::downcast::<T>)
    }

    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The resolved init params, an empty object if none were given.
    #[must_use]
    pub fn init_params(&self) -> &Value {
        &self.init_params
    }

    /// The engine's container.
    #[must_use]
    pub fn injector(&self) -> &Injector {
        &self.injector
    }

    /// Keys a context builder returned that clashed with an implementation
    /// and were dropped.
    #[must_use]
    pub fn collisions(&self) -> &[String] {
        &self.collisions
    }

    /// Runs `future` with this context bound as the current one.
    pub fn scope<F: Future>(self: Arc<Self>, future: F) -> impl Future<Output = F::Output> {
        CURRENT_CONTEXT.scope(self, future)
    }

    /// The context bound to the running task, if any.
    #[must_use]
    pub fn current() -> Option<Arc<Context>> {
        CURRENT_CONTEXT.try_with(Arc::clone).ok()
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("entries", &self.entries)
            .field("init_params", &self.init_params)
            .field("collisions", &self.collisions)
            .finish()
    }
}

/// Handle given to implementation factories for reading the context of the
/// request being served.
///
/// Implementations are built once but used by every request, so they must
/// not capture a context. They capture the accessor instead and call
/// [`ContextAccessor::current`] when they need one.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContextAccessor;

impl ContextAccessor {
    /// The context of the request running on this task, `None` outside of
    /// [`Context::scope`].
    #[must_use]
    pub fn current(&self) -> Option<Arc<Context>> {
        Context::current()
    }
}

/// The caller's raw request, passed unchanged to every context builder.
#[derive(Clone, Default)]
pub struct NetworkRequest(Option<Instance>);

impl NetworkRequest {
    pub fn new<T: Any + Send + Sync>(request: T) -> Self {
        Self(Some(Arc::new(request)))
    }

    /// No request, e.g. when building a context outside of a transport.
    #[must_use]
    pub fn none() -> Self {
        Self(None)
    }

    #[must_use]
    pub fn is_none(&self) -> bool {
        self.0.is_none()
    }

    #[must_use]
    pub fn downcast_ref<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.0.as_deref().and_then(|request| request.downcast_ref::<T>())
    }
}

impl fmt::Debug for NetworkRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(_) => f.write_str("NetworkRequest(..)"),
            None => f.write_str("NetworkRequest(None)"),
        }
    }
}
