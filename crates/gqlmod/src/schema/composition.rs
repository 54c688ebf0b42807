//! Resolver composition.
//!
//! A composition maps resolver paths to wrappers (authorization checks,
//! logging, caching) that are applied once to the merged resolver map.
//!
//! Paths:
//! - `Type.field` wraps one field
//! - `Type.*` or `Type` wraps every resolved field of the type
//!
//! Composers listed first end up outermost: for `[a, b]` the field runs as
//! `a(b(resolver))`.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use tracing::{debug, warn};

use super::resolvers::{Resolver, ResolverMap};

/// Wraps a resolver into another resolver.
pub type Composer = Arc<dyn Fn(Resolver) -> Resolver + Send + Sync>;

/// Resolver paths mapped to the composers applied to them.
#[derive(Clone, Default)]
pub struct ResolversComposition {
    entries: IndexMap<String, Vec<Composer>>,
}

impl ResolversComposition {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a composer for `path`.
    #[must_use]
    pub fn compose<F>(mut self, path: impl Into<String>, composer: F) -> Self
    where
        F: Fn(Resolver) -> Resolver + Send + Sync + 'static,
    {
        self.entries
            .entry(path.into())
            .or_default()
            .push(Arc::new(composer));
        self
    }

    /// Appends several composers for `path`, in order.
    #[must_use]
    pub fn compose_all(
        mut self,
        path: impl Into<String>,
        composers: impl IntoIterator<Item = Composer>,
    ) -> Self {
        self.entries.entry(path.into()).or_default().extend(composers);
        self
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Wraps the matching resolvers of `resolvers`.
    ///
    /// Paths matching no resolver are logged and skipped.
    pub fn apply(&self, mut resolvers: ResolverMap) -> ResolverMap {
        for (path, composers) in &self.entries {
            let (type_name, field) = match path.split_once('.') {
                Some((type_name, field)) => (type_name, Some(field).filter(|field| *field != "*")),
                None => (path.as_str(), None),
            };

            let fields = match field {
                Some(field) => vec![field.to_string()],
                None => resolvers.fields(type_name),
            };

            let mut matched = false;
            for field in &fields {
                if let Some(resolver) = resolvers.get_mut(type_name, field) {
                    *resolver = composers
                        .iter()
                        .rev()
                        .fold(resolver.clone(), |inner, composer| composer(inner));
                    matched = true;
                }
            }

            if matched {
                debug!(path = %path, composers = composers.len(), "Composed resolvers");
            } else {
                warn!(path = %path, "Resolvers composition path matches no resolver");
            }
        }
        resolvers
    }
}

impl fmt::Debug for ResolversComposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.entries.iter().map(|(path, composers)| (path, composers.len())))
            .finish()
    }
}
