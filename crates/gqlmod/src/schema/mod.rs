//! Schema merging and execution.
//!
//! - [`TypeDefs`] / [`SchemaDocument`]: SDL fragments and their merge
//! - [`ResolverMap`]: per-field resolvers, merged last-write-wins
//! - [`ResolversComposition`]: wrappers applied once to the merged map
//! - [`ExecutableSchemaBuilder`]: the `async-graphql` dynamic schema

mod composition;
mod executable;
mod resolvers;
mod type_defs;

pub use composition::{Composer, ResolversComposition};
pub use executable::ExecutableSchemaBuilder;
pub use resolvers::{FieldInfo, ResolveParams, Resolver, ResolverMap, ResolverResult};
pub use type_defs::{RootTypes, SchemaDocument, TypeDefs};
