//! Executable schema.
//!
//! Turns the merged [`SchemaDocument`] and [`ResolverMap`] into an
//! `async_graphql::dynamic::Schema`. Resolvers work on JSON; values are
//! converted at the field boundary. Fields without a resolver read the key
//! of the same name from their parent object. Interface and union values
//! pick their concrete type from a `__typename` key.
//!
//! Resolvers find the request [`Context`] as `Arc<Context>` request data.

use std::sync::Arc;

use async_graphql::dynamic::{
    Enum, EnumItem, Field, FieldFuture, FieldValue, InputObject, InputValue, Interface,
    InterfaceField, Object, ResolverContext, Scalar, Schema, SchemaBuilder, TypeRef, Union,
};
use async_graphql::{Error as GraphQLError, Name, Value};
use async_graphql_parser::Positioned;
use async_graphql_parser::types::{
    BaseType, ConstDirective, FieldDefinition, InputValueDefinition, Type, TypeDefinition, TypeKind,
};
use tracing::{debug, info, warn};

use super::resolvers::{FieldInfo, ResolveParams, ResolverMap};
use super::type_defs::SchemaDocument;
use crate::config::SchemaConfig;
use crate::context::Context;
use crate::error::SchemaError;

const BUILT_IN_SCALARS: [&str; 5] = ["String", "Int", "Float", "Boolean", "ID"];

/// How a field's value has to be shaped for the executor.
#[derive(Debug, Clone)]
enum OutputShape {
    List(Box<OutputShape>),
    Enum,
    Abstract,
    Plain,
}

/// Builds the executable schema.
pub struct ExecutableSchemaBuilder<'a> {
    document: &'a SchemaDocument,
    resolvers: &'a ResolverMap,
    config: &'a SchemaConfig,
}

impl<'a> ExecutableSchemaBuilder<'a> {
    #[must_use]
    pub fn new(
        document: &'a SchemaDocument,
        resolvers: &'a ResolverMap,
        config: &'a SchemaConfig,
    ) -> Self {
        Self {
            document,
            resolvers,
            config,
        }
    }

    /// Builds the schema.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::Build`] if the query root type is missing or
    /// the executor rejects the schema.
    pub fn build(&self) -> Result<Schema, SchemaError> {
        let roots = self.document.roots();
        let query = roots.query.clone().unwrap_or_else(|| self.config.query_type.clone());
        let mutation = roots
            .mutation
            .clone()
            .or_else(|| Some(self.config.mutation_type.clone()))
            .filter(|name| self.document.contains(name));
        let subscription = roots
            .subscription
            .clone()
            .or_else(|| self.config.subscription_type.clone());

        if !self.document.contains(&query) {
            return Err(SchemaError::Build(format!("query root type \"{query}\" is not defined")));
        }
        if let Some(subscription) = &subscription {
            warn!(
                subscription = %subscription,
                "Subscriptions are not executable, skipping root type"
            );
        }

        info!(
            query = %query,
            mutation = ?mutation,
            types = self.document.types().count(),
            resolvers = self.resolvers.len(),
            "Building executable schema"
        );

        let mut builder = Schema::build(&query, mutation.as_deref(), None);
        for definition in self.document.types() {
            let name = definition.name.node.as_str();
            if subscription.as_deref() == Some(name) {
                continue;
            }
            builder = self.register(builder, definition);
        }

        builder = builder
            .limit_depth(self.config.max_depth)
            .limit_complexity(self.config.max_complexity);
        if !self.config.introspection {
            builder = builder.disable_introspection();
        }

        builder.finish().map_err(|err| SchemaError::Build(err.to_string()))
    }

    fn register(&self, builder: SchemaBuilder, definition: &TypeDefinition) -> SchemaBuilder {
        let name = definition.name.node.as_str();
        let description = definition.description.as_ref().map(|d| d.node.clone());

        match &definition.kind {
            TypeKind::Scalar => {
                if BUILT_IN_SCALARS.contains(&name) {
                    return builder;
                }
                let mut scalar = Scalar::new(name);
                if let Some(description) = description {
                    scalar = scalar.description(description);
                }
                builder.register(scalar)
            }
            TypeKind::Object(object_type) => {
                let mut object = Object::new(name);
                if let Some(description) = description {
                    object = object.description(description);
                }
                for interface in &object_type.implements {
                    object = object.implement(interface.node.as_str());
                }
                for field in &object_type.fields {
                    object = object.field(self.output_field(name, &field.node));
                }
                builder.register(object)
            }
            TypeKind::Interface(interface_type) => {
                if !interface_type.implements.is_empty() {
                    debug!(interface = %name, "Interfaces implementing interfaces are flattened");
                }
                let mut interface = Interface::new(name);
                if let Some(description) = description {
                    interface = interface.description(description);
                }
                for field in &interface_type.fields {
                    let field = &field.node;
                    let mut interface_field =
                        InterfaceField::new(field.name.node.as_str(), type_ref(&field.ty.node));
                    for argument in &field.arguments {
                        interface_field = interface_field.argument(input_value(&argument.node));
                    }
                    if let Some(description) = &field.description {
                        interface_field = interface_field.description(description.node.clone());
                    }
                    interface = interface.field(interface_field);
                }
                builder.register(interface)
            }
            TypeKind::Union(union_type) => {
                let mut union = Union::new(name);
                if let Some(description) = description {
                    union = union.description(description);
                }
                for member in &union_type.members {
                    union = union.possible_type(member.node.as_str());
                }
                builder.register(union)
            }
            TypeKind::Enum(enum_type) => {
                let mut enumeration = Enum::new(name);
                if let Some(description) = description {
                    enumeration = enumeration.description(description);
                }
                for value in &enum_type.values {
                    let value = &value.node;
                    let mut item = EnumItem::new(value.value.node.as_str());
                    if let Some(description) = &value.description {
                        item = item.description(description.node.clone());
                    }
                    if let Some(reason) = deprecation(&value.directives) {
                        item = item.deprecation(reason.as_deref());
                    }
                    enumeration = enumeration.item(item);
                }
                builder.register(enumeration)
            }
            TypeKind::InputObject(input_type) => {
                let mut input = InputObject::new(name);
                if let Some(description) = description {
                    input = input.description(description);
                }
                for field in &input_type.fields {
                    input = input.field(input_value(&field.node));
                }
                builder.register(input)
            }
        }
    }

    fn output_field(&self, parent_type: &str, definition: &FieldDefinition) -> Field {
        let field_name = definition.name.node.to_string();
        let shape = self.shape(&definition.ty.node);
        let resolver = self.resolvers.get(parent_type, &field_name).cloned();
        let info = FieldInfo {
            parent_type: parent_type.to_string(),
            field: field_name.clone(),
        };

        let mut field = Field::new(field_name, type_ref(&definition.ty.node), move |ctx| {
            let shape = shape.clone();
            let resolver = resolver.clone();
            let info = info.clone();
            FieldFuture::new(async move {
                let Some(resolver) = resolver else {
                    return Ok(parent_field(&ctx, &info.field)
                        .map(|value| into_field_value(value, &shape)));
                };
                let params = resolve_params(&ctx, info)?;
                let value = resolver.call(params).await?;
                Ok(Some(into_field_value(json_to_graphql_value(value), &shape)))
            })
        });

        for argument in &definition.arguments {
            field = field.argument(input_value(&argument.node));
        }
        if let Some(description) = &definition.description {
            field = field.description(description.node.clone());
        }
        if let Some(reason) = deprecation(&definition.directives) {
            field = field.deprecation(reason.as_deref());
        }
        field
    }

    fn shape(&self, ty: &Type) -> OutputShape {
        match &ty.base {
            BaseType::List(inner) => OutputShape::List(Box::new(self.shape(inner))),
            BaseType::Named(name) => match self.document.get(name.as_str()).map(|d| &d.kind) {
                Some(TypeKind::Enum(_)) => OutputShape::Enum,
                Some(TypeKind::Interface(_) | TypeKind::Union(_)) => OutputShape::Abstract,
                _ => OutputShape::Plain,
            },
        }
    }
}

/// Collects what a resolver needs from the executor's context.
fn resolve_params(
    ctx: &ResolverContext<'_>,
    info: FieldInfo,
) -> Result<ResolveParams, GraphQLError> {
    let context = ctx
        .data::<Arc<Context>>()
        .map_err(|_| GraphQLError::new("Request context not available"))?;

    let parent = match ctx.parent_value.as_value() {
        Some(value) => value.clone().into_json()?,
        None => serde_json::Value::Null,
    };
    let mut args = serde_json::Map::new();
    for (name, value) in ctx.args.as_index_map() {
        args.insert(name.to_string(), value.clone().into_json()?);
    }

    Ok(ResolveParams {
        parent,
        args,
        context: Arc::clone(context),
        info,
    })
}

/// Reads `field` from the parent object.
fn parent_field(ctx: &ResolverContext<'_>, field: &str) -> Option<Value> {
    if let Some(Value::Object(object)) = ctx.parent_value.as_value()
        && let Some(value) = object.get(&Name::new(field))
    {
        return Some(value.clone());
    }
    None
}

fn into_field_value<'a>(value: Value, shape: &OutputShape) -> FieldValue<'a> {
    match (shape, value) {
        (_, Value::Null) => FieldValue::NULL,
        (OutputShape::List(inner), Value::List(items)) => {
            FieldValue::list(items.into_iter().map(|item| into_field_value(item, inner)))
        }
        (OutputShape::Enum, Value::String(name)) => FieldValue::value(Value::Enum(Name::new(name))),
        (OutputShape::Abstract, Value::Object(object)) => {
            let type_name = match object.get(&Name::new("__typename")) {
                Some(Value::String(name)) => Some(name.clone()),
                _ => None,
            };
            let value = FieldValue::value(Value::Object(object));
            match type_name {
                Some(type_name) => value.with_type(type_name),
                None => value,
            }
        }
        (_, value) => FieldValue::value(value),
    }
}

fn type_ref(ty: &Type) -> TypeRef {
    let base = match &ty.base {
        BaseType::Named(name) => TypeRef::named(name.as_str()),
        BaseType::List(inner) => TypeRef::List(Box::new(type_ref(inner))),
    };
    if ty.nullable {
        base
    } else {
        TypeRef::NonNull(Box::new(base))
    }
}

fn input_value(definition: &InputValueDefinition) -> InputValue {
    let mut value = InputValue::new(definition.name.node.as_str(), type_ref(&definition.ty.node));
    if let Some(default) = &definition.default_value {
        value = value.default_value(default.node.clone());
    }
    if let Some(description) = &definition.description {
        value = value.description(description.node.clone());
    }
    value
}

/// `Some(reason)` if the element carries `@deprecated`.
fn deprecation(directives: &[Positioned<ConstDirective>]) -> Option<Option<String>> {
    directives
        .iter()
        .find(|directive| directive.node.name.node.as_str() == "deprecated")
        .map(|directive| match directive.node.get_argument("reason").map(|value| &value.node) {
            Some(async_graphql_value::ConstValue::String(reason)) => Some(reason.clone()),
            _ => None,
        })
}

/// Convert a serde_json::Value to async_graphql::Value.
pub(crate) fn json_to_graphql_value(json: serde_json::Value) -> Value {
    match json {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Boolean(b),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Number(i.into())
            } else if let Some(u) = n.as_u64() {
                Value::Number(u.into())
            } else if let Some(f) = n.as_f64() {
                async_graphql::Number::from_f64(f).map_or(Value::Null, Value::Number)
            } else {
                Value::Null
            }
        }
        serde_json::Value::String(s) => Value::String(s),
        serde_json::Value::Array(arr) => {
            Value::List(arr.into_iter().map(json_to_graphql_value).collect())
        }
        serde_json::Value::Object(obj) => Value::Object(
            obj.into_iter()
                .map(|(k, v)| (Name::new(k), json_to_graphql_value(v)))
                .collect(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::resolvers::Resolver;
    use async_graphql::Request;
    use gqlmod_di::Injector;
    use indexmap::IndexMap;
    use serde_json::json;

    fn context() -> Arc<Context> {
        Arc::new(Context::new(
            IndexMap::new(),
            Arc::new(json!({})),
            Injector::new(),
            Vec::new(),
        ))
    }

    const SDL: &str = r#"
        type Query {
            user(id: ID!): User
            users(role: Role = ADMIN): [User!]!
            search: [SearchResult]
            legacy: String @deprecated(reason: "gone")
        }
        enum Role { ADMIN MEMBER }
        type User { id: ID! name: String role: Role }
        type Team { title: String }
        union SearchResult = User | Team
    "#;

    fn resolvers() -> ResolverMap {
        ResolverMap::new()
            .field(
                "Query",
                "user",
                Resolver::from_fn(|params| {
                    Ok(json!({ "id": params.arg("id"), "name": "Ada", "role": "MEMBER" }))
                }),
            )
            .field(
                "Query",
                "users",
                Resolver::from_fn(|params| Ok(json!([{ "id": "1", "role": params.arg("role") }]))),
            )
            .field(
                "Query",
                "search",
                Resolver::constant(json!([
                    { "__typename": "User", "id": "1", "name": "Ada" },
                    { "__typename": "Team", "title": "Core" }
                ])),
            )
            .field(
                "User",
                "name",
                Resolver::from_fn(|params| {
                    Ok(json!(params.parent["name"].as_str().map(str::to_uppercase)))
                }),
            )
    }

    fn schema() -> Schema {
        let document = SchemaDocument::merge([SDL]).unwrap();
        let resolvers = resolvers();
        let config = SchemaConfig::default();
        ExecutableSchemaBuilder::new(&document, &resolvers, &config)
            .build()
            .unwrap()
    }

    async fn run(schema: &Schema, query: &str) -> serde_json::Value {
        let response = schema.execute(Request::new(query).data(context())).await;
        assert!(response.errors.is_empty(), "errors: {:?}", response.errors);
        response.data.into_json().unwrap()
    }

    #[tokio::test]
    async fn test_resolvers_and_default_field_resolution() {
        let schema = schema();
        let data = run(&schema, r#"{ user(id: "7") { id name role } }"#).await;
        assert_eq!(data, json!({ "user": { "id": "7", "name": "ADA", "role": "MEMBER" } }));
    }

    #[tokio::test]
    async fn test_enum_argument_default() {
        let schema = schema();
        let data = run(&schema, "{ users { id role } }").await;
        assert_eq!(data, json!({ "users": [{ "id": "1", "role": "ADMIN" }] }));
    }

    #[tokio::test]
    async fn test_union_resolves_through_typename() {
        let schema = schema();
        let data = run(
            &schema,
            "{ search { __typename ... on User { id } ... on Team { title } } }",
        )
        .await;
        assert_eq!(
            data,
            json!({ "search": [
                { "__typename": "User", "id": "1" },
                { "__typename": "Team", "title": "Core" }
            ] })
        );
    }

    #[tokio::test]
    async fn test_missing_context_is_an_error() {
        let schema = schema();
        let response = schema.execute(Request::new("{ search { __typename } }")).await;
        assert_eq!(response.errors.len(), 1);
        assert!(response.errors[0].message.contains("Request context not available"));
    }

    #[test]
    fn test_missing_query_root() {
        let document = SchemaDocument::merge(["type User { id: ID }"]).unwrap();
        let resolvers = ResolverMap::new();
        let config = SchemaConfig::default();
        let err = ExecutableSchemaBuilder::new(&document, &resolvers, &config)
            .build()
            .err()
            .unwrap();
        assert!(matches!(err, SchemaError::Build(ref message) if message.contains("Query")));
    }

    #[test]
    fn test_json_to_graphql_value() {
        let value = json_to_graphql_value(json!({ "a": [1, 2.5, "x", null, true] }));
        assert_eq!(value.into_json().unwrap(), json!({ "a": [1, 2.5, "x", null, true] }));
    }
}
