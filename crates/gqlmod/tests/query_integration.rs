//! End-to-end query tests: modules composed into one schema, executed with a
//! per-request context.

use std::collections::HashMap;
use std::sync::Arc;

use gqlmod::{
    CompositionEngine, ContextAccessor, ContextPatch, InitParams, Module, NetworkRequest,
    ResolveParams, Resolver, ResolverMap, ResolversComposition, SchemaConfig,
};
use serde_json::{Value, json};

/// User directory built once, reading the viewer from the current request.
struct UserDirectory {
    users: HashMap<String, (String, String)>,
    context: ContextAccessor,
}

impl UserDirectory {
    fn find(&self, id: &str) -> Option<Value> {
        self.users
            .get(id)
            .map(|(name, role)| json!({ "id": id, "name": name, "role": role }))
    }

    fn viewer(&self) -> Option<Value> {
        let context = self.context.current()?;
        let id = context.value("viewer")?.as_str()?.to_string();
        self.find(&id)
    }
}

fn directory(params: &ResolveParams) -> Result<Arc<UserDirectory>, async_graphql::Error> {
    params
        .context
        .shared::<UserDirectory>("users")
        .ok_or_else(|| async_graphql::Error::new("users module not loaded"))
}

fn users_module() -> Module {
    Module::new("users")
        .with_type_defs(
            r#"
            type Query {
                me: User
                user(id: ID!): User
            }

            type User {
                id: ID!
                name: String!
                role: Role!
            }

            enum Role { ADMIN MEMBER }
            "#,
        )
        .with_resolvers(
            ResolverMap::new()
                .field(
                    "Query",
                    "me",
                    Resolver::from_fn(|params| {
                        Ok(directory(&params)?.viewer().unwrap_or(Value::Null))
                    }),
                )
                .field(
                    "Query",
                    "user",
                    Resolver::from_fn(|params| {
                        let id: String = params.arg_as("id")?;
                        Ok(directory(&params)?.find(&id).unwrap_or(Value::Null))
                    }),
                ),
        )
        .with_config(json!({ "users": { "1": ["Ada", "ADMIN"], "2": ["Grace", "MEMBER"] } }))
        .with_implementation_factory(|params| async move {
            let users: HashMap<String, (String, String)> = params
                .config_as::<HashMap<String, HashMap<String, (String, String)>>>()
                .map_err(anyhow::Error::from)?
                .remove("users")
                .unwrap_or_default();
            Ok(UserDirectory {
                users,
                context: params.context,
            })
        })
        .with_context_builder(|request: NetworkRequest, _, _| async move {
            let viewer = request.downcast_ref::<&'static str>().copied();
            Ok(ContextPatch::new().value("viewer", viewer))
        })
}

fn posts_module() -> Module {
    Module::new("posts")
        .with_dependency("users")
        .with_type_defs(
            r#"
            type Post { title: String! }
            extend type User { posts: [Post!]! }
            "#,
        )
        .with_on_init(|_, _| async {
            Ok(json!({ "1": ["Notes on the Analytical Engine"], "2": [] }))
        })
        .with_resolvers_fn(|_, init_result| {
            let posts = init_result.clone();
            ResolverMap::new().field(
                "User",
                "posts",
                Resolver::from_fn(move |params| {
                    let id = params.parent["id"].as_str().unwrap_or_default();
                    let titles = posts[id].as_array().cloned().unwrap_or_default();
                    Ok(titles.into_iter().map(|title| json!({ "title": title })).collect())
                }),
            )
        })
}

fn require_viewer(inner: Resolver) -> Resolver {
    Resolver::new(move |params| {
        let inner = inner.clone();
        async move {
            if params.context.value("viewer").is_none_or(Value::is_null) {
                return Err(async_graphql::Error::new("Not authenticated"));
            }
            inner.call(params).await
        }
    })
}

async fn engine() -> CompositionEngine {
    let mut engine = CompositionEngine::builder()
        .modules([posts_module(), users_module()])
        .resolvers_composition(ResolversComposition::new().compose("Query.me", require_viewer))
        .build()
        .unwrap();
    engine.init(InitParams::None).await.unwrap();
    engine
}

#[tokio::test]
async fn test_query_spans_modules() {
    let engine = engine().await;

    let response = engine
        .execute("{ me { name role posts { title } } }", NetworkRequest::new("1"))
        .await
        .unwrap();

    assert!(response.errors.is_empty(), "{:?}", response.errors);
    assert_eq!(
        response.data.into_json().unwrap(),
        json!({ "me": {
            "name": "Ada",
            "role": "ADMIN",
            "posts": [{ "title": "Notes on the Analytical Engine" }]
        } })
    );
}

#[tokio::test]
async fn test_arguments_reach_resolvers() {
    let engine = engine().await;

    let response = engine
        .execute(r#"{ user(id: "2") { name posts { title } } }"#, NetworkRequest::none())
        .await
        .unwrap();

    assert!(response.errors.is_empty(), "{:?}", response.errors);
    assert_eq!(
        response.data.into_json().unwrap(),
        json!({ "user": { "name": "Grace", "posts": [] } })
    );
}

#[tokio::test]
async fn test_composed_resolver_guards_field() {
    let engine = engine().await;

    let response = engine.execute("{ me { name } }", NetworkRequest::none()).await.unwrap();

    assert_eq!(response.errors.len(), 1);
    assert_eq!(response.errors[0].message, "Not authenticated");
}

#[tokio::test]
async fn test_requests_do_not_share_viewer() {
    let engine = engine().await;

    let (ada, grace) = tokio::join!(
        engine.execute("{ me { name } }", NetworkRequest::new("1")),
        engine.execute("{ me { name } }", NetworkRequest::new("2")),
    );

    assert_eq!(ada.unwrap().data.into_json().unwrap(), json!({ "me": { "name": "Ada" } }));
    assert_eq!(grace.unwrap().data.into_json().unwrap(), json!({ "me": { "name": "Grace" } }));
}

#[tokio::test]
async fn test_merged_schema_contains_every_module() {
    let engine = engine().await;

    let sdl = engine.type_defs().to_sdl();
    assert!(sdl.contains("posts: [Post!]!"));
    assert!(sdl.contains("role: Role!"));
    assert!(!sdl.contains("extend"));
    assert_eq!(engine.resolvers().paths(), vec!["User.posts", "Query.me", "Query.user"]);
}

#[tokio::test]
async fn test_schema_limits_come_from_config() {
    let mut engine = CompositionEngine::builder()
        .modules([users_module()])
        .schema_config(SchemaConfig {
            max_depth: 1,
            ..SchemaConfig::default()
        })
        .build()
        .unwrap();
    engine.init(InitParams::None).await.unwrap();

    let response = engine
        .execute(r#"{ user(id: "1") { name } }"#, NetworkRequest::none())
        .await
        .unwrap();
    assert!(!response.errors.is_empty());
}
