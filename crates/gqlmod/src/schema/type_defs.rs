//! Type definition fragments and their merge.
//!
//! Every fragment is parsed on its own. Definitions sharing a name are folded
//! into one: fields, enum values, union members and implemented interfaces
//! are unioned, and a later field replaces an earlier one with the same name.
//! `extend` definitions fold into their base the same way, whatever the
//! order. Directive definitions are not carried over.

use std::fmt::{self, Write as _};

use async_graphql_parser::Positioned;
use async_graphql_parser::types::{
    ConstDirective, InputValueDefinition, TypeDefinition, TypeKind, TypeSystemDefinition,
};
use indexmap::IndexMap;
use tracing::debug;

use crate::error::SchemaError;

/// Schema source as one or more SDL fragments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TypeDefs(Vec<String>);

impl TypeDefs {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a fragment.
    pub fn push(&mut self, fragment: impl Into<String>) {
        self.0.push(fragment.into());
    }

    pub fn fragments(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Returns true if there is no non-blank fragment.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.iter().all(|fragment| fragment.trim().is_empty())
    }
}

impl From<&str> for TypeDefs {
    fn from(fragment: &str) -> Self {
        Self(vec![fragment.to_string()])
    }
}

impl From<String> for TypeDefs {
    fn from(fragment: String) -> Self {
        Self(vec![fragment])
    }
}

impl From<Vec<String>> for TypeDefs {
    fn from(fragments: Vec<String>) -> Self {
        Self(fragments)
    }
}

impl From<Vec<&str>> for TypeDefs {
    fn from(fragments: Vec<&str>) -> Self {
        Self(fragments.into_iter().map(str::to_string).collect())
    }
}

impl<const N: usize> From<[&str; N]> for TypeDefs {
    fn from(fragments: [&str; N]) -> Self {
        Self(fragments.into_iter().map(str::to_string).collect())
    }
}

/// Root operation type names declared by a `schema { ... }` block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RootTypes {
    pub query: Option<String>,
    pub mutation: Option<String>,
    pub subscription: Option<String>,
}

impl RootTypes {
    fn is_empty(&self) -> bool {
        self.query.is_none() && self.mutation.is_none() && self.subscription.is_none()
    }
}

/// The merged schema document.
#[derive(Debug, Clone, Default)]
pub struct SchemaDocument {
    roots: RootTypes,
    types: IndexMap<String, TypeDefinition>,
}

impl SchemaDocument {
    /// Merges fragments in order.
    ///
    /// # Errors
    ///
    /// [`SchemaError::Parse`] if a fragment is not valid SDL,
    /// [`SchemaError::Conflict`] if a name is used by two kinds of type.
    pub fn merge<'a>(fragments: impl IntoIterator<Item = &'a str>) -> Result<Self, SchemaError> {
        let mut document = Self::default();
        for (index, fragment) in fragments.into_iter().enumerate() {
            if fragment.trim().is_empty() {
                continue;
            }
            let parsed = async_graphql_parser::parse_schema(fragment)
                .map_err(|err| SchemaError::Parse(format!("fragment #{index}: {err}")))?;
            for definition in parsed.definitions {
                document.add(definition)?;
            }
        }
        Ok(document)
    }

    fn add(&mut self, definition: TypeSystemDefinition) -> Result<(), SchemaError> {
        match definition {
            TypeSystemDefinition::Schema(schema) => {
                let schema = schema.node;
                if let Some(query) = schema.query {
                    self.roots.query = Some(query.node.to_string());
                }
                if let Some(mutation) = schema.mutation {
                    self.roots.mutation = Some(mutation.node.to_string());
                }
                if let Some(subscription) = schema.subscription {
                    self.roots.subscription = Some(subscription.node.to_string());
                }
            }
            TypeSystemDefinition::Directive(directive) => {
                debug!(directive = %directive.node.name.node, "Dropping directive definition");
            }
            TypeSystemDefinition::Type(definition) => {
                let mut definition = definition.node;
                definition.extend = false;
                let name = definition.name.node.to_string();
                match self.types.get_mut(&name) {
                    Some(existing) => merge_definition(existing, definition)?,
                    None => {
                        self.types.insert(name, definition);
                    }
                }
            }
        }
        Ok(())
    }

    /// Root names from the `schema { ... }` block, if there was one.
    #[must_use]
    pub fn roots(&self) -> &RootTypes {
        &self.roots
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&TypeDefinition> {
        self.types.get(name)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    /// Type definitions in first-seen order.
    pub fn types(&self) -> impl Iterator<Item = &TypeDefinition> {
        self.types.values()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty() && self.roots.is_empty()
    }

    /// Prints the document as SDL.
    #[must_use]
    pub fn to_sdl(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for SchemaDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::new();
        if !self.roots.is_empty() {
            out.push_str("schema {\n");
            for (operation, name) in [
                ("query", &self.roots.query),
                ("mutation", &self.roots.mutation),
                ("subscription", &self.roots.subscription),
            ] {
                if let Some(name) = name {
                    let _ = writeln!(out, "  {operation}: {name}");
                }
            }
            out.push_str("}\n");
        }
        for definition in self.types.values() {
            if !out.is_empty() {
                out.push('\n');
            }
            write_type(&mut out, definition);
        }
        f.write_str(&out)
    }
}

fn kind_name(kind: &TypeKind) -> &'static str {
    match kind {
        TypeKind::Scalar => "scalar",
        TypeKind::Object(_) => "type",
        TypeKind::Interface(_) => "interface",
        TypeKind::Union(_) => "union",
        TypeKind::Enum(_) => "enum",
        TypeKind::InputObject(_) => "input",
    }
}

fn merge_definition(
    existing: &mut TypeDefinition,
    incoming: TypeDefinition,
) -> Result<(), SchemaError> {
    let (first, second) = (kind_name(&existing.kind), kind_name(&incoming.kind));
    if first != second {
        return Err(SchemaError::Conflict {
            name: existing.name.node.to_string(),
            first,
            second,
        });
    }

    match (&mut existing.kind, incoming.kind) {
        (TypeKind::Scalar, TypeKind::Scalar) => {}
        (TypeKind::Object(base), TypeKind::Object(extra)) => {
            union_by_name(&mut base.implements, extra.implements, |name| name.node.to_string());
            union_by_name(&mut base.fields, extra.fields, |field| field.node.name.node.to_string());
        }
        (TypeKind::Interface(base), TypeKind::Interface(extra)) => {
            union_by_name(&mut base.implements, extra.implements, |name| name.node.to_string());
            union_by_name(&mut base.fields, extra.fields, |field| field.node.name.node.to_string());
        }
        (TypeKind::Union(base), TypeKind::Union(extra)) => {
            union_by_name(&mut base.members, extra.members, |name| name.node.to_string());
        }
        (TypeKind::Enum(base), TypeKind::Enum(extra)) => {
            union_by_name(&mut base.values, extra.values, |value| {
                value.node.value.node.to_string()
            });
        }
        (TypeKind::InputObject(base), TypeKind::InputObject(extra)) => {
            union_by_name(&mut base.fields, extra.fields, |field| field.node.name.node.to_string());
        }
        _ => {}
    }

    if incoming.description.is_some() {
        existing.description = incoming.description;
    }
    union_by_name(&mut existing.directives, incoming.directives, |directive| {
        directive.node.name.node.to_string()
    });
    Ok(())
}

/// Appends `extra` to `base`, replacing items whose name is already present.
fn union_by_name<T>(base: &mut Vec<T>, extra: Vec<T>, name: impl Fn(&T) -> String) {
    for item in extra {
        let key = name(&item);
        match base.iter().position(|existing| name(existing) == key) {
            Some(index) => base[index] = item,
            None => base.push(item),
        }
    }
}

fn write_type(out: &mut String, definition: &TypeDefinition) {
    write_description(out, definition.description.as_ref().map(|d| d.node.as_str()), "");
    let name = &definition.name.node;
    match &definition.kind {
        TypeKind::Scalar => {
            let _ = write!(out, "scalar {name}");
            write_directives(out, &definition.directives);
            out.push('\n');
        }
        TypeKind::Object(object) => {
            let _ = write!(out, "type {name}");
            write_implements(out, object.implements.iter().map(|i| i.node.as_str()));
            write_directives(out, &definition.directives);
            write_fields(out, &object.fields);
        }
        TypeKind::Interface(interface) => {
            let _ = write!(out, "interface {name}");
            write_implements(out, interface.implements.iter().map(|i| i.node.as_str()));
            write_directives(out, &definition.directives);
            write_fields(out, &interface.fields);
        }
        TypeKind::Union(union) => {
            let _ = write!(out, "union {name}");
            write_directives(out, &definition.directives);
            let members: Vec<&str> = union.members.iter().map(|m| m.node.as_str()).collect();
            if !members.is_empty() {
                let _ = write!(out, " = {}", members.join(" | "));
            }
            out.push('\n');
        }
        TypeKind::Enum(enum_type) => {
            let _ = write!(out, "enum {name}");
            write_directives(out, &definition.directives);
            out.push_str(" {\n");
            for value in &enum_type.values {
                let value = &value.node;
                write_description(out, value.description.as_ref().map(|d| d.node.as_str()), "  ");
                let _ = write!(out, "  {}", value.value.node);
                write_directives(out, &value.directives);
                out.push('\n');
            }
            out.push_str("}\n");
        }
        TypeKind::InputObject(input) => {
            let _ = write!(out, "input {name}");
            write_directives(out, &definition.directives);
            out.push_str(" {\n");
            for field in &input.fields {
                let description = field.node.description.as_ref().map(|d| d.node.as_str());
                write_description(out, description, "  ");
                out.push_str("  ");
                write_input_value(out, &field.node);
                out.push('\n');
            }
            out.push_str("}\n");
        }
    }
}

fn write_fields(
    out: &mut String,
    fields: &[Positioned<async_graphql_parser::types::FieldDefinition>],
) {
    out.push_str(" {\n");
    for field in fields {
        let field = &field.node;
        write_description(out, field.description.as_ref().map(|d| d.node.as_str()), "  ");
        let _ = write!(out, "  {}", field.name.node);
        if !field.arguments.is_empty() {
            out.push('(');
            for (index, argument) in field.arguments.iter().enumerate() {
                if index > 0 {
                    out.push_str(", ");
                }
                write_input_value(out, &argument.node);
            }
            out.push(')');
        }
        let _ = write!(out, ": {}", field.ty.node);
        write_directives(out, &field.directives);
        out.push('\n');
    }
    out.push_str("}\n");
}

fn write_implements<'a>(out: &mut String, interfaces: impl Iterator<Item = &'a str>) {
    let interfaces: Vec<&str> = interfaces.collect();
    if !interfaces.is_empty() {
        let _ = write!(out, " implements {}", interfaces.join(" & "));
    }
}

fn write_input_value(out: &mut String, value: &InputValueDefinition) {
    let _ = write!(out, "{}: {}", value.name.node, value.ty.node);
    if let Some(default) = &value.default_value {
        let _ = write!(out, " = {}", default.node);
    }
    write_directives(out, &value.directives);
}

fn write_directives(out: &mut String, directives: &[Positioned<ConstDirective>]) {
    for directive in directives {
        let directive = &directive.node;
        let _ = write!(out, " @{}", directive.name.node);
        if !directive.arguments.is_empty() {
            out.push('(');
            for (index, (name, value)) in directive.arguments.iter().enumerate() {
                if index > 0 {
                    out.push_str(", ");
                }
                let _ = write!(out, "{}: {}", name.node, value.node);
            }
            out.push(')');
        }
    }
}

fn write_description(out: &mut String, description: Option<&str>, indent: &str) {
    if let Some(description) = description {
        let escaped = description.replace("\"\"\"", "\\\"\"\"");
        let _ = writeln!(out, "{indent}\"\"\"");
        for line in escaped.lines() {
            let _ = writeln!(out, "{indent}{line}");
        }
        let _ = writeln!(out, "{indent}\"\"\"");
    }
}
