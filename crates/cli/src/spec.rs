//! Declaration file loading
//!
//! The CLI drives the construct tree from a YAML declaration instead of
//! user code. Deferred values inside resource properties are written as
//! single-key maps:
//!
//! - `{$ref: <path>}` - reference to the resource at a tree path
//! - `{$get-att: {target: <path>, attribute: <name>}}` - attribute lookup
//! - `{$context: <key>}` - context lookup

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use serde_json::Value;

use stratus_core::{App, AppConfig, Environment, PropValue};

/// A parsed declaration file.
#[derive(Debug, Deserialize)]
pub struct DeclarationFile {
    /// Context seeded at the app root.
    #[serde(default)]
    pub context: BTreeMap<String, Value>,

    /// Stacks in declaration order.
    #[serde(default)]
    pub stacks: Vec<StackDecl>,
}

#[derive(Debug, Deserialize)]
pub struct StackDecl {
    pub name: String,

    #[serde(default)]
    pub env: Option<EnvDecl>,

    #[serde(default)]
    pub resources: Vec<ResourceDecl>,
}

#[derive(Debug, Deserialize)]
pub struct EnvDecl {
    pub account: Option<String>,
    pub region: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ResourceDecl {
    pub id: String,

    #[serde(rename = "type")]
    pub resource_type: String,

    #[serde(default)]
    pub properties: Option<Value>,

    /// Explicit logical id, overriding allocation.
    #[serde(default)]
    pub logical_id: Option<String>,
}

/// Read and parse a declaration file.
pub fn load(path: &Path) -> Result<DeclarationFile> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let decl = serde_yaml::from_str(&raw)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    Ok(decl)
}

/// Build the construct tree a declaration describes.
pub fn build_app(
    decl: &DeclarationFile,
    context_overrides: BTreeMap<String, Value>,
) -> Result<App> {
    let mut app = App::new(AppConfig {
        context: decl.context.clone(),
        context_overrides,
        ..Default::default()
    });
    let root = app.root();

    for stack_decl in &decl.stacks {
        let environment = match &stack_decl.env {
            Some(env) => Environment {
                account: env.account.clone(),
                region: env.region.clone(),
            },
            None => Environment::unresolved(),
        };
        let stack = app.add_stack(root, &stack_decl.name, environment)?;

        for resource in &stack_decl.resources {
            let properties = resource.properties.as_ref().map(prop_value).transpose()?;
            let id = app.add_resource(stack, &resource.id, &resource.resource_type, properties)?;
            if let Some(logical_id) = &resource.logical_id {
                app.override_logical_id(id, logical_id)?;
            }
        }
    }

    Ok(app)
}

fn prop_value(value: &Value) -> Result<PropValue> {
    match value {
        Value::Object(map) => {
            if map.len() == 1 {
                if let Some((key, inner)) = map.iter().next() {
                    match key.as_str() {
                        "$ref" => {
                            let Some(target) = inner.as_str() else {
                                bail!("$ref expects a tree path string");
                            };
                            return Ok(PropValue::reference(target));
                        }
                        "$get-att" => {
                            let (Some(target), Some(attribute)) = (
                                inner.get("target").and_then(Value::as_str),
                                inner.get("attribute").and_then(Value::as_str),
                            ) else {
                                bail!("$get-att expects string 'target' and 'attribute' fields");
                            };
                            return Ok(PropValue::get_att(target, attribute));
                        }
                        "$context" => {
                            let Some(context_key) = inner.as_str() else {
                                bail!("$context expects a key string");
                            };
                            return Ok(PropValue::context(context_key));
                        }
                        _ => {}
                    }
                }
            }
            let mut entries = BTreeMap::new();
            for (key, inner) in map {
                entries.insert(key.clone(), prop_value(inner)?);
            }
            Ok(PropValue::Map(entries))
        }
        Value::Array(items) => Ok(PropValue::List(
            items.iter().map(prop_value).collect::<Result<_>>()?,
        )),
        other => Ok(PropValue::Literal(other.clone())),
    }
}
