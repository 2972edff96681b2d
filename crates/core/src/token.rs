//! Deferred values and their resolution
//!
//! A property bag may contain values that are not known at declaration
//! time: a reference to a sibling resource, an attribute of something
//! created elsewhere, a context lookup, or an arbitrary registered
//! resolver. These are carried as tagged [`Token`] variants, not closures,
//! so a deferred value is plain data: it can be compared, serialized, and
//! memoized by its serialized key.
//!
//! Resolution happens once per synthesis pass, bound to one deployable
//! stack. A token resolves to a literal or to the target's intrinsic
//! expression; results are resolved recursively until they reach a literal
//! fixed point, with a hard depth bound so a self-referential resolver
//! fails fast instead of looping.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::trace;

use crate::error::CoreError;
use crate::names::{strip_non_alphanumeric, LogicalIdTable};
use crate::tree::{ConstructId, ConstructTree};

/// Hard bound on recursive resolution.
pub const MAX_RESOLUTION_DEPTH: usize = 32;

/// A deferred value: an opaque resolver discriminator plus its captured
/// parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Token {
    /// The identity of the resource at `target` (tree path).
    Ref { target: String },

    /// An attribute of the resource at `target`.
    GetAtt { target: String, attribute: String },

    /// A context lookup against the resolving stack's context chain.
    Context { key: String },

    /// Dispatched to the resolver registered under `name`.
    Custom { name: String, params: Value },
}

/// A property value: nested literals with deferred leaves.
#[derive(Debug, Clone, PartialEq)]
pub enum PropValue {
    Literal(Value),
    List(Vec<PropValue>),
    Map(BTreeMap<String, PropValue>),
    Deferred(Token),
}

impl PropValue {
    /// Wrap an already-literal JSON document.
    pub fn from_json(value: Value) -> Self {
        PropValue::Literal(value)
    }

    pub fn string(value: impl Into<String>) -> Self {
        PropValue::Literal(Value::String(value.into()))
    }

    /// A reference to the resource at `target`.
    pub fn reference(target: impl Into<String>) -> Self {
        PropValue::Deferred(Token::Ref {
            target: target.into(),
        })
    }

    /// An attribute of the resource at `target`.
    pub fn get_att(target: impl Into<String>, attribute: impl Into<String>) -> Self {
        PropValue::Deferred(Token::GetAtt {
            target: target.into(),
            attribute: attribute.into(),
        })
    }

    /// A context lookup.
    pub fn context(key: impl Into<String>) -> Self {
        PropValue::Deferred(Token::Context { key: key.into() })
    }

    /// A custom deferred value handled by a registered [`TokenResolver`].
    pub fn custom(name: impl Into<String>, params: Value) -> Self {
        PropValue::Deferred(Token::Custom {
            name: name.into(),
            params,
        })
    }

    pub fn list(items: impl IntoIterator<Item = PropValue>) -> Self {
        PropValue::List(items.into_iter().collect())
    }

    pub fn map<K: Into<String>>(entries: impl IntoIterator<Item = (K, PropValue)>) -> Self {
        PropValue::Map(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

impl From<Value> for PropValue {
    fn from(value: Value) -> Self {
        PropValue::Literal(value)
    }
}

/// What a [`TokenResolver`] gets to see while resolving.
pub struct ResolutionContext<'a> {
    pub tree: &'a ConstructTree,
    /// The stack being synthesized.
    pub unit: ConstructId,
    /// The stack's artifact name.
    pub unit_name: &'a str,
}

/// A registered resolver for [`Token::Custom`] values.
///
/// Resolution must be a pure function of the token's parameters and the
/// context; the result may itself contain deferred values and will be
/// resolved recursively.
pub trait TokenResolver {
    fn resolve(&self, params: &Value, ctx: &ResolutionContext<'_>) -> Result<PropValue, CoreError>;
}

/// A cross-stack value the producing stack must export.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportRequest {
    /// Artifact name of the producing stack.
    pub producer: String,
    /// Logical id of the output entry in the producer's template.
    pub output_id: String,
    pub export_name: String,
    /// The intrinsic expression, as seen from inside the producer.
    pub value: Value,
}

/// Side effects accumulated while resolving one stack.
#[derive(Debug, Default)]
pub struct ResolutionEffects {
    /// Artifact names of stacks this stack consumes values from.
    pub dependencies: BTreeSet<String>,
    pub exports: Vec<ExportRequest>,
}

/// Resolves deferred values against one deployable stack.
pub struct Resolver<'a> {
    tree: &'a ConstructTree,
    ids: &'a LogicalIdTable,
    stack_names: &'a BTreeMap<ConstructId, String>,
    custom: &'a BTreeMap<String, Box<dyn TokenResolver>>,
    unit: ConstructId,
    unit_name: String,
    memo: BTreeMap<String, Option<Value>>,
    effects: ResolutionEffects,
}

impl<'a> Resolver<'a> {
    pub fn new(
        tree: &'a ConstructTree,
        ids: &'a LogicalIdTable,
        stack_names: &'a BTreeMap<ConstructId, String>,
        custom: &'a BTreeMap<String, Box<dyn TokenResolver>>,
        unit: ConstructId,
    ) -> Self {
        let unit_name = stack_names
            .get(&unit)
            .cloned()
            .unwrap_or_else(|| tree.path(unit));
        Self {
            tree,
            ids,
            stack_names,
            custom,
            unit,
            unit_name,
            memo: BTreeMap::new(),
            effects: ResolutionEffects::default(),
        }
    }

    /// Resolve a value to literal JSON.
    ///
    /// `None` means the value is absent (an unsatisfied context lookup):
    /// map entries that resolve to absent are dropped, list slots keep a
    /// `null`. A fully-literal input comes back unchanged.
    pub fn resolve(&mut self, value: &PropValue) -> Result<Option<Value>, CoreError> {
        self.resolve_at(value, 0)
    }

    /// Consume the resolver, yielding the accumulated cross-stack effects.
    pub fn finish(self) -> ResolutionEffects {
        self.effects
    }

    fn resolve_at(&mut self, value: &PropValue, depth: usize) -> Result<Option<Value>, CoreError> {
        match value {
            PropValue::Literal(v) => Ok(Some(v.clone())),
            PropValue::List(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(self.resolve_at(item, depth)?.unwrap_or(Value::Null));
                }
                Ok(Some(Value::Array(out)))
            }
            PropValue::Map(entries) => {
                let mut out = Map::new();
                for (key, item) in entries {
                    if let Some(resolved) = self.resolve_at(item, depth)? {
                        out.insert(key.clone(), resolved);
                    }
                }
                Ok(Some(Value::Object(out)))
            }
            PropValue::Deferred(token) => self.resolve_token(token, depth),
        }
    }

    fn resolve_token(&mut self, token: &Token, depth: usize) -> Result<Option<Value>, CoreError> {
        let key = serde_json::to_string(token)?;
        if let Some(hit) = self.memo.get(&key) {
            return Ok(hit.clone());
        }
        if depth >= MAX_RESOLUTION_DEPTH {
            return Err(CoreError::CyclicReference {
                description: key,
                depth,
            });
        }

        trace!(token = %key, unit = %self.unit_name, "resolving deferred value");
        let resolved = match token {
            Token::Ref { target } => Some(self.resolve_reference(target, None)?),
            Token::GetAtt { target, attribute } => {
                Some(self.resolve_reference(target, Some(attribute))?)
            }
            Token::Context { key } => self.tree.get_context(self.unit, key).cloned(),
            Token::Custom { name, params } => {
                let next = {
                    let resolver =
                        self.custom
                            .get(name)
                            .ok_or_else(|| CoreError::UnknownResolver {
                                name: name.clone(),
                            })?;
                    let ctx = ResolutionContext {
                        tree: self.tree,
                        unit: self.unit,
                        unit_name: &self.unit_name,
                    };
                    resolver.resolve(params, &ctx)?
                };
                self.resolve_at(&next, depth + 1)?
            }
        };

        self.memo.insert(key, resolved.clone());
        Ok(resolved)
    }

    fn resolve_reference(
        &mut self,
        target: &str,
        attribute: Option<&str>,
    ) -> Result<Value, CoreError> {
        let node = self
            .tree
            .find_by_path(target)
            .ok_or_else(|| CoreError::UnknownPath {
                path: target.to_string(),
            })?;
        let logical_id = self
            .ids
            .get(node)
            .ok_or_else(|| CoreError::InvalidReference {
                path: self.tree.path(node),
            })?
            .to_string();
        let producer = self
            .tree
            .enclosing_stack(node)
            .ok_or_else(|| CoreError::NoEnclosingStack {
                path: self.tree.path(node),
            })?;

        let intrinsic = match attribute {
            None => json!({ "Ref": logical_id }),
            Some(attr) => json!({ "Fn::GetAtt": [logical_id, attr] }),
        };

        if producer == self.unit {
            return Ok(intrinsic);
        }

        // Cross-stack: literal substitution is impossible at synthesis
        // time, so the producer exports the value under a well-known name,
        // the consumer imports it, and a dependency edge orders deployment.
        let producer_name = self
            .stack_names
            .get(&producer)
            .cloned()
            .unwrap_or_else(|| self.tree.path(producer));
        let export_name = match attribute {
            None => format!("{producer_name}:{logical_id}"),
            Some(attr) => format!("{producer_name}:{logical_id}:{attr}"),
        };
        let output_id = format!(
            "Export{}{}",
            logical_id,
            strip_non_alphanumeric(attribute.unwrap_or_default())
        );

        self.effects.dependencies.insert(producer_name.clone());
        self.effects.exports.push(ExportRequest {
            producer: producer_name,
            output_id,
            export_name: export_name.clone(),
            value: intrinsic,
        });

        Ok(json!({ "Fn::ImportValue": export_name }))
    }
}
