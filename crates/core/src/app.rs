//! The app: tree construction entry point and synthesis trigger
//!
//! An [`App`] owns the construct tree for one synthesis lifecycle. All
//! configuration comes in through [`AppConfig`] at construction; there is
//! no hidden process-wide state. Declaration is synchronous and ordered by
//! call sequence, and `synth` reads the finished tree without mutating it.

use std::collections::BTreeMap;

use serde_json::Value;
use stratus_assembly::{Assembly, Environment, MissingContext};

use crate::error::CoreError;
use crate::synth;
use crate::token::{PropValue, TokenResolver};
use crate::tree::{ConstructId, ConstructTree, NodeKind, ResourceNode, StackNode};
use crate::validate::Validate;

/// Configuration for a new [`App`].
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Context declared by the caller, seeded at the root.
    pub context: BTreeMap<String, Value>,

    /// Externally-injected context; wins over `context` for identical keys.
    pub context_overrides: BTreeMap<String, Value>,

    /// Write library versions into the manifest. On by default; opt out
    /// explicitly.
    pub version_reporting: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            context: BTreeMap::new(),
            context_overrides: BTreeMap::new(),
            version_reporting: true,
        }
    }
}

/// The root of one declaration-and-synthesis lifecycle.
pub struct App {
    pub(crate) tree: ConstructTree,
    pub(crate) resolvers: BTreeMap<String, Box<dyn TokenResolver>>,
    pub(crate) version_reporting: bool,
}

impl App {
    pub fn new(config: AppConfig) -> Self {
        let mut tree = ConstructTree::new();
        let root = tree.root();
        for (key, value) in config.context {
            tree.seed_context(root, key, value);
        }
        for (key, value) in config.context_overrides {
            tree.seed_context(root, key, value);
        }
        Self {
            tree,
            resolvers: BTreeMap::new(),
            version_reporting: config.version_reporting,
        }
    }

    pub fn root(&self) -> ConstructId {
        self.tree.root()
    }

    pub fn tree(&self) -> &ConstructTree {
        &self.tree
    }

    /// Add a plain grouping construct.
    pub fn add_construct(
        &mut self,
        scope: ConstructId,
        id: &str,
    ) -> Result<ConstructId, CoreError> {
        self.tree.add_node(scope, id, NodeKind::Generic)
    }

    /// Add a deployable stack. Freezes context tree-wide.
    pub fn add_stack(
        &mut self,
        scope: ConstructId,
        id: &str,
        environment: Environment,
    ) -> Result<ConstructId, CoreError> {
        self.tree.add_node(
            scope,
            id,
            NodeKind::Stack(StackNode {
                environment,
                missing: Vec::new(),
            }),
        )
    }

    /// Add a resource. The scope must live inside a stack.
    pub fn add_resource(
        &mut self,
        scope: ConstructId,
        id: &str,
        resource_type: &str,
        properties: Option<PropValue>,
    ) -> Result<ConstructId, CoreError> {
        if self.tree.enclosing_stack(scope).is_none() {
            let scope_path = self.tree.path(scope);
            return Err(CoreError::NoEnclosingStack {
                path: if scope_path.is_empty() {
                    id.to_string()
                } else {
                    format!("{scope_path}/{id}")
                },
            });
        }
        self.tree.add_node(
            scope,
            id,
            NodeKind::Resource(ResourceNode {
                resource_type: resource_type.to_string(),
                properties,
                logical_id_override: None,
            }),
        )
    }

    /// Pin a resource's logical id instead of allocating one.
    pub fn override_logical_id(
        &mut self,
        resource: ConstructId,
        logical_id: &str,
    ) -> Result<(), CoreError> {
        if !matches!(self.tree.node(resource).kind(), NodeKind::Resource(_)) {
            return Err(CoreError::InvalidReference {
                path: self.tree.path(resource),
            });
        }
        if let NodeKind::Resource(res) = self.tree.node_mut(resource).kind_mut() {
            res.logical_id_override = Some(logical_id.to_string());
        }
        Ok(())
    }

    pub fn set_context(
        &mut self,
        scope: ConstructId,
        key: &str,
        value: Value,
    ) -> Result<(), CoreError> {
        self.tree.set_context(scope, key, value)
    }

    pub fn get_context(&self, scope: ConstructId, key: &str) -> Option<&Value> {
        self.tree.get_context(scope, key)
    }

    pub fn add_metadata(&mut self, scope: ConstructId, kind: &str, data: Value) {
        self.tree.add_metadata(scope, kind, data);
    }

    pub fn add_warning(&mut self, scope: ConstructId, message: &str) {
        self.tree.add_warning(scope, message);
    }

    pub fn add_validation(&mut self, scope: ConstructId, hook: Box<dyn Validate>) {
        self.tree.add_validation(scope, hook);
    }

    /// Record a context lookup synthesis will not be able to satisfy.
    ///
    /// The request is attached to the enclosing stack and lands in the
    /// manifest's `missing` list; it does not fail synthesis.
    pub fn report_missing_context(
        &mut self,
        scope: ConstructId,
        missing: MissingContext,
    ) -> Result<(), CoreError> {
        let stack = self
            .tree
            .enclosing_stack(scope)
            .ok_or_else(|| CoreError::NoEnclosingStack {
                path: self.tree.path(scope),
            })?;
        self.tree.report_missing(stack, missing);
        Ok(())
    }

    /// Register a resolver for [`crate::Token::Custom`] values.
    pub fn register_resolver(&mut self, name: impl Into<String>, resolver: Box<dyn TokenResolver>) {
        self.resolvers.insert(name.into(), resolver);
    }

    /// Synthesize the whole tree into an artifact bundle.
    pub fn synth(&self) -> Result<Assembly, CoreError> {
        synth::synthesize(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn declared_context_is_visible_from_every_scope() {
        let mut app = App::new(AppConfig {
            context: BTreeMap::from([("foo".to_string(), json!("bar"))]),
            ..Default::default()
        });
        let root = app.root();
        let child = app.add_construct(root, "child").unwrap();

        assert_eq!(app.get_context(child, "foo"), Some(&json!("bar")));
    }

    #[test]
    fn context_overrides_win_over_declared_context() {
        let app = App::new(AppConfig {
            context: BTreeMap::from([
                ("key1".to_string(), json!("val3")),
                ("key2".to_string(), json!("val4")),
            ]),
            context_overrides: BTreeMap::from([
                ("key1".to_string(), json!("val1")),
                ("key2".to_string(), json!("val2")),
            ]),
            ..Default::default()
        });

        assert_eq!(app.get_context(app.root(), "key1"), Some(&json!("val1")));
        assert_eq!(app.get_context(app.root(), "key2"), Some(&json!("val2")));
    }

    #[test]
    fn set_context_fails_once_a_stack_exists() {
        let mut app = App::new(AppConfig::default());
        let root = app.root();
        app.add_stack(root, "s1", Environment::unresolved()).unwrap();

        let err = app.set_context(root, "foo", json!("bar")).unwrap_err();
        assert!(matches!(err, CoreError::FrozenContext { .. }));
    }

    #[test]
    fn resources_must_live_inside_a_stack() {
        let mut app = App::new(AppConfig::default());
        let root = app.root();

        let err = app
            .add_resource(root, "orphan", "DummyResource", None)
            .unwrap_err();
        assert!(matches!(err, CoreError::NoEnclosingStack { ref path } if path == "orphan"));
    }

    #[test]
    fn logical_id_override_rejects_non_resources() {
        let mut app = App::new(AppConfig::default());
        let root = app.root();
        let stack = app.add_stack(root, "s1", Environment::unresolved()).unwrap();

        assert!(matches!(
            app.override_logical_id(stack, "Pinned"),
            Err(CoreError::InvalidReference { .. })
        ));
    }
}
