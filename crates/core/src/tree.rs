//! The construct tree
//!
//! Constructs form a single ownership tree: an app root, stacks somewhere
//! beneath it, and arbitrary constructs and resources beneath those. The
//! tree is arena-backed: every node lives in one `Vec`, children hold no
//! owning pointers, and a node's parent is fixed at creation, so the tree
//! is acyclic by construction and a child cannot outlive its owner.
//!
//! Context is inherited downward with child-overrides-parent precedence and
//! freezes tree-wide the moment any stack exists, because stacks may have
//! already read it.

use std::collections::BTreeMap;

use serde_json::Value;
use stratus_assembly::{Environment, MetadataEntry, MissingContext, METADATA_WARNING};

use crate::error::CoreError;
use crate::token::PropValue;
use crate::validate::Validate;

/// Separator used when rendering tree paths.
pub const PATH_SEP: char = '/';

/// Handle to a node in a [`ConstructTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConstructId(usize);

/// Payload of a stack node.
#[derive(Debug)]
pub struct StackNode {
    pub environment: Environment,
    pub(crate) missing: Vec<MissingContext>,
}

/// Payload of a resource node.
#[derive(Debug)]
pub struct ResourceNode {
    pub resource_type: String,
    pub properties: Option<PropValue>,
    pub(crate) logical_id_override: Option<String>,
}

/// What a construct node is.
#[derive(Debug)]
pub enum NodeKind {
    Root,
    Generic,
    Stack(StackNode),
    Resource(ResourceNode),
}

/// One node of the tree.
pub struct ConstructNode {
    local_id: String,
    parent: Option<ConstructId>,
    children: Vec<ConstructId>,
    context: BTreeMap<String, Value>,
    metadata: Vec<MetadataEntry>,
    validations: Vec<Box<dyn Validate>>,
    kind: NodeKind,
}

impl ConstructNode {
    pub fn local_id(&self) -> &str {
        &self.local_id
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub(crate) fn kind_mut(&mut self) -> &mut NodeKind {
        &mut self.kind
    }

    pub fn metadata(&self) -> &[MetadataEntry] {
        &self.metadata
    }

    pub(crate) fn validations(&self) -> &[Box<dyn Validate>] {
        &self.validations
    }
}

/// The ownership tree itself.
pub struct ConstructTree {
    nodes: Vec<ConstructNode>,
    frozen: bool,
}

impl ConstructTree {
    pub fn new() -> Self {
        Self {
            nodes: vec![ConstructNode {
                local_id: String::new(),
                parent: None,
                children: Vec::new(),
                context: BTreeMap::new(),
                metadata: Vec::new(),
                validations: Vec::new(),
                kind: NodeKind::Root,
            }],
            frozen: false,
        }
    }

    pub fn root(&self) -> ConstructId {
        ConstructId(0)
    }

    /// Add a child under `parent`.
    ///
    /// Fails fast on an empty id, an id containing the path separator, or a
    /// sibling already using the id; the tree is left unchanged on failure.
    /// Adding a stack freezes context for the whole tree.
    pub fn add_node(
        &mut self,
        parent: ConstructId,
        local_id: &str,
        kind: NodeKind,
    ) -> Result<ConstructId, CoreError> {
        if local_id.is_empty() {
            return Err(CoreError::InvalidId {
                id: local_id.to_string(),
                reason: "ids must not be empty".to_string(),
            });
        }
        if local_id.contains(PATH_SEP) {
            return Err(CoreError::InvalidId {
                id: local_id.to_string(),
                reason: format!("ids must not contain '{PATH_SEP}'"),
            });
        }
        if self.nodes[parent.0]
            .children
            .iter()
            .any(|&c| self.nodes[c.0].local_id == local_id)
        {
            return Err(CoreError::DuplicateId {
                parent_path: self.path(parent),
                id: local_id.to_string(),
            });
        }

        let freezes = matches!(kind, NodeKind::Stack(_));
        let id = ConstructId(self.nodes.len());
        self.nodes.push(ConstructNode {
            local_id: local_id.to_string(),
            parent: Some(parent),
            children: Vec::new(),
            context: BTreeMap::new(),
            metadata: Vec::new(),
            validations: Vec::new(),
            kind,
        });
        self.nodes[parent.0].children.push(id);
        if freezes {
            self.frozen = true;
        }
        Ok(id)
    }

    pub fn node(&self, id: ConstructId) -> &ConstructNode {
        &self.nodes[id.0]
    }

    pub(crate) fn node_mut(&mut self, id: ConstructId) -> &mut ConstructNode {
        &mut self.nodes[id.0]
    }

    pub fn parent(&self, id: ConstructId) -> Option<ConstructId> {
        self.nodes[id.0].parent
    }

    pub fn children(&self, id: ConstructId) -> &[ConstructId] {
        &self.nodes[id.0].children
    }

    /// Path from the root, local ids joined by [`PATH_SEP`]. The root
    /// contributes no segment, so its path is the empty string.
    pub fn path(&self, id: ConstructId) -> String {
        let mut segments = Vec::new();
        let mut cur = Some(id);
        while let Some(node_id) = cur {
            let node = &self.nodes[node_id.0];
            if node.parent.is_some() {
                segments.push(node.local_id.as_str());
            }
            cur = node.parent;
        }
        segments.reverse();
        segments.join(&PATH_SEP.to_string())
    }

    /// Local ids from just below `ancestor` down to `node`, in order.
    pub fn relative_path_segments(&self, ancestor: ConstructId, node: ConstructId) -> Vec<String> {
        let mut segments = Vec::new();
        let mut cur = node;
        while cur != ancestor {
            let n = &self.nodes[cur.0];
            segments.push(n.local_id.clone());
            match n.parent {
                Some(p) => cur = p,
                None => break,
            }
        }
        segments.reverse();
        segments
    }

    /// Whether context is frozen (any stack exists anywhere in the tree).
    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    pub fn set_context(
        &mut self,
        id: ConstructId,
        key: &str,
        value: Value,
    ) -> Result<(), CoreError> {
        if self.frozen {
            return Err(CoreError::FrozenContext {
                path: self.path(id),
                key: key.to_string(),
            });
        }
        self.node_mut(id).context.insert(key.to_string(), value);
        Ok(())
    }

    /// Seed context without the freeze check. Only for tree construction,
    /// before any user code has run.
    pub(crate) fn seed_context(&mut self, id: ConstructId, key: String, value: Value) {
        self.node_mut(id).context.insert(key, value);
    }

    /// Nearest value for `key`, searching the node and then its ancestors.
    ///
    /// Returns `None` only when no level defines the key; a stored `null`
    /// is a found value.
    pub fn get_context(&self, id: ConstructId, key: &str) -> Option<&Value> {
        let mut cur = Some(id);
        while let Some(node_id) = cur {
            let node = &self.nodes[node_id.0];
            if let Some(value) = node.context.get(key) {
                return Some(value);
            }
            cur = node.parent;
        }
        None
    }

    pub fn add_metadata(&mut self, id: ConstructId, kind: &str, data: Value) {
        self.node_mut(id).metadata.push(MetadataEntry::new(kind, data));
    }

    pub fn add_metadata_entry(&mut self, id: ConstructId, entry: MetadataEntry) {
        self.node_mut(id).metadata.push(entry);
    }

    pub fn add_warning(&mut self, id: ConstructId, message: &str) {
        self.add_metadata(id, METADATA_WARNING, Value::String(message.to_string()));
    }

    pub fn add_validation(&mut self, id: ConstructId, hook: Box<dyn Validate>) {
        self.node_mut(id).validations.push(hook);
    }

    /// All nodes in preorder, root first.
    pub fn walk(&self) -> Vec<ConstructId> {
        let mut out = Vec::with_capacity(self.nodes.len());
        self.collect_preorder(self.root(), &mut out);
        out
    }

    fn collect_preorder(&self, id: ConstructId, out: &mut Vec<ConstructId>) {
        out.push(id);
        for &child in &self.nodes[id.0].children {
            self.collect_preorder(child, out);
        }
    }

    /// All stacks in declaration (preorder) order, nested ones included.
    pub fn stacks(&self) -> Vec<ConstructId> {
        self.walk()
            .into_iter()
            .filter(|&id| matches!(self.nodes[id.0].kind, NodeKind::Stack(_)))
            .collect()
    }

    /// The stack that owns `id`: the node itself if it is a stack, else the
    /// nearest stack ancestor.
    pub fn enclosing_stack(&self, id: ConstructId) -> Option<ConstructId> {
        let mut cur = Some(id);
        while let Some(node_id) = cur {
            if matches!(self.nodes[node_id.0].kind, NodeKind::Stack(_)) {
                return Some(node_id);
            }
            cur = self.nodes[node_id.0].parent;
        }
        None
    }

    /// Resolve a path (with or without a leading separator) to a node.
    pub fn find_by_path(&self, path: &str) -> Option<ConstructId> {
        let trimmed = path.trim_start_matches(PATH_SEP);
        let mut cur = self.root();
        if trimmed.is_empty() {
            return Some(cur);
        }
        for segment in trimmed.split(PATH_SEP) {
            cur = *self.nodes[cur.0]
                .children
                .iter()
                .find(|&&c| self.nodes[c.0].local_id == segment)?;
        }
        Some(cur)
    }

    /// The resources belonging to `stack`, in preorder. Subtrees of nested
    /// stacks belong to those stacks and are skipped.
    pub fn unit_resources(&self, stack: ConstructId) -> Vec<ConstructId> {
        let mut out = Vec::new();
        for &child in &self.nodes[stack.0].children {
            self.collect_unit_resources(child, &mut out);
        }
        out
    }

    fn collect_unit_resources(&self, id: ConstructId, out: &mut Vec<ConstructId>) {
        match self.nodes[id.0].kind {
            NodeKind::Stack(_) => return,
            NodeKind::Resource(_) => out.push(id),
            NodeKind::Root | NodeKind::Generic => {}
        }
        for &child in &self.nodes[id.0].children {
            self.collect_unit_resources(child, out);
        }
    }

    pub fn logical_id_override(&self, id: ConstructId) -> Option<&str> {
        match &self.nodes[id.0].kind {
            NodeKind::Resource(res) => res.logical_id_override.as_deref(),
            _ => None,
        }
    }

    pub(crate) fn report_missing(&mut self, stack: ConstructId, missing: MissingContext) {
        if let NodeKind::Stack(node) = &mut self.node_mut(stack).kind {
            node.missing.push(missing);
        }
    }
}

impl Default for ConstructTree {
    fn default() -> Self {
        Self::new()
    }
}
