//! Assembly manifest types
//!
//! The manifest is the synthesis output header: which stacks exist, where
//! their templates live, what they depend on, construct metadata keyed by
//! tree path, and any context lookups that could not be satisfied during
//! synthesis. All maps are [`BTreeMap`] so the serialized manifest is
//! deterministic.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::environment::EnvironmentRef;

/// Manifest schema version written into every manifest.
pub const MANIFEST_VERSION: &str = "stratus-assembly/1.0";

/// Metadata type for the synthesized logical id of a resource.
pub const METADATA_LOGICAL_ID: &str = "stratus:logicalId";

/// Metadata type for warnings attached to a construct.
pub const METADATA_WARNING: &str = "stratus:warning";

/// A single metadata entry attached to a construct path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataEntry {
    #[serde(rename = "type")]
    pub kind: String,

    pub data: Value,

    /// Optional trace of where the entry was attached.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace: Option<Vec<String>>,
}

impl MetadataEntry {
    pub fn new(kind: impl Into<String>, data: Value) -> Self {
        Self {
            kind: kind.into(),
            data,
            trace: None,
        }
    }
}

/// A context lookup that synthesis needed but could not satisfy.
///
/// These are requests, not errors: an external actor is expected to obtain
/// the value (`provider` names the mechanism, `props` scopes the query),
/// supply it via configuration, and run synthesis again.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissingContext {
    pub key: String,
    pub provider: String,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub props: BTreeMap<String, Value>,
}

/// Library name/version provenance, written unless version reporting is
/// disabled.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeInfo {
    pub libraries: BTreeMap<String, String>,
}

/// Per-stack entry in the manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StackManifest {
    pub name: String,
    pub environment: EnvironmentRef,

    /// File name of this stack's template within the assembly directory.
    pub template_file: String,

    /// Names of stacks this stack consumes values from.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<String>,
}

/// The complete assembly manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssemblyManifest {
    pub version: String,

    /// Stacks in declaration order.
    pub stacks: Vec<StackManifest>,

    /// Metadata entries keyed by absolute construct path (leading `/`).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, Vec<MetadataEntry>>,

    /// Missing-context requests, deduplicated, in declaration order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub missing: Vec<MissingContext>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime: Option<RuntimeInfo>,
}

impl AssemblyManifest {
    pub fn new() -> Self {
        Self {
            version: MANIFEST_VERSION.to_string(),
            stacks: Vec::new(),
            metadata: BTreeMap::new(),
            missing: Vec::new(),
            runtime: None,
        }
    }

    /// Look up a stack entry by name.
    pub fn stack(&self, name: &str) -> Option<&StackManifest> {
        self.stacks.iter().find(|s| s.name == name)
    }
}

impl Default for AssemblyManifest {
    fn default() -> Self {
        Self::new()
    }
}
