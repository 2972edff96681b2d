//! Template documents
//!
//! A template is the per-stack output artifact: an ordered mapping of
//! logical id to resource definition, plus any outputs the stack exports
//! to other stacks. Uses [`BTreeMap`] so serialization order is
//! deterministic regardless of declaration order.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A synthesized template for one deployable stack.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Template {
    /// Resource definitions keyed by logical id.
    #[serde(rename = "Resources", default, skip_serializing_if = "BTreeMap::is_empty")]
    pub resources: BTreeMap<String, ResourceDefinition>,

    /// Values this stack exports for consumption by other stacks.
    #[serde(rename = "Outputs", default, skip_serializing_if = "BTreeMap::is_empty")]
    pub outputs: BTreeMap<String, OutputDefinition>,
}

impl Template {
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty() && self.outputs.is_empty()
    }
}

/// A single resource inside a template.
///
/// `properties` is `None` (and omitted from the serialized document) when
/// the resource was declared without a property bag, or when every property
/// resolved to an absent value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceDefinition {
    #[serde(rename = "Type")]
    pub resource_type: String,

    #[serde(rename = "Properties", default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<Value>,
}

/// An output entry, optionally exported under a well-known name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputDefinition {
    #[serde(rename = "Value")]
    pub value: Value,

    #[serde(rename = "Export", default, skip_serializing_if = "Option::is_none")]
    pub export: Option<OutputExport>,
}

/// The export name attached to an output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputExport {
    #[serde(rename = "Name")]
    pub name: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn resource_without_properties_omits_the_key() {
        let mut template = Template::default();
        template.resources.insert(
            "Res".to_string(),
            ResourceDefinition {
                resource_type: "ResourceType1".to_string(),
                properties: None,
            },
        );

        let rendered = serde_json::to_value(&template).unwrap();
        assert_eq!(rendered, json!({ "Resources": { "Res": { "Type": "ResourceType1" } } }));
    }

    #[test]
    fn resource_properties_render_verbatim() {
        let mut template = Template::default();
        template.resources.insert(
            "s1c1".to_string(),
            ResourceDefinition {
                resource_type: "DummyResource".to_string(),
                properties: Some(json!({ "Prop1": "Prop1" })),
            },
        );

        let rendered = serde_json::to_value(&template).unwrap();
        assert_eq!(
            rendered,
            json!({
                "Resources": {
                    "s1c1": { "Type": "DummyResource", "Properties": { "Prop1": "Prop1" } }
                }
            })
        );
    }

    #[test]
    fn empty_template_serializes_to_empty_object() {
        let rendered = serde_json::to_value(Template::default()).unwrap();
        assert_eq!(rendered, json!({}));
    }

    #[test]
    fn outputs_carry_export_names() {
        let mut template = Template::default();
        template.outputs.insert(
            "ExportBucket".to_string(),
            OutputDefinition {
                value: json!({ "Ref": "Bucket" }),
                export: Some(OutputExport {
                    name: "producer:Bucket".to_string(),
                }),
            },
        );

        let rendered = serde_json::to_value(&template).unwrap();
        assert_eq!(
            rendered,
            json!({
                "Outputs": {
                    "ExportBucket": {
                        "Value": { "Ref": "Bucket" },
                        "Export": { "Name": "producer:Bucket" }
                    }
                }
            })
        );
    }
}
