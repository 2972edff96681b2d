//! The synthesizer
//!
//! Turns a finished construct tree into an artifact bundle. The pipeline
//! is strictly gated: validation runs first and aborts with every failure
//! before any template exists, then logical ids are fixed, then each
//! stack's property bags are resolved against that stack's own resolution
//! context, and only then are templates and the manifest assembled.

use std::collections::{BTreeMap, BTreeSet};

use serde_json::Value;
use tracing::{debug, info};

use stratus_assembly::{
    template_file_name, Assembly, AssemblyManifest, EnvironmentRef, MetadataEntry, MissingContext,
    OutputDefinition, OutputExport, ResourceDefinition, RuntimeInfo, StackManifest, Template,
    METADATA_LOGICAL_ID,
};

use crate::app::App;
use crate::error::CoreError;
use crate::names::{allocate_logical_id, LogicalIdTable};
use crate::token::Resolver;
use crate::tree::{ConstructId, NodeKind};
use crate::validate::run_validations;

pub(crate) fn synthesize(app: &App) -> Result<Assembly, CoreError> {
    let tree = &app.tree;
    debug!("starting synthesis");

    // Everything validates before anything is built.
    let failures = run_validations(tree);
    if !failures.is_empty() {
        return Err(CoreError::Validation { failures });
    }

    // Name every stack artifact from its root-relative path. Top-level
    // stacks keep their plain id; nested stacks get the hashed form.
    let stacks = tree.stacks();
    let mut stack_names: BTreeMap<ConstructId, String> = BTreeMap::new();
    let mut seen_names: BTreeSet<String> = BTreeSet::new();
    for &stack in &stacks {
        let segments = tree.relative_path_segments(tree.root(), stack);
        let refs: Vec<&str> = segments.iter().map(|s| s.as_str()).collect();
        let name = allocate_logical_id(&refs);
        if !seen_names.insert(name.clone()) {
            return Err(CoreError::DuplicateStackName { name });
        }
        stack_names.insert(stack, name);
    }

    let ids = LogicalIdTable::allocate(tree)?;

    // Resolve every stack's resources, collecting cross-stack effects.
    let mut templates: BTreeMap<String, Template> = BTreeMap::new();
    let mut dependencies: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    let mut exports = Vec::new();
    for &stack in &stacks {
        let name = stack_names[&stack].clone();
        let mut resolver = Resolver::new(tree, &ids, &stack_names, &app.resolvers, stack);
        let mut template = Template::default();

        for resource in tree.unit_resources(stack) {
            let NodeKind::Resource(res) = tree.node(resource).kind() else {
                continue;
            };
            let Some(logical_id) = ids.get(resource) else {
                continue;
            };

            let properties = match &res.properties {
                None => None,
                Some(props) => match resolver.resolve(props)? {
                    // A bag whose every entry resolved to absent is omitted
                    // entirely.
                    Some(Value::Object(map)) if map.is_empty() => None,
                    other => other,
                },
            };

            template.resources.insert(
                logical_id.to_string(),
                ResourceDefinition {
                    resource_type: res.resource_type.clone(),
                    properties,
                },
            );
        }

        let effects = resolver.finish();
        debug!(
            stack = %name,
            resources = template.resources.len(),
            dependencies = effects.dependencies.len(),
            "resolved stack"
        );
        dependencies.insert(name.clone(), effects.dependencies);
        exports.extend(effects.exports);
        templates.insert(name, template);
    }

    // Attach export outputs to the producing templates.
    for export in exports {
        if let Some(template) = templates.get_mut(&export.producer) {
            template.outputs.insert(
                export.output_id,
                OutputDefinition {
                    value: export.value,
                    export: Some(OutputExport {
                        name: export.export_name,
                    }),
                },
            );
        }
    }

    let mut manifest = AssemblyManifest::new();

    for &stack in &stacks {
        let NodeKind::Stack(stack_node) = tree.node(stack).kind() else {
            continue;
        };
        let name = &stack_names[&stack];
        manifest.stacks.push(StackManifest {
            name: name.clone(),
            environment: EnvironmentRef::from(&stack_node.environment),
            template_file: template_file_name(name),
            dependencies: dependencies
                .remove(name)
                .unwrap_or_default()
                .into_iter()
                .collect(),
        });
    }

    // Metadata per absolute path: the allocated logical id first, then
    // whatever was attached at declaration time.
    for id in tree.walk() {
        let node = tree.node(id);
        let mut entries = Vec::new();
        if let Some(logical_id) = ids.get(id) {
            entries.push(MetadataEntry::new(
                METADATA_LOGICAL_ID,
                Value::String(logical_id.to_string()),
            ));
        }
        entries.extend(node.metadata().iter().cloned());
        if !entries.is_empty() {
            manifest.metadata.insert(format!("/{}", tree.path(id)), entries);
        }
    }

    // Missing-context requests: declaration order, exact duplicates
    // collapsed. These are not fatal; they tell the caller what to supply
    // before the next run.
    let mut missing: Vec<MissingContext> = Vec::new();
    for &stack in &stacks {
        if let NodeKind::Stack(stack_node) = tree.node(stack).kind() {
            for request in &stack_node.missing {
                if !missing.contains(request) {
                    missing.push(request.clone());
                }
            }
        }
    }
    manifest.missing = missing;

    if app.version_reporting {
        manifest.runtime = Some(RuntimeInfo {
            libraries: BTreeMap::from([
                (
                    "stratus-core".to_string(),
                    env!("CARGO_PKG_VERSION").to_string(),
                ),
                (
                    "stratus-assembly".to_string(),
                    stratus_assembly::VERSION.to_string(),
                ),
            ]),
        });
    }

    info!(stacks = manifest.stacks.len(), "synthesis complete");
    Ok(Assembly { manifest, templates })
}
