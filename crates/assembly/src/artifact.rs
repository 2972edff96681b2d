//! The artifact bundle produced by a synthesis run
//!
//! An [`Assembly`] is the in-memory result: the manifest plus one template
//! per stack. It can be persisted as a directory containing `manifest.json`
//! and one `<stack>.template.json` file per stack.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use tracing::debug;

use crate::error::AssemblyError;
use crate::manifest::{AssemblyManifest, StackManifest};
use crate::template::Template;

/// File name of the manifest within an assembly directory.
pub const MANIFEST_FILE: &str = "manifest.json";

/// Template file name for a stack.
pub fn template_file_name(stack_name: &str) -> String {
    format!("{stack_name}.template.json")
}

/// The complete output of one synthesis run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Assembly {
    pub manifest: AssemblyManifest,

    /// Templates keyed by stack name.
    pub templates: BTreeMap<String, Template>,
}

/// A borrowed view of one stack's manifest entry and template.
#[derive(Debug, Clone, Copy)]
pub struct StackArtifact<'a> {
    pub manifest: &'a StackManifest,
    pub template: &'a Template,
}

impl Assembly {
    /// Look up a stack by name.
    pub fn stack(&self, name: &str) -> Option<StackArtifact<'_>> {
        let manifest = self.manifest.stack(name)?;
        let template = self.templates.get(name)?;
        Some(StackArtifact { manifest, template })
    }

    /// Persist the bundle into `dir`, creating it if needed.
    ///
    /// Writes the manifest first, then one template file per stack entry.
    /// Fails without writing templates if the manifest names a stack for
    /// which no template exists.
    pub fn write_to_dir(&self, dir: &Path) -> Result<(), AssemblyError> {
        for entry in &self.manifest.stacks {
            if !self.templates.contains_key(&entry.name) {
                return Err(AssemblyError::MissingTemplate {
                    stack: entry.name.clone(),
                });
            }
        }

        fs::create_dir_all(dir)?;

        let manifest_path = dir.join(MANIFEST_FILE);
        let manifest_json = serde_json::to_string_pretty(&self.manifest)?;
        fs::write(&manifest_path, manifest_json)?;
        debug!(path = %manifest_path.display(), "wrote assembly manifest");

        for entry in &self.manifest.stacks {
            let template = &self.templates[&entry.name];
            let template_path = dir.join(&entry.template_file);
            let template_json = serde_json::to_string_pretty(template)?;
            fs::write(&template_path, template_json)?;
            debug!(stack = %entry.name, path = %template_path.display(), "wrote template");
        }

        Ok(())
    }
}
