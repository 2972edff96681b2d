//! stratus-assembly: Output model for stratus synthesis
//!
//! This crate defines the artifact bundle produced by a synthesis run:
//! one template document per deployable stack, plus an assembly manifest
//! describing stacks, metadata, dependencies, and missing-context requests.
//! It knows nothing about construct trees; it is the serializable boundary
//! between the synthesis engine and whatever consumes its output.

mod artifact;
mod environment;
mod error;
mod manifest;
mod template;

pub use artifact::{template_file_name, Assembly, StackArtifact, MANIFEST_FILE};
pub use environment::{Environment, EnvironmentRef, UNKNOWN_ACCOUNT, UNKNOWN_REGION};
pub use error::AssemblyError;
pub use manifest::{
    AssemblyManifest, MetadataEntry, MissingContext, RuntimeInfo, StackManifest, MANIFEST_VERSION,
    METADATA_LOGICAL_ID, METADATA_WARNING,
};
pub use template::{OutputDefinition, OutputExport, ResourceDefinition, Template};

/// Result type for assembly operations
pub type Result<T> = std::result::Result<T, AssemblyError>;

/// This crate's version, as reported in manifest runtime info.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
