//! stratus-core: Construct tree and synthesis engine
//!
//! User code declares a tree of constructs under an [`App`]: stacks,
//! resources, plain grouping nodes. Synthesis walks the finished tree,
//! validates every construct, resolves deferred values, allocates stable
//! logical ids, and emits one template per stack plus an assembly manifest.

mod app;
mod error;
mod names;
mod synth;
mod token;
mod tree;
mod validate;

pub use app::{App, AppConfig};
pub use error::{CoreError, ValidationFailure};
pub use names::{allocate_logical_id, LogicalIdTable, MAX_ID_LEN};
pub use token::{
    ExportRequest, PropValue, ResolutionContext, ResolutionEffects, Resolver, Token, TokenResolver,
    MAX_RESOLUTION_DEPTH,
};
pub use tree::{
    ConstructId, ConstructNode, ConstructTree, NodeKind, ResourceNode, StackNode, PATH_SEP,
};
pub use validate::{run_validations, NameValidator, Validate};

// Re-export the output model for convenience
pub use stratus_assembly::{
    Assembly, AssemblyManifest, Environment, EnvironmentRef, MetadataEntry, MissingContext,
    RuntimeInfo, StackArtifact, StackManifest, Template, METADATA_LOGICAL_ID, METADATA_WARNING,
};

/// Result type for core operations
pub type Result<T> = std::result::Result<T, CoreError>;
