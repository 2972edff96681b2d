//! Error types for stratus-core
//!
//! Structural mistakes (duplicate ids, writes to frozen context) fail fast
//! at the call site. Content problems (bad names, unresolvable references)
//! are collected by the validation engine or the resolver so one synthesis
//! attempt reports everything it found.

use thiserror::Error;

/// A single validation failure, annotated with the construct that
/// produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationFailure {
    pub path: String,
    pub message: String,
}

fn format_failures(failures: &[ValidationFailure]) -> String {
    let mut out = String::from("Validation failed with the following errors:");
    for failure in failures {
        out.push_str(&format!("\n  [{}] {}", failure.path, failure.message));
    }
    out
}

/// Errors that can occur while declaring constructs or synthesizing
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("there is already a construct with id '{id}' in '/{parent_path}'")]
    DuplicateId { parent_path: String, id: String },

    #[error("invalid construct id '{id}': {reason}")]
    InvalidId { id: String, reason: String },

    #[error("cannot set context key '{key}' on '/{path}': context is frozen once a stack exists")]
    FrozenContext { path: String, key: String },

    #[error("{}", format_failures(.failures))]
    Validation { failures: Vec<ValidationFailure> },

    #[error("possible cyclic reference: resolving {description} exceeded depth {depth}")]
    CyclicReference { description: String, depth: usize },

    #[error("logical id '{id}' allocated more than once within stack '{stack}'")]
    LogicalIdCollision { stack: String, id: String },

    #[error("two stacks synthesize to the same artifact name '{name}'")]
    DuplicateStackName { name: String },

    #[error("no deferred-value resolver registered under '{name}'")]
    UnknownResolver { name: String },

    #[error("construct '/{path}' is not inside a stack")]
    NoEnclosingStack { path: String },

    #[error("no construct exists at path '{path}'")]
    UnknownPath { path: String },

    #[error("construct '/{path}' cannot be referenced: not a resource")]
    InvalidReference { path: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Assembly(#[from] stratus_assembly::AssemblyError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_error_lists_every_failure_with_its_path() {
        let err = CoreError::Validation {
            failures: vec![
                ValidationFailure {
                    path: "Parent/C1".to_string(),
                    message: "Error from C1".to_string(),
                },
                ValidationFailure {
                    path: "Parent/C2".to_string(),
                    message: "Error from C2".to_string(),
                },
            ],
        };

        let rendered = err.to_string();
        assert!(rendered.starts_with("Validation failed with the following errors:"));
        assert!(rendered.contains("[Parent/C1] Error from C1"));
        assert!(rendered.contains("[Parent/C2] Error from C2"));
    }
}
