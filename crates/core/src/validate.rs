//! The validation engine
//!
//! Validation is a capability, not a base class: anything that implements
//! [`Validate`] (including a plain closure) can be attached to any node.
//! All hooks across the whole tree run before any artifact is produced,
//! and every failure is reported in one aggregate, annotated with the path
//! of the construct it came from.

use tracing::debug;

use crate::error::ValidationFailure;
use crate::tree::{ConstructTree, NodeKind};

/// A self-validation hook. Returns zero or more human-readable problems.
pub trait Validate {
    fn validate(&self) -> Vec<String>;
}

impl<F> Validate for F
where
    F: Fn() -> Vec<String>,
{
    fn validate(&self) -> Vec<String> {
        (self)()
    }
}

/// Checks a user-supplied name against length and character constraints.
///
/// Violations surface as validation failures, so they aggregate with every
/// other problem instead of aborting synthesis one at a time.
pub struct NameValidator {
    label: String,
    name: String,
    max_len: usize,
}

impl NameValidator {
    pub fn new(label: impl Into<String>, name: impl Into<String>, max_len: usize) -> Self {
        Self {
            label: label.into(),
            name: name.into(),
            max_len,
        }
    }
}

impl Validate for NameValidator {
    fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.name.len() > self.max_len {
            errors.push(format!(
                "{} name \"{}\" can be a max of {} characters",
                self.label, self.name, self.max_len
            ));
        }

        let allowed =
            |c: char| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '+' | '=' | ',' | '@' | '-');
        if !self.name.chars().all(allowed) {
            errors.push(format!(
                "{} name \"{}\" can only contain letters (a-z, A-Z), numbers (0-9), \
                 periods (.), underscores (_), + (plus signs), = (equals signs), \
                 , (commas), @ (at signs), - (minus signs)",
                self.label, self.name
            ));
        }

        errors
    }
}

/// Run every hook on every node and collect all failures.
///
/// Order of execution is unspecified; only completeness matters.
pub fn run_validations(tree: &ConstructTree) -> Vec<ValidationFailure> {
    let mut failures = Vec::new();

    for id in tree.walk() {
        let node = tree.node(id);
        let path = tree.path(id);

        if let NodeKind::Resource(res) = node.kind() {
            if res.resource_type.is_empty() {
                failures.push(ValidationFailure {
                    path: path.clone(),
                    message: "resource type must not be empty".to_string(),
                });
            }
        }

        for hook in node.validations() {
            for message in hook.validate() {
                failures.push(ValidationFailure {
                    path: path.clone(),
                    message,
                });
            }
        }
    }

    if !failures.is_empty() {
        debug!(count = failures.len(), "validation produced failures");
    }
    failures
}
