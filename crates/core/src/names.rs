//! Logical identity allocation
//!
//! Every resource gets a stable logical id derived from its tree path: the
//! path segments below the enclosing stack, stripped to an identifier
//! alphabet and concatenated, spliced with a short hash of the full path.
//! A resource declared directly under its stack keeps its plain id, which
//! keeps shallow templates human-readable; anything deeper carries the hash
//! so that renaming an intermediate construct cannot silently collide with
//! a sibling subtree.
//!
//! The same allocator names nested stack artifacts (from their root-relative
//! path), so artifact names follow the same determinism rules as logical ids.

use std::collections::{BTreeMap, BTreeSet};

use sha2::{Digest, Sha256};
use tracing::trace;

use crate::error::CoreError;
use crate::tree::{ConstructId, ConstructTree};

/// Maximum length of an allocated id.
pub const MAX_ID_LEN: usize = 255;

/// Length of the hex hash spliced into multi-segment ids.
const HASH_LEN: usize = 8;

/// Prefix kept from the raw concatenation when it has to be shortened.
const PREFIX_LEN: usize = 112;

/// Suffix kept from the raw concatenation when it has to be shortened.
const SUFFIX_LEN: usize = MAX_ID_LEN - PREFIX_LEN - HASH_LEN;

/// Allocate a deterministic id for a path.
///
/// `segments` are the local ids from (but excluding) the enclosing scope
/// down to the construct itself, in order.
pub fn allocate_logical_id(segments: &[&str]) -> String {
    let stripped: Vec<String> = segments.iter().map(|s| strip_non_alphanumeric(s)).collect();

    // A single shallow segment stays verbatim; there is nothing above it
    // within the unit that could collide.
    if stripped.len() == 1 && !stripped[0].is_empty() && stripped[0].len() <= MAX_ID_LEN {
        return stripped[0].clone();
    }

    let human: String = stripped.concat();
    let hash = path_hash(segments);

    if human.len() + HASH_LEN <= MAX_ID_LEN {
        format!("{human}{hash}")
    } else {
        // Keep both ends of the raw name so the id stays recognizable; the
        // hash in the middle carries the uniqueness.
        format!(
            "{}{}{}",
            &human[..PREFIX_LEN],
            hash,
            &human[human.len() - SUFFIX_LEN..]
        )
    }
}

/// First 32 bits of the SHA-256 of the `/`-joined path, upper-case hex.
fn path_hash(segments: &[&str]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(segments.join("/").as_bytes());
    let digest = hasher.finalize();
    hex::encode_upper(&digest[..HASH_LEN / 2])
}

pub(crate) fn strip_non_alphanumeric(s: &str) -> String {
    s.chars().filter(|c| c.is_ascii_alphanumeric()).collect()
}

/// The allocated logical ids of every resource in a tree.
#[derive(Debug, Default)]
pub struct LogicalIdTable {
    ids: BTreeMap<ConstructId, String>,
}

impl LogicalIdTable {
    /// Allocate ids for every resource of every stack.
    ///
    /// Explicit per-resource overrides win over allocation. Fails if two
    /// resources within the same stack end up with the same id.
    pub fn allocate(tree: &ConstructTree) -> Result<Self, CoreError> {
        let mut table = Self::default();

        for stack in tree.stacks() {
            let mut taken: BTreeSet<String> = BTreeSet::new();

            for resource in tree.unit_resources(stack) {
                let id = match tree.logical_id_override(resource) {
                    Some(explicit) => explicit.to_string(),
                    None => {
                        let segments = tree.relative_path_segments(stack, resource);
                        let refs: Vec<&str> = segments.iter().map(|s| s.as_str()).collect();
                        allocate_logical_id(&refs)
                    }
                };

                if !taken.insert(id.clone()) {
                    return Err(CoreError::LogicalIdCollision {
                        stack: tree.path(stack),
                        id,
                    });
                }

                trace!(path = %tree.path(resource), logical_id = %id, "allocated logical id");
                table.ids.insert(resource, id);
            }
        }

        Ok(table)
    }

    pub fn get(&self, resource: ConstructId) -> Option<&str> {
        self.ids.get(&resource).map(|s| s.as_str())
    }
}
