//! Deployment environment descriptors
//!
//! A deployable stack targets an account/region pair. Either half may be
//! unknown at synthesis time; unknown halves render as fixed sentinel
//! strings so a manifest consumer can tell a concrete environment apart
//! from an environment-agnostic one.

use serde::{Deserialize, Serialize};

/// Sentinel rendered for an account that is not known until deploy time.
pub const UNKNOWN_ACCOUNT: &str = "unknown-account";

/// Sentinel rendered for a region that is not known until deploy time.
pub const UNKNOWN_REGION: &str = "unknown-region";

/// The target environment of a deployable stack.
///
/// `None` means "not known until deploy time", which is different from any
/// literal value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Environment {
    pub account: Option<String>,
    pub region: Option<String>,
}

impl Environment {
    /// An environment with both halves known.
    pub fn new(account: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            account: Some(account.into()),
            region: Some(region.into()),
        }
    }

    /// An environment resolved at deploy time.
    pub fn unresolved() -> Self {
        Self::default()
    }

    pub fn is_resolved(&self) -> bool {
        self.account.is_some() && self.region.is_some()
    }

    /// Canonical name, e.g. `aws://12345/us-east-1` or
    /// `aws://unknown-account/unknown-region`.
    pub fn name(&self) -> String {
        format!(
            "aws://{}/{}",
            self.account.as_deref().unwrap_or(UNKNOWN_ACCOUNT),
            self.region.as_deref().unwrap_or(UNKNOWN_REGION)
        )
    }
}

/// The serialized form of an [`Environment`] as it appears in the manifest.
///
/// Unknown halves are already rendered as their sentinels here, so manifest
/// consumers never have to deal with absent fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentRef {
    pub account: String,
    pub region: String,
    pub name: String,
}

impl From<&Environment> for EnvironmentRef {
    fn from(env: &Environment) -> Self {
        Self {
            account: env.account.clone().unwrap_or_else(|| UNKNOWN_ACCOUNT.to_string()),
            region: env.region.clone().unwrap_or_else(|| UNKNOWN_REGION.to_string()),
            name: env.name(),
        }
    }
}
