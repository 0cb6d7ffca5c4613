//! Command implementations
//!
//! Each submodule holds the arguments and the handler of one command family.

pub mod bitmap;
pub mod mls;
pub mod search;

use anyhow::{Context, Result};
use polscope_policy::{InMemoryPolicy, PolicySnapshot};
use std::path::Path;
use tracing::debug;

/// Load a policy snapshot and build the in-memory policy from it.
///
/// The format is picked from the file extension: `.json` is JSON and
/// anything else is TOML.
pub fn load_policy(path: &Path) -> Result<InMemoryPolicy> {
    let snapshot = PolicySnapshot::load(path)
        .with_context(|| format!("Failed to load policy from {}", path.display()))?;
    let policy = snapshot
        .into_policy()
        .with_context(|| format!("Policy {} is inconsistent", path.display()))?;
    debug!(path = %path.display(), "loaded policy");
    Ok(policy)
}
