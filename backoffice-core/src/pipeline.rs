//! Shared pipeline error type and small store-level operations.

use anyhow::anyhow;
use backoffice_lifecycle::TransitionError;
use backoffice_store::Store;
use tracing::{info, warn};

/// Error type for pipeline results.
///
/// Exit code 2 = partial batch failure or rejected transition, 1 = tool error.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("{failed} item(s) failed; partial output was written")]
    Partial { failed: usize },

    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error("{0:#}")]
    Internal(#[from] anyhow::Error),
}

impl ToolError {
    pub fn exit_code(&self) -> u8 {
        match self {
            ToolError::Partial { .. } | ToolError::Transition(_) => 2,
            ToolError::Internal(_) => 1,
        }
    }
}

/// Turn a failure count into `Partial`, so callers can `?` it.
pub fn partial_if_failed(failed: usize) -> Result<(), ToolError> {
    if failed == 0 {
        Ok(())
    } else {
        Err(ToolError::Partial { failed })
    }
}

const WIPE_GUARDS: [&str; 2] = ["sandbox", "testing"];

/// Delete everything below `prefix`.
///
/// Refuses unless the resolved location names a sandbox or testing area.
pub fn run_wipe(store: &dyn Store, prefix: &str) -> Result<String, ToolError> {
    let location = store.location(prefix);
    if !WIPE_GUARDS.iter().any(|guard| location.contains(guard)) {
        warn!(location = %location, "refusing to wipe");
        return Err(anyhow!(
            "refusing to wipe {location}: only locations containing 'sandbox' or 'testing' may be wiped"
        )
        .into());
    }
    store.remove_prefix(prefix)?;
    info!(location = %location, "wiped");
    Ok(location)
}
