//! Error taxonomy of the actor runtime.
//!
//! Lifecycle errors (`AlreadyStarted`, `NotStarted`, `NotRunning`) are
//! returned synchronously to the caller and never terminate an actor.
//! Processing failures are caught per dispatched task and surfaced as
//! lifecycle events, not as errors from this enum.

use crate::part::PartId;
use crate::runtime::LifecycleState;
use config::SettingsError;
use thiserror::Error;

/// Result type for actor operations
pub type Result<T> = std::result::Result<T, ActorError>;

#[derive(Debug, Clone, Error)]
pub enum ActorError {
    #[error("part {id} is already started (state: {state})")]
    AlreadyStarted { id: PartId, state: LifecycleState },

    #[error("part {id} is not started (state: {state})")]
    NotStarted { id: PartId, state: LifecycleState },

    #[error("part {id} is not running, not ready to process data")]
    NotRunning { id: PartId },

    #[error("invalid configuration for part {id}: {source}")]
    Configuration {
        id: PartId,
        #[source]
        source: SettingsError,
    },

    #[error("downstream part(s) not accepting data: {}", format_targets(.targets))]
    DownstreamUnavailable { targets: Vec<PartId> },

    #[error("processing failed in part {id}: {reason}")]
    ProcessingFailed { id: PartId, reason: String },
}

impl ActorError {
    /// Lifecycle-state errors: the call was made in the wrong state, the
    /// actor itself is unaffected.
    pub fn is_lifecycle(&self) -> bool {
        matches!(
            self,
            ActorError::AlreadyStarted { .. }
                | ActorError::NotStarted { .. }
                | ActorError::NotRunning { .. }
        )
    }

    /// Errors the caller may meaningfully retry once the pipeline settles.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ActorError::NotRunning { .. } | ActorError::DownstreamUnavailable { .. }
        )
    }

    pub fn not_running(id: &PartId) -> Self {
        ActorError::NotRunning { id: id.clone() }
    }

    pub fn processing_failed(id: &PartId, reason: impl Into<String>) -> Self {
        ActorError::ProcessingFailed {
            id: id.clone(),
            reason: reason.into(),
        }
    }
}

fn format_targets(targets: &[PartId]) -> String {
    targets
        .iter()
        .map(|id| id.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}
