//! Engine error types.
//!
//! Nothing here aborts a resolution pass: these errors are either returned
//! from the edges (payload parsing, HTML writing) or logged and scoped to the
//! entry or hook that produced them.

use crate::hooks::HookPoint;
use thiserror::Error;

/// Errors produced by the head engine.
#[derive(Debug, Error)]
pub enum HeadError {
    #[error("deferred field of entry {entry} rejected: {reason}")]
    DeferredRejected { entry: u64, reason: String },

    #[error("invalid head payload")]
    Payload(#[from] serde_json::Error),

    #[error("failed to write head html")]
    Render(#[from] std::io::Error),

    #[error("hook `{handler}` failed at `{point}`")]
    Hook {
        point: HookPoint,
        handler: String,
        #[source]
        source: anyhow::Error,
    },
}
