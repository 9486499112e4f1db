//! Planning oracle port.
//!
//! The oracle turns the operator's command plus a bounded context digest
//! into an ordered batch of build tasks. Transport and prompt rendering
//! are adapter concerns; the engine only sees structured requests and
//! responses.

use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::digest::ContextDigest;

/// Boxed future type alias used by [`Oracle`] to keep the trait dyn-compatible.
pub type PlanFuture<'a> =
    Pin<Box<dyn Future<Output = Result<PlanResponse, OracleError>> + Send + 'a>>;

/// Which oracle backend the engine talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OracleKind {
    /// The xAI Grok chat-completions API.
    Grok,
    /// The Google Gemini generate-content API.
    Gemini,
}

impl std::fmt::Display for OracleKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Grok => write!(f, "grok"),
            Self::Gemini => write!(f, "gemini"),
        }
    }
}

/// A request for the next batch of build tasks.
#[derive(Debug, Clone, Serialize)]
pub struct PlanRequest {
    /// The operator command driving this iteration.
    pub command: String,
    /// The current iteration number.
    pub iteration: u32,
    /// Description of a failed task the oracle should recover from.
    pub failed_task: Option<String>,
    /// Set when the previous response was rejected and the oracle should
    /// correct it.
    pub retry: bool,
    /// Bounded project digest sent in lieu of full state.
    pub digest: ContextDigest,
}

/// The oracle's reply: an ordered list of task objects.
///
/// Elements are kept as raw JSON values here; turning them into typed
/// tasks (and rejecting ones that do not fit the closed action set) is
/// the validator's job, so that a single malformed task invalidates the
/// batch instead of the whole response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlanResponse {
    /// Raw task objects in batch order. An empty list signals that the
    /// oracle considers the project complete.
    #[serde(default)]
    pub tasks: Vec<serde_json::Value>,
}

/// Faults raised by an oracle call.
///
/// Transport and parse failures are distinct from an explicitly empty
/// task list: an empty list is a completion signal, a fault is not.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OracleError {
    /// The HTTP round-trip failed (network, auth, rate limit).
    #[error("oracle transport failure: {0}")]
    Transport(String),
    /// The response could not be parsed into a task list.
    #[error("oracle response could not be parsed: {0}")]
    Parse(String),
}

/// Produces task batches from planning requests.
pub trait Oracle: Send + Sync {
    /// Requests the next batch of tasks for the given context.
    ///
    /// # Errors
    ///
    /// The future resolves to an [`OracleError`] when the round-trip or
    /// response parsing fails.
    fn plan(&self, request: &PlanRequest) -> PlanFuture<'_>;
}
