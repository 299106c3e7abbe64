//! Body rewriting strategies
//!
//! The ordinary strategy rewrites a method's own body; the async strategy
//! splits the work between the kickoff body and the generated state
//! machine's driver method. Static façade-call redirection is shared and
//! runs independently of the trace decision.

pub mod async_method;
pub mod log_calls;
pub mod ordinary;

use crate::emit::AdapterRefs;
use ilweave_model::FieldRef;

/// Per-method context threaded through the rewriters.
#[derive(Debug)]
pub struct TraceCallContext<'a> {
    /// `Ns.Type::Method` signature string carried in every emitted call.
    pub signature: String,
    /// Adapter references derived from the weave configuration.
    pub adapter: &'a AdapterRefs,
    /// The declaring type's cached static logger field.
    pub logger_field: FieldRef,
    /// Configuration extras appended to enter/leave payloads.
    pub extras: Option<Vec<(String, String)>>,
}

impl TraceCallContext<'_> {
    /// Whether the emitted calls carry the extras array.
    pub fn has_extras(&self) -> bool {
        self.extras.is_some()
    }
}
