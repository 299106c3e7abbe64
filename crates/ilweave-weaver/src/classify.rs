//! Method classification
//!
//! Async-transformed methods need a different rewriting strategy because
//! the user's code physically lives in a compiler-generated state-machine
//! type. Everything else (constructors, accessors, generic methods) weaves
//! through the ordinary strategy; those distinctions only matter to the
//! filter.

use ilweave_model::MethodDef;

/// Which body-rewriting strategy applies to a method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MethodKind {
    /// Rewrite the method's own body.
    Ordinary,
    /// Enter tracing goes into the kickoff body, leave tracing into the
    /// generated state machine's driver method.
    Async {
        /// Full name of the generated state-machine type.
        state_machine_type: String,
    },
}

/// Classify a method by its compiler markers.
pub fn classify(method: &MethodDef) -> MethodKind {
    match method.state_machine_type() {
        Some(state_machine_type) => MethodKind::Async { state_machine_type },
        None => MethodKind::Ordinary,
    }
}
