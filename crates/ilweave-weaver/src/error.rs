//! Weaving errors

use ilweave_model::BodyError;
use thiserror::Error;

/// Errors aborting a module weave.
///
/// A weave is all-or-nothing: any of these propagates to the module level
/// and the caller discards the partially-rewritten module.
#[derive(Debug, Error)]
pub enum WeaveError {
    /// Redirecting a write to a static façade property cannot be expressed
    /// as an instance-logger call.
    #[error("cannot redirect static property setter {facade_type}::{method_name}")]
    StaticSetterNotSupported {
        /// Full name of the static logging façade type.
        facade_type: String,
        /// The setter method name (`set_*`).
        method_name: String,
    },

    /// An async method's state-machine marker names a type that is not in
    /// the module.
    #[error("state machine type '{type_name}' referenced by '{method}' not found in module")]
    StateMachineTypeNotFound {
        /// Full name from the marker attribute.
        type_name: String,
        /// The async method carrying the marker.
        method: String,
    },

    /// The kickoff body of an async method holds no local of the
    /// state-machine type, so the start tick cannot be threaded through.
    #[error("no local of state machine type '{type_name}' in method '{method}'")]
    StateMachineLocalNotFound {
        /// Full name of the state-machine type.
        type_name: String,
        /// The kickoff method being woven.
        method: String,
    },

    /// The state-machine type has no driver method to splice leave tracing
    /// into.
    #[error("state machine '{type_name}' has no MoveNext method")]
    MoveNextNotFound {
        /// Full name of the state-machine type.
        type_name: String,
    },

    /// Instruction stream edit against a stale or foreign handle.
    #[error("instruction stream edit failed: {0}")]
    Body(#[from] BodyError),
}

/// Result alias for weaving operations.
pub type WeaveResult<T> = Result<T, WeaveError>;
