//! ilweave rewriting engine
//!
//! Takes an in-memory compiled module, decides per method whether trace
//! instrumentation applies (via the filter subsystem) and splices
//! enter/leave tracing plus static log-call redirection into method bodies.
//! The transformation is single-threaded, in-place and fail-fast: one
//! [`ModuleWeaver::weave`] call either fully rewrites the module or errors
//! with the module in an undefined state the caller must discard.

pub mod classify;
pub mod emit;
pub mod error;
pub mod logger;
pub mod module_weaver;
pub mod rewrite;

pub use classify::{classify, MethodKind};
pub use emit::{AdapterRefs, EXCEPTION_SLOT, LOGGER_FIELD_NAME, START_TICK_FIELD_NAME};
pub use error::{WeaveError, WeaveResult};
pub use module_weaver::{ModuleWeaver, WeaveStats};
