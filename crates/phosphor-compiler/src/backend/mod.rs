//! The backend: normalized patch → [`CompiledProgram`].
//!
//! Runs only when the frontend reports `backend_ready`. Any internal
//! inconsistency here is a compiler bug, not an author error: the
//! compile aborts with a [`BackendError`] naming the failing pass, and
//! the caller keeps its previously running program.

pub mod lower;
mod sched;

use phosphor_core::diag::BackendError;
use phosphor_core::id::{CompileId, Revision};

use crate::frontend::card::CardMap;
use crate::frontend::norm::NormalizedPatch;
use crate::program::CompiledProgram;

/// Run the backend over the frontend's artifacts.
pub fn run(
    norm: &NormalizedPatch,
    cards: &CardMap,
    revision: Revision,
    compile_id: CompileId,
) -> Result<CompiledProgram, BackendError> {
    let lowered = lower::lower(norm, cards)?;
    let schedule = sched::build(&lowered)?;
    Ok(CompiledProgram {
        revision,
        compile_id,
        exprs: lowered.exprs,
        slots: lowered.slots,
        schedule,
        instances: lowered.instances,
        passes: lowered.passes,
        debug: lowered.debug,
    })
}
