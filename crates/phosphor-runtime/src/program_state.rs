//! Per-program runtime state and hot-swap migration.

use phosphor_arena::LaneBuffer;
use phosphor_compiler::program::{CompiledProgram, StateSlotKind};
use phosphor_core::value::Value;

use crate::continuity::LaneMapping;
use crate::session::{FieldStateStore, SessionState};

/// Dense slot arenas bound to exactly one compiled program.
///
/// Value slots are per-frame scratch; state slots persist across frames.
/// On hot-swap a fresh `ProgramState` is created for the new program,
/// primed from the session, and the previous one is discarded.
#[derive(Clone, Debug)]
pub struct ProgramState {
    /// Signal slot values, indexed by value-slot ID.
    pub scalars: Vec<Value>,
    /// Field slot buffers, indexed by value-slot ID. `None` outside a
    /// frame and for signal slots; borrowed from the pool during one.
    pub fields: Vec<Option<LaneBuffer>>,
    /// Scalar state values, indexed by state-slot ID.
    pub state_scalars: Vec<Value>,
    /// Per-lane state stores, indexed by state-slot ID. Empty stores for
    /// scalar slots keep the indices aligned.
    pub state_fields: Vec<FieldStateStore>,
    /// Current lane count per instance, solved each frame.
    pub counts: Vec<u32>,
    /// Pending lane mappings per instance, produced by the continuity
    /// map-build step and consumed by the apply step.
    pub pending_mappings: Vec<Option<LaneMapping>>,
}

impl ProgramState {
    /// Allocate state for a program, every slot at its declared initial.
    pub fn for_program(program: &CompiledProgram) -> Self {
        let values = program.slots.values.len();
        let mut state_scalars = Vec::with_capacity(program.slots.states.len());
        let mut state_fields = Vec::with_capacity(program.slots.states.len());
        for def in &program.slots.states {
            match def.kind {
                StateSlotKind::Scalar => {
                    state_scalars.push(def.initial);
                    state_fields.push(FieldStateStore::default());
                }
                StateSlotKind::FieldLane => {
                    state_scalars.push(Value::default());
                    // Lanes are sized on the first frame, when the
                    // instance count is known.
                    state_fields.push(FieldStateStore {
                        data: Vec::new(),
                        width: def.payload.components() as usize,
                        lanes: 0,
                    });
                }
            }
        }
        Self {
            scalars: vec![Value::default(); values],
            fields: (0..values).map(|_| None).collect(),
            state_scalars,
            state_fields,
            counts: vec![0; program.instances.len()],
            pending_mappings: vec![None; program.instances.len()],
        }
    }

    /// Memory held by persistent state, in bytes.
    pub fn state_memory_bytes(&self) -> usize {
        self.state_fields
            .iter()
            .map(FieldStateStore::memory_bytes)
            .sum::<usize>()
            + self.state_scalars.len() * std::mem::size_of::<Value>()
    }
}

/// Counters from one migration, reported as an informational event.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MigrationStats {
    /// Scalar slots that inherited a session value.
    pub scalars_migrated: usize,
    /// Field slots that inherited a session store.
    pub fields_migrated: usize,
    /// Slots initialized from their declared initial value.
    pub initialized: usize,
    /// Session entries with no counterpart in the new program.
    pub discarded: usize,
}

/// Flush a program's state into the session, keyed by stable state ID.
///
/// Called before discarding a program on hot-swap, so the next program
/// can claim the values.
pub fn flush_to_session(
    program: &CompiledProgram,
    state: &ProgramState,
    session: &mut SessionState,
) {
    for def in &program.slots.states {
        match def.kind {
            StateSlotKind::Scalar => {
                session.put_scalar(
                    def.state_id.clone(),
                    state.state_scalars[def.id.0 as usize],
                );
            }
            StateSlotKind::FieldLane => {
                session.put_field(
                    def.state_id.clone(),
                    state.state_fields[def.id.0 as usize].clone(),
                );
            }
        }
    }
}

/// Prime a fresh program state from the session.
///
/// For each state slot: a session entry with the same stable ID
/// migrates; otherwise the declared initial stands. Session entries with
/// no counterpart are counted as discarded (they stay in the session and
/// are harmless).
pub fn migrate_state(
    program: &CompiledProgram,
    state: &mut ProgramState,
    session: &SessionState,
) -> MigrationStats {
    let mut stats = MigrationStats::default();

    for def in &program.slots.states {
        match def.kind {
            StateSlotKind::Scalar => match session.scalar(&def.state_id) {
                Some(value) => {
                    state.state_scalars[def.id.0 as usize] = value;
                    stats.scalars_migrated += 1;
                }
                None => stats.initialized += 1,
            },
            StateSlotKind::FieldLane => match session.field(&def.state_id) {
                Some(store) => {
                    state.state_fields[def.id.0 as usize] = store.clone();
                    stats.fields_migrated += 1;
                }
                None => stats.initialized += 1,
            },
        }
    }

    let claimed = |id: &phosphor_core::id::StateId| {
        program.slots.states.iter().any(|s| &s.state_id == id)
    };
    stats.discarded += session.scalar_ids().filter(|id| !claimed(id)).count();
    stats.discarded += session.field_ids().filter(|id| !claimed(id)).count();
    stats
}
