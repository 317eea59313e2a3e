//! The two-phase frame schedule.
//!
//! A frame runs `PreFrame → Phase1 → PhaseBoundary → Phase2 → PostFrame`.
//! Phase 1 reads: continuity, state reads, expression evaluation. Phase 2
//! writes state back, atomically with respect to this frame's readers.
//! The boundary is an explicit step so the debugger can break on it.

use phosphor_core::id::{ExprId, InstanceId, StateSlotId, ValueSlotId};

/// Which phase a step belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Phase {
    /// Instance-count solving, before any lane buffer exists.
    PreFrame,
    /// Continuity, state reads, and expression evaluation.
    Phase1,
    /// The marker between reads and write-backs.
    PhaseBoundary,
    /// State write-backs.
    Phase2,
    /// Render-pass assembly.
    PostFrame,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PreFrame => write!(f, "pre-frame"),
            Self::Phase1 => write!(f, "phase-1"),
            Self::PhaseBoundary => write!(f, "phase-boundary"),
            Self::Phase2 => write!(f, "phase-2"),
            Self::PostFrame => write!(f, "post-frame"),
        }
    }
}

/// One schedule step.
#[derive(Clone, Debug, PartialEq)]
pub enum Step {
    /// Evaluate a signal expression into its slot.
    EvalSignal {
        /// The expression.
        expr: ExprId,
        /// The destination slot.
        slot: ValueSlotId,
    },
    /// Materialize a field expression into its lane buffer.
    MaterializeField {
        /// The expression.
        expr: ExprId,
        /// The destination slot.
        slot: ValueSlotId,
        /// The instance sizing the buffer.
        instance: InstanceId,
    },
    /// Resolve an instance's lane count from its count expression.
    SolveInstance {
        /// The instance.
        instance: InstanceId,
        /// The already-evaluated count expression.
        expr: ExprId,
    },
    /// Copy a scalar state slot into its read expression's value slot.
    ReadScalarState {
        /// The state slot.
        state: StateSlotId,
        /// The destination value slot.
        slot: ValueSlotId,
    },
    /// Copy a per-lane state slot into its read expression's buffer.
    ReadFieldState {
        /// The state slot.
        state: StateSlotId,
        /// The destination value slot.
        slot: ValueSlotId,
        /// The instance sizing the buffer.
        instance: InstanceId,
    },
    /// Build the lane-identity mapping for a resized instance.
    ContinuityMapBuild {
        /// The instance.
        instance: InstanceId,
    },
    /// Apply the lane mapping to every field state slot on the instance.
    ContinuityApply {
        /// The instance.
        instance: InstanceId,
    },
    /// The read/write boundary marker.
    PhaseBoundary,
    /// Write a value slot back to a scalar state slot.
    WriteScalarState {
        /// The state slot.
        state: StateSlotId,
        /// The source value slot.
        from: ValueSlotId,
    },
    /// Write a lane buffer back to a per-lane state slot.
    WriteFieldState {
        /// The state slot.
        state: StateSlotId,
        /// The source value slot.
        from: ValueSlotId,
        /// The instance the state is bound to.
        instance: InstanceId,
    },
    /// Assemble one render pass.
    Render {
        /// Index into the program's pass table.
        pass: usize,
    },
}

/// A step tagged with its phase and originating block.
#[derive(Clone, Debug, PartialEq)]
pub struct ScheduledStep {
    /// The step.
    pub step: Step,
    /// The phase it runs in.
    pub phase: Phase,
    /// Index into the debug index's block table, when attributable.
    pub block: Option<u32>,
}

/// The ordered step list for one frame.
#[derive(Clone, Debug, Default)]
pub struct Schedule {
    /// Steps in execution order.
    pub steps: Vec<ScheduledStep>,
}

impl Schedule {
    /// Number of steps.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Whether the schedule is empty.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Index of the phase-boundary marker.
    pub fn boundary_index(&self) -> Option<usize> {
        self.steps
            .iter()
            .position(|s| matches!(s.step, Step::PhaseBoundary))
    }

    /// Verify phases are monotonically ordered. Used by backend
    /// self-checks and tests.
    pub fn phases_ordered(&self) -> bool {
        self.steps.windows(2).all(|w| w[0].phase <= w[1].phase)
    }
}
