//! The compiled program: the immutable output of a successful compile.

pub mod debug_index;
pub mod expr;
pub mod schedule;
pub mod slots;

pub use debug_index::DebugIndex;
pub use expr::{ExprNode, ValueExpr};
pub use schedule::{Phase, Schedule, ScheduledStep, Step};
pub use slots::{SlotTable, StateSlotDef, StateSlotKind, ValueSlotDef};

use phosphor_core::id::{BlockId, CompileId, ExprId, InstanceId, Revision, ValueSlotId};
use phosphor_core::op::PrimitiveKind;
use phosphor_core::MappingKind;

/// How an instance assigns element identity to its lanes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ElementIdMode {
    /// Monotonic IDs synthesized by the session's lane table; resizes
    /// map by surviving ID.
    Synthesized,
    /// No identity: resizes map positionally over the shared prefix.
    Positional,
    /// No continuity: every resize reinitializes all lanes.
    Ephemeral,
}

impl ElementIdMode {
    /// The lane-mapping strategy this mode yields on resize.
    pub fn mapping_kind(&self) -> MappingKind {
        match self {
            Self::Synthesized => MappingKind::ById,
            Self::Positional => MappingKind::Prefix,
            Self::Ephemeral => MappingKind::None,
        }
    }
}

/// One instance domain of a program.
#[derive(Clone, Debug, PartialEq)]
pub struct InstanceDef {
    /// Program-local index.
    pub id: InstanceId,
    /// Stable cross-program key: the declaring domain block's ID.
    pub stable_key: BlockId,
    /// Display label for events and lane-identity queries.
    pub label: String,
    /// The signal expression producing the lane count, evaluated once
    /// per frame in `PreFrame`.
    pub count_expr: ExprId,
    /// How lanes acquire element identity.
    pub element_mode: ElementIdMode,
}

/// One instanced render pass emitted per frame.
#[derive(Clone, Debug, PartialEq)]
pub struct RenderPassDef {
    /// The render-sink block this pass was emitted for.
    pub sink: BlockId,
    /// Primitive drawn per instance.
    pub primitive: PrimitiveKind,
    /// The instance supplying the count.
    pub instance: InstanceId,
    /// Field slot holding per-instance positions (vec2).
    pub position: ValueSlotId,
    /// Field slot holding per-instance colors, when wired.
    pub color: Option<ValueSlotId>,
    /// Field slot holding per-instance shape/size values, when wired.
    pub shape: Option<ValueSlotId>,
    /// Uniform scale applied to the whole pass.
    pub scale: f32,
}

/// The immutable output of a successful compile.
///
/// Owned by the runtime after hot-swap; never mutated after emission.
#[derive(Clone, Debug)]
pub struct CompiledProgram {
    /// Revision of the patch this program was compiled from.
    pub revision: Revision,
    /// The compile invocation that produced it.
    pub compile_id: CompileId,
    /// The expression DAG, indexed by [`ExprId`].
    pub exprs: Vec<ExprNode>,
    /// Value and state slot tables.
    pub slots: SlotTable,
    /// The two-phase frame schedule.
    pub schedule: Schedule,
    /// Instance domains, indexed by [`InstanceId`]. Count-resolution
    /// order lives in the schedule's `SolveInstance` steps.
    pub instances: Vec<InstanceDef>,
    /// Render passes, in emission order.
    pub passes: Vec<RenderPassDef>,
    /// Identity maps for debugging.
    pub debug: DebugIndex,
}

impl CompiledProgram {
    /// Look up an expression node.
    pub fn expr(&self, id: ExprId) -> Option<&ExprNode> {
        self.exprs.get(id.0 as usize)
    }

    /// Look up an instance definition.
    pub fn instance(&self, id: InstanceId) -> Option<&InstanceDef> {
        self.instances.get(id.0 as usize)
    }

    /// Find an instance by its stable key.
    pub fn instance_by_key(&self, key: &BlockId) -> Option<&InstanceDef> {
        self.instances.iter().find(|i| &i.stable_key == key)
    }
}
