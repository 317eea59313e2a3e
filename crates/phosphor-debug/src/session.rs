//! The step session: paused single-step execution with breakpoints.

use indexmap::IndexMap;

use phosphor_arena::BufferPool;
use phosphor_compiler::program::{CompiledProgram, Phase};
use phosphor_core::event::EventSink;
use phosphor_core::id::{BlockId, ElementId, PortId, StateSlotId, ValueSlotId};
use phosphor_core::ty::Cardinality;
use phosphor_core::value::Value;
use phosphor_engine::executor::{AnomalyRecord, FrameCursor, FrameResult, StepRecord};
use phosphor_runtime::{ProgramState, SessionState};

/// Capture settings for a step session.
#[derive(Clone, Copy, Debug)]
pub struct DebugSettings {
    /// Record written slot values on every snapshot.
    pub capture_writes: bool,
    /// Keep the final slot values for next-frame delta display.
    pub capture_previous: bool,
    /// Lanes included in a field slot's preview.
    pub preview_lanes: usize,
}

impl Default for DebugSettings {
    fn default() -> Self {
        Self {
            capture_writes: true,
            capture_previous: false,
            preview_lanes: 8,
        }
    }
}

/// A captured slot value.
#[derive(Clone, Debug, PartialEq)]
pub enum SlotValue {
    /// A signal value.
    Scalar(Value),
    /// A field buffer: lane count plus a bounded preview of the flat
    /// data.
    Field {
        /// Active lane count.
        lanes: usize,
        /// Components per lane.
        width: usize,
        /// The first `preview_lanes × width` components.
        preview: Vec<f32>,
    },
    /// An event slot and whether it fired this frame.
    Event {
        /// Whether the event was present.
        fired: bool,
    },
    /// An opaque object (domain handles).
    Object,
}

/// Pause conditions checked after every step.
pub enum Breakpoint {
    /// Pause at a schedule step index.
    StepIndex(usize),
    /// Pause on any step attributed to a block.
    Block(BlockId),
    /// Pause at the phase boundary.
    PhaseBoundary,
    /// Pause when a step writes a NaN or ±∞.
    Anomaly,
    /// Pause when a written signal slot satisfies a predicate.
    SlotCondition {
        /// The watched slot.
        slot: ValueSlotId,
        /// The predicate over its new value.
        predicate: Box<dyn Fn(Value) -> bool>,
    },
    /// Pause when a written slot moved more than `threshold` from the
    /// previous frame's value (requires `capture_previous`).
    ValueDelta {
        /// The watched slot.
        slot: ValueSlotId,
        /// Absolute delta that triggers the pause.
        threshold: f32,
    },
}

impl std::fmt::Debug for Breakpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::StepIndex(i) => write!(f, "StepIndex({i})"),
            Self::Block(id) => write!(f, "Block({id})"),
            Self::PhaseBoundary => write!(f, "PhaseBoundary"),
            Self::Anomaly => write!(f, "Anomaly"),
            Self::SlotCondition { slot, .. } => write!(f, "SlotCondition({slot})"),
            Self::ValueDelta { slot, threshold } => {
                write!(f, "ValueDelta({slot}, {threshold})")
            }
        }
    }
}

/// One step's observation.
#[derive(Clone, Debug)]
pub struct StepSnapshot {
    /// Step index within the schedule.
    pub index: usize,
    /// Total steps in the schedule.
    pub total: usize,
    /// The step's phase.
    pub phase: Phase,
    /// The attributed block's stable ID, when known.
    pub block: Option<BlockId>,
    /// The attributed block's display name, when known.
    pub block_name: Option<String>,
    /// The port whose slot this step wrote, when a single one is known.
    pub port: Option<PortId>,
    /// Written value slots and their captured values.
    pub written_value_slots: IndexMap<ValueSlotId, SlotValue>,
    /// Written state slots.
    pub written_state_slots: Vec<StateSlotId>,
    /// Anomalies detected in this step's writes.
    pub anomalies: Vec<AnomalyRecord>,
    /// Previous-frame values of the written slots, when captured.
    pub previous_frame_values: Option<IndexMap<ValueSlotId, SlotValue>>,
}

/// A paused, single-step execution of one frame.
///
/// Stepping writes exactly what full execution writes; the session only
/// adds observation.
pub struct StepSession<'a> {
    program: &'a CompiledProgram,
    cursor: FrameCursor<'a>,
    settings: DebugSettings,
    breakpoints: Vec<Breakpoint>,
    /// Written values this frame, kept for `final_values`.
    written: IndexMap<ValueSlotId, SlotValue>,
    /// Previous frame's final values, for delta display and
    /// `ValueDelta` breakpoints.
    previous: Option<IndexMap<ValueSlotId, SlotValue>>,
}

impl<'a> StepSession<'a> {
    /// Begin a session over one frame.
    pub fn new(
        program: &'a CompiledProgram,
        state: &'a mut ProgramState,
        session: &'a mut SessionState,
        pool: &'a mut BufferPool,
        sink: &'a dyn EventSink,
        t_abs_ms: f64,
        settings: DebugSettings,
    ) -> Self {
        let cursor =
            FrameCursor::new(program, state, session, pool, sink, None, t_abs_ms).with_capture();
        Self {
            program,
            cursor,
            settings,
            breakpoints: Vec::new(),
            written: IndexMap::new(),
            previous: None,
        }
    }

    /// Supply the previous frame's final values for delta display.
    pub fn with_previous(mut self, previous: IndexMap<ValueSlotId, SlotValue>) -> Self {
        self.previous = Some(previous);
        self
    }

    /// Add a breakpoint.
    pub fn add_breakpoint(&mut self, breakpoint: Breakpoint) {
        self.breakpoints.push(breakpoint);
    }

    /// The pre-frame marker snapshot: nothing executed yet.
    pub fn start_frame(&self) -> StepSnapshot {
        StepSnapshot {
            index: 0,
            total: self.cursor.total_steps(),
            phase: Phase::PreFrame,
            block: None,
            block_name: None,
            port: None,
            written_value_slots: IndexMap::new(),
            written_state_slots: Vec::new(),
            anomalies: Vec::new(),
            previous_frame_values: self.previous.clone(),
        }
    }

    /// Execute one step. `None` once the schedule is exhausted.
    pub fn step_next(&mut self) -> Option<StepSnapshot> {
        let index = self.cursor.position();
        let scheduled = self.program.schedule.steps.get(index)?.clone();
        let record = self.cursor.step()?;
        Some(self.observe(&scheduled.phase, scheduled.block, index, record))
    }

    /// Run until a breakpoint triggers, returning the snapshot of the
    /// triggering step. `None` when the frame finished first.
    pub fn run_to_breakpoint(&mut self) -> Option<StepSnapshot> {
        while let Some(snapshot) = self.step_next() {
            if self.triggers(&snapshot) {
                return Some(snapshot);
            }
        }
        None
    }

    /// Run to the end of the current phase, returning that phase's last
    /// snapshot. `None` when the frame was already done.
    pub fn run_to_phase_end(&mut self) -> Option<StepSnapshot> {
        let current = self
            .program
            .schedule
            .steps
            .get(self.cursor.position())?
            .phase;
        let mut last = None;
        while let Some(next) = self.program.schedule.steps.get(self.cursor.position()) {
            if next.phase != current {
                break;
            }
            last = self.step_next();
        }
        last
    }

    /// Run the rest of the frame and return its result.
    pub fn finish_frame(mut self) -> (FrameResult, IndexMap<ValueSlotId, SlotValue>) {
        while self.step_next().is_some() {}
        let written = self.written;
        (self.cursor.finish(), written)
    }

    /// Lane identities of the instance backing a field slot:
    /// `(instance label, element id)` per lane.
    pub fn lane_identities(&self, slot: ValueSlotId) -> Vec<(String, ElementId)> {
        let Some(def) = self.program.slots.value(slot) else {
            return Vec::new();
        };
        let Some(instance) = def.instance else {
            return Vec::new();
        };
        let Some(instance_def) = self.program.instance(instance) else {
            return Vec::new();
        };
        let Some(table) = self.cursor.session_lane_table(&instance_def.stable_key) else {
            return Vec::new();
        };
        table
            .element_ids()
            .iter()
            .map(|&id| (instance_def.label.clone(), id))
            .collect()
    }

    // ── Internals ──────────────────────────────────────────────

    fn observe(
        &mut self,
        phase: &Phase,
        block_index: Option<u32>,
        index: usize,
        record: StepRecord,
    ) -> StepSnapshot {
        let block = block_index.and_then(|i| self.program.debug.block_at(i)).cloned();
        let block_name = block_index
            .and_then(|i| self.program.debug.display_name_at(i))
            .map(str::to_string);
        let port = record
            .written_value_slots
            .first()
            .and_then(|&slot| self.program.debug.port_of(slot))
            .map(|p| p.port.clone());

        let mut written_value_slots = IndexMap::new();
        if self.settings.capture_writes {
            for &slot in &record.written_value_slots {
                let value = self.capture_slot(slot);
                self.written.insert(slot, value.clone());
                written_value_slots.insert(slot, value);
            }
        }

        let previous_frame_values = self.previous.as_ref().map(|previous| {
            record
                .written_value_slots
                .iter()
                .filter_map(|slot| previous.get(slot).map(|v| (*slot, v.clone())))
                .collect()
        });

        StepSnapshot {
            index,
            total: self.cursor.total_steps(),
            phase: *phase,
            block,
            block_name,
            port,
            written_value_slots,
            written_state_slots: record.written_state_slots.to_vec(),
            anomalies: record.anomalies,
            previous_frame_values,
        }
    }

    fn capture_slot(&self, slot: ValueSlotId) -> SlotValue {
        let Some(def) = self.program.slots.value(slot) else {
            return SlotValue::Object;
        };
        match def.cardinality {
            Cardinality::Signal => SlotValue::Scalar(
                self.cursor.scalar(slot).unwrap_or_default(),
            ),
            Cardinality::Field => match self.cursor.field(slot) {
                Some(buf) => {
                    let keep = self.settings.preview_lanes.min(buf.lanes()) * buf.width();
                    SlotValue::Field {
                        lanes: buf.lanes(),
                        width: buf.width(),
                        preview: buf.as_slice()[..keep].to_vec(),
                    }
                }
                None => SlotValue::Field {
                    lanes: 0,
                    width: 0,
                    preview: Vec::new(),
                },
            },
            Cardinality::Event => SlotValue::Event { fired: false },
            Cardinality::Static => SlotValue::Object,
        }
    }

    fn triggers(&self, snapshot: &StepSnapshot) -> bool {
        self.breakpoints.iter().any(|bp| match bp {
            Breakpoint::StepIndex(i) => snapshot.index == *i,
            Breakpoint::Block(id) => snapshot.block.as_ref() == Some(id),
            Breakpoint::PhaseBoundary => snapshot.phase == Phase::PhaseBoundary,
            Breakpoint::Anomaly => !snapshot.anomalies.is_empty(),
            Breakpoint::SlotCondition { slot, predicate } => {
                match snapshot.written_value_slots.get(slot) {
                    Some(SlotValue::Scalar(v)) => predicate(*v),
                    _ => false,
                }
            }
            Breakpoint::ValueDelta { slot, threshold } => {
                let (Some(SlotValue::Scalar(now)), Some(previous)) = (
                    snapshot.written_value_slots.get(slot),
                    self.previous.as_ref(),
                ) else {
                    return false;
                };
                match previous.get(slot) {
                    Some(SlotValue::Scalar(before)) => {
                        (now.x() - before.x()).abs() > *threshold
                    }
                    _ => false,
                }
            }
        })
    }
}
