//! The frame executor: a single-step cursor over one frame's schedule.
//!
//! [`FrameCursor`] executes schedule steps one at a time; full-speed
//! playback ([`execute_frame`]) is just the cursor run to completion.
//! Both paths share every evaluation routine, so the step debugger sees
//! bitwise the same writes as normal execution.
//!
//! Runtime anomalies (NaN/±∞) are counted, optionally recorded, and
//! never abort the frame. Buffer cleanup is unconditional: whatever
//! happens mid-frame, every non-pass buffer returns to the pool in
//! [`FrameCursor::finish`].

use std::time::Instant;

use indexmap::IndexMap;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use smallvec::SmallVec;

use phosphor_arena::{BufferPool, LaneBuffer};
use phosphor_compiler::program::{CompiledProgram, Step, StateSlotKind, ValueExpr};
use phosphor_core::diag::AnomalyKind;
use phosphor_core::event::{EngineEvent, EventSink};
use phosphor_core::id::{BlockId, ElementId, ExprId, InstanceId, PortId, StateSlotId, ValueSlotId};
use phosphor_core::op::{LaneOp, GOLDEN_ANGLE};
use phosphor_core::tap::DebugTap;
use phosphor_core::value::Value;
use phosphor_runtime::{LaneSource, LaneTable, ProgramState, SessionState};

use crate::metrics::FrameMetrics;
use crate::render::{RenderFrame, RenderPass};

/// One detected NaN/±∞ write.
#[derive(Clone, Debug, PartialEq)]
pub struct AnomalyRecord {
    /// The slot that received the anomaly.
    pub slot: ValueSlotId,
    /// The producing block, when the debug index knows it.
    pub block: Option<BlockId>,
    /// The port whose value the slot carries, when known.
    pub port: Option<PortId>,
    /// NaN, +Inf, or −Inf.
    pub kind: AnomalyKind,
    /// The offending lane, for field slots.
    pub lane: Option<usize>,
}

/// What one executed step wrote.
#[derive(Clone, Debug, Default)]
pub struct StepRecord {
    /// Index of the step within the schedule.
    pub index: usize,
    /// Value slots written by the step.
    pub written_value_slots: SmallVec<[ValueSlotId; 2]>,
    /// State slots written by the step.
    pub written_state_slots: SmallVec<[StateSlotId; 2]>,
    /// Anomalies detected in this step's writes (populated when capture
    /// is enabled; counted either way).
    pub anomalies: Vec<AnomalyRecord>,
}

/// The result of a completed frame.
#[derive(Debug)]
pub struct FrameResult {
    /// The render description. Buffers stay valid until recycled.
    pub frame: RenderFrame,
    /// Timing and resource metrics.
    pub metrics: FrameMetrics,
}

/// A single-step executor over one frame.
pub struct FrameCursor<'a> {
    program: &'a CompiledProgram,
    state: &'a mut ProgramState,
    session: &'a mut SessionState,
    pool: &'a mut BufferPool,
    sink: &'a dyn EventSink,
    tap: Option<&'a mut dyn DebugTap>,
    t_abs_ms: f64,
    capture: bool,
    next_step: usize,
    emitted_passes: Vec<usize>,
    anomaly_count: u64,
    buffers_acquired: u64,
    started: Instant,
    /// Minimum milliseconds between domain-change events per instance.
    domain_event_min_interval_ms: f64,
}

impl<'a> FrameCursor<'a> {
    /// Start a frame at the given absolute time.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        program: &'a CompiledProgram,
        state: &'a mut ProgramState,
        session: &'a mut SessionState,
        pool: &'a mut BufferPool,
        sink: &'a dyn EventSink,
        tap: Option<&'a mut dyn DebugTap>,
        t_abs_ms: f64,
    ) -> Self {
        Self {
            program,
            state,
            session,
            pool,
            sink,
            tap,
            t_abs_ms,
            capture: false,
            next_step: 0,
            emitted_passes: Vec::new(),
            anomaly_count: 0,
            buffers_acquired: 0,
            started: Instant::now(),
            domain_event_min_interval_ms: 250.0,
        }
    }

    /// Enable detailed anomaly records on step results (the debugger
    /// turns this on; playback leaves it off and only counts).
    pub fn with_capture(mut self) -> Self {
        self.capture = true;
        self
    }

    /// Total number of schedule steps.
    pub fn total_steps(&self) -> usize {
        self.program.schedule.len()
    }

    /// Index of the next step to execute.
    pub fn position(&self) -> usize {
        self.next_step
    }

    /// Whether every step has executed.
    pub fn is_done(&self) -> bool {
        self.next_step >= self.program.schedule.len()
    }

    /// The absolute frame time.
    pub fn t_abs_ms(&self) -> f64 {
        self.t_abs_ms
    }

    /// Read a signal slot's current value.
    pub fn scalar(&self, slot: ValueSlotId) -> Option<Value> {
        self.state.scalars.get(slot.0 as usize).copied()
    }

    /// Read a field slot's current buffer.
    pub fn field(&self, slot: ValueSlotId) -> Option<&LaneBuffer> {
        self.state.fields.get(slot.0 as usize)?.as_ref()
    }

    /// The session's lane table for an instance's stable key, for debug
    /// observers.
    pub fn session_lane_table(&self, key: &BlockId) -> Option<&LaneTable> {
        self.session.lane_table(key)
    }

    /// Execute the next step. Returns `None` when the frame is done.
    pub fn step(&mut self) -> Option<StepRecord> {
        let scheduled = self.program.schedule.steps.get(self.next_step)?.clone();
        let index = self.next_step;
        self.next_step += 1;

        let mut record = StepRecord {
            index,
            ..StepRecord::default()
        };

        match scheduled.step {
            Step::EvalSignal { expr, slot } => {
                let value = self.eval_signal(expr);
                self.write_scalar(slot, value, &mut record);
            }
            Step::MaterializeField {
                expr,
                slot,
                instance,
            } => {
                self.materialize_field(expr, slot, instance);
                self.note_field_write(slot, &mut record);
            }
            Step::SolveInstance { instance, expr } => {
                let slot = self.program.exprs[expr.0 as usize].slot;
                let raw = self.state.scalars[slot.0 as usize].x();
                let count = if raw.is_finite() { raw.max(0.0) as u32 } else { 0 };
                self.state.counts[instance.0 as usize] = count;
            }
            Step::ReadScalarState { state, slot } => {
                let value = self.state.state_scalars[state.0 as usize];
                self.write_scalar(slot, value, &mut record);
            }
            Step::ReadFieldState {
                state,
                slot,
                instance,
            } => {
                self.read_field_state(state, slot, instance);
                self.note_field_write(slot, &mut record);
            }
            Step::ContinuityMapBuild { instance } => {
                self.continuity_map_build(instance);
            }
            Step::ContinuityApply { instance } => {
                self.continuity_apply(instance);
                for def in &self.program.slots.states {
                    if def.kind == StateSlotKind::FieldLane && def.instance == Some(instance) {
                        record.written_state_slots.push(def.id);
                    }
                }
            }
            Step::PhaseBoundary => {}
            Step::WriteScalarState { state, from } => {
                self.state.state_scalars[state.0 as usize] =
                    self.state.scalars[from.0 as usize];
                record.written_state_slots.push(state);
            }
            Step::WriteFieldState {
                state,
                from,
                instance,
            } => {
                let count = self.state.counts[instance.0 as usize] as usize;
                if let Some(buf) = self.state.fields[from.0 as usize].as_ref() {
                    let store = &mut self.state.state_fields[state.0 as usize];
                    store.width = buf.width();
                    store.lanes = count.min(buf.lanes());
                    store.data.clear();
                    store.data.extend_from_slice(buf.as_slice());
                }
                record.written_state_slots.push(state);
            }
            Step::Render { pass } => {
                self.emitted_passes.push(pass);
            }
        }

        Some(record)
    }

    /// Run the remaining steps and assemble the frame.
    ///
    /// Cleanup is unconditional: every field buffer not moved into a
    /// render pass is released back to the pool.
    pub fn finish(mut self) -> FrameResult {
        while self.step().is_some() {}

        // Duplicate pass-slot references get pool-backed copies so the
        // grant/return ledger stays balanced.
        let mut usage: IndexMap<ValueSlotId, usize> = IndexMap::new();
        for &i in &self.emitted_passes {
            let def = &self.program.passes[i];
            for slot in [Some(def.position), def.color, def.shape].into_iter().flatten() {
                *usage.entry(slot).or_insert(0) += 1;
            }
        }

        let emitted = std::mem::take(&mut self.emitted_passes);
        let mut passes = Vec::with_capacity(emitted.len());
        for i in emitted {
            let def = self.program.passes[i].clone();
            let count = self.state.counts[def.instance.0 as usize];
            let Some(position) = self.take_pass_buffer(def.position, &mut usage) else {
                continue;
            };
            let color = def.color.and_then(|s| self.take_pass_buffer(s, &mut usage));
            let shape = def.shape.and_then(|s| self.take_pass_buffer(s, &mut usage));
            passes.push(RenderPass {
                primitive: def.primitive,
                count,
                position,
                color,
                shape,
                scale: def.scale,
            });
        }

        // Unconditional drain of everything still borrowed.
        for slot in self.state.fields.iter_mut() {
            if let Some(buf) = slot.take() {
                self.pool.release(buf);
            }
        }

        let instance_counts = self
            .program
            .instances
            .iter()
            .map(|def| (def.label.clone(), self.state.counts[def.id.0 as usize]))
            .collect();

        let metrics = FrameMetrics {
            total_us: self.started.elapsed().as_micros() as u64,
            steps: self.next_step,
            anomalies: self.anomaly_count,
            buffers_acquired: self.buffers_acquired,
            instance_counts,
            state_bytes: self.state.state_memory_bytes(),
            pool_bytes: self.pool.memory_bytes(),
        };

        FrameResult {
            frame: RenderFrame {
                revision: self.program.revision,
                t_abs_ms: self.t_abs_ms,
                passes,
            },
            metrics,
        }
    }

    // ── Pass buffer hand-off ───────────────────────────────────

    /// Move a slot's buffer into a render pass. The last reference takes
    /// the buffer itself; earlier ones get a pooled copy.
    fn take_pass_buffer(
        &mut self,
        slot: ValueSlotId,
        usage: &mut IndexMap<ValueSlotId, usize>,
    ) -> Option<LaneBuffer> {
        let remaining = usage.get_mut(&slot)?;
        *remaining -= 1;
        let last_use = *remaining == 0;
        if last_use {
            self.state.fields[slot.0 as usize].take()
        } else {
            let src = self.state.fields[slot.0 as usize].as_ref()?;
            let lanes = src.lanes();
            let payload = src.payload();
            let data: Vec<f32> = src.as_slice().to_vec();
            self.buffers_acquired += 1;
            let mut copy = self.pool.acquire(payload, lanes);
            copy.as_mut_slice().copy_from_slice(&data);
            Some(copy)
        }
    }

    // ── Scalar evaluation ──────────────────────────────────────

    /// The current value of an expression's slot.
    fn arg_value(&self, expr: ExprId) -> Value {
        let slot = self.program.exprs[expr.0 as usize].slot;
        self.state.scalars[slot.0 as usize]
    }

    /// Evaluate a signal expression. Arguments were evaluated by earlier
    /// steps; state reads were satisfied by explicit read steps.
    fn eval_signal(&self, expr: ExprId) -> Value {
        let node = &self.program.exprs[expr.0 as usize];
        match &node.expr {
            ValueExpr::Const(v) => *v,
            ValueExpr::Time { func, period_ms } => {
                Value::scalar(func.apply(self.t_abs_ms, *period_ms))
            }
            ValueExpr::Map { op, args } => {
                let values: SmallVec<[Value; 4]> =
                    args.iter().map(|&a| self.arg_value(a)).collect();
                op.apply(&values)
            }
            ValueExpr::Adapt { conv, arg } => {
                self.arg_value(*arg).map(|x| conv.apply(x))
            }
            ValueExpr::Reduce { op, arg } => {
                let slot = self.program.exprs[arg.0 as usize].slot;
                match self.state.fields[slot.0 as usize].as_ref() {
                    Some(buf) => {
                        let mut acc = op.init();
                        for i in 0..buf.lanes() {
                            acc = op.accum(acc, buf.lane(i)[0]);
                        }
                        Value::scalar(op.finish(acc, buf.lanes()))
                    }
                    None => Value::scalar(op.finish(op.init(), 0)),
                }
            }
            ValueExpr::ReadScalarState { state } => {
                self.state.state_scalars[state.0 as usize]
            }
            // Field expressions never reach signal evaluation; the
            // schedule routes them to materialization.
            _ => Value::default(),
        }
    }

    fn write_scalar(&mut self, slot: ValueSlotId, value: Value, record: &mut StepRecord) {
        self.state.scalars[slot.0 as usize] = value;
        record.written_value_slots.push(slot);
        if !value.is_finite() {
            self.anomaly_count += 1;
            if self.capture {
                let kind = value
                    .comps()
                    .iter()
                    .find_map(|&c| AnomalyKind::classify(c))
                    .unwrap_or(AnomalyKind::NaN);
                record.anomalies.push(self.anomaly(slot, kind, None));
            }
        }
        if let Some(tap) = self.tap.as_deref_mut() {
            tap.record_slot_value(slot, value);
        }
    }

    fn anomaly(&self, slot: ValueSlotId, kind: AnomalyKind, lane: Option<usize>) -> AnomalyRecord {
        AnomalyRecord {
            slot,
            block: self.program.debug.block_of_slot(slot).cloned(),
            port: self.program.debug.port_of(slot).map(|p| p.port.clone()),
            kind,
            lane,
        }
    }

    fn note_field_write(&mut self, slot: ValueSlotId, record: &mut StepRecord) {
        record.written_value_slots.push(slot);
        let mut anomalies = Vec::new();
        if let Some(buf) = self.state.fields[slot.0 as usize].as_ref() {
            let width = buf.width().max(1);
            for (i, &c) in buf.as_slice().iter().enumerate() {
                if let Some(kind) = AnomalyKind::classify(c) {
                    self.anomaly_count += 1;
                    if self.capture {
                        anomalies.push((i / width, kind));
                    }
                }
            }
        }
        for (lane, kind) in anomalies {
            let rec = self.anomaly(slot, kind, Some(lane));
            record.anomalies.push(rec);
        }
        if let Some(buf) = self.state.fields[slot.0 as usize].as_ref() {
            let (lanes, width) = (buf.lanes(), buf.width());
            let data: &[f32] = buf.as_slice();
            // The tap borrow is disjoint from the buffer borrow, but the
            // borrow checker cannot see that through `self`; copy out
            // only when a tap is actually attached.
            if self.tap.is_some() {
                let copy = data.to_vec();
                if let Some(tap) = self.tap.as_deref_mut() {
                    tap.record_field_value(slot, lanes, width, &copy);
                }
            }
        }
    }

    // ── Field materialization ──────────────────────────────────

    /// Acquire (or re-size) the buffer backing a field slot.
    fn acquire_field(&mut self, slot: ValueSlotId, lanes: usize) {
        let payload = self.program.slots.values[slot.0 as usize].payload;
        if self.state.fields[slot.0 as usize].is_none() {
            self.buffers_acquired += 1;
            self.state.fields[slot.0 as usize] = Some(self.pool.acquire(payload, lanes));
        } else if let Some(buf) = self.state.fields[slot.0 as usize].as_mut() {
            buf.reset(lanes);
        }
    }

    /// Element IDs for an instance, falling back to positional identity
    /// when the lane table has not caught up (pre-frame materialization
    /// for a later instance's count).
    fn element_id(&self, instance: InstanceId, lane: usize) -> ElementId {
        let def = &self.program.instances[instance.0 as usize];
        self.session
            .lane_table(&def.stable_key)
            .and_then(|t| t.element_id(lane))
            .unwrap_or(ElementId(lane as u64))
    }

    fn materialize_field(&mut self, expr: ExprId, slot: ValueSlotId, instance: InstanceId) {
        let count = self.state.counts[instance.0 as usize] as usize;
        self.acquire_field(slot, count);
        let node = self.program.exprs[expr.0 as usize].expr.clone();

        // Split the destination buffer out of the slot array so lane
        // loops can read sibling slots while writing it.
        let Some(mut dest) = self.state.fields[slot.0 as usize].take() else {
            return;
        };

        match &node {
            ValueExpr::FieldLift { arg, .. } => {
                let value = self.arg_value(*arg);
                for i in 0..count {
                    dest.write_lane(i, value.comps());
                }
            }
            ValueExpr::FieldMap { op, args, .. } => {
                for i in 0..count {
                    let values: SmallVec<[Value; 4]> = args
                        .iter()
                        .map(|&a| self.lane_arg(a, i))
                        .collect();
                    let out = op.apply(&values);
                    dest.write_lane(i, out.comps());
                }
            }
            ValueExpr::Lane { op, args, .. } => {
                let broadcast: SmallVec<[Value; 2]> =
                    args.iter().map(|&a| self.arg_value(a)).collect();
                for i in 0..count {
                    let v = self.lane_generate(*op, instance, i, count, &broadcast);
                    dest.write_lane(i, &[v]);
                }
            }
            ValueExpr::Adapt { conv, arg } => {
                let arg_slot = self.program.exprs[arg.0 as usize].slot;
                match self.state.fields[arg_slot.0 as usize].as_ref() {
                    Some(src) => {
                        for i in 0..count.min(src.lanes()) {
                            let lane = src.lane(i);
                            let converted: SmallVec<[f32; 4]> =
                                lane.iter().map(|&x| conv.apply(x)).collect();
                            dest.write_lane(i, &converted);
                        }
                    }
                    None => {
                        // Signal argument adapted then lifted.
                        let value = self.arg_value(*arg).map(|x| conv.apply(x));
                        for i in 0..count {
                            dest.write_lane(i, value.comps());
                        }
                    }
                }
            }
            // Scalar expressions and state reads are never scheduled as
            // materialization.
            _ => {}
        }

        self.state.fields[slot.0 as usize] = Some(dest);
    }

    /// One lane's value for a field-map argument: the argument's lane
    /// when it is a field, its broadcast value otherwise.
    fn lane_arg(&self, arg: ExprId, lane: usize) -> Value {
        let slot = self.program.exprs[arg.0 as usize].slot;
        match self.state.fields[slot.0 as usize].as_ref() {
            Some(buf) if lane < buf.lanes() => Value::from_comps(buf.lane(lane)),
            Some(_) => Value::default(),
            None => self.state.scalars[slot.0 as usize],
        }
    }

    /// Evaluate one lane of a generator.
    fn lane_generate(
        &self,
        op: LaneOp,
        instance: InstanceId,
        lane: usize,
        count: usize,
        args: &[Value],
    ) -> f32 {
        match op {
            LaneOp::Index => lane as f32,
            LaneOp::Norm01 => lane as f32 / (count.saturating_sub(1).max(1)) as f32,
            LaneOp::GoldenAngle => {
                let scale = args.first().map(Value::x).unwrap_or(1.0);
                lane as f32 * GOLDEN_ANGLE * scale
            }
            LaneOp::RadiusSqrt => {
                let max_radius = args.first().map(Value::x).unwrap_or(1.0);
                let t = lane as f32 / (count.saturating_sub(1).max(1)) as f32;
                max_radius * t.sqrt()
            }
            LaneOp::Jitter { seed } => {
                let amount = args.first().map(Value::x).unwrap_or(0.0);
                let time = args.get(1).map(Value::x).unwrap_or(0.0);
                // The per-lane stream folds the broadcast time term into
                // the seed; time is absolute milliseconds, so a lane's
                // jitter is continuous across phase wraps.
                let element = self.element_id(instance, lane);
                let folded = seed ^ element.0 ^ (time as i64 as u64);
                let mut rng = ChaCha8Rng::seed_from_u64(folded);
                rng.random_range(-1.0f32..1.0) * amount
            }
        }
    }

    // ── State and continuity ───────────────────────────────────

    fn read_field_state(&mut self, state: StateSlotId, slot: ValueSlotId, instance: InstanceId) {
        let count = self.state.counts[instance.0 as usize] as usize;
        self.acquire_field(slot, count);
        let Some(mut dest) = self.state.fields[slot.0 as usize].take() else {
            return;
        };
        {
            let store = &self.state.state_fields[state.0 as usize];
            let initial = self.program.slots.states[state.0 as usize].initial;
            for i in 0..count {
                if i < store.lanes {
                    dest.write_lane(i, store.lane(i));
                } else {
                    dest.write_lane(i, initial.comps());
                }
            }
        }
        self.state.fields[slot.0 as usize] = Some(dest);
    }

    /// Build (and if needed emit) the lane mapping for this frame's
    /// count, ahead of any state read.
    fn continuity_map_build(&mut self, instance: InstanceId) {
        let program = self.program;
        let def = &program.instances[instance.0 as usize];
        let count = self.state.counts[instance.0 as usize] as usize;

        let existing_len = self.session.lane_table(&def.stable_key).map(LaneTable::len);
        match existing_len {
            // First touch (or an empty table meeting its first lanes):
            // seed without emitting a change event.
            None => {
                self.session.lane_table_mut(&def.stable_key).seed(count);
            }
            Some(0) if count > 0 => {
                self.session.lane_table_mut(&def.stable_key).seed(count);
            }
            Some(old) if old == count => {}
            Some(old) => {
                let mapping = self
                    .session
                    .lane_table_mut(&def.stable_key)
                    .resize(count, def.element_mode);
                let kind = mapping.kind;
                self.state.pending_mappings[instance.0 as usize] = Some(mapping);
                if self.session.domain_event_permitted(
                    &def.stable_key,
                    self.t_abs_ms,
                    self.domain_event_min_interval_ms,
                ) {
                    self.sink.emit(EngineEvent::DomainChanged {
                        revision: program.revision,
                        instance: def.label.clone(),
                        old_count: old as u32,
                        new_count: count as u32,
                        mapping: kind,
                        t_ms: self.t_abs_ms,
                    });
                }
            }
        }
    }

    /// Apply the pending lane mapping to every field state slot bound to
    /// the instance. Runs before any state read, so expressions observe
    /// already-migrated state.
    fn continuity_apply(&mut self, instance: InstanceId) {
        let count = self.state.counts[instance.0 as usize] as usize;
        let mapping = self.state.pending_mappings[instance.0 as usize].take();

        for def in &self.program.slots.states {
            if def.kind != StateSlotKind::FieldLane || def.instance != Some(instance) {
                continue;
            }
            let store = &mut self.state.state_fields[def.id.0 as usize];
            let width = def.payload.components() as usize;
            store.width = width;
            let initial_lane: SmallVec<[f32; 4]> =
                (0..width).map(|i| def.initial.comp_broadcast(i)).collect();

            let mut data = Vec::with_capacity(count * width);
            match &mapping {
                Some(mapping) => {
                    for source in mapping.sources.iter().take(count) {
                        match source {
                            LaneSource::Old(j) if *j < store.lanes => {
                                data.extend_from_slice(store.lane(*j));
                            }
                            _ => data.extend_from_slice(&initial_lane),
                        }
                    }
                    // A mapping shorter than the count (never expected)
                    // falls through to fresh lanes.
                    while data.len() < count * width {
                        data.extend_from_slice(&initial_lane);
                    }
                }
                None => {
                    // No resize this frame: keep the surviving prefix
                    // and initialize anything the store has not got.
                    for i in 0..count {
                        if i < store.lanes {
                            data.extend_from_slice(store.lane(i));
                        } else {
                            data.extend_from_slice(&initial_lane);
                        }
                    }
                }
            }
            store.data = data;
            store.lanes = count;
        }
    }
}

/// Execute one full frame: the cursor run to completion.
#[allow(clippy::too_many_arguments)]
pub fn execute_frame<'a>(
    program: &'a CompiledProgram,
    state: &'a mut ProgramState,
    session: &'a mut SessionState,
    pool: &'a mut BufferPool,
    sink: &'a dyn EventSink,
    tap: Option<&'a mut dyn DebugTap>,
    t_abs_ms: f64,
) -> FrameResult {
    FrameCursor::new(program, state, session, pool, sink, tap, t_abs_ms).finish()
}
