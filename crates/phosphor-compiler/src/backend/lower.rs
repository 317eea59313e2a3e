//! Expression lowering: normalized blocks → value-expression DAG.
//!
//! Blocks are walked in dependency order (unit-delay feedback edges cut)
//! and each behavior is lowered to expression nodes. Nodes deduplicate by
//! structural hash, so identical subgraphs share one node and one value
//! slot. Unit delays lower to state reads; their write-back sources are
//! resolved after the walk, when every producer has an expression.

use indexmap::{IndexMap, IndexSet};
use smallvec::SmallVec;

use phosphor_core::diag::BackendError;
use phosphor_core::id::{BlockId, ExprId, InstanceId, PortId, StateId, StateSlotId, ValueSlotId};
use phosphor_core::op::{LaneOp, MapOp};
use phosphor_core::ty::{CanonicalType, Cardinality};
use phosphor_core::value::Value;
use phosphor_graph::block::CombineMode;
use phosphor_graph::edge::{EdgeRole, PortRef};
use phosphor_graph::registry::{Behavior, DefaultSource, PortDef, StateKind};

use crate::frontend::card::CardMap;
use crate::frontend::norm::{NormBlock, NormOrigin, NormalizedPatch};
use crate::program::{
    DebugIndex, ElementIdMode, ExprNode, InstanceDef, RenderPassDef, SlotTable, StateSlotDef,
    StateSlotKind, ValueExpr, ValueSlotDef,
};

const PASS: &str = "lower";

/// FNV-1a over a byte slice, for structural hashing.
fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash = 0xcbf2_9ce4_8422_2325u64;
    for &b in bytes {
        hash = (hash ^ u64::from(b)).wrapping_mul(0x0000_0100_0000_01B3);
    }
    hash
}

/// Everything lowering produces; the scheduler consumes this.
#[derive(Debug, Default)]
pub struct Lowered {
    /// The expression DAG.
    pub exprs: Vec<ExprNode>,
    /// Value and state slot tables.
    pub slots: SlotTable,
    /// State write-backs: `(state slot, source expression)`.
    pub state_writes: Vec<(StateSlotId, ExprId)>,
    /// Instance domains, indexed by [`InstanceId`].
    pub instances: Vec<InstanceDef>,
    /// Render passes.
    pub passes: Vec<RenderPassDef>,
    /// Identity maps.
    pub debug: DebugIndex,
    /// Output port → expression, for tests and the scheduler.
    pub port_exprs: IndexMap<PortRef, ExprId>,
}

struct Lowering<'a> {
    norm: &'a NormalizedPatch,
    cards: &'a CardMap,
    out: Lowered,
    cse: IndexMap<u64, SmallVec<[ExprId; 2]>>,
    instance_of_domain: IndexMap<BlockId, InstanceId>,
    /// Unit delays whose write sources resolve after the walk:
    /// `(block id, state slot)`.
    pending_delays: Vec<(BlockId, StateSlotId)>,
    /// Blocks already lowered.
    lowered: IndexSet<BlockId>,
    /// Blocks on the current demand-lowering path, for cycle detection.
    visiting: IndexSet<BlockId>,
}

impl<'a> Lowering<'a> {
    /// Intern an expression node, deduplicating structurally equal ones.
    fn add_expr(&mut self, expr: ValueExpr, ty: CanonicalType) -> ExprId {
        let key = fnv1a(format!("{expr:?}|{ty:?}").as_bytes());
        if let Some(candidates) = self.cse.get(&key) {
            for &id in candidates {
                let node = &self.out.exprs[id.0 as usize];
                if node.expr == expr && node.ty == ty {
                    return id;
                }
            }
        }
        let id = ExprId(self.out.exprs.len() as u32);
        let slot = ValueSlotId(id.0);
        // Field-valued nodes that carry no instance themselves (adapters
        // over fields) inherit it from their first field argument.
        let instance = match expr.instance() {
            Some(i) => Some(i),
            None if ty.cardinality == Cardinality::Field => expr
                .args()
                .iter()
                .find_map(|a| self.out.slots.values[a.0 as usize].instance),
            None => None,
        };
        self.out.slots.values.push(ValueSlotDef {
            id: slot,
            payload: ty.payload,
            cardinality: ty.cardinality,
            instance,
        });
        self.out.exprs.push(ExprNode { expr, ty, slot });
        self.cse.entry(key).or_default().push(id);
        id
    }

    /// The expression feeding one input port, after combine folding.
    fn input_expr(&mut self, block: &NormBlock, port: &PortDef) -> Result<ExprId, BackendError> {
        let edges = self.norm.edges_into(&block.id, port.id);
        let mut sources = Vec::new();
        for edge in &edges {
            match self.out.port_exprs.get(&edge.from) {
                Some(&e) => sources.push(e),
                None => {
                    return Err(BackendError::new(
                        PASS,
                        format!(
                            "no expression for {} feeding {}.{}",
                            edge.from, block.id, port.id
                        ),
                    ))
                }
            }
        }
        match sources.len() {
            0 => Err(BackendError::new(
                PASS,
                format!("input {}.{} has no source after normalization", block.id, port.id),
            )),
            1 => Ok(sources[0]),
            _ => {
                let fold_op = match port.combine {
                    CombineMode::Sum => Some(MapOp::Add),
                    CombineMode::Product => Some(MapOp::Mul),
                    CombineMode::First => None,
                    CombineMode::Single => {
                        return Err(BackendError::new(
                            PASS,
                            format!(
                                "single-source input {}.{} has {} sources",
                                block.id,
                                port.id,
                                sources.len()
                            ),
                        ))
                    }
                };
                match fold_op {
                    None => Ok(sources[0]),
                    Some(op) => {
                        let mut acc = sources[0];
                        for &next in &sources[1..] {
                            acc = self.fold_pair(op, acc, next, port.ty);
                        }
                        Ok(acc)
                    }
                }
            }
        }
    }

    /// The instance a lowered expression's slot is bound to (covers
    /// adapters over fields, which carry no instance on the node).
    fn slot_instance(&self, expr: ExprId) -> Option<InstanceId> {
        self.out.slots.values[expr.0 as usize].instance
    }

    /// Whether a lowered expression produces a lane buffer.
    fn is_field_expr(&self, expr: ExprId) -> bool {
        self.out.slots.values[expr.0 as usize].cardinality == Cardinality::Field
    }

    /// Fold two sources with a combine operator, staying element-wise if
    /// either side is a field.
    fn fold_pair(
        &mut self,
        op: MapOp,
        a: ExprId,
        b: ExprId,
        declared: CanonicalType,
    ) -> ExprId {
        let instance = self.slot_instance(a).or_else(|| self.slot_instance(b));
        let mut args = SmallVec::new();
        args.push(a);
        args.push(b);
        match instance {
            Some(instance) => self.add_expr(
                ValueExpr::FieldMap { op, instance, args },
                declared.with_cardinality(Cardinality::Field),
            ),
            None => self.add_expr(
                ValueExpr::Map { op, args },
                declared.with_cardinality(Cardinality::Signal),
            ),
        }
    }

    /// The instance bound to a block's `domain` input.
    fn domain_instance(&self, block: &NormBlock) -> Result<InstanceId, BackendError> {
        let edges = self.norm.edges_into(&block.id, "domain");
        let edge = edges.first().ok_or_else(|| {
            BackendError::new(PASS, format!("block {} has no domain source", block.id))
        })?;
        self.instance_of_domain
            .get(&edge.from.block)
            .copied()
            .ok_or_else(|| {
                BackendError::new(
                    PASS,
                    format!("domain block {} was not lowered first", edge.from.block),
                )
            })
    }

    /// The resolved type of an output port.
    fn output_ty(&self, block: &NormBlock, port: &PortDef) -> CanonicalType {
        let port_ref = PortRef {
            block: block.id.clone(),
            port: PortId(port.id.to_string()),
        };
        let cardinality = self
            .cards
            .output(&port_ref)
            .map(|c| c.cardinality)
            .unwrap_or(port.ty.cardinality);
        port.ty.with_cardinality(cardinality)
    }

    /// Wrap a signal expression into a field lift if needed.
    fn ensure_field(&mut self, expr: ExprId, instance: InstanceId) -> ExprId {
        if self.is_field_expr(expr) {
            return expr;
        }
        let ty = self.out.exprs[expr.0 as usize]
            .ty
            .with_cardinality(Cardinality::Field);
        self.add_expr(ValueExpr::FieldLift { arg: expr, instance }, ty)
    }

    /// Lower one block, recording expressions for its outputs.
    fn lower_block(&mut self, block: &NormBlock) -> Result<(), BackendError> {
        let block_index = self
            .out
            .debug
            .intern_block(&block.id, &block.display_name);

        match &block.def.behavior {
            Behavior::Bus => {
                // Buses are collapsed during normalization.
                return Err(BackendError::new(
                    PASS,
                    format!("bus block {} survived normalization", block.id),
                ));
            }
            Behavior::Const => {
                let out = &block.def.outputs[0];
                let value = match &block.origin {
                    NormOrigin::Default {
                        source: DefaultSource::Const(v),
                        ..
                    } => *v,
                    _ => Value::scalar(block.params.f32_or("value", 0.0)),
                };
                let ty = self.output_ty(block, out);
                let expr = self.add_expr(ValueExpr::Const(value), ty);
                self.bind_output(block, out, expr, block_index);
            }
            Behavior::Time(func) => {
                let out = &block.def.outputs[0];
                let period_ms = f64::from(block.params.f32_or("periodMs", 4000.0));
                let ty = self.output_ty(block, out);
                let expr = self.add_expr(ValueExpr::Time { func: *func, period_ms }, ty);
                self.bind_output(block, out, expr, block_index);
            }
            Behavior::Map(op) => {
                let mut args: SmallVec<[ExprId; 4]> = SmallVec::new();
                for input in &block.def.inputs {
                    args.push(self.input_expr(block, input)?);
                }
                if args.len() != op.arity() {
                    return Err(BackendError::new(
                        PASS,
                        format!(
                            "operator {} wants {} args, block {} wires {}",
                            op.name(),
                            op.arity(),
                            block.id,
                            args.len()
                        ),
                    ));
                }
                let out = &block.def.outputs[0];
                let ty = self.output_ty(block, out);
                let expr = if ty.cardinality == Cardinality::Field {
                    let instance = args
                        .iter()
                        .find_map(|&a| self.slot_instance(a))
                        .ok_or_else(|| {
                            BackendError::new(
                                PASS,
                                format!("field-valued {} has no field argument", block.id),
                            )
                        })?;
                    self.add_expr(ValueExpr::FieldMap { op: *op, instance, args }, ty)
                } else {
                    self.add_expr(ValueExpr::Map { op: *op, args }, ty)
                };
                self.bind_output(block, out, expr, block_index);
            }
            Behavior::Lane(op) => {
                let instance = self.domain_instance(block)?;
                // Jitter folds its seed param into the op tag.
                let op = match op {
                    LaneOp::Jitter { .. } => LaneOp::Jitter {
                        seed: block.params.i64_or("seed", 0) as u64,
                    },
                    other => *other,
                };
                let mut args: SmallVec<[ExprId; 2]> = SmallVec::new();
                for input in &block.def.inputs {
                    if input.ty.cardinality == Cardinality::Static {
                        continue; // the domain handle
                    }
                    args.push(self.input_expr(block, input)?);
                }
                if args.len() != op.arity() {
                    return Err(BackendError::new(
                        PASS,
                        format!(
                            "lane generator {} wants {} args, block {} wires {}",
                            op.name(),
                            op.arity(),
                            block.id,
                            args.len()
                        ),
                    ));
                }
                let out = &block.def.outputs[0];
                let ty = self
                    .output_ty(block, out)
                    .with_cardinality(Cardinality::Field);
                let expr = self.add_expr(ValueExpr::Lane { op, instance, args }, ty);
                self.bind_output(block, out, expr, block_index);
            }
            Behavior::Reduce(op) => {
                let input = &block.def.inputs[0];
                let arg = self.input_expr(block, input)?;
                let out = &block.def.outputs[0];
                let ty = self
                    .output_ty(block, out)
                    .with_cardinality(Cardinality::Signal);
                let expr = self.add_expr(ValueExpr::Reduce { op: *op, arg }, ty);
                self.bind_output(block, out, expr, block_index);
            }
            Behavior::Broadcast => {
                let instance = self.domain_instance(block)?;
                let signal = block
                    .def
                    .inputs
                    .iter()
                    .find(|p| p.ty.cardinality != Cardinality::Static)
                    .ok_or_else(|| {
                        BackendError::new(PASS, format!("broadcast {} has no signal input", block.id))
                    })?;
                let arg = self.input_expr(block, signal)?;
                let out = &block.def.outputs[0];
                let ty = self
                    .output_ty(block, out)
                    .with_cardinality(Cardinality::Field);
                let expr = self.add_expr(ValueExpr::FieldLift { arg, instance }, ty);
                self.bind_output(block, out, expr, block_index);
            }
            Behavior::UnitDelay => {
                let decl = block.def.states.first().ok_or_else(|| {
                    BackendError::new(PASS, format!("unit delay {} declares no state", block.id))
                })?;
                let out = &block.def.outputs[0];
                let ty = self.output_ty(block, out);
                let is_field = ty.cardinality == Cardinality::Field;
                let instance = if is_field {
                    let domain = self.cards.field_domain_of(&block.id).cloned().ok_or_else(
                        || {
                            BackendError::new(
                                PASS,
                                format!("field delay {} has no domain binding", block.id),
                            )
                        },
                    )?;
                    Some(self.instance_of_domain.get(&domain).copied().ok_or_else(
                        || {
                            BackendError::new(
                                PASS,
                                format!("domain block {domain} was not lowered first"),
                            )
                        },
                    )?)
                } else {
                    None
                };
                // The author's `init` param overrides the declared initial.
                let initial = block
                    .params
                    .get_f32("init")
                    .map(Value::scalar)
                    .unwrap_or(decl.initial);
                let state = StateSlotId(self.out.slots.states.len() as u32);
                self.out.slots.states.push(StateSlotDef {
                    id: state,
                    state_id: StateId::derive(&block.id, decl.role_tag),
                    kind: match (decl.kind, is_field) {
                        (_, true) => StateSlotKind::FieldLane,
                        (StateKind::FieldLane, false) => StateSlotKind::FieldLane,
                        (StateKind::Scalar, false) => StateSlotKind::Scalar,
                    },
                    payload: ty.payload,
                    instance,
                    initial,
                    block: block.id.clone(),
                });
                self.out.debug.bind_state(state, block_index);
                let expr = match instance {
                    Some(instance) => self.add_expr(
                        ValueExpr::ReadFieldState { state, instance },
                        ty,
                    ),
                    None => self.add_expr(ValueExpr::ReadScalarState { state }, ty),
                };
                self.bind_output(block, out, expr, block_index);
                self.pending_delays.push((block.id.clone(), state));
            }
            Behavior::Domain => {
                let id = InstanceId(self.out.instances.len() as u32);
                let count_expr = self.domain_count_expr(block)?;
                let element_mode = match block.params.get_str("continuity") {
                    Some("prefix") => ElementIdMode::Positional,
                    Some("none") => ElementIdMode::Ephemeral,
                    _ => ElementIdMode::Synthesized,
                };
                self.out.instances.push(InstanceDef {
                    id,
                    stable_key: block.id.clone(),
                    label: block.display_name.clone(),
                    count_expr,
                    element_mode,
                });
                self.instance_of_domain.insert(block.id.clone(), id);
                // The domain handle itself has no value expression.
            }
            Behavior::Adapter(conv) => {
                let input = &block.def.inputs[0];
                let arg = self.input_expr(block, input)?;
                let out = &block.def.outputs[0];
                let arg_is_field = self.is_field_expr(arg);
                let ty = self.output_ty(block, out).with_cardinality(if arg_is_field {
                    Cardinality::Field
                } else {
                    Cardinality::Signal
                });
                let expr = self.add_expr(ValueExpr::Adapt { conv: *conv, arg }, ty);
                self.bind_output(block, out, expr, block_index);
            }
            Behavior::Render(primitive) => {
                let instance = self.domain_instance(block)?;
                let mut position = None;
                let mut color = None;
                let mut shape = None;
                for input in &block.def.inputs {
                    if input.ty.cardinality == Cardinality::Static {
                        continue;
                    }
                    let expr = self.input_expr(block, input)?;
                    let expr = self.ensure_field(expr, instance);
                    let slot = self.out.exprs[expr.0 as usize].slot;
                    match input.id {
                        "position" => position = Some(slot),
                        "color" => color = Some(slot),
                        "shape" => shape = Some(slot),
                        other => {
                            return Err(BackendError::new(
                                PASS,
                                format!("render sink {} has unknown input '{other}'", block.id),
                            ))
                        }
                    }
                }
                let position = position.ok_or_else(|| {
                    BackendError::new(PASS, format!("render sink {} lacks a position", block.id))
                })?;
                self.out.passes.push(RenderPassDef {
                    sink: block.id.clone(),
                    primitive: *primitive,
                    instance,
                    position,
                    color,
                    shape,
                    scale: block.params.f32_or("scale", 1.0),
                });
            }
        }
        Ok(())
    }

    /// The count expression of a domain block: a wired `count` input, or
    /// the `count` param when only the synthesized default feeds it.
    fn domain_count_expr(&mut self, block: &NormBlock) -> Result<ExprId, BackendError> {
        let count_ty = CanonicalType::signal(
            phosphor_core::ty::Payload::Float,
            Some(phosphor_core::ty::Unit::Count),
        );
        if let Some(input) = block.def.input("count") {
            let edges = self.norm.edges_into(&block.id, "count");
            let from_user = edges.iter().any(|e| e.role == EdgeRole::User);
            if from_user {
                return self.input_expr(block, input);
            }
        }
        let count = block.params.f32_or("count", 64.0);
        Ok(self.add_expr(ValueExpr::Const(Value::scalar(count)), count_ty))
    }

    fn bind_output(
        &mut self,
        block: &NormBlock,
        port: &PortDef,
        expr: ExprId,
        block_index: u32,
    ) {
        let port_ref = PortRef {
            block: block.id.clone(),
            port: PortId(port.id.to_string()),
        };
        let slot = self.out.exprs[expr.0 as usize].slot;
        self.out.debug.bind_port(port_ref.clone(), slot, block_index);
        self.out.port_exprs.insert(port_ref, expr);
    }

    /// Resolve unit-delay write sources after the walk.
    fn finalize_delays(&mut self) -> Result<(), BackendError> {
        let pending = std::mem::take(&mut self.pending_delays);
        for (block_id, state) in pending {
            let block = self.norm.blocks.get(&block_id).ok_or_else(|| {
                BackendError::new(PASS, format!("delay block {block_id} disappeared"))
            })?;
            let input = block.def.input("in").ok_or_else(|| {
                BackendError::new(PASS, format!("delay {block_id} has no 'in' port"))
            })?;
            let source = self.input_expr(block, input)?;
            self.out.state_writes.push((state, source));
        }
        Ok(())
    }
}

impl Lowering<'_> {
    /// Demand-lower a block: producers first (unit-delay feedback edges
    /// excepted), then the block itself.
    ///
    /// A field-cardinality unit delay additionally demands its domain
    /// block; its only link to the domain runs through the cut
    /// feedback edge, so plain producer order would miss it.
    fn ensure_lowered(&mut self, id: &BlockId) -> Result<(), BackendError> {
        if self.lowered.contains(id) {
            return Ok(());
        }
        if !self.visiting.insert(id.clone()) {
            return Err(BackendError::new(
                PASS,
                format!("unbroken cycle through block {id} survived the frontend"),
            ));
        }
        let Some(block) = self.norm.blocks.get(id) else {
            self.visiting.shift_remove(id);
            return Err(BackendError::new(PASS, format!("unknown block {id}")));
        };

        let is_delay = matches!(block.def.behavior, Behavior::UnitDelay);
        let producers: Vec<BlockId> = self
            .norm
            .edges
            .iter()
            .filter(|e| {
                &e.to.block == id && !(is_delay && e.to.port.0 == "in")
            })
            .map(|e| e.from.block.clone())
            .collect();
        for producer in producers {
            self.ensure_lowered(&producer)?;
        }
        if is_delay {
            if let Some(domain) = self.cards.field_domain_of(id).cloned() {
                self.ensure_lowered(&domain)?;
            }
        }

        self.lower_block(block)?;
        self.visiting.shift_remove(id);
        self.lowered.insert(id.clone());
        Ok(())
    }
}

/// Lower a normalized patch to the expression DAG and slot tables.
pub fn lower(norm: &NormalizedPatch, cards: &CardMap) -> Result<Lowered, BackendError> {
    let mut lowering = Lowering {
        norm,
        cards,
        out: Lowered::default(),
        cse: IndexMap::new(),
        instance_of_domain: IndexMap::new(),
        pending_delays: Vec::new(),
        lowered: IndexSet::new(),
        visiting: IndexSet::new(),
    };
    let ids: Vec<BlockId> = norm.blocks.keys().cloned().collect();
    for id in &ids {
        lowering.ensure_lowered(id)?;
    }
    lowering.finalize_delays()?;
    Ok(lowering.out)
}
