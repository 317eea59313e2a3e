//! The typed value-expression DAG.
//!
//! Nodes are pure expressions referencing their arguments by ordinal
//! [`ExprId`]; the DAG is acyclic by construction (unit-delay feedback is
//! cut into state reads and writes). The backend deduplicates nodes by
//! structural hash, so equal subgraphs share one node and one slot.

use smallvec::SmallVec;

use phosphor_core::adapt::UnitConversion;
use phosphor_core::id::{ExprId, InstanceId, StateSlotId, ValueSlotId};
use phosphor_core::op::{LaneOp, MapOp, ReduceOp, TimeFn};
use phosphor_core::ty::CanonicalType;
use phosphor_core::value::Value;

/// A pure expression node.
#[derive(Clone, Debug, PartialEq)]
pub enum ValueExpr {
    /// A compile-time constant.
    Const(Value),
    /// Absolute frame time mapped through a time function.
    Time {
        /// Phase or ramp.
        func: TimeFn,
        /// Cycle period in milliseconds.
        period_ms: f64,
    },
    /// Element-wise operator over signal arguments.
    Map {
        /// The operator.
        op: MapOp,
        /// Arguments, in operator order.
        args: SmallVec<[ExprId; 4]>,
    },
    /// Element-wise operator over field (and broadcast signal) arguments.
    FieldMap {
        /// The operator.
        op: MapOp,
        /// The instance whose lanes this expression fills.
        instance: InstanceId,
        /// Arguments; signal-typed arguments broadcast across lanes.
        args: SmallVec<[ExprId; 4]>,
    },
    /// Per-lane generator bound to an instance.
    Lane {
        /// The generator.
        op: LaneOp,
        /// The instance whose lanes this expression fills.
        instance: InstanceId,
        /// Broadcast arguments, in generator order.
        args: SmallVec<[ExprId; 2]>,
    },
    /// Broadcast a signal across an instance's lanes.
    FieldLift {
        /// The signal to broadcast.
        arg: ExprId,
        /// The target instance.
        instance: InstanceId,
    },
    /// Fold a field down to one signal.
    Reduce {
        /// The fold operator.
        op: ReduceOp,
        /// The field argument.
        arg: ExprId,
    },
    /// Apply a unit conversion componentwise.
    Adapt {
        /// The conversion.
        conv: UnitConversion,
        /// The argument (signal or field; the slot's cardinality decides).
        arg: ExprId,
    },
    /// Read a scalar state slot (unit-delay output).
    ReadScalarState {
        /// The state slot.
        state: StateSlotId,
    },
    /// Read a per-lane state slot into a field.
    ReadFieldState {
        /// The state slot.
        state: StateSlotId,
        /// The instance the state is bound to.
        instance: InstanceId,
    },
}

impl ValueExpr {
    /// Argument IDs of this node, in order.
    pub fn args(&self) -> SmallVec<[ExprId; 4]> {
        match self {
            Self::Const(_)
            | Self::Time { .. }
            | Self::ReadScalarState { .. }
            | Self::ReadFieldState { .. } => SmallVec::new(),
            Self::Map { args, .. } | Self::FieldMap { args, .. } => args.clone(),
            Self::Lane { args, .. } => args.iter().copied().collect(),
            Self::FieldLift { arg, .. } | Self::Reduce { arg, .. } | Self::Adapt { arg, .. } => {
                let mut v = SmallVec::new();
                v.push(*arg);
                v
            }
        }
    }

    /// Whether this node materializes a lane buffer.
    pub fn is_field(&self) -> bool {
        matches!(
            self,
            Self::FieldMap { .. }
                | Self::Lane { .. }
                | Self::FieldLift { .. }
                | Self::ReadFieldState { .. }
        )
    }

    /// The instance a field node fills, if any.
    pub fn instance(&self) -> Option<InstanceId> {
        match self {
            Self::FieldMap { instance, .. }
            | Self::Lane { instance, .. }
            | Self::FieldLift { instance, .. }
            | Self::ReadFieldState { instance, .. } => Some(*instance),
            _ => None,
        }
    }
}

/// One node of the DAG: the expression, its type, and its value slot.
#[derive(Clone, Debug, PartialEq)]
pub struct ExprNode {
    /// The expression.
    pub expr: ValueExpr,
    /// Resolved type of the produced value.
    pub ty: CanonicalType,
    /// The per-frame slot the value is written to.
    pub slot: ValueSlotId,
}
