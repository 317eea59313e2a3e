//! The debug tap: an injected observer of slot writes.
//!
//! The executor invokes the tap synchronously on every value-slot write
//! and never awaits it. The tap must be side-effect-light and must not
//! reenter the executor; it exists so debug observers can record values
//! without the executor knowing who is listening.

use crate::id::ValueSlotId;
use crate::value::Value;

/// Observer of per-slot writes during frame execution.
pub trait DebugTap {
    /// A scalar value was written to a signal slot.
    fn record_slot_value(&mut self, slot: ValueSlotId, value: Value);

    /// A lane buffer was (re)materialized for a field slot.
    ///
    /// `data` is the flat component-major buffer: `lanes × width` floats.
    fn record_field_value(&mut self, slot: ValueSlotId, lanes: usize, width: usize, data: &[f32]);
}

/// A tap that records nothing.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullTap;

impl DebugTap for NullTap {
    fn record_slot_value(&mut self, _slot: ValueSlotId, _value: Value) {}

    fn record_field_value(
        &mut self,
        _slot: ValueSlotId,
        _lanes: usize,
        _width: usize,
        _data: &[f32],
    ) {
    }
}
