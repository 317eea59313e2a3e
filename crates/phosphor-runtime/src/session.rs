//! The session: state that outlives any single compiled program.

use indexmap::IndexMap;

use phosphor_core::id::{BlockId, StateId};
use phosphor_core::value::Value;

use crate::continuity::LaneTable;

/// Per-lane state backing for one field state entry.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FieldStateStore {
    /// Flat component-major data: `lanes × width`.
    pub data: Vec<f32>,
    /// Components per lane.
    pub width: usize,
    /// Lane count.
    pub lanes: usize,
}

impl FieldStateStore {
    /// A store of `lanes` lanes, every component set to `initial`'s
    /// broadcast.
    pub fn filled(width: usize, lanes: usize, initial: Value) -> Self {
        let mut data = vec![0.0; lanes * width];
        for lane in data.chunks_mut(width.max(1)) {
            for (i, c) in lane.iter_mut().enumerate() {
                *c = initial.comp_broadcast(i);
            }
        }
        Self { data, width, lanes }
    }

    /// One lane's components.
    pub fn lane(&self, i: usize) -> &[f32] {
        &self.data[i * self.width..(i + 1) * self.width]
    }

    /// Memory footprint in bytes.
    pub fn memory_bytes(&self) -> usize {
        self.data.len() * std::mem::size_of::<f32>()
    }
}

/// State that survives hot-swap: stable-identity stores plus lane
/// tables.
///
/// Created once per playback session. Programs come and go; their state
/// is flushed here keyed by [`StateId`] and primed back into the next
/// program's dense arrays.
#[derive(Clone, Debug, Default)]
pub struct SessionState {
    scalars: IndexMap<StateId, Value>,
    fields: IndexMap<StateId, FieldStateStore>,
    lane_tables: IndexMap<BlockId, LaneTable>,
    /// Last domain-change emission time per instance key, for throttling.
    throttle_marks: IndexMap<BlockId, f64>,
}

impl SessionState {
    /// A fresh session with no state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a scalar state value.
    pub fn put_scalar(&mut self, id: StateId, value: Value) {
        self.scalars.insert(id, value);
    }

    /// Read a scalar state value.
    pub fn scalar(&self, id: &StateId) -> Option<Value> {
        self.scalars.get(id).copied()
    }

    /// Store a field state entry.
    pub fn put_field(&mut self, id: StateId, store: FieldStateStore) {
        self.fields.insert(id, store);
    }

    /// Read a field state entry.
    pub fn field(&self, id: &StateId) -> Option<&FieldStateStore> {
        self.fields.get(id)
    }

    /// All scalar state IDs currently held.
    pub fn scalar_ids(&self) -> impl Iterator<Item = &StateId> {
        self.scalars.keys()
    }

    /// All field state IDs currently held.
    pub fn field_ids(&self) -> impl Iterator<Item = &StateId> {
        self.fields.keys()
    }

    /// The lane table for an instance's stable key, created on first
    /// touch.
    pub fn lane_table_mut(&mut self, key: &BlockId) -> &mut LaneTable {
        self.lane_tables.entry(key.clone()).or_default()
    }

    /// The lane table for an instance's stable key, if it exists.
    pub fn lane_table(&self, key: &BlockId) -> Option<&LaneTable> {
        self.lane_tables.get(key)
    }

    /// Whether a domain-change event may be emitted now, and if so,
    /// record the emission time.
    ///
    /// Per-instance throttle: at most one event per `min_interval_ms`.
    pub fn domain_event_permitted(
        &mut self,
        key: &BlockId,
        t_ms: f64,
        min_interval_ms: f64,
    ) -> bool {
        match self.throttle_marks.get(key) {
            Some(&last) if t_ms - last < min_interval_ms => false,
            _ => {
                self.throttle_marks.insert(key.clone(), t_ms);
                true
            }
        }
    }

    /// Number of scalar entries held.
    pub fn scalar_count(&self) -> usize {
        self.scalars.len()
    }

    /// Number of field entries held.
    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    /// Memory held by state stores, in bytes.
    pub fn memory_bytes(&self) -> usize {
        self.fields.values().map(FieldStateStore::memory_bytes).sum::<usize>()
            + self.scalars.len() * std::mem::size_of::<Value>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_round_trip() {
        let mut session = SessionState::new();
        let id = StateId::derive(&BlockId::from("delay"), "held");
        session.put_scalar(id.clone(), Value::scalar(1.5));
        assert_eq!(session.scalar(&id), Some(Value::scalar(1.5)));
        assert_eq!(session.scalar(&StateId::derive(&BlockId::from("x"), "held")), None);
    }

    #[test]
    fn filled_store_broadcasts_initial() {
        let store = FieldStateStore::filled(4, 2, Value::scalar(0.25));
        assert_eq!(store.lane(0), &[0.25, 0.25, 0.25, 0.25]);
        assert_eq!(store.lane(1), &[0.25, 0.25, 0.25, 0.25]);
    }

    #[test]
    fn throttle_limits_event_rate() {
        let mut session = SessionState::new();
        let key = BlockId::from("dots");
        assert!(session.domain_event_permitted(&key, 0.0, 250.0));
        assert!(!session.domain_event_permitted(&key, 100.0, 250.0));
        assert!(session.domain_event_permitted(&key, 300.0, 250.0));
        // Other instances throttle independently.
        assert!(session.domain_event_permitted(&BlockId::from("grid"), 100.0, 250.0));
    }
}
