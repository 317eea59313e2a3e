//! Lane-identity tables and resize mappings.
//!
//! Each instance domain owns a table assigning every lane a stable
//! [`ElementId`]. On a resize the table produces a [`LaneMapping`] that
//! tells the state-migration step which old lane each new lane inherits
//! from. Element identity, not lane position, is what makes a shrink
//! followed by a grow give elements their state back.

use indexmap::IndexMap;

use phosphor_core::event::MappingKind;
use phosphor_core::id::ElementId;
use phosphor_compiler::program::ElementIdMode;

/// Where one new lane's state comes from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LaneSource {
    /// Inherit from this old lane index.
    Old(usize),
    /// A brand-new lane; initialize from the declared initial value.
    Fresh,
}

/// The mapping from new lanes to old lanes for one resize.
#[derive(Clone, Debug, PartialEq)]
pub struct LaneMapping {
    /// One entry per new lane.
    pub sources: Vec<LaneSource>,
    /// The strategy that produced the mapping.
    pub kind: MappingKind,
}

impl LaneMapping {
    /// An identity mapping for an unchanged count.
    pub fn identity(count: usize, kind: MappingKind) -> Self {
        Self {
            sources: (0..count).map(LaneSource::Old).collect(),
            kind,
        }
    }
}

/// A resize observed by [`LaneTable::resize`], for event emission.
#[derive(Clone, Debug, PartialEq)]
pub struct DomainChange {
    /// Lane count before.
    pub old_count: u32,
    /// Lane count after.
    pub new_count: u32,
    /// The mapping strategy used.
    pub mapping: MappingKind,
}

/// The lane-identity table of one instance domain.
#[derive(Clone, Debug, Default)]
pub struct LaneTable {
    element_ids: Vec<ElementId>,
    next_element: u64,
}

impl LaneTable {
    /// An empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current lane count.
    pub fn len(&self) -> usize {
        self.element_ids.len()
    }

    /// Whether the table has no lanes.
    pub fn is_empty(&self) -> bool {
        self.element_ids.is_empty()
    }

    /// The element ID of a lane.
    pub fn element_id(&self, lane: usize) -> Option<ElementId> {
        self.element_ids.get(lane).copied()
    }

    /// All element IDs in lane order.
    pub fn element_ids(&self) -> &[ElementId] {
        &self.element_ids
    }

    /// Resize the table to `new_count` lanes under the given identity
    /// mode, returning the mapping from new lanes to old lanes.
    ///
    /// Synthesized mode keeps the surviving prefix of element IDs on a
    /// shrink and mints fresh IDs on a grow, then matches by ID, so an
    /// element that keeps its ID keeps its lane state. Positional mode
    /// matches the shared prefix by position. Ephemeral mode preserves
    /// nothing.
    pub fn resize(&mut self, new_count: usize, mode: ElementIdMode) -> LaneMapping {
        let old_count = self.element_ids.len();
        if new_count == old_count {
            return LaneMapping::identity(new_count, mode.mapping_kind());
        }

        match mode {
            ElementIdMode::Synthesized => {
                let old_ids = std::mem::take(&mut self.element_ids);
                let index_of: IndexMap<ElementId, usize> = old_ids
                    .iter()
                    .enumerate()
                    .map(|(i, &id)| (id, i))
                    .collect();

                let mut new_ids = Vec::with_capacity(new_count);
                new_ids.extend(old_ids.iter().take(new_count).copied());
                while new_ids.len() < new_count {
                    new_ids.push(ElementId(self.next_element));
                    self.next_element += 1;
                }

                let sources = new_ids
                    .iter()
                    .map(|id| match index_of.get(id) {
                        Some(&i) => LaneSource::Old(i),
                        None => LaneSource::Fresh,
                    })
                    .collect();
                self.element_ids = new_ids;
                LaneMapping {
                    sources,
                    kind: MappingKind::ById,
                }
            }
            ElementIdMode::Positional => {
                self.element_ids = (0..new_count as u64).map(ElementId).collect();
                self.next_element = new_count as u64;
                let keep = old_count.min(new_count);
                let sources = (0..new_count)
                    .map(|i| {
                        if i < keep {
                            LaneSource::Old(i)
                        } else {
                            LaneSource::Fresh
                        }
                    })
                    .collect();
                LaneMapping {
                    sources,
                    kind: MappingKind::Prefix,
                }
            }
            ElementIdMode::Ephemeral => {
                let start = self.next_element;
                self.element_ids = (0..new_count as u64)
                    .map(|i| ElementId(start + i))
                    .collect();
                self.next_element = start + new_count as u64;
                LaneMapping {
                    sources: vec![LaneSource::Fresh; new_count],
                    kind: MappingKind::None,
                }
            }
        }
    }

    /// Seed a fresh table with `count` lanes (first frame of a domain).
    pub fn seed(&mut self, count: usize) {
        self.element_ids = (0..count as u64).map(ElementId).collect();
        self.next_element = count as u64;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn shrink_keeps_prefix_ids() {
        let mut table = LaneTable::new();
        table.seed(50);
        let mapping = table.resize(30, ElementIdMode::Synthesized);
        assert_eq!(mapping.kind, MappingKind::ById);
        assert_eq!(table.len(), 30);
        for (i, source) in mapping.sources.iter().enumerate() {
            assert_eq!(*source, LaneSource::Old(i));
        }
        assert_eq!(table.element_id(29), Some(ElementId(29)));
    }

    #[test]
    fn grow_mints_fresh_ids() {
        let mut table = LaneTable::new();
        table.seed(4);
        let mapping = table.resize(6, ElementIdMode::Synthesized);
        assert_eq!(
            mapping.sources,
            vec![
                LaneSource::Old(0),
                LaneSource::Old(1),
                LaneSource::Old(2),
                LaneSource::Old(3),
                LaneSource::Fresh,
                LaneSource::Fresh,
            ]
        );
        // Fresh IDs never collide with surviving ones.
        assert_eq!(table.element_id(4), Some(ElementId(4)));
        assert_eq!(table.element_id(5), Some(ElementId(5)));
    }

    #[test]
    fn shrink_then_grow_mints_new_identity() {
        // Elements dropped in a shrink do not come back: a later grow
        // mints fresh IDs, so their state stays discarded.
        let mut table = LaneTable::new();
        table.seed(4);
        table.resize(2, ElementIdMode::Synthesized);
        let mapping = table.resize(4, ElementIdMode::Synthesized);
        assert_eq!(mapping.sources[0], LaneSource::Old(0));
        assert_eq!(mapping.sources[1], LaneSource::Old(1));
        assert_eq!(mapping.sources[2], LaneSource::Fresh);
        assert_eq!(mapping.sources[3], LaneSource::Fresh);
        assert_ne!(table.element_id(2), Some(ElementId(2)));
    }

    #[test]
    fn ephemeral_preserves_nothing() {
        let mut table = LaneTable::new();
        table.seed(3);
        let mapping = table.resize(3, ElementIdMode::Ephemeral);
        // Equal count short-circuits to identity; force a real resize.
        assert_eq!(mapping.kind, MappingKind::None);
        let mapping = table.resize(5, ElementIdMode::Ephemeral);
        assert!(mapping.sources.iter().all(|s| *s == LaneSource::Fresh));
    }

    proptest! {
        #[test]
        fn mapping_len_matches_new_count(
            old in 0usize..200,
            new in 0usize..200,
        ) {
            let mut table = LaneTable::new();
            table.seed(old);
            let mapping = table.resize(new, ElementIdMode::Synthesized);
            prop_assert_eq!(mapping.sources.len(), new);
            prop_assert_eq!(table.len(), new);
        }

        #[test]
        fn old_sources_are_in_range(
            old in 0usize..200,
            new in 0usize..200,
        ) {
            let mut table = LaneTable::new();
            table.seed(old);
            let mapping = table.resize(new, ElementIdMode::Synthesized);
            for source in &mapping.sources {
                if let LaneSource::Old(i) = source {
                    prop_assert!(*i < old.max(1));
                }
            }
        }
    }
}
