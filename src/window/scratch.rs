use std::any::{Any, TypeId};
use std::collections::HashMap;

use crate::window::row_source::PartitionId;

/// Per-partition scratch memory of one window function instance.
///
/// Each algorithm keeps its state in its own type; the arena hands out one
/// default-initialized value per type and drops everything when a different
/// partition is bound.
#[derive(Default)]
pub(crate) struct PartitionScratch {
    partition: Option<PartitionId>,
    slots: HashMap<TypeId, Box<dyn Any>>,
}

impl PartitionScratch {
    /// Re-keys the arena to `partition`, discarding state of any previous one.
    pub(crate) fn rebind(&mut self, partition: PartitionId) {
        if self.partition != Some(partition) {
            self.slots.clear();
            self.partition = Some(partition);
        }
    }

    pub(crate) fn clear(&mut self) {
        self.slots.clear();
        self.partition = None;
    }

    pub(crate) fn get_or_default<S: Default + 'static>(&mut self) -> &mut S {
        self.slots
            .entry(TypeId::of::<S>())
            .or_insert_with(|| Box::new(S::default()))
            .downcast_mut::<S>()
            .expect("scratch slot keyed by its own type id")
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }
}
