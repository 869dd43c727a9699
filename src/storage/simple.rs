use std::collections::BTreeMap;
use std::sync::Arc;

use xias::Xias;

use super::{Record, RecordMut, Storage};
use crate::comp::Schema;
use crate::entity::EntityId;
use crate::prop::{ObjectRef, ObjectState};

/// A storage that keeps every field in its record.
#[derive(Debug)]
pub struct Simple {
    schema:  Arc<Schema>,
    records: Vec<Record>,
    free:    Vec<u32>,
    owners:  BTreeMap<EntityId, u32>,
}

impl Simple {
    /// Constructs an empty storage.
    pub fn new(schema: Arc<Schema>) -> Self {
        Self { schema, records: Vec::new(), free: Vec::new(), owners: BTreeMap::new() }
    }
}

impl Storage for Simple {
    fn schema(&self) -> &Arc<Schema> { &self.schema }

    fn create(&mut self, owner: EntityId) -> u32 {
        if let Some(&handle) = self.owners.get(&owner) {
            return handle;
        }

        let handle = match self.free.pop() {
            Some(handle) => {
                self.records[handle.small_int::<usize>()].owner = Some(owner);
                handle
            }
            None => {
                let state = ObjectState::new(self.schema.clone());
                self.records.push(Record { owner: Some(owner), state });
                (self.records.len() - 1).small_int()
            }
        };

        self.owners.insert(owner, handle);
        handle
    }

    fn destroy(&mut self, owner: EntityId) -> bool {
        let handle = match self.owners.remove(&owner) {
            Some(handle) => handle,
            None => return false,
        };

        let record = &mut self.records[handle.small_int::<usize>()];
        record.state.reset(&mut []);
        record.owner = None;
        self.free.push(handle);
        true
    }

    fn handle(&self, owner: EntityId) -> Option<u32> { self.owners.get(&owner).copied() }

    fn read(&self, owner: EntityId) -> Option<ObjectRef<'_>> {
        let record = &self.records[self.handle(owner)?.small_int::<usize>()];
        Some(ObjectRef::new(&record.state, &[]))
    }

    fn write(&mut self, owner: EntityId) -> Option<RecordMut<'_>> {
        let handle = self.handle(owner)?;
        let record = &mut self.records[handle.small_int::<usize>()];
        Some(RecordMut { state: &mut record.state, row: Default::default() })
    }

    fn mark_clean(&mut self) {
        for record in &mut self.records {
            if record.owner.is_some() {
                record.state.mark_clean();
            }
        }
    }

    fn len(&self) -> usize { self.owners.len() }

    fn owners(&self) -> Box<dyn Iterator<Item = EntityId> + '_> {
        Box::new(self.owners.keys().copied())
    }
}

#[cfg(test)]
super::tests::test_storage!(Simple::new);
