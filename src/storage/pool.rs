use std::collections::BTreeMap;
use std::sync::Arc;

use xias::Xias;

use super::{Record, RecordMut, Storage};
use crate::comp::Schema;
use crate::entity::EntityId;
use crate::prop::{ObjectRef, ObjectState};

/// The packed row layout of a component type.
#[derive(Debug, Clone)]
pub struct Layout {
    /// The byte width of a row.
    width:    usize,
    /// The byte offset of each field, `None` for fields that are not packed.
    offsets:  Vec<Option<usize>>,
    /// A row holding the default value of every packed field.
    defaults: Box<[u8]>,
}

impl Layout {
    /// Packs every fixed-width scalar field in declaration order.
    pub fn new(schema: &Schema) -> Self {
        let mut width = 0;
        let offsets: Vec<_> = schema
            .fields()
            .map(|field| {
                let size = field.scalar()?.width()?;
                let offset = width;
                width += size;
                Some(offset)
            })
            .collect();

        let mut defaults = vec![0; width].into_boxed_slice();
        for (field, offset) in schema.fields().zip(&offsets) {
            if let (Some(scalar), &Some(offset)) = (field.scalar(), offset) {
                let size = scalar.width().expect("packed fields have a width");
                scalar.write_le(field.default_value(), &mut defaults[offset..offset + size]);
            }
        }

        Self { width, offsets, defaults }
    }

    /// The byte width of a row.
    pub fn width(&self) -> usize { self.width }

    /// The byte offset of the field at `index` within a row.
    pub fn offset(&self, index: usize) -> Option<usize> {
        self.offsets.get(index).copied().flatten()
    }

    /// A row with every packed field at its default.
    pub fn defaults(&self) -> &[u8] { &self.defaults }
}

/// A packed, chunked storage.
///
/// Record `handle` lives in chunk `handle / chunk_len`
/// at byte offset `width * (handle % chunk_len)`.
/// Chunks are appended when every row is in use and are never released.
#[derive(Debug)]
pub struct Pool {
    schema:     Arc<Schema>,
    layout:     Layout,
    chunk_len:  usize,
    chunks:     Vec<Box<[u8]>>,
    records:    Vec<Record>,
    free:       Vec<u32>,
    owners:     BTreeMap<EntityId, u32>,
    generation: u64,
}

impl Pool {
    /// Constructs an empty pool with `chunk_len` rows per chunk.
    pub fn new(schema: Arc<Schema>, chunk_len: usize) -> Self {
        let layout = Layout::new(&schema);
        log::debug!(
            "Pool for `{}` has {}-byte rows, {} rows per chunk",
            schema.name(),
            layout.width,
            chunk_len
        );

        Self {
            schema,
            layout,
            chunk_len: chunk_len.max(1),
            chunks: Vec::new(),
            records: Vec::new(),
            free: Vec::new(),
            owners: BTreeMap::new(),
            generation: 0,
        }
    }

    /// The row layout.
    pub fn layout(&self) -> &Layout { &self.layout }

    /// The number of rows per chunk.
    pub fn chunk_len(&self) -> usize { self.chunk_len }

    /// The raw chunks.
    pub fn chunks(&self) -> &[Box<[u8]>] { &self.chunks }

    /// Mutable access to the raw bytes of a chunk.
    ///
    /// Writes through this slice bypass dirty tracking.
    pub fn chunk_mut(&mut self, index: usize) -> Option<&mut [u8]> {
        self.chunks.get_mut(index).map(|chunk| &mut chunk[..])
    }

    /// The number of chunk allocations so far.
    ///
    /// Foreign code holding chunk pointers must refresh them when this changes.
    pub fn generation(&self) -> u64 { self.generation }

    /// The chunk index and the byte offset within the chunk of a handle.
    pub fn locate(&self, handle: u32) -> (usize, usize) {
        let handle = handle.small_int::<usize>();
        (handle / self.chunk_len, self.layout.width * (handle % self.chunk_len))
    }

    fn row(&self, handle: u32) -> &[u8] {
        let (chunk, offset) = self.locate(handle);
        &self.chunks[chunk][offset..offset + self.layout.width]
    }

    fn grow(&mut self) {
        self.chunks.push(self.layout.defaults.repeat(self.chunk_len).into_boxed_slice());
        self.generation += 1;
        log::trace!(
            "Pool for `{}` grew to {} chunks (generation {})",
            self.schema.name(),
            self.chunks.len(),
            self.generation
        );
    }
}

impl Storage for Pool {
    fn schema(&self) -> &Arc<Schema> { &self.schema }

    fn create(&mut self, owner: EntityId) -> u32 {
        if let Some(&handle) = self.owners.get(&owner) {
            return handle;
        }

        let handle = match self.free.pop() {
            Some(handle) => handle,
            None => {
                let handle = self.records.len();
                if handle == self.chunks.len() * self.chunk_len {
                    self.grow();
                }
                self.records.push(Record {
                    owner: None,
                    state: ObjectState::with_offsets(self.schema.clone(), &self.layout.offsets),
                });
                handle.small_int()
            }
        };

        self.records[handle.small_int::<usize>()].owner = Some(owner);
        self.owners.insert(owner, handle);
        handle
    }

    fn destroy(&mut self, owner: EntityId) -> bool {
        let handle = match self.owners.remove(&owner) {
            Some(handle) => handle,
            None => return false,
        };

        let (chunk, offset) = self.locate(handle);
        let row = &mut self.chunks[chunk][offset..offset + self.layout.width];
        let record = &mut self.records[handle.small_int::<usize>()];
        record.state.reset(row);
        record.owner = None;
        self.free.push(handle);
        true
    }

    fn handle(&self, owner: EntityId) -> Option<u32> { self.owners.get(&owner).copied() }

    fn read(&self, owner: EntityId) -> Option<ObjectRef<'_>> {
        let handle = self.handle(owner)?;
        let record = &self.records[handle.small_int::<usize>()];
        Some(ObjectRef::new(&record.state, self.row(handle)))
    }

    fn write(&mut self, owner: EntityId) -> Option<RecordMut<'_>> {
        let handle = self.handle(owner)?;
        let (chunk, offset) = self.locate(handle);
        let row = &mut self.chunks[chunk][offset..offset + self.layout.width];
        let record = &mut self.records[handle.small_int::<usize>()];
        Some(RecordMut { state: &mut record.state, row })
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

    fn packed(&self) -> Option<&Pool> { Some(self) }

    fn packed_mut(&mut self) -> Option<&mut Pool> { Some(self) }
}

#[cfg(test)]
super::tests::test_storage!(|schema| Pool::new(schema, 2));
