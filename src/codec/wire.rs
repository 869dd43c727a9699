use indexmap::IndexMap;

use super::{Codec, ObjectCodec, Reader, Writer};
use crate::comp::Schema;
use crate::entity::EntityId;
use crate::error::CodecError;
use crate::world::{ComponentDiff, EntityDiff, World, WorldDiff};

/// Encodes the change of one component: a bool telling whether it was removed,
/// followed by its changed fields if it was not.
#[derive(Debug, Clone, Copy)]
pub struct ComponentCodec<'a>(pub &'a Schema);

impl Codec for ComponentCodec<'_> {
    type Item = ComponentDiff;

    fn encode(&self, item: &ComponentDiff, writer: &mut Writer) -> Result<(), CodecError> {
        match item {
            ComponentDiff::Removed => {
                writer.bool(true);
                Ok(())
            }
            ComponentDiff::Changed(fields) => {
                writer.bool(false);
                ObjectCodec(self.0).encode(fields, writer)
            }
        }
    }

    fn decode(&self, reader: &mut Reader<'_>) -> Result<ComponentDiff, CodecError> {
        if reader.bool()? {
            Ok(ComponentDiff::Removed)
        } else {
            Ok(ComponentDiff::Changed(ObjectCodec(self.0).decode(reader)?))
        }
    }
}

/// Encodes the component changes of a live entity.
///
/// A presence bitmap over the registered component types
/// is followed by the change of each present component, in registration order.
#[derive(Debug, Clone)]
pub struct EntityCodec<'a> {
    components: IndexMap<&'a str, &'a Schema>,
}

impl<'a> EntityCodec<'a> {
    /// Creates a codec for the given component types in registration order.
    pub fn new(components: impl IntoIterator<Item = (&'a str, &'a Schema)>) -> Self {
        Self { components: components.into_iter().collect() }
    }
}

impl Codec for EntityCodec<'_> {
    type Item = IndexMap<String, ComponentDiff>;

    fn encode(&self, item: &Self::Item, writer: &mut Writer) -> Result<(), CodecError> {
        if let Some(name) = item.keys().find(|name| !self.components.contains_key(name.as_str())) {
            return Err(CodecError::UnknownComponent(name.clone()));
        }

        writer.bitmap(self.components.keys().map(|&name| item.contains_key(name)));
        for (&name, &schema) in &self.components {
            if let Some(comp) = item.get(name) {
                ComponentCodec(schema).encode(comp, writer)?;
            }
        }
        Ok(())
    }

    fn decode(&self, reader: &mut Reader<'_>) -> Result<Self::Item, CodecError> {
        let present = reader.bitmap(self.components.len())?;

        let mut comps = IndexMap::new();
        for (index, (&name, &schema)) in self.components.iter().enumerate() {
            if present[index] {
                comps.insert(name.to_string(), ComponentCodec(schema).decode(reader)?);
            }
        }
        Ok(comps)
    }
}

/// Encodes a [`WorldDiff`].
///
/// A varint entry count is followed by each entry in id order:
/// the varint id, a bool telling whether the entity is live,
/// and the entity change if it is.
#[derive(Debug, Clone)]
pub struct WorldCodec<'a> {
    entity: EntityCodec<'a>,
}

impl<'a> WorldCodec<'a> {
    /// Creates a codec for the component types of `world`.
    pub fn new(world: &'a World) -> Self {
        let schemas = world.schemas().map(|schema| &**schema);
        Self { entity: EntityCodec::new(world.component_names().zip(schemas)) }
    }

    /// The codec of the entity entries.
    pub fn entity(&self) -> &EntityCodec<'a> { &self.entity }
}

impl Codec for WorldCodec<'_> {
    type Item = WorldDiff;

    fn encode(&self, item: &WorldDiff, writer: &mut Writer) -> Result<(), CodecError> {
        writer.varint(item.len() as u64);
        for (id, entry) in item {
            writer.varint(id.get().into());
            match entry {
                EntityDiff::Destroyed => writer.bool(false),
                EntityDiff::Live(comps) => {
                    writer.bool(true);
                    self.entity.encode(comps, writer)?;
                }
            }
        }
        Ok(())
    }

    fn decode(&self, reader: &mut Reader<'_>) -> Result<WorldDiff, CodecError> {
        let len = reader.length(u32::MAX.into())?;

        let mut diff = WorldDiff::new();
        for _ in 0..len {
            let id = reader.varint_u32()?;
            let id = EntityId::new(id).ok_or(CodecError::OutOfRange(0))?;
            let entry = if reader.bool()? {
                EntityDiff::Live(self.entity.decode(reader)?)
            } else {
                EntityDiff::Destroyed
            };
            diff.insert(id, entry);
        }
        Ok(diff)
    }
}
