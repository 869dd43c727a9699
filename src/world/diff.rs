//! Capturing and applying world-level diffs.

use std::collections::BTreeMap;

use indexmap::IndexMap;

use super::World;
use crate::codec::{self, WorldCodec};
use crate::entity::{Entity, EntityId};
use crate::error::Error;
use crate::value::Fields;

/// The change of one component of an entity.
#[derive(Debug, Clone, PartialEq)]
pub enum ComponentDiff {
    /// The dirty fields of an attached component.
    Changed(Fields),
    /// The component was detached.
    Removed,
}

/// The change of one entity.
#[derive(Debug, Clone, PartialEq)]
pub enum EntityDiff {
    /// The entity is live; lists its changed and removed components in registration order.
    Live(IndexMap<String, ComponentDiff>),
    /// The entity was destroyed.
    Destroyed,
}

/// The changes of every entity, keyed by id.
pub type WorldDiff = BTreeMap<EntityId, EntityDiff>;

impl World {
    /// Collects the changes since the last [`mark_clean`](Self::mark_clean).
    ///
    /// This does not change any state, so calling it twice returns equal diffs.
    /// An id that was destroyed and then created again is reported as live.
    pub fn diff(&self) -> WorldDiff {
        let mut diff: WorldDiff =
            self.destroyed.iter().map(|&id| (id, EntityDiff::Destroyed)).collect();

        for id in &self.dirty {
            let entity = self.entities.get(id).expect("dirty entities are live");
            diff.insert(*id, EntityDiff::Live(self.entity_diff(entity)));
        }
        diff
    }

    fn entity_diff(&self, entity: &Entity) -> IndexMap<String, ComponentDiff> {
        self.names
            .iter()
            .enumerate()
            .filter_map(|(index, name)| {
                let diff = if entity.components[index] {
                    let record = self.storages[index].read(entity.id).expect("attached");
                    match record.diff() {
                        Some(fields) => ComponentDiff::Changed(fields),
                        // attached components are reported even if they have no fields
                        None if entity.added[index] => ComponentDiff::Changed(Fields::new()),
                        None => return None,
                    }
                } else if entity.removed[index] {
                    ComponentDiff::Removed
                } else {
                    return None;
                };
                Some((name.clone(), diff))
            })
            .collect()
    }

    /// Whether anything changed since the last [`mark_clean`](Self::mark_clean).
    pub fn is_dirty(&self) -> bool { !self.dirty.is_empty() || !self.destroyed.is_empty() }

    /// Forgets every change, so that the next diff is empty.
    pub fn mark_clean(&mut self) {
        for storage in &mut self.storages {
            storage.mark_clean();
        }
        for entity in self.entities.values_mut() {
            entity.mark_clean();
        }
        self.dirty.clear();
        self.destroyed.clear();
    }

    /// Applies a diff received from another world.
    ///
    /// Destroyed entities are marked for destruction.
    /// Unknown live entities are created with the listed components.
    /// Known live entities have removed components detached
    /// and changed components attached or patched.
    ///
    /// Entries are applied in id order; entries before a rejected one stay applied.
    pub fn set(&mut self, diff: &WorldDiff) -> Result<(), Error> {
        for (&id, entry) in diff {
            match entry {
                EntityDiff::Destroyed => {
                    if self.contains(id) {
                        self.destroy(id)?;
                    }
                }
                EntityDiff::Live(comps) if !self.contains(id) => {
                    let init = comps.iter().filter_map(|(name, comp)| match comp {
                        ComponentDiff::Changed(fields) => Some((name.as_str(), fields)),
                        ComponentDiff::Removed => None,
                    });
                    let comps = self.validate(id, init)?;
                    self.ealloc.reserve(id);
                    self.spawn(id, comps)?;
                }
                EntityDiff::Live(comps) => {
                    for (name, comp) in comps {
                        match comp {
                            ComponentDiff::Changed(fields) => self.attach(id, name, fields)?,
                            ComponentDiff::Removed => {
                                self.detach(id, name)?;
                            }
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Encodes [`diff`](Self::diff) in the binary wire format.
    pub fn encode_diff(&self) -> Result<Vec<u8>, Error> {
        let bytes = codec::encode(&WorldCodec::new(self), &self.diff())?;
        log::trace!("Encoded diff into {} bytes", bytes.len());
        Ok(bytes)
    }

    /// Decodes a diff in the binary wire format and [`set`](Self::set)s it.
    ///
    /// Nothing is applied if the bytes cannot be decoded.
    pub fn set_encoded(&mut self, bytes: &[u8]) -> Result<(), Error> {
        let diff = codec::decode(&WorldCodec::new(self), bytes)?;
        self.set(&diff)
    }
}
