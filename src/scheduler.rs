//! The scheduler decides the order in which systems run.
//!
//! Systems are grouped by [`Phase`].
//! Within a phase, `before`/`after` hints become edges of a [`Digraph`]
//! and the systems are sorted topologically,
//! keeping registration order between unrelated systems.
//! The sorted phases are concatenated `Pre`, `Normal`, `Post`.

use std::collections::HashMap;

use crate::digraph::Digraph;
use crate::error::{Error, RegistrationError};
use crate::query::{Criteria, QueryId};
use crate::system::{Context, Descriptor, Phase, System};
use crate::world::World;

#[cfg(test)]
mod tests;

/// A scheduled system and its run state.
struct Entry {
    name:        String,
    interval:    Option<f64>,
    /// Seconds accumulated since the last run of an interval system.
    accumulated: f64,
    queries:     Vec<QueryId>,
    system:      Box<dyn System>,
}

impl Entry {
    /// Accumulates `delta` and returns the delta to run with, if the system is due.
    fn due(&mut self, delta: f64) -> Option<f64> {
        let interval = match self.interval {
            Some(interval) => interval,
            None => return Some(delta),
        };

        self.accumulated += delta;
        if self.accumulated >= interval {
            Some(std::mem::take(&mut self.accumulated))
        } else {
            None
        }
    }
}

/// The ordered list of systems of a world.
#[derive(Default)]
pub(crate) struct Scheduler {
    entries: Vec<Entry>,
}

impl Scheduler {
    /// Orders the described systems.
    ///
    /// `resolve` registers a declared query on behalf of the named system.
    pub(crate) fn new(
        descriptors: Vec<Descriptor>,
        mut resolve: impl FnMut(&str, &Criteria) -> Result<QueryId, RegistrationError>,
    ) -> Result<Self, RegistrationError> {
        let mut phases: HashMap<&str, Phase> = HashMap::new();
        for descriptor in &descriptors {
            if phases.insert(&descriptor.name, descriptor.phase).is_some() {
                return Err(RegistrationError::Duplicate(descriptor.name.clone()));
            }
        }

        let mut graphs: [Digraph<String>; 3] = Default::default();
        for descriptor in &descriptors {
            graphs[descriptor.phase as usize].add_vertex(descriptor.name.clone());
        }

        for descriptor in &descriptors {
            let hints = descriptor
                .before
                .iter()
                .map(|other| (other, true))
                .chain(descriptor.after.iter().map(|other| (other, false)));
            for (other, before) in hints {
                let phase = match phases.get(other.as_str()) {
                    Some(&phase) => phase,
                    None => {
                        return Err(RegistrationError::UnknownReference {
                            owner:  descriptor.name.clone(),
                            target: other.clone(),
                        })
                    }
                };
                if phase != descriptor.phase {
                    log::warn!(
                        "Ignoring ordering hint between `{}` ({:?}) and `{}` ({:?}) in different \
                         phases",
                        descriptor.name,
                        descriptor.phase,
                        other,
                        phase
                    );
                    continue;
                }

                let graph = &mut graphs[phase as usize];
                if before {
                    graph.add_dependency(other.clone(), descriptor.name.clone());
                } else {
                    graph.add_dependency(descriptor.name.clone(), other.clone());
                }
            }
        }

        let mut order = Vec::with_capacity(descriptors.len());
        for graph in &graphs {
            order.extend(graph.sort()?);
        }
        log::debug!("System order: {:?}", order);

        let mut descriptors: HashMap<String, Descriptor> = descriptors
            .into_iter()
            .map(|descriptor| (descriptor.name.clone(), descriptor))
            .collect();
        let entries = order
            .into_iter()
            .map(|name| -> Result<Entry, RegistrationError> {
                let descriptor = descriptors.remove(&name).expect("every vertex is a descriptor");
                let queries = descriptor
                    .queries
                    .iter()
                    .map(|criteria| resolve(&name, criteria))
                    .collect::<Result<_, _>>()?;
                Ok(Entry {
                    name,
                    interval: descriptor.interval,
                    accumulated: 0.,
                    queries,
                    system: descriptor.system,
                })
            })
            .collect::<Result<_, _>>()?;

        Ok(Self { entries })
    }

    /// The system names in run order.
    pub(crate) fn order(&self) -> impl Iterator<Item = &str> + '_ {
        self.entries.iter().map(|entry| entry.name.as_str())
    }

    /// Runs every due system in order.
    pub(crate) fn run(&mut self, world: &mut World, delta: f64) {
        for entry in &mut self.entries {
            let delta = match entry.due(delta) {
                Some(delta) => delta,
                None => continue,
            };

            log::trace!("Running system `{}` with delta {}", entry.name, delta);
            let mut ctx = Context { world: &mut *world, delta, queries: &entry.queries };
            entry.system.tick(&mut ctx);
        }
    }

    /// Binds a foreign module to the system `name`.
    pub(crate) fn bind(&mut self, name: &str, module: &[u8]) -> Result<(), Error> {
        let entry = match self.entries.iter_mut().find(|entry| entry.name == name) {
            Some(entry) => entry,
            None => {
                let source = "no such system".into();
                return Err(Error::Bind { system: name.to_string(), source });
            }
        };

        entry
            .system
            .bind(module)
            .map_err(|source| Error::Bind { system: entry.name.clone(), source })?;
        log::debug!("Bound a {}-byte module to system `{}`", module.len(), name);
        Ok(())
    }
}
