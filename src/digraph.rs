//! A dependency graph with an iterative topological sort.
//!
//! Used for the registration order of component types
//! and for the tick order of systems within a phase.

use std::fmt;
use std::hash::Hash;

use indexmap::IndexSet;

use crate::error::CycleError;

#[cfg(test)]
mod tests;

/// A directed graph whose edges point from a dependent to its dependencies.
#[derive(Debug, Clone)]
pub struct Digraph<V> {
    /// The vertices in insertion order.
    vertices:     IndexSet<V>,
    /// If `dependencies[a].contains(b)`, `b` must be ordered before `a`.
    dependencies: Vec<Vec<usize>>,
    /// The reverse of `dependencies`.
    dependents:   Vec<Vec<usize>>,
}

impl<V> Default for Digraph<V> {
    fn default() -> Self {
        Self { vertices: IndexSet::new(), dependencies: Vec::new(), dependents: Vec::new() }
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    InProgress,
    Done,
}

impl<V: Clone + Eq + Hash + fmt::Display> Digraph<V> {
    /// Constructs an empty graph.
    pub fn new() -> Self { Self::default() }

    /// Adds a vertex if it is not already present, returning its index.
    pub fn add_vertex(&mut self, vertex: V) -> usize {
        let (index, inserted) = self.vertices.insert_full(vertex);
        if inserted {
            self.dependencies.push(Vec::new());
            self.dependents.push(Vec::new());
        }
        index
    }

    /// Declares that `tail` must be ordered before `head`.
    ///
    /// Missing vertices are added.
    pub fn add_dependency(&mut self, head: V, tail: V) {
        let head = self.add_vertex(head);
        let tail = self.add_vertex(tail);
        if !self.dependencies[head].contains(&tail) {
            self.dependencies[head].push(tail);
            self.dependents[tail].push(head);
        }
    }

    /// Whether `vertex` was added.
    pub fn contains(&self, vertex: &V) -> bool { self.vertices.contains(vertex) }

    /// The number of vertices.
    pub fn len(&self) -> usize { self.vertices.len() }

    /// Whether the graph has no vertices.
    pub fn is_empty(&self) -> bool { self.vertices.is_empty() }

    /// The vertices in insertion order.
    pub fn vertices(&self) -> impl Iterator<Item = &V> + '_ { self.vertices.iter() }

    /// The vertices that directly depend on `vertex`.
    pub fn dependents_of(&self, vertex: &V) -> impl Iterator<Item = &V> + '_ {
        let indices = match self.vertices.get_index_of(vertex) {
            Some(index) => &self.dependents[index][..],
            None => &[],
        };
        indices.iter().map(|&index| &self.vertices[index])
    }

    /// Orders the vertices so that every vertex follows its dependencies.
    ///
    /// Vertices are visited depth-first in insertion order
    /// and emitted when all of their dependencies have been emitted,
    /// so independent vertices keep their insertion order.
    pub fn sort(&self) -> Result<Vec<V>, CycleError> {
        let mut marks = vec![Mark::Unvisited; self.vertices.len()];
        let mut order = Vec::with_capacity(self.vertices.len());
        // (vertex, number of dependencies already visited)
        let mut stack: Vec<(usize, usize)> = Vec::new();

        for root in 0..self.vertices.len() {
            if marks[root] != Mark::Unvisited {
                continue;
            }

            marks[root] = Mark::InProgress;
            stack.push((root, 0));

            while let Some(&mut (vertex, ref mut next)) = stack.last_mut() {
                match self.dependencies[vertex].get(*next) {
                    Some(&dep) => {
                        *next += 1;
                        match marks[dep] {
                            Mark::Unvisited => {
                                marks[dep] = Mark::InProgress;
                                stack.push((dep, 0));
                            }
                            Mark::InProgress => return Err(self.cycle(&stack, dep)),
                            Mark::Done => {}
                        }
                    }
                    None => {
                        marks[vertex] = Mark::Done;
                        order.push(self.vertices[vertex].clone());
                        stack.pop();
                    }
                }
            }
        }

        Ok(order)
    }

    /// Describes the cycle closed by an edge from the top of `stack` to `dep`.
    fn cycle(&self, stack: &[(usize, usize)], dep: usize) -> CycleError {
        let path = stack
            .iter()
            .map(|&(vertex, _)| vertex)
            .skip_while(|&vertex| vertex != dep)
            .chain([dep])
            .map(|vertex| self.vertices[vertex].to_string())
            .collect();
        CycleError { path }
    }
}
