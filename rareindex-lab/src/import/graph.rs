//! Model dependency graph and import ordering
//!
//! Edges run from a model to every model its foreign keys point at.
//! Self references (pedigree parents) are left out of the graph; the
//! importer back-fills them after the batch insert instead.

use super::ImportError;
use rareindex_common::db::ModelRegistry;
use std::collections::{BTreeSet, HashMap};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Visiting,
    Done,
}

/// Foreign-key dependency graph keyed by model name
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    /// Models in registry order, for deterministic traversal
    models: Vec<&'static str>,
    edges: HashMap<&'static str, BTreeSet<&'static str>>,
}

impl DependencyGraph {
    pub fn from_registry(registry: &ModelRegistry) -> Self {
        let mut models = Vec::new();
        let mut edges = HashMap::new();

        for schema in registry.schemas() {
            let deps: BTreeSet<&'static str> = schema
                .foreign_keys()
                .map(|(_, fk)| fk.model)
                .filter(|target| *target != schema.model)
                .collect();
            models.push(schema.model);
            edges.insert(schema.model, deps);
        }

        Self { models, edges }
    }

    /// Models `model` points at (self references excluded)
    pub fn dependencies(&self, model: &str) -> Option<&BTreeSet<&'static str>> {
        self.edges.get(model)
    }

    /// Depth-first topological order with `root` (and its dependencies) first
    ///
    /// Every model appears after all models it references. A cycle aborts
    /// with [`ImportError::CircularDependency`] naming a model on the cycle.
    pub fn import_order(&self, root: &str) -> Result<Vec<&'static str>, ImportError> {
        let mut marks: HashMap<&'static str, Mark> = HashMap::new();
        let mut order = Vec::with_capacity(self.models.len());

        let root = self
            .models
            .iter()
            .copied()
            .find(|m| *m == root)
            .ok_or_else(|| ImportError::UnknownModel(root.to_string()))?;

        self.visit(root, &mut marks, &mut order)?;
        for model in self.models.iter().copied() {
            self.visit(model, &mut marks, &mut order)?;
        }

        Ok(order)
    }

    fn visit(
        &self,
        model: &'static str,
        marks: &mut HashMap<&'static str, Mark>,
        order: &mut Vec<&'static str>,
    ) -> Result<(), ImportError> {
        match marks.get(model) {
            Some(Mark::Done) => return Ok(()),
            Some(Mark::Visiting) => return Err(ImportError::CircularDependency(model.to_string())),
            None => {}
        }

        marks.insert(model, Mark::Visiting);
        if let Some(deps) = self.edges.get(model) {
            for dep in deps {
                // References to unregistered models are caught by the registry tests
                if self.edges.contains_key(dep) {
                    self.visit(*dep, marks, order)?;
                }
            }
        }
        marks.insert(model, Mark::Done);
        order.push(model);
        Ok(())
    }
}
