//! Program catalogs
//!
//! A catalog maps program IDs to names. It is consumed only by trace
//! extractors (and optionally by [`FixedActionSpace`](crate::search::FixedActionSpace)
//! to enumerate the program set).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::ProgramId;

/// Lookup of program definitions by ID
pub trait ProgramCatalog: Send + Sync {
    /// Name of a program, or `None` if the ID is not in the catalog
    fn name_of(&self, id: ProgramId) -> Option<String>;

    /// All program IDs known to the catalog, ascending
    fn program_ids(&self) -> Vec<ProgramId>;

    /// Optional richer description (arguments, parameters) for a program.
    ///
    /// Defaults to the name.
    fn describe(&self, id: ProgramId) -> Option<String> {
        self.name_of(id)
    }
}

/// In-memory catalog backed by an ordered map
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StaticCatalog {
    names: BTreeMap<ProgramId, String>,
    #[serde(default)]
    descriptions: BTreeMap<ProgramId, String>,
}

impl StaticCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog whose IDs are the positions of `names` (0, 1, 2, ...)
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names = names
            .into_iter()
            .enumerate()
            .map(|(i, name)| (ProgramId(i as u32), name.into()))
            .collect();
        Self {
            names,
            descriptions: BTreeMap::new(),
        }
    }

    pub fn with_program(mut self, id: ProgramId, name: impl Into<String>) -> Self {
        self.names.insert(id, name.into());
        self
    }

    pub fn with_description(mut self, id: ProgramId, description: impl Into<String>) -> Self {
        self.descriptions.insert(id, description.into());
        self
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl ProgramCatalog for StaticCatalog {
    fn name_of(&self, id: ProgramId) -> Option<String> {
        self.names.get(&id).cloned()
    }

    fn program_ids(&self) -> Vec<ProgramId> {
        self.names.keys().copied().collect()
    }

    fn describe(&self, id: ProgramId) -> Option<String> {
        self.descriptions
            .get(&id)
            .cloned()
            .or_else(|| self.name_of(id))
    }
}
