//! Action spaces: which programs may follow a prefix

use crate::extraction::ProgramCatalog;
use crate::types::ProgramId;

/// Source of eligible next programs for a tree node
///
/// An empty result marks the prefix as terminal.
pub trait ActionSpace: Send + Sync {
    fn next_programs(&self, prefix: &[ProgramId]) -> Vec<ProgramId>;
}

/// The same program set at every step, up to a maximum sequence length
#[derive(Debug, Clone)]
pub struct FixedActionSpace {
    programs: Vec<ProgramId>,
    max_depth: usize,
}

impl FixedActionSpace {
    pub fn new(mut programs: Vec<ProgramId>, max_depth: usize) -> Self {
        programs.sort_unstable();
        programs.dedup();
        Self {
            programs,
            max_depth,
        }
    }

    /// Every program in `catalog`
    pub fn from_catalog(catalog: &dyn ProgramCatalog, max_depth: usize) -> Self {
        Self::new(catalog.program_ids(), max_depth)
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }
}

impl ActionSpace for FixedActionSpace {
    fn next_programs(&self, prefix: &[ProgramId]) -> Vec<ProgramId> {
        if prefix.len() >= self.max_depth {
            Vec::new()
        } else {
            self.programs.clone()
        }
    }
}
