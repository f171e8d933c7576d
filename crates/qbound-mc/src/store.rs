//! Visited-state storage for one exploration run.

use crate::state::{Fingerprint, FingerprintSet};

/// The three fingerprint sets an exploration run maintains.
///
/// Membership is by fingerprint only. Every run starts from [`VisitedSets::clear`].
#[derive(Debug, Default)]
pub struct VisitedSets {
    /// Concrete states reached this run.
    concrete: FingerprintSet,
    /// Abstractions of the concrete states reached this run.
    abstracts: FingerprintSet,
    /// One-step abstract successors of the abstract states above.
    abstract_successors: FingerprintSet,
}

impl VisitedSets {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget everything seen by a previous run.
    pub fn clear(&mut self) {
        self.concrete.clear();
        self.abstracts.clear();
        self.abstract_successors.clear();
    }

    /// Record a concrete state. Returns true if it was new.
    #[inline]
    pub fn insert_concrete(&mut self, fp: Fingerprint) -> bool {
        self.concrete.insert(fp)
    }

    /// Record an abstract state. Returns true if it was new.
    #[inline]
    pub fn insert_abstract(&mut self, fp: Fingerprint) -> bool {
        self.abstracts.insert(fp)
    }

    /// Record an abstract successor. Returns true if it was new.
    #[inline]
    pub fn insert_abstract_successor(&mut self, fp: Fingerprint) -> bool {
        self.abstract_successors.insert(fp)
    }

    #[inline]
    pub fn contains_abstract(&self, fp: &Fingerprint) -> bool {
        self.abstracts.contains(fp)
    }

    pub fn concrete_len(&self) -> usize {
        self.concrete.len()
    }

    pub fn abstract_len(&self) -> usize {
        self.abstracts.len()
    }

    pub fn abstract_successor_len(&self) -> usize {
        self.abstract_successors.len()
    }

    pub fn concrete(&self) -> &FingerprintSet {
        &self.concrete
    }

    pub fn abstracts(&self) -> &FingerprintSet {
        &self.abstracts
    }

    pub fn abstract_successors(&self) -> &FingerprintSet {
        &self.abstract_successors
    }

    /// Abstract successors that are not (yet) visited abstract states, in
    /// ascending order.
    pub fn unreached_successors(&self) -> Vec<Fingerprint> {
        let mut missing: Vec<Fingerprint> = self
            .abstract_successors
            .iter()
            .filter(|fp| !self.abstracts.contains(fp))
            .copied()
            .collect();
        missing.sort_unstable();
        missing
    }
}
