//! State fingerprints and the boundary to the explored system.

use std::collections::HashSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::io;
use std::num::ParseIntError;
use std::str::FromStr;

/// A fingerprint is a 64-bit hash identifying a state.
///
/// Visited sets compare fingerprints only; two distinct states that hash
/// identically are treated as the same state.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Fingerprint(u64);

impl Fingerprint {
    #[inline]
    pub fn as_u64(self) -> u64 {
        self.0
    }

    #[inline]
    pub fn from_u64(v: u64) -> Self {
        Fingerprint(v)
    }

    /// Fingerprint any hashable value with fixed-key AHash.
    pub fn of<T: Hash + ?Sized>(value: &T) -> Self {
        let mut hasher = ahash::AHasher::default();
        value.hash(&mut hasher);
        Fingerprint(hasher.finish())
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({:016x})", self.0)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

impl FromStr for Fingerprint {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .unwrap_or(s);
        u64::from_str_radix(digits, 16).map(Fingerprint)
    }
}

/// Set of fingerprints, as kept by the explorer and filled by abstract
/// successor collection.
pub type FingerprintSet = HashSet<Fingerprint>;

/// Source of boolean nondeterministic decisions during a single step.
pub trait ChoiceSource {
    fn choose(&mut self) -> bool;
}

/// A full snapshot of the explored system.
///
/// `Clone` must be a deep copy: the explorer forks states by cloning and
/// mutates the copies independently. `Display` is the pretty-printed form
/// written to dump files.
pub trait ConcreteState: Clone + fmt::Display {
    /// Handle naming one runnable component.
    type Component: Copy + fmt::Debug;

    /// Content hash of the state.
    fn fingerprint(&self) -> Fingerprint;

    /// Components with a runnable transition, in a stable order.
    fn enabled_components(&self) -> Vec<Self::Component>;

    /// Execute one transition of `component`, consulting `choices` for every
    /// nondeterministic decision.
    fn run_one_step(&mut self, component: Self::Component, choices: &mut dyn ChoiceSource);

    /// Whether this state, reached at `depth`, violates a safety condition
    /// or failed an assumption. Failed states are pruned.
    fn is_failed(&self, depth: usize) -> bool;

    /// Set the event-queue capacity (0 = unbounded) for subsequent steps.
    fn set_bound(&mut self, bound: usize);

    /// Length of the longest event queue, for diagnostics.
    fn max_queue_len(&self) -> usize {
        0
    }

    /// Replace this state by its abstraction.
    fn abstract_in_place(&mut self);

    /// Insert into `sink` the fingerprints of all one-step abstract
    /// successors of this (abstract) state that satisfy the static
    /// invariants. Each successor is also written to `dump` when given.
    fn collect_abstract_successors(
        &self,
        sink: &mut FingerprintSet,
        dump: Option<&mut dyn io::Write>,
    ) -> io::Result<()>;
}
