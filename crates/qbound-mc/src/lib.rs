//! Depth-first explicit-state explorer for systems of communicating
//! components, with queue-bound convergence checking.

pub mod choice;
pub mod convergence;
pub mod dump;
pub mod explorer;
pub mod frame;
pub mod investigate;
pub mod state;
pub mod store;

#[cfg(test)]
mod testing;

pub use choice::{ChoiceRecord, Replayer};
pub use convergence::{
    AutoDecisions, ConvergenceConfig, ConvergenceController, ConvergenceOutcome, DecisionProvider,
    NonConvergenceAction, RunCounters,
};
pub use dump::DumpConfig;
pub use explorer::{CheckError, CheckResult, ExploreConfig, ExploreStats, Explorer, SearchOutcome};
pub use frame::Frame;
pub use investigate::Investigation;
pub use state::{ChoiceSource, ConcreteState, Fingerprint, FingerprintSet};
pub use store::VisitedSets;
