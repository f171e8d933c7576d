//! Queue-bound iteration and the abstract convergence test.
//!
//! The controller explores the system for bounds `k = 1, 2, ...` with
//! abstraction tracking on. Once the number of abstract states stops growing
//! after having grown (a plateau), it checks that every abstract successor
//! is itself a visited abstract state. If so, larger bounds cannot produce
//! new abstract behavior and the search has converged.

use crate::explorer::{CheckError, CheckResult, ExploreStats, Explorer, SearchOutcome};
use crate::state::{ConcreteState, Fingerprint};
use tracing::{info, warn};

/// Reaction to a plateau that failed the convergence test.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NonConvergenceAction {
    /// Move on to the next bound, ignoring the unreached successor.
    Continue,
    /// Re-run the current bound to locate the unreached successor.
    Investigate,
}

/// Answers the questions the controller would otherwise ask a user.
pub trait DecisionProvider {
    /// Called before exploring at `bound`. Returning false ends the search.
    fn proceed_to_bound(&mut self, bound: usize) -> bool;

    /// Called when the plateau at `bound` has the unreached abstract
    /// successor `hash`.
    fn on_unreached_successor(&mut self, bound: usize, hash: Fingerprint) -> NonConvergenceAction;
}

/// Non-interactive decisions: always proceed, and either always continue
/// or always investigate.
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoDecisions {
    pub investigate: bool,
}

impl DecisionProvider for AutoDecisions {
    fn proceed_to_bound(&mut self, _bound: usize) -> bool {
        true
    }

    fn on_unreached_successor(&mut self, _bound: usize, _hash: Fingerprint) -> NonConvergenceAction {
        if self.investigate {
            NonConvergenceAction::Investigate
        } else {
            NonConvergenceAction::Continue
        }
    }
}

/// Configuration for the bound iteration.
#[derive(Debug, Clone, Default)]
pub struct ConvergenceConfig {
    /// First bound to consider. Bound 0 (unbounded) is always skipped.
    pub start_bound: usize,
    /// Largest bound to explore (0 = unlimited).
    pub max_bound: usize,
    /// Width of the tail abstraction, for reporting.
    pub tail: usize,
}

/// Visited counts carried from one run to the next.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunCounters {
    pub concrete_previous: usize,
    pub abstract_previous: usize,
    pub abstract_previous_previous: usize,
}

impl RunCounters {
    /// The abstract count grew in the previous run but not in this one.
    pub fn is_plateau(&self, abstracts: usize) -> bool {
        self.abstract_previous_previous < self.abstract_previous
            && self.abstract_previous == abstracts
    }

    pub fn roll_forward(&mut self, stats: &ExploreStats) {
        self.abstract_previous_previous = self.abstract_previous;
        self.abstract_previous = stats.abstracts;
        self.concrete_previous = stats.concrete;
    }
}

/// Result of the bound iteration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConvergenceOutcome {
    /// Every abstract successor was visited at `bound`.
    Converged { bound: usize, stats: ExploreStats },
    /// The decision provider declined to explore `bound`.
    Aborted { bound: usize },
    /// Successor search reached `hash`; a plain run at `bound` then
    /// collected the competitors of `predecessor`.
    TargetLocated {
        bound: usize,
        hash: Fingerprint,
        predecessor: Option<Fingerprint>,
        competitors: Vec<Fingerprint>,
        stats: ExploreStats,
    },
    /// `max_bound` was explored without convergence.
    BoundLimitReached {
        bound: usize,
        stats: Option<ExploreStats>,
    },
}

pub struct ConvergenceController<D> {
    explorer: Explorer,
    config: ConvergenceConfig,
    decisions: D,
    counters: RunCounters,
}

impl<D: DecisionProvider> ConvergenceController<D> {
    pub fn new(explorer: Explorer, config: ConvergenceConfig, decisions: D) -> Self {
        Self {
            explorer,
            config,
            decisions,
            counters: RunCounters::default(),
        }
    }

    pub fn explorer(&self) -> &Explorer {
        &self.explorer
    }

    pub fn counters(&self) -> &RunCounters {
        &self.counters
    }

    pub fn decisions(&self) -> &D {
        &self.decisions
    }

    /// Explore `initial` for increasing bounds until convergence, a located
    /// investigation target, the bound limit, or a declined prompt.
    pub fn run<S: ConcreteState>(&mut self, initial: &S) -> CheckResult<ConvergenceOutcome> {
        let mut bound = self.config.start_bound;
        let mut last = None;
        let mut hunting: Option<Fingerprint> = None;

        loop {
            if self.config.max_bound > 0 && bound > self.config.max_bound {
                info!(max_bound = self.config.max_bound, "bound limit reached without convergence");
                return Ok(ConvergenceOutcome::BoundLimitReached {
                    bound: self.config.max_bound,
                    stats: last,
                });
            }

            if bound == 0 {
                info!("skipping queue bound 0");
                bound += 1;
                continue;
            }

            // The investigation re-run of a bound is not asked about again.
            if hunting.is_none() && !self.decisions.proceed_to_bound(bound) {
                info!(bound, "exploration declined, stopping");
                return Ok(ConvergenceOutcome::Aborted { bound });
            }

            let stats = match self.explorer.explore(initial, bound, true)? {
                SearchOutcome::TargetFound {
                    hash, predecessor, ..
                } => return self.locate(initial, bound, hash, predecessor),
                SearchOutcome::Completed(stats) => stats,
            };
            if let Some(hash) = hunting {
                return Err(CheckError::TargetNotFound { hash, bound });
            }

            if stats.concrete == self.counters.concrete_previous {
                info!(bound, concrete = stats.concrete, "concrete state sequence converged");
            }

            if self.counters.is_plateau(stats.abstracts) {
                info!(
                    bound,
                    abstracts = stats.abstracts,
                    tail = self.config.tail,
                    "new plateau detected, running abstract convergence test"
                );
                let unreached = self.explorer.unreached_successors();
                let Some(&hash) = unreached.first() else {
                    info!(bound, "abstract state space converged");
                    return Ok(ConvergenceOutcome::Converged { bound, stats });
                };
                warn!(
                    bound,
                    hash = %hash,
                    unreached = unreached.len(),
                    "did not converge: found an unreached abstract successor"
                );
                match self.decisions.on_unreached_successor(bound, hash) {
                    NonConvergenceAction::Continue => {}
                    NonConvergenceAction::Investigate => {
                        // Same bound again, this time stopping at the successor.
                        self.explorer.set_successor_target(Some(hash));
                        self.explorer.config_mut().dump.states = false;
                        hunting = Some(hash);
                        continue;
                    }
                }
            }

            self.counters.roll_forward(&stats);
            last = Some(stats);
            bound += 1;
        }
    }

    /// After successor search stopped at `hash`, re-explore `bound` without
    /// abstraction, collecting the competitors of `predecessor`.
    fn locate<S: ConcreteState>(
        &mut self,
        initial: &S,
        bound: usize,
        hash: Fingerprint,
        predecessor: Option<Fingerprint>,
    ) -> CheckResult<ConvergenceOutcome> {
        info!(bound, hash = %hash, "restarting exploration to collect competitors");
        self.explorer.set_successor_target(None);
        self.explorer.set_predecessor_target(predecessor);
        self.explorer.reset_competitors();

        let outcome = self.explorer.explore(initial, bound, false)?;
        Ok(ConvergenceOutcome::TargetLocated {
            bound,
            hash,
            predecessor,
            competitors: self.explorer.competitors().to_vec(),
            stats: *outcome.stats(),
        })
    }
}
