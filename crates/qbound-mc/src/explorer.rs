//! Depth-first state space explorer.

use crate::dump::{DumpConfig, RunDumps};
use crate::frame::Frame;
use crate::investigate::Investigation;
use crate::state::{ConcreteState, Fingerprint, FingerprintSet};
use crate::store::VisitedSets;
use std::io;
use thiserror::Error;
use tracing::{debug, info, trace};

/// Model checking error.
#[derive(Debug, Error)]
pub enum CheckError {
    #[error("failed to write dump: {0}")]
    Io(#[from] io::Error),

    #[error("re-run at queue bound {bound} finished without reaching abstract state {hash}")]
    TargetNotFound { hash: Fingerprint, bound: usize },
}

pub type CheckResult<T> = Result<T, CheckError>;

/// Counts reported by an exploration run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExploreStats {
    /// Distinct concrete states visited.
    pub concrete: usize,
    /// Distinct abstract states visited.
    pub abstracts: usize,
    /// Distinct abstract successors discovered.
    pub abstract_successors: usize,
    /// Successors discarded because they failed.
    pub pruned: usize,
    pub max_depth: usize,
    /// Longest event queue seen in a visited concrete state.
    pub max_queue_len: usize,
}

/// How an exploration run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchOutcome {
    /// The stack emptied.
    Completed(ExploreStats),
    /// The successor-search target was reached and the run stopped early.
    /// `predecessor` is the abstract state whose successors contained the
    /// target, when it was found that way.
    TargetFound {
        hash: Fingerprint,
        predecessor: Option<Fingerprint>,
        stats: ExploreStats,
    },
}

impl SearchOutcome {
    pub fn stats(&self) -> &ExploreStats {
        match self {
            SearchOutcome::Completed(stats) => stats,
            SearchOutcome::TargetFound { stats, .. } => stats,
        }
    }
}

/// Configuration for the explorer.
#[derive(Debug, Clone)]
pub struct ExploreConfig {
    /// Maximum depth to expand (0 = unlimited).
    pub max_depth: usize,
    /// Log progress every this many new concrete states (0 = never).
    pub progress_interval: usize,
    pub dump: DumpConfig,
}

impl Default for ExploreConfig {
    fn default() -> Self {
        Self {
            max_depth: 0,
            progress_interval: 1000,
            dump: DumpConfig::default(),
        }
    }
}

/// Target found while recording an abstract state.
struct Found {
    hash: Fingerprint,
    predecessor: Option<Fingerprint>,
}

/// Explorer for one search session.
///
/// Owns the visited sets and the investigation targets. Each call to
/// [`Explorer::explore`] clears the visited sets; targets and competitors
/// persist until changed.
pub struct Explorer {
    config: ExploreConfig,
    visited: VisitedSets,
    investigation: Investigation,
}

impl Explorer {
    pub fn new(config: ExploreConfig) -> Self {
        Self {
            config,
            visited: VisitedSets::new(),
            investigation: Investigation::default(),
        }
    }

    pub fn config(&self) -> &ExploreConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut ExploreConfig {
        &mut self.config
    }

    /// Visited sets of the most recent run.
    pub fn visited(&self) -> &VisitedSets {
        &self.visited
    }

    pub fn investigation(&self) -> &Investigation {
        &self.investigation
    }

    pub fn set_successor_target(&mut self, target: Option<Fingerprint>) {
        self.investigation.set_successor_target(target);
    }

    pub fn set_predecessor_target(&mut self, target: Option<Fingerprint>) {
        self.investigation.set_predecessor_target(target);
    }

    pub fn reset_competitors(&mut self) {
        self.investigation.reset_competitors();
    }

    pub fn competitors(&self) -> &[Fingerprint] {
        self.investigation.competitors()
    }

    /// Abstract successors of the last run missing from its abstract states.
    pub fn unreached_successors(&self) -> Vec<Fingerprint> {
        self.visited.unreached_successors()
    }

    /// Whether every abstract successor of the last run was also reached.
    pub fn is_converged(&self) -> bool {
        self.visited
            .abstract_successors()
            .iter()
            .all(|fp| self.visited.contains_abstract(fp))
    }

    /// Explore every state reachable from `initial` with queue bound `bound`
    /// (0 = unbounded). With `abstraction`, also record the abstraction of
    /// each visited state and its abstract successors.
    pub fn explore<S: ConcreteState>(
        &mut self,
        initial: &S,
        bound: usize,
        abstraction: bool,
    ) -> CheckResult<SearchOutcome> {
        if bound == 0 {
            info!(abstraction, "exploring with unbounded queues");
        } else {
            info!(bound, abstraction, "exploring with queue bound");
        }

        self.visited.clear();
        let mut dumps = RunDumps::open(&self.config.dump, bound)?;
        let mut stats = ExploreStats::default();

        let mut start = initial.clone();
        start.set_bound(bound);
        self.visited.insert_concrete(start.fingerprint());
        dumps.concrete(&start)?;
        stats.max_queue_len = start.max_queue_len();

        if abstraction {
            let mut start_abstract = start.clone();
            start_abstract.abstract_in_place();
            if let Some(found) = self.record_abstract(&start_abstract, &mut dumps)? {
                return self.stop_at_target(found, stats, dumps);
            }
        }

        let dump_dir = self.config.dump.dir.clone();
        let mut stack = vec![Frame::new(start)];

        while let Some(mut frame) = stack.pop() {
            if self.config.max_depth > 0 && frame.depth >= self.config.max_depth {
                continue;
            }

            // Exhausted frames are dropped: that is the backtrack.
            let Some(next) = frame.execute() else {
                continue;
            };
            stack.push(frame);

            if self.investigation.predecessor_target().is_some() {
                if let Some(current) = stack.last() {
                    self.investigation.check_transition(
                        &current.state,
                        &next.state,
                        dump_dir.as_deref(),
                    )?;
                }
            }

            if next.state.is_failed(next.depth) {
                stats.pruned += 1;
                trace!(depth = next.depth, "pruned failed successor");
                continue;
            }

            let fp = next.state.fingerprint();
            if !self.visited.insert_concrete(fp) {
                continue;
            }
            trace!(depth = next.depth, fp = %fp, "new state");
            stats.max_depth = stats.max_depth.max(next.depth);
            let queue_len = next.state.max_queue_len();
            if queue_len > stats.max_queue_len {
                stats.max_queue_len = queue_len;
                debug!(depth = next.depth, max_queue_len = queue_len, "new maximum queue size observed");
            }
            dumps.concrete(&next.state)?;

            if abstraction {
                let mut next_abstract = next.state.clone();
                next_abstract.abstract_in_place();
                if let Some(found) = self.record_abstract(&next_abstract, &mut dumps)? {
                    return self.stop_at_target(found, stats, dumps);
                }
            }

            let interval = self.config.progress_interval;
            if interval > 0 && self.visited.concrete_len() % interval == 0 {
                debug!(
                    concrete = self.visited.concrete_len(),
                    abstracts = self.visited.abstract_len(),
                    abstract_successors = self.visited.abstract_successor_len(),
                    stack = stack.len(),
                    "progress"
                );
            }

            stack.push(next);
        }

        dumps.finish()?;
        let stats = self.fill_counts(stats);
        info!(
            concrete = stats.concrete,
            abstracts = stats.abstracts,
            abstract_successors = stats.abstract_successors,
            pruned = stats.pruned,
            max_depth = stats.max_depth,
            max_queue_len = stats.max_queue_len,
            "exploration complete"
        );
        Ok(SearchOutcome::Completed(stats))
    }

    /// Record an abstract state and, the first time it is seen, its abstract
    /// successors. Returns the successor-search target if it came up.
    fn record_abstract<S: ConcreteState>(
        &mut self,
        state: &S,
        dumps: &mut RunDumps,
    ) -> io::Result<Option<Found>> {
        let fp = state.fingerprint();
        if !self.visited.insert_abstract(fp) {
            // Successors of a known abstract state are already collected.
            return Ok(None);
        }
        dumps.abstraction(state)?;
        if self.investigation.is_successor_target(fp) {
            return Ok(Some(Found {
                hash: fp,
                predecessor: None,
            }));
        }

        let mut successors = FingerprintSet::new();
        state.collect_abstract_successors(&mut successors, dumps.successor_sink())?;
        for succ in successors {
            if self.visited.insert_abstract_successor(succ)
                && self.investigation.is_successor_target(succ)
            {
                return Ok(Some(Found {
                    hash: succ,
                    predecessor: Some(fp),
                }));
            }
        }
        Ok(None)
    }

    fn stop_at_target(
        &self,
        found: Found,
        stats: ExploreStats,
        dumps: RunDumps,
    ) -> CheckResult<SearchOutcome> {
        dumps.finish()?;
        let stats = self.fill_counts(stats);
        info!(
            target = %found.hash,
            predecessor = ?found.predecessor,
            concrete = stats.concrete,
            "reached successor-search target, stopping exploration"
        );
        Ok(SearchOutcome::TargetFound {
            hash: found.hash,
            predecessor: found.predecessor,
            stats,
        })
    }

    fn fill_counts(&self, stats: ExploreStats) -> ExploreStats {
        ExploreStats {
            concrete: self.visited.concrete_len(),
            abstracts: self.visited.abstract_len(),
            abstract_successors: self.visited.abstract_successor_len(),
            ..stats
        }
    }
}

impl Default for Explorer {
    fn default() -> Self {
        Self::new(ExploreConfig::default())
    }
}
