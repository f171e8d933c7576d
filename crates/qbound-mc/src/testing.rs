//! Small systems for unit tests.

use crate::frame::Frame;
use crate::state::{ChoiceSource, ConcreteState, Fingerprint, FingerprintSet};
use std::cell::Cell;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::io::{self, Write};
use std::rc::Rc;

/// Independent counters. Component `i` is enabled while `values[i] < limit`
/// and adds `1 + (number of true decisions)` to its counter, saturating at
/// the limit. The bound, when non-zero, replaces the limit.
#[derive(Clone, Debug)]
pub struct Counters {
    values: Vec<u8>,
    limit: u8,
    decisions: usize,
    fail_at: Option<u8>,
    phantom: Option<Fingerprint>,
    /// Report the phantom only during this many runs.
    phantom_runs: Option<usize>,
    /// Runs started, shared by every clone.
    runs: Rc<Cell<usize>>,
    coarse: bool,
}

impl Counters {
    pub fn new(components: usize, limit: u8) -> Self {
        Self {
            values: vec![0; components],
            limit,
            decisions: 0,
            fail_at: None,
            phantom: None,
            phantom_runs: None,
            runs: Rc::default(),
            coarse: false,
        }
    }

    pub fn with_decisions(mut self, decisions: usize) -> Self {
        self.decisions = decisions;
        self
    }

    /// States where some counter equals `value` are failed.
    pub fn failing_at(mut self, value: u8) -> Self {
        self.fail_at = Some(value);
        self
    }

    /// Every abstract state also claims `fp` as a successor, which no run
    /// ever reaches.
    pub fn with_phantom(mut self, fp: Fingerprint) -> Self {
        self.phantom = Some(fp);
        self
    }

    /// Like [`Counters::with_phantom`], but the phantom is no longer
    /// reported once `runs` explorations have started.
    pub fn with_fading_phantom(mut self, fp: Fingerprint, runs: usize) -> Self {
        self.phantom = Some(fp);
        self.phantom_runs = Some(runs);
        self
    }

    pub fn values(&self) -> &[u8] {
        &self.values
    }
}

impl Hash for Counters {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.values.hash(state);
    }
}

impl fmt::Display for Counters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "values = {:?}", self.values)
    }
}

impl ConcreteState for Counters {
    type Component = usize;

    fn fingerprint(&self) -> Fingerprint {
        Fingerprint::of(self)
    }

    fn enabled_components(&self) -> Vec<usize> {
        (0..self.values.len())
            .filter(|&i| self.values[i] < self.limit)
            .collect()
    }

    fn run_one_step(&mut self, component: usize, choices: &mut dyn ChoiceSource) {
        let mut delta = 1u8;
        for _ in 0..self.decisions {
            if choices.choose() {
                delta += 1;
            }
        }
        let v = &mut self.values[component];
        *v = v.saturating_add(delta).min(self.limit);
        if self.coarse {
            *v = (*v).min(1);
        }
    }

    fn is_failed(&self, _depth: usize) -> bool {
        self.fail_at
            .is_some_and(|bad| self.values.iter().any(|&v| v == bad))
    }

    fn set_bound(&mut self, bound: usize) {
        self.runs.set(self.runs.get() + 1);
        if bound > 0 {
            self.limit = u8::try_from(bound).unwrap_or(u8::MAX);
        }
    }

    /// Counters stand in for queue lengths.
    fn max_queue_len(&self) -> usize {
        self.values.iter().copied().max().unwrap_or(0) as usize
    }

    /// Collapses every counter to "zero or not".
    fn abstract_in_place(&mut self) {
        self.coarse = true;
        for v in &mut self.values {
            *v = (*v).min(1);
        }
    }

    fn collect_abstract_successors(
        &self,
        sink: &mut FingerprintSet,
        mut dump: Option<&mut dyn io::Write>,
    ) -> io::Result<()> {
        let phantom_active = self.phantom_runs.map_or(true, |n| self.runs.get() <= n);
        if let Some(fp) = self.phantom.filter(|_| phantom_active) {
            sink.insert(fp);
        }
        let mut frame = Frame::new(self.clone());
        while let Some(next) = frame.execute() {
            if next.state.is_failed(next.depth) {
                continue;
            }
            if sink.insert(next.state.fingerprint()) {
                if let Some(out) = dump.as_deref_mut() {
                    write!(out, "{}", next.state)?;
                }
            }
        }
        Ok(())
    }
}

/// A single component whose step requests two decisions the first time it
/// runs and one decision afterwards.
#[derive(Clone, Debug, Default)]
pub struct Flaky {
    runs: Rc<Cell<usize>>,
}

impl fmt::Display for Flaky {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "flaky")
    }
}

impl ConcreteState for Flaky {
    type Component = ();

    fn fingerprint(&self) -> Fingerprint {
        Fingerprint::from_u64(0)
    }

    fn enabled_components(&self) -> Vec<()> {
        vec![()]
    }

    fn run_one_step(&mut self, _component: (), choices: &mut dyn ChoiceSource) {
        let n = if self.runs.get() == 0 { 2 } else { 1 };
        self.runs.set(self.runs.get() + 1);
        for _ in 0..n {
            choices.choose();
        }
    }

    fn is_failed(&self, _depth: usize) -> bool {
        false
    }

    fn set_bound(&mut self, _bound: usize) {}

    fn abstract_in_place(&mut self) {}

    fn collect_abstract_successors(
        &self,
        _sink: &mut FingerprintSet,
        _dump: Option<&mut dyn io::Write>,
    ) -> io::Result<()> {
        Ok(())
    }
}
