//! Successor and predecessor search for diagnosing failed convergence.
//!
//! Successor search stops a run as soon as a chosen abstract fingerprint
//! shows up. Predecessor search watches every transition `s -> s'` whose
//! source abstracts to a chosen fingerprint `a` and collects the distinct
//! abstractions of `s'`. Several such "competitors" mean concrete states
//! that look alike under the abstraction step to abstractly different
//! places.

use crate::dump;
use crate::state::{ConcreteState, Fingerprint, FingerprintSet};
use std::io;
use std::path::Path;
use tracing::info;

#[derive(Debug, Default)]
pub struct Investigation {
    successor_target: Option<Fingerprint>,
    predecessor_target: Option<Fingerprint>,
    competitor_set: FingerprintSet,
    /// Competitors in discovery order.
    competitors: Vec<Fingerprint>,
}

impl Investigation {
    pub fn successor_target(&self) -> Option<Fingerprint> {
        self.successor_target
    }

    pub fn set_successor_target(&mut self, target: Option<Fingerprint>) {
        self.successor_target = target;
    }

    pub fn predecessor_target(&self) -> Option<Fingerprint> {
        self.predecessor_target
    }

    pub fn set_predecessor_target(&mut self, target: Option<Fingerprint>) {
        self.predecessor_target = target;
    }

    #[inline]
    pub fn is_successor_target(&self, fp: Fingerprint) -> bool {
        self.successor_target == Some(fp)
    }

    pub fn competitors(&self) -> &[Fingerprint] {
        &self.competitors
    }

    pub fn reset_competitors(&mut self) {
        self.competitor_set.clear();
        self.competitors.clear();
    }

    /// Inspect the transition `before -> after`. If `before` abstracts to
    /// the predecessor target and the abstraction of `after` is a new
    /// competitor, record it and write it to `dump_dir`.
    pub(crate) fn check_transition<S: ConcreteState>(
        &mut self,
        before: &S,
        after: &S,
        dump_dir: Option<&Path>,
    ) -> io::Result<()> {
        let Some(target) = self.predecessor_target else {
            return Ok(());
        };

        let mut a = before.clone();
        a.abstract_in_place();
        if a.fingerprint() != target {
            return Ok(());
        }

        let mut b = after.clone();
        b.abstract_in_place();
        let fp = b.fingerprint();
        if !self.competitor_set.insert(fp) {
            return Ok(());
        }

        let index = self.competitors.len();
        self.competitors.push(fp);
        info!(predecessor = %target, competitor = %fp, index, "found new concrete pair (s, s') with alpha(s) = a");
        if let Some(dir) = dump_dir {
            let path = dump::write_competitor(dir, index, &b)?;
            info!(path = %path.display(), "wrote competitor abstract state");
        }
        Ok(())
    }
}
