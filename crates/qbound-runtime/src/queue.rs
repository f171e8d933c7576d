//! FIFO event queues and their tail abstraction.

use qbound_mc::ChoiceSource;
use std::collections::{BTreeSet, VecDeque};
use std::fmt;

/// An event identifier, indexing the program's event names.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Event(pub u16);

/// A machine's input queue.
///
/// A concrete queue keeps every event in `tail`. Folding to width `t` keeps
/// the last `t` events in order and collapses everything before them into
/// the set `folded`, forgetting order and multiplicity.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct EventQueue {
    folded: BTreeSet<Event>,
    tail: VecDeque<Event>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of events held in order. Exact for concrete queues.
    pub fn len(&self) -> usize {
        self.tail.len()
    }

    pub fn is_empty(&self) -> bool {
        self.folded.is_empty() && self.tail.is_empty()
    }

    pub fn folded(&self) -> &BTreeSet<Event> {
        &self.folded
    }

    pub fn tail(&self) -> impl Iterator<Item = Event> + '_ {
        self.tail.iter().copied()
    }

    /// Append `event`. With `fold_width`, re-fold so at most that many
    /// events stay in order.
    pub fn push(&mut self, event: Event, fold_width: Option<usize>) {
        self.tail.push_back(event);
        if let Some(width) = fold_width {
            self.fold(width);
        }
    }

    /// Collapse all but the last `width` events into the folded set.
    pub fn fold(&mut self, width: usize) {
        while self.tail.len() > width {
            if let Some(event) = self.tail.pop_front() {
                self.folded.insert(event);
            }
        }
    }

    /// Remove the next event.
    ///
    /// With a non-empty folded set, any of its members may come next and may
    /// or may not have been the last copy; both are decided through `choices`.
    /// Concrete queues never consult `choices`.
    pub fn pop(&mut self, choices: &mut dyn ChoiceSource) -> Option<Event> {
        if self.folded.is_empty() {
            return self.tail.pop_front();
        }

        let members: Vec<Event> = self.folded.iter().copied().collect();
        let last = members.len() - 1;
        let picked = members[..last]
            .iter()
            .copied()
            .find(|_| choices.choose())
            .unwrap_or(members[last]);

        let more_copies = choices.choose();
        if !more_copies {
            self.folded.remove(&picked);
        }
        Some(picked)
    }
}

/// Formats a queue given the program's event names.
pub(crate) struct QueueDisplay<'a> {
    pub queue: &'a EventQueue,
    pub names: &'a [String],
}

impl fmt::Display for QueueDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = |e: Event| {
            self.names
                .get(e.0 as usize)
                .map(String::as_str)
                .unwrap_or("?")
        };
        if !self.queue.folded.is_empty() {
            write!(f, "{{")?;
            for (i, e) in self.queue.folded.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}", name(*e))?;
            }
            write!(f, "}} ++ ")?;
        }
        write!(f, "[")?;
        for (i, e) in self.queue.tail.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", name(*e))?;
        }
        write!(f, "]")
    }
}
