//! Choice records: replay and systematic enumeration of boolean decisions.
//!
//! A record holds the decisions taken along one step. Executing the step
//! again through [`ChoiceRecord::replayer`] reproduces them and extends the
//! record with `false` for any decision beyond its end. [`ChoiceRecord::advance`]
//! then moves to the next combination like a binary odometer, so repeated
//! execute/advance rounds visit every combination of the decisions the step
//! requests exactly once.

use crate::state::ChoiceSource;
use smallvec::SmallVec;
use std::fmt;

#[derive(Clone, Default, PartialEq, Eq)]
pub struct ChoiceRecord {
    bits: SmallVec<[bool; 16]>,
}

impl ChoiceRecord {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.bits.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    pub fn as_slice(&self) -> &[bool] {
        &self.bits
    }

    /// A decision source that replays this record and appends fresh `false`
    /// decisions past its end.
    pub fn replayer(&mut self) -> Replayer<'_> {
        Replayer {
            record: self,
            consumed: 0,
        }
    }

    /// Step to the next combination: drop trailing `true`s, then flip the
    /// new last decision to `true`. Returns false once every combination
    /// has been produced (the record is then empty).
    pub fn advance(&mut self) -> bool {
        while self.bits.last() == Some(&true) {
            self.bits.pop();
        }
        match self.bits.last_mut() {
            Some(last) => {
                *last = true;
                true
            }
            None => false,
        }
    }
}

impl fmt::Debug for ChoiceRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ChoiceRecord(")?;
        for &b in &self.bits {
            write!(f, "{}", if b { '1' } else { '0' })?;
        }
        write!(f, ")")
    }
}

impl From<Vec<bool>> for ChoiceRecord {
    fn from(bits: Vec<bool>) -> Self {
        Self {
            bits: SmallVec::from_vec(bits),
        }
    }
}

/// Replays a [`ChoiceRecord`] during one step.
pub struct Replayer<'a> {
    record: &'a mut ChoiceRecord,
    consumed: usize,
}

impl Replayer<'_> {
    /// Number of decisions requested so far.
    pub fn consumed(&self) -> usize {
        self.consumed
    }
}

impl ChoiceSource for Replayer<'_> {
    fn choose(&mut self) -> bool {
        let value = match self.record.bits.get(self.consumed) {
            Some(&recorded) => recorded,
            None => {
                self.record.bits.push(false);
                false
            }
        };
        self.consumed += 1;
        value
    }
}
