//! Backtrack frames and the single-step executor.

use crate::choice::ChoiceRecord;
use crate::state::ConcreteState;

/// One entry of the depth-first search stack.
///
/// The frame owns its state outright. `current_index` and `choices` name the
/// next (component, decision combination) pair to execute from this state.
#[derive(Clone, Debug)]
pub struct Frame<S> {
    pub state: S,
    pub current_index: usize,
    pub choices: ChoiceRecord,
    pub depth: usize,
}

impl<S: ConcreteState> Frame<S> {
    /// A root frame at depth 0.
    pub fn new(state: S) -> Self {
        Self::at_depth(state, 0)
    }

    fn at_depth(state: S, depth: usize) -> Self {
        Self {
            state,
            current_index: 0,
            choices: ChoiceRecord::new(),
            depth,
        }
    }

    /// Execute one step of the component at `current_index` under the
    /// current choice combination, and return the successor as a new frame.
    ///
    /// Afterwards `self` holds its original state again, with its choice
    /// record advanced to the next combination, or with `current_index`
    /// moved to the next component once all combinations are done.
    /// Returns `None` when every enabled component has been explored.
    ///
    /// # Panics
    ///
    /// If the step requests fewer decisions than the record replays. That
    /// means the state's step function is not deterministic under replay.
    pub fn execute(&mut self) -> Option<Frame<S>> {
        let component = *self.state.enabled_components().get(self.current_index)?;
        let saved = self.state.clone();

        let consumed = {
            let mut replay = self.choices.replayer();
            self.state.run_one_step(component, &mut replay);
            replay.consumed()
        };
        assert_eq!(
            consumed,
            self.choices.len(),
            "decision count mismatch at depth {} on component #{} ({:?}): step consumed {} of {:?}",
            self.depth,
            self.current_index,
            component,
            consumed,
            self.choices,
        );

        if !self.choices.advance() {
            self.current_index += 1;
        }

        let successor = std::mem::replace(&mut self.state, saved);
        Some(Frame::at_depth(successor, self.depth + 1))
    }
}
