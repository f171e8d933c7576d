//! Communicating state machines with bounded FIFO event queues.
//!
//! A [`System`] is the explorable state of a [`Program`]. It implements
//! [`qbound_mc::ConcreteState`]: each machine is a component, a step handles
//! the machine's entry or its next event, and the abstraction folds every
//! queue down to its last few events.

pub mod program;
pub mod queue;
pub mod system;
pub mod systems;

pub use program::{Fault, Handler, MachineDef, MachineId, MachineState, Program, ProgramBuilder, Step};
pub use queue::{Event, EventQueue};
pub use system::System;
