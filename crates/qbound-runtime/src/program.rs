//! Machine definitions and the context handed to a machine's handler.

use crate::queue::{Event, EventQueue};
use qbound_mc::ChoiceSource;
use smallvec::SmallVec;
use std::fmt;
use std::sync::Arc;

/// Index of a machine in its program.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MachineId(pub usize);

impl fmt::Display for MachineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A machine's reaction to its entry step (`event() == None`) or to one
/// dequeued event.
pub type Handler = Arc<dyn Fn(&mut Step<'_>) + Send + Sync>;

pub struct MachineDef {
    pub name: String,
    /// Number of integer variables.
    pub vars: usize,
    handler: Handler,
}

impl fmt::Debug for MachineDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MachineDef")
            .field("name", &self.name)
            .field("vars", &self.vars)
            .finish_non_exhaustive()
    }
}

/// The static part of a system: its machines and event names.
#[derive(Debug, Default)]
pub struct Program {
    machines: Vec<MachineDef>,
    events: Vec<String>,
}

impl Program {
    pub fn builder() -> ProgramBuilder {
        ProgramBuilder::default()
    }

    pub fn machines(&self) -> &[MachineDef] {
        &self.machines
    }

    pub fn event_names(&self) -> &[String] {
        &self.events
    }

    pub(crate) fn handler(&self, id: MachineId) -> &Handler {
        &self.machines[id.0].handler
    }
}

/// Builds a [`Program`]. Machine ids are assigned in declaration order, so
/// handlers may refer to machines declared after them by id.
#[derive(Default)]
pub struct ProgramBuilder {
    program: Program,
}

impl ProgramBuilder {
    pub fn event(&mut self, name: &str) -> Event {
        let id = u16::try_from(self.program.events.len()).unwrap_or(u16::MAX);
        self.program.events.push(name.to_string());
        Event(id)
    }

    pub fn machine(
        &mut self,
        name: &str,
        vars: usize,
        handler: impl Fn(&mut Step<'_>) + Send + Sync + 'static,
    ) -> MachineId {
        let id = MachineId(self.program.machines.len());
        self.program.machines.push(MachineDef {
            name: name.to_string(),
            vars,
            handler: Arc::new(handler),
        });
        id
    }

    pub fn build(self) -> Arc<Program> {
        Arc::new(self.program)
    }
}

/// Local state of one machine.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct MachineState {
    pub started: bool,
    pub control: u32,
    pub vars: SmallVec<[i64; 4]>,
    pub queue: EventQueue,
}

impl MachineState {
    pub(crate) fn new(vars: usize) -> Self {
        Self {
            started: false,
            control: 0,
            vars: SmallVec::from_elem(0, vars),
            queue: EventQueue::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        !self.started || !self.queue.is_empty()
    }
}

/// Why a step's result is not a legal state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Fault {
    /// A send found the target queue at capacity.
    QueueFull { sender: MachineId, target: MachineId },
    AssertionFailed { machine: MachineId, message: String },
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Fault::QueueFull { sender, target } => {
                write!(f, "{} blocked sending to full queue of {}", sender, target)
            }
            Fault::AssertionFailed { machine, message } => {
                write!(f, "assertion failed in {}: {}", machine, message)
            }
        }
    }
}

/// Context for one handler invocation.
pub struct Step<'a> {
    pub(crate) me: MachineId,
    pub(crate) event: Option<Event>,
    pub(crate) machines: &'a mut [MachineState],
    pub(crate) choices: &'a mut dyn ChoiceSource,
    pub(crate) bound: usize,
    pub(crate) fold_width: Option<usize>,
    pub(crate) fault: &'a mut Option<Fault>,
}

impl Step<'_> {
    pub fn me(&self) -> MachineId {
        self.me
    }

    /// The dequeued event, or `None` for the entry step.
    pub fn event(&self) -> Option<Event> {
        self.event
    }

    pub fn control(&self) -> u32 {
        self.machines[self.me.0].control
    }

    pub fn set_control(&mut self, control: u32) {
        self.machines[self.me.0].control = control;
    }

    pub fn var(&self, idx: usize) -> i64 {
        self.machines[self.me.0].vars[idx]
    }

    pub fn set_var(&mut self, idx: usize, value: i64) {
        self.machines[self.me.0].vars[idx] = value;
    }

    /// Enqueue `event` at `target`. In a concrete state with a bound, a full
    /// target queue blocks the step.
    pub fn send(&mut self, target: MachineId, event: Event) {
        if self.fault.is_some() {
            return;
        }
        let queue = &mut self.machines[target.0].queue;
        if self.fold_width.is_none() && self.bound > 0 && queue.len() >= self.bound {
            *self.fault = Some(Fault::QueueFull {
                sender: self.me,
                target,
            });
            return;
        }
        queue.push(event, self.fold_width);
    }

    /// A nondeterministic boolean.
    pub fn choose(&mut self) -> bool {
        self.choices.choose()
    }

    pub fn assert(&mut self, condition: bool, message: &str) {
        if !condition && self.fault.is_none() {
            *self.fault = Some(Fault::AssertionFailed {
                machine: self.me,
                message: message.to_string(),
            });
        }
    }
}
