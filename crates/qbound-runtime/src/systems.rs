//! Built-in systems.

use crate::program::{MachineId, Program};
use crate::system::System;

/// Names accepted by [`by_name`].
pub const NAMES: &[&str] = &[
    "single-step",
    "failing-step",
    "producer-consumer",
    "ping-pong",
    "coin-toss",
];

pub fn by_name(name: &str) -> Option<System> {
    match name {
        "single-step" => Some(single_step()),
        "failing-step" => Some(failing_step()),
        "producer-consumer" => Some(producer_consumer()),
        "ping-pong" => Some(ping_pong()),
        "coin-toss" => Some(coin_toss()),
        _ => None,
    }
}

/// One machine whose entry step does nothing: two reachable states.
pub fn single_step() -> System {
    let mut b = Program::builder();
    b.machine("Main", 0, |_| {});
    System::new(b.build())
}

/// One machine whose entry step fails an assertion.
pub fn failing_step() -> System {
    let mut b = Program::builder();
    b.machine("Main", 0, |step| step.assert(false, "entry always fails"));
    System::new(b.build())
}

/// A producer that keeps sending `Ping` to a consumer that drops them.
/// The consumer's queue grows up to the bound.
pub fn producer_consumer() -> System {
    let mut b = Program::builder();
    let tick = b.event("Tick");
    let ping = b.event("Ping");
    let producer = MachineId(0);
    let consumer = MachineId(1);

    b.machine("Producer", 0, move |step| match step.event() {
        None => step.send(producer, tick),
        Some(_) => {
            step.send(consumer, ping);
            step.send(producer, tick);
        }
    });
    b.machine("Consumer", 0, |_| {});
    System::new(b.build())
}

/// A client pinging a server that answers `Pong` or `Nack` at will. The
/// client counts pongs modulo 3.
pub fn ping_pong() -> System {
    let mut b = Program::builder();
    let ping = b.event("Ping");
    let pong = b.event("Pong");
    let nack = b.event("Nack");
    let client = MachineId(0);
    let server = MachineId(1);

    b.machine("Client", 1, move |step| {
        match step.event() {
            Some(e) if e == pong => {
                let count = (step.var(0) + 1) % 3;
                step.set_var(0, count);
            }
            Some(e) if e == nack => step.set_control(1),
            _ => {}
        }
        step.assert(step.var(0) < 3, "pong count stays below 3");
        step.send(server, ping);
    });
    b.machine("Server", 0, move |step| {
        if step.event() == Some(ping) {
            let reply = if step.choose() { pong } else { nack };
            step.send(client, reply);
        }
    });
    System::new(b.build())
}

/// A machine tossing a coin four times. Three or more heads trip an
/// assertion, so those runs are pruned.
pub fn coin_toss() -> System {
    let mut b = Program::builder();
    let toss = b.event("Toss");
    let tosser = MachineId(0);

    b.machine("Tosser", 2, move |step| {
        if step.event().is_some() {
            if step.choose() {
                let heads = step.var(0) + 1;
                step.set_var(0, heads);
            }
            let tosses = step.var(1) + 1;
            step.set_var(1, tosses);
            step.assert(step.var(0) < 3, "fewer than three heads");
        }
        if step.var(1) < 4 {
            step.send(tosser, toss);
        }
    });
    System::new(b.build())
}
