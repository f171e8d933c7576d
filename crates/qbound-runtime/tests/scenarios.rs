//! End-to-end exploration scenarios over the built-in systems.

use qbound_mc::{
    AutoDecisions, ChoiceRecord, ConcreteState, ConvergenceConfig, ConvergenceController,
    ConvergenceOutcome, DumpConfig, ExploreConfig, ExploreStats, Explorer, Fingerprint,
    SearchOutcome,
};
use qbound_runtime::{systems, MachineId, System};

fn completed(outcome: SearchOutcome) -> ExploreStats {
    match outcome {
        SearchOutcome::Completed(stats) => stats,
        other => panic!("expected completion, got {:?}", other),
    }
}

/// Run the given machines in order from `system`, with every decision false.
fn run(system: &System, machines: &[usize]) -> System {
    let mut s = system.clone();
    for &m in machines {
        s.run_one_step(MachineId(m), &mut ChoiceRecord::new().replayer());
    }
    s
}

fn abstract_fp(system: &System) -> Fingerprint {
    let mut s = system.clone();
    s.abstract_in_place();
    s.fingerprint()
}

// ─── Scenarios A-C ───

#[test]
fn single_step_visits_two_states() {
    let mut explorer = Explorer::default();
    let stats = completed(explorer.explore(&systems::single_step(), 1, false).unwrap());
    assert_eq!(stats.concrete, 2);
    assert_eq!(stats.max_depth, 1);
}

#[test]
fn failing_successor_is_never_added() {
    let mut explorer = Explorer::default();
    let stats = completed(explorer.explore(&systems::failing_step(), 1, false).unwrap());
    assert_eq!(stats.concrete, 1);
    assert_eq!(stats.pruned, 1);
}

#[test]
fn successor_search_stops_then_plain_run_completes() {
    let system = systems::single_step();
    let target = abstract_fp(&run(&system, &[0]));

    let mut explorer = Explorer::default();
    explorer.set_successor_target(Some(target));
    match explorer.explore(&system, 1, true).unwrap() {
        SearchOutcome::TargetFound {
            hash, predecessor, ..
        } => {
            assert_eq!(hash, target);
            assert_eq!(predecessor, Some(abstract_fp(&system)));
        }
        other => panic!("expected target, got {:?}", other),
    }

    explorer.set_successor_target(None);
    let stats = completed(explorer.explore(&system, 1, false).unwrap());
    assert_eq!(stats.concrete, 2);
}

#[test]
fn successor_search_stops_mid_run() {
    let system = systems::producer_consumer();
    // Producer started, consumer idle with two pings queued.
    let target = abstract_fp(&run(&system, &[0, 0, 0]));

    let mut explorer = Explorer::default();
    explorer.set_successor_target(Some(target));
    let outcome = explorer.explore(&system, 2, true).unwrap();
    assert!(matches!(outcome, SearchOutcome::TargetFound { hash, .. } if hash == target));
    assert!(outcome.stats().concrete < 8);

    explorer.set_successor_target(None);
    assert_eq!(completed(explorer.explore(&system, 2, false).unwrap()).concrete, 8);
}

// ─── Determinism and monotonicity ───

#[test]
fn repeated_runs_are_identical() {
    let system = systems::ping_pong();
    let mut explorer = Explorer::default();

    let first = completed(explorer.explore(&system, 1, true).unwrap());
    let concrete = explorer.visited().concrete().clone();
    let abstracts = explorer.visited().abstracts().clone();
    let successors = explorer.visited().abstract_successors().clone();

    let second = completed(explorer.explore(&system, 1, true).unwrap());
    assert_eq!(first, second);
    assert_eq!(explorer.visited().concrete(), &concrete);
    assert_eq!(explorer.visited().abstracts(), &abstracts);
    assert_eq!(explorer.visited().abstract_successors(), &successors);
}

#[test]
fn larger_bound_never_visits_fewer_states() {
    let system = systems::producer_consumer();
    let mut explorer = Explorer::default();
    let counts: Vec<usize> = (1..=5)
        .map(|k| completed(explorer.explore(&system, k, false).unwrap()).concrete)
        .collect();
    assert_eq!(counts, vec![6, 8, 10, 12, 14]);
}

#[test]
fn longest_queue_reaches_the_bound() {
    let mut explorer = Explorer::default();
    for k in 1..=3 {
        let stats = completed(explorer.explore(&systems::producer_consumer(), k, false).unwrap());
        assert_eq!(stats.max_queue_len, k);
    }
}

#[test]
fn choices_and_assertions_prune_coin_tosses() {
    let mut explorer = Explorer::default();
    let stats = completed(explorer.explore(&systems::coin_toss(), 1, false).unwrap());
    assert!(stats.pruned > 0);
    assert!(stats.concrete > 1);
}

// ─── Convergence ───

#[test]
fn producer_consumer_not_converged_at_bound_one() {
    let mut explorer = Explorer::default();
    let stats = completed(explorer.explore(&systems::producer_consumer(), 1, true).unwrap());
    assert_eq!(stats.abstracts, 6);
    assert!(!explorer.is_converged());
    assert_eq!(explorer.unreached_successors().len(), 2);
}

#[test]
fn producer_consumer_converges_at_plateau() {
    let config = ConvergenceConfig {
        max_bound: 10,
        tail: 1,
        ..Default::default()
    };
    let mut ctl = ConvergenceController::new(Explorer::default(), config, AutoDecisions::default());
    match ctl.run(&systems::producer_consumer()).unwrap() {
        ConvergenceOutcome::Converged { bound, stats } => {
            assert_eq!(bound, 3);
            assert_eq!(stats.concrete, 10);
            assert_eq!(stats.abstracts, 8);
        }
        other => panic!("expected convergence, got {:?}", other),
    }
}

#[test]
fn no_convergence_reported_before_plateau() {
    let config = ConvergenceConfig {
        max_bound: 2,
        ..Default::default()
    };
    let mut ctl = ConvergenceController::new(Explorer::default(), config, AutoDecisions::default());
    let outcome = ctl.run(&systems::producer_consumer()).unwrap();
    assert!(matches!(
        outcome,
        ConvergenceOutcome::BoundLimitReached { bound: 2, .. }
    ));
}

#[test]
fn bounded_queues_converge_immediately() {
    // Queues never exceed one event, so bound 2 repeats bound 1.
    let mut ctl = ConvergenceController::new(
        Explorer::default(),
        ConvergenceConfig::default(),
        AutoDecisions::default(),
    );
    let outcome = ctl.run(&systems::ping_pong()).unwrap();
    assert!(matches!(outcome, ConvergenceOutcome::Converged { bound: 2, .. }));
}

// ─── Predecessor search ───

#[test]
fn predecessor_search_writes_competitors() {
    let dir = tempfile::tempdir().unwrap();
    let system = systems::producer_consumer();
    let predecessor = abstract_fp(&run(&system, &[0, 1, 0, 0]));

    let mut explorer = Explorer::new(ExploreConfig {
        dump: DumpConfig {
            dir: Some(dir.path().to_path_buf()),
            states: false,
        },
        ..Default::default()
    });
    explorer.set_predecessor_target(Some(predecessor));
    completed(explorer.explore(&system, 3, false).unwrap());

    let competitors = explorer.competitors();
    assert!(!competitors.is_empty());
    // Another ping keeps the queue folded: the state competes with itself.
    assert!(competitors.contains(&predecessor));
    for i in 0..competitors.len() {
        assert!(dir.path().join(format!("bp{i}.txt")).exists());
    }
    assert!(!dir.path().join("concretes-03.txt").exists());
}
