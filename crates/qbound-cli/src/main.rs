//! Command-line interface for the queue-bound explorer.

use clap::{Parser, Subcommand};
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use miette::Diagnostic;
use qbound_mc::{
    AutoDecisions, ConvergenceConfig, ConvergenceController, ConvergenceOutcome, DecisionProvider,
    DumpConfig, ExploreConfig, ExploreStats, Explorer, Fingerprint, NonConvergenceAction,
    SearchOutcome,
};
use qbound_runtime::{systems, System};
use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Instant;
use thiserror::Error;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    #[error("unknown system '{name}'")]
    #[diagnostic(
        code(qbound::unknown_system),
        help("available systems: {}", systems::NAMES.join(", "))
    )]
    UnknownSystem { name: String },

    #[error("invalid state hash '{value}': {message}")]
    #[diagnostic(
        code(qbound::invalid_hash),
        help("hashes are printed as 16 hex digits, optionally prefixed with 0x")
    )]
    InvalidHash { value: String, message: String },

    #[error("check error: {message}")]
    #[diagnostic(code(qbound::check_error))]
    CheckError { message: String },
}

impl From<qbound_mc::CheckError> for CliError {
    fn from(e: qbound_mc::CheckError) -> Self {
        CliError::CheckError {
            message: e.to_string(),
        }
    }
}

type CliResult<T> = Result<T, CliError>;

#[derive(Parser)]
#[command(name = "qbound")]
#[command(version = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("QBOUND_GIT_HASH"),
    " ",
    env!("QBOUND_GIT_DATE"),
    ")"
))]
#[command(about = "Queue-bound explorer for communicating state machines", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Explore a system once at a fixed queue bound
    Check {
        /// Built-in system to explore
        #[arg(short, long, value_name = "NAME")]
        system: String,

        /// Queue bound (0 = unbounded)
        #[arg(short, long, default_value = "1")]
        bound: usize,

        /// Events kept in order by the tail abstraction
        #[arg(short, long, default_value = "1")]
        tail: usize,

        /// Track abstract states and their abstract successors
        #[arg(short, long)]
        abstraction: bool,

        /// Stop as soon as this abstract state is reached (implies --abstraction)
        #[arg(long, value_name = "HASH")]
        succ_hash: Option<String>,

        /// Collect abstract successors of concrete states abstracting to this hash
        #[arg(long, value_name = "HASH")]
        pred_hash: Option<String>,

        /// Maximum depth to explore (0 = unlimited)
        #[arg(long, default_value = "0")]
        max_depth: usize,

        /// Directory for state dumps and competitor files
        #[arg(long, value_name = "DIR")]
        dump: Option<PathBuf>,

        /// Show verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Raise the queue bound until the abstract state space converges
    Converge {
        /// Built-in system to explore
        #[arg(short, long, value_name = "NAME")]
        system: String,

        /// Events kept in order by the tail abstraction
        #[arg(short, long, default_value = "1")]
        tail: usize,

        /// First queue bound to explore
        #[arg(long, default_value = "1")]
        start_bound: usize,

        /// Last queue bound to explore (0 = unlimited)
        #[arg(long, default_value = "0")]
        max_bound: usize,

        /// Do not prompt; keep raising the bound past non-convergence
        #[arg(short, long, conflicts_with = "investigate")]
        yes: bool,

        /// Do not prompt; investigate the first non-convergence
        #[arg(short, long)]
        investigate: bool,

        /// Directory for state dumps and competitor files
        #[arg(long, value_name = "DIR")]
        dump: Option<PathBuf>,

        /// Show verbose output
        #[arg(short, long)]
        verbose: bool,
    },
}

fn main() {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .build(),
        )
    }))
    .ok();

    let cli = Cli::parse();

    let filter = if matches!(
        &cli.command,
        Commands::Check { verbose: true, .. } | Commands::Converge { verbose: true, .. }
    ) {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .init();

    let result = match cli.command {
        Commands::Check {
            system,
            bound,
            tail,
            abstraction,
            succ_hash,
            pred_hash,
            max_depth,
            dump,
            verbose: _,
        } => cmd_check(&CheckArgs {
            system,
            bound,
            tail,
            abstraction,
            succ_hash,
            pred_hash,
            max_depth,
            dump,
        }),
        Commands::Converge {
            system,
            tail,
            start_bound,
            max_bound,
            yes,
            investigate,
            dump,
            verbose: _,
        } => cmd_converge(&system, tail, start_bound, max_bound, yes, investigate, dump),
    };

    match result {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("{:?}", miette::Report::new(e));
            std::process::exit(1);
        }
    }
}

fn load_system(name: &str, tail: usize) -> CliResult<System> {
    systems::by_name(name)
        .map(|s| s.with_tail(tail))
        .ok_or_else(|| CliError::UnknownSystem {
            name: name.to_string(),
        })
}

fn parse_hash(value: &str) -> CliResult<Fingerprint> {
    value.parse().map_err(|e: std::num::ParseIntError| CliError::InvalidHash {
        value: value.to_string(),
        message: e.to_string(),
    })
}

fn dump_config(dir: Option<PathBuf>) -> DumpConfig {
    match dir {
        Some(dir) => DumpConfig::in_dir(dir),
        None => DumpConfig::default(),
    }
}

struct CheckArgs {
    system: String,
    bound: usize,
    tail: usize,
    abstraction: bool,
    succ_hash: Option<String>,
    pred_hash: Option<String>,
    max_depth: usize,
    dump: Option<PathBuf>,
}

fn cmd_check(args: &CheckArgs) -> CliResult<i32> {
    let system = load_system(&args.system, args.tail)?;
    let succ = args.succ_hash.as_deref().map(parse_hash).transpose()?;
    let pred = args.pred_hash.as_deref().map(parse_hash).transpose()?;

    let mut explorer = Explorer::new(ExploreConfig {
        max_depth: args.max_depth,
        dump: dump_config(args.dump.clone()),
        ..Default::default()
    });
    explorer.set_successor_target(succ);
    explorer.set_predecessor_target(pred);

    let abstraction = args.abstraction || succ.is_some();
    let start = Instant::now();
    let outcome = explorer.explore(&system, args.bound, abstraction)?;
    let elapsed = start.elapsed().as_secs_f64();

    println!();
    match &outcome {
        SearchOutcome::Completed(stats) => {
            println!("Result: COMPLETED");
            print_stats(stats, abstraction);
            if abstraction {
                let unreached = explorer.unreached_successors();
                match unreached.first() {
                    None => println!("  Abstract successors: all reached"),
                    Some(first) => println!(
                        "  Unreached abstract successors: {} (first: {})",
                        unreached.len(),
                        first
                    ),
                }
            }
        }
        SearchOutcome::TargetFound {
            hash,
            predecessor,
            stats,
        } => {
            println!("Result: TARGET FOUND");
            println!("  Target: {}", hash);
            if let Some(p) = predecessor {
                println!("  Abstract predecessor: {}", p);
            }
            print_stats(stats, abstraction);
        }
    }
    if pred.is_some() {
        print_competitors(explorer.competitors(), args.dump.is_some());
    }
    println!("  Time: {:.2}s", elapsed);
    Ok(0)
}

fn cmd_converge(
    system: &str,
    tail: usize,
    start_bound: usize,
    max_bound: usize,
    yes: bool,
    investigate: bool,
    dump: Option<PathBuf>,
) -> CliResult<i32> {
    let system = load_system(system, tail)?;
    let explorer = Explorer::new(ExploreConfig {
        dump: dump_config(dump.clone()),
        ..Default::default()
    });
    let config = ConvergenceConfig {
        start_bound,
        max_bound,
        tail,
    };

    let start = Instant::now();
    let outcome = if yes || investigate {
        ConvergenceController::new(explorer, config, AutoDecisions { investigate }).run(&system)?
    } else {
        ConvergenceController::new(explorer, config, ConsoleDecisions).run(&system)?
    };
    let elapsed = start.elapsed().as_secs_f64();

    println!();
    let code = match &outcome {
        ConvergenceOutcome::Converged { bound, stats } => {
            println!("Result: CONVERGED");
            println!("  Queue bound: {}", bound);
            print_stats(stats, true);
            0
        }
        ConvergenceOutcome::TargetLocated {
            bound,
            hash,
            predecessor,
            competitors,
            stats,
        } => {
            println!("Result: NOT CONVERGED");
            println!("  Queue bound: {}", bound);
            println!("  Unreached abstract successor: {}", hash);
            if let Some(p) = predecessor {
                println!("  Abstract predecessor: {}", p);
            }
            print_stats(stats, false);
            print_competitors(competitors, dump.is_some());
            0
        }
        ConvergenceOutcome::Aborted { bound } => {
            println!("Result: ABORTED");
            println!("  Queue bound: {}", bound);
            2
        }
        ConvergenceOutcome::BoundLimitReached { bound, stats } => {
            println!("Result: BOUND LIMIT REACHED");
            println!("  Queue bound: {}", bound);
            if let Some(stats) = stats {
                print_stats(stats, true);
            }
            2
        }
    };
    println!("  Time: {:.2}s", elapsed);
    Ok(code)
}

fn print_stats(stats: &ExploreStats, abstraction: bool) {
    println!("  Concrete states: {}", stats.concrete);
    if abstraction {
        println!("  Abstract states: {}", stats.abstracts);
        println!("  Abstract successors: {}", stats.abstract_successors);
    }
    println!("  Pruned: {}", stats.pruned);
    println!("  Max depth: {}", stats.max_depth);
    println!("  Max queue length: {}", stats.max_queue_len);
}

fn print_competitors(competitors: &[Fingerprint], dumped: bool) {
    println!("  Competitors: {}", competitors.len());
    for (i, fp) in competitors.iter().enumerate() {
        if dumped {
            println!("    {}: {} ({})", i, fp, qbound_mc::dump::competitor_file_name(i));
        } else {
            println!("    {}: {}", i, fp);
        }
    }
}

/// Asks the user at the console, one keystroke per question.
struct ConsoleDecisions;

impl DecisionProvider for ConsoleDecisions {
    fn proceed_to_bound(&mut self, bound: usize) -> bool {
        let prompt = format!(
            "About to explore queue bound {}. Press <ENTER> to continue, anything else to stop: ",
            bound
        );
        match prompt_key(&prompt) {
            Ok(KeyCode::Enter) => true,
            Ok(_) => false,
            Err(e) => {
                warn!(error = %e, "could not read from console, stopping");
                false
            }
        }
    }

    fn on_unreached_successor(&mut self, bound: usize, hash: Fingerprint) -> NonConvergenceAction {
        let mut prompt = format!(
            "Abstract successor {} is not reached at bound {}. \
             Press 'c' to continue with the next bound, 'i' to investigate: ",
            hash, bound
        );
        loop {
            match prompt_key(&prompt) {
                Ok(key) => {
                    if let Some(action) = unreached_answer(key) {
                        return action;
                    }
                    prompt = " ? ".to_string();
                }
                Err(e) => {
                    warn!(error = %e, "could not read from console, continuing");
                    return NonConvergenceAction::Continue;
                }
            }
        }
    }
}

/// Map a key to the answer for an unreached successor. `None` asks again.
/// Esc (and Ctrl-C) gives up on the investigation.
fn unreached_answer(key: KeyCode) -> Option<NonConvergenceAction> {
    match key {
        KeyCode::Char('c') | KeyCode::Char('C') | KeyCode::Esc => {
            Some(NonConvergenceAction::Continue)
        }
        KeyCode::Char('i') | KeyCode::Char('I') => Some(NonConvergenceAction::Investigate),
        _ => None,
    }
}

/// Print `prompt` and wait for a single key press.
fn prompt_key(prompt: &str) -> io::Result<KeyCode> {
    let mut stdout = io::stdout();
    write!(stdout, "{}", prompt)?;
    stdout.flush()?;

    enable_raw_mode()?;
    let key = read_key();
    if let Err(e) = disable_raw_mode() {
        warn!(error = %e, "failed to restore terminal from raw mode");
    }
    writeln!(stdout)?;

    let key = key?;
    info!(key = ?key, "read console answer");
    Ok(key)
}

fn read_key() -> io::Result<KeyCode> {
    loop {
        if let Event::Key(key) = event::read()? {
            if key.kind != KeyEventKind::Press {
                continue;
            }
            // Raw mode swallows the interrupt signal.
            if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
                return Ok(KeyCode::Esc);
            }
            return Ok(key.code);
        }
    }
}
