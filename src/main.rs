//! MTG Combat - command-line driver
//!
//! Replays combat snapshots and runs the blocking search on them.

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use mtg_combat_rs::game::{
    decide_optimal_blocks, decide_simple_blocks, CombatLogger, CombatSimulator, CombatSnapshot,
    OptimalDamageStrategy, OutputFormat, SearchOptions, VerbosityLevel, DEFAULT_SEARCH_ITERATIONS,
};
use std::path::{Path, PathBuf};
use std::rc::Rc;

/// Rendering of combat log lines
#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormat {
    /// Plain text, detail lines indented
    Text,
    /// One JSON object per line
    Json,
}

impl From<LogFormat> for OutputFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Text => OutputFormat::Text,
            LogFormat::Json => OutputFormat::Json,
        }
    }
}

#[derive(Parser)]
#[command(name = "mtg-combat")]
#[command(about = "MTG combat resolution and blocking search", long_about = None)]
struct Cli {
    /// Verbosity level for combat output (0=silent, 1=minimal, 2=normal, 3=verbose)
    #[arg(long, short = 'v', global = true, default_value = "normal")]
    verbosity: VerbosityLevel,

    /// Format of combat log lines
    #[arg(long, global = true, value_enum, default_value = "text")]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve the combat recorded in a snapshot
    Simulate {
        /// Snapshot file (JSON)
        #[arg(value_name = "SNAPSHOT")]
        snapshot: PathBuf,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Search for the defender's best blocks
    Blocks {
        /// Snapshot file (JSON); recorded blocks are ignored
        #[arg(value_name = "SNAPSHOT")]
        snapshot: PathBuf,

        /// Number of ranked assignments to print
        #[arg(long, short = 'k', default_value_t = 1)]
        k: i64,

        /// Simulation budget for the whole search
        #[arg(long, default_value_t = DEFAULT_SEARCH_ITERATIONS)]
        max_iterations: u64,

        /// Use the greedy search instead of the exhaustive one
        #[arg(long)]
        simple: bool,

        /// Print the decision as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let verbosity = cli.verbosity;
    let format = OutputFormat::from(cli.log_format);

    match cli.command {
        Commands::Simulate { snapshot, json } => run_simulate(snapshot, verbosity, format, json),
        Commands::Blocks {
            snapshot,
            k,
            max_iterations,
            simple,
            json,
        } => run_blocks(snapshot, k, max_iterations, simple, verbosity, format, json),
    }
}

fn load(path: &Path) -> anyhow::Result<CombatSnapshot> {
    CombatSnapshot::load_from_file(path)
        .with_context(|| format!("failed to load snapshot {}", path.display()))
}

fn run_simulate(
    path: PathBuf,
    verbosity: VerbosityLevel,
    format: OutputFormat,
    json: bool,
) -> anyhow::Result<()> {
    let snapshot = load(&path)?;
    let (attackers, blockers) = snapshot.wired_rosters();

    let mut sim = CombatSimulator::new(attackers, blockers)?
        .with_provoke(snapshot.provoke.clone())
        .with_mentor(snapshot.mentor.clone())
        .with_strategy(Box::new(OptimalDamageStrategy::for_attacker(Rc::default())))
        .with_logger(
            CombatLogger::with_verbosity(if json {
                VerbosityLevel::Silent
            } else {
                verbosity
            })
            .with_output_format(format),
        );
    if let Some(state) = snapshot.game_state()? {
        sim = sim.with_game_state(state);
    }
    let result = sim.simulate().context("combat failed")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }
    if verbosity >= VerbosityLevel::Minimal {
        if let Some(state) = sim.game_state() {
            for (id, player) in &state.players {
                println!("{id}: life {}, poison {}", player.life, player.poison);
            }
        }
    }
    Ok(())
}

fn run_blocks(
    path: PathBuf,
    k: i64,
    max_iterations: u64,
    simple: bool,
    verbosity: VerbosityLevel,
    format: OutputFormat,
    json: bool,
) -> anyhow::Result<()> {
    let snapshot = load(&path)?;
    let state = snapshot.game_state()?;
    let mut attackers = snapshot.attackers.clone();
    let mut blockers = snapshot.blockers.clone();
    let options = SearchOptions::with_k(k)?
        .max_iterations(max_iterations)
        .verbosity(if json { VerbosityLevel::Silent } else { verbosity })
        .output_format(format);

    let search = if simple {
        decide_simple_blocks
    } else {
        decide_optimal_blocks
    };
    let decision = search(
        &mut attackers,
        &mut blockers,
        state.as_ref(),
        &snapshot.provoke,
        &snapshot.mentor,
        &options,
    )
    .context("blocking search failed")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&decision)?);
        return Ok(());
    }

    println!(
        "{} optimal assignment(s), {} simulations",
        decision.optimal_count, decision.iterations
    );
    for (rank, entry) in decision.ranked.iter().enumerate() {
        let blocks: Vec<String> = entry
            .assignment
            .iter()
            .zip(&blockers)
            .map(|(choice, blocker)| match choice {
                Some(a) => format!("{} -> {}", blocker.name, attackers[*a].name),
                None => format!("{} -> no block", blocker.name),
            })
            .collect();
        println!("#{} {}: {}", rank + 1, entry.score, blocks.join(", "));
    }
    Ok(())
}
