//! Combat resolution and blocking search

pub mod blocking_ai;
pub mod combat;
pub mod damage;
pub mod evaluator;
pub mod limits;
pub mod logger;
pub mod simulator;
pub mod snapshot;
pub mod validation;

pub use blocking_ai::{
    decide_optimal_blocks, decide_optimal_blocks_for_state, decide_simple_blocks,
    decide_simple_blocks_for_state, BlockDecision, RankedAssignment, SearchOptions,
};
pub use combat::{CombatResult, DestroyedCreature, Score};
pub use damage::{
    DamageAssignmentStrategy, DeclarationOrder, MostCreaturesKilled, OptimalDamageStrategy,
    Perspective,
};
pub use evaluator::{evaluate_block_assignment, Assignment, CombatScenario, Evaluation};
pub use limits::{IterationCounter, DEFAULT_MAX_ITERATIONS, DEFAULT_SEARCH_ITERATIONS};
pub use logger::{CombatLogger, LogEntry, OutputFormat, VerbosityLevel};
pub use simulator::{CombatSimulator, CreatureMap, DamageOrders};
pub use snapshot::{CombatSnapshot, PlayerTotals, SNAPSHOT_VERSION};
pub use validation::{can_block, validate_blocking};
