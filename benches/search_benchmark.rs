//! Performance benchmarks for combat resolution and the blocking search
//!
//! Measures three workloads using Criterion.rs:
//!
//! 1. **simulate** - one combat with a gang block and optimal damage ordering
//! 2. **optimal** - exhaustive blocking search, by board size
//! 3. **simple** - greedy blocking search on the same boards

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use mtg_combat_rs::core::{Creature, GameState, Keyword};
use mtg_combat_rs::game::{
    decide_optimal_blocks, decide_simple_blocks, CombatSimulator, CreatureMap,
    OptimalDamageStrategy, SearchOptions,
};
use std::rc::Rc;

fn creature(name: &str, power: i32, toughness: i32, controller: &str) -> Creature {
    Creature::new(name, power, toughness, controller).unwrap()
}

/// A mixed board with `blockers` defenders against three attackers
fn board(blockers: usize) -> (Vec<Creature>, Vec<Creature>) {
    let attackers = vec![
        creature("Knight", 2, 2, "A").with_keyword(Keyword::FirstStrike),
        creature("Wurm", 6, 6, "A").with_keyword(Keyword::Trample),
        creature("Drake", 2, 3, "A").with_keyword(Keyword::Flying),
    ];
    let pool = [
        creature("Wall", 0, 5, "B"),
        creature("Spider", 2, 4, "B").with_keyword(Keyword::Reach),
        creature("Elf", 1, 1, "B"),
        creature("Bear", 2, 2, "B"),
        creature("Viper", 1, 1, "B").with_keyword(Keyword::Deathtouch),
    ];
    let blockers = pool.iter().cycle().take(blockers).cloned().collect();
    (attackers, blockers)
}

fn bench_simulate(c: &mut Criterion) {
    let mut attackers = vec![creature("Wurm", 6, 6, "A").with_keyword(Keyword::Trample)];
    let mut blockers: Vec<Creature> = board(4).1.into_iter().filter(|b| !b.keywords.reach).collect();
    for (b, blocker) in blockers.iter_mut().enumerate() {
        blocker.blocking = Some(0);
        attackers[0].blocked_by.push(b);
    }
    let state = GameState::two_player(20, Vec::new(), 20, Vec::new()).unwrap();

    c.bench_function("simulate_gang_block", |b| {
        b.iter(|| {
            let mut sim = CombatSimulator::new(attackers.clone(), blockers.clone())
                .unwrap()
                .with_game_state(state.totals_only())
                .with_strategy(Box::new(OptimalDamageStrategy::for_attacker(Rc::default())));
            black_box(sim.simulate().unwrap())
        })
    });
}

fn bench_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("blocking_search");
    group.sample_size(10);
    let state = GameState::two_player(20, Vec::new(), 8, Vec::new()).unwrap();
    let options = SearchOptions::default();
    let no_map = CreatureMap::new();

    for size in [2, 3, 4] {
        let (attackers, blockers) = board(size);
        group.bench_with_input(BenchmarkId::new("optimal", size), &size, |b, _| {
            b.iter(|| {
                let (mut atk, mut blk) = (attackers.clone(), blockers.clone());
                black_box(
                    decide_optimal_blocks(&mut atk, &mut blk, Some(&state), &no_map, &no_map, &options)
                        .unwrap(),
                )
            })
        });
        group.bench_with_input(BenchmarkId::new("simple", size), &size, |b, _| {
            b.iter(|| {
                let (mut atk, mut blk) = (attackers.clone(), blockers.clone());
                black_box(
                    decide_simple_blocks(&mut atk, &mut blk, Some(&state), &no_map, &no_map, &options)
                        .unwrap(),
                )
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_simulate, bench_search);
criterion_main!(benches);
