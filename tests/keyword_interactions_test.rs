//! Tests for interactions between multiple keywords
//!
//! These cover edge cases where two or more keywords combine in non-obvious
//! ways. Rule references are to the Comprehensive Rules.

use mtg_combat_rs::core::{Color, Creature, GameState, Keyword, PlayerId};
use mtg_combat_rs::game::{can_block, validate_blocking, CombatResult, CombatSimulator, CreatureMap};
use mtg_combat_rs::CombatError;

fn creature(name: &str, power: i32, toughness: i32, controller: &str) -> Creature {
    Creature::new(name, power, toughness, controller).unwrap()
}

fn fight(
    mut attackers: Vec<Creature>,
    mut blockers: Vec<Creature>,
    links: &[(usize, usize)],
) -> (CombatResult, CombatSimulator) {
    for &(a, b) in links {
        attackers[a].blocked_by.push(b);
        blockers[b].blocking = Some(a);
    }
    let state = GameState::two_player(20, Vec::new(), 20, Vec::new()).unwrap();
    let mut sim = CombatSimulator::new(attackers, blockers)
        .unwrap()
        .with_game_state(state);
    let result = sim.simulate().unwrap();
    (result, sim)
}

fn damage_to_defender(result: &CombatResult) -> i32 {
    result
        .damage_to_players
        .get(&PlayerId::defender())
        .copied()
        .unwrap_or(0)
}

/// First strike + trample (CR 510.1c)
///
/// The blocker dies in the first-strike step and the excess tramples over.
/// Nothing happens in the regular step.
#[test]
fn test_first_strike_trample_interaction() {
    let attacker = creature("Charging Rhino", 4, 4, "A")
        .with_keyword(Keyword::FirstStrike)
        .with_keyword(Keyword::Trample);
    let (result, sim) = fight(vec![attacker], vec![creature("Bear", 2, 2, "B")], &[(0, 0)]);

    assert_eq!(result.destroyed_names(), vec!["Bear"]);
    assert_eq!(damage_to_defender(&result), 2);
    assert_eq!(sim.attackers()[0].damage_marked, 0);
}

/// Double strike + trample (CR 702.4b, 702.19c)
///
/// 3 damage in the first step kills the 2/2 and tramples 1. In the regular
/// step the attacker is still blocked but has no blockers, so all 3 trample.
#[test]
fn test_double_strike_trample_interaction() {
    let attacker = creature("Striker", 3, 3, "A")
        .with_keyword(Keyword::DoubleStrike)
        .with_keyword(Keyword::Trample);
    let (result, sim) = fight(vec![attacker], vec![creature("Bear", 2, 2, "B")], &[(0, 0)]);

    assert_eq!(damage_to_defender(&result), 4);
    let defender = &sim.game_state().unwrap().players[&PlayerId::defender()];
    assert_eq!(defender.life, 16);
}

/// Double strike without trample: the second hit has nowhere to go
#[test]
fn test_double_strike_without_trample_stays_blocked() {
    let attacker = creature("Striker", 3, 3, "A").with_keyword(Keyword::DoubleStrike);
    let (result, _) = fight(vec![attacker], vec![creature("Bear", 2, 2, "B")], &[(0, 0)]);

    assert_eq!(result.destroyed_names(), vec!["Bear"]);
    assert_eq!(damage_to_defender(&result), 0);
}

/// Deathtouch + trample (CR 702.19c)
///
/// One damage is lethal for the blocker, the rest tramples over.
#[test]
fn test_deathtouch_trample_interaction() {
    let attacker = creature("Viper", 5, 5, "A")
        .with_keyword(Keyword::Deathtouch)
        .with_keyword(Keyword::Trample);
    let (result, sim) = fight(vec![attacker], vec![creature("Baloth", 4, 4, "B")], &[(0, 0)]);

    assert_eq!(result.destroyed_names(), vec!["Baloth"]);
    assert_eq!(damage_to_defender(&result), 4);
    assert_eq!(sim.attackers()[0].damage_marked, 4);
}

/// Deathtouch does not beat indestructible
#[test]
fn test_deathtouch_vs_indestructible() {
    let attacker = creature("Viper", 1, 1, "A").with_keyword(Keyword::Deathtouch);
    let blocker = creature("Guardian", 2, 2, "B").with_keyword(Keyword::Indestructible);
    let (result, _) = fight(vec![attacker], vec![blocker], &[(0, 0)]);

    assert_eq!(result.destroyed_names(), vec!["Viper"]);
}

/// Indestructible still dies to zero toughness from wither counters
#[test]
fn test_wither_kills_indestructible() {
    let attacker = creature("Wilt-Leaf", 3, 3, "A").with_keyword(Keyword::Wither);
    let blocker = creature("Guardian", 0, 3, "B").with_keyword(Keyword::Indestructible);
    let (result, sim) = fight(vec![attacker], vec![blocker], &[(0, 0)]);

    assert_eq!(result.destroyed_names(), vec!["Guardian"]);
    assert_eq!(sim.blockers()[0].damage_marked, 0);
}

/// Lifelink + deathtouch first striker kills before taking damage
#[test]
fn test_first_strike_deathtouch_lifelink() {
    let attacker = creature("Vampire", 1, 1, "A")
        .with_keyword(Keyword::FirstStrike)
        .with_keyword(Keyword::Deathtouch)
        .with_keyword(Keyword::Lifelink);
    let (result, sim) = fight(vec![attacker], vec![creature("Dragon", 6, 6, "B")], &[(0, 0)]);

    assert_eq!(result.destroyed_names(), vec!["Dragon"]);
    assert_eq!(result.lifegain[&PlayerId::attacker()], 1);
    assert_eq!(sim.game_state().unwrap().players[&PlayerId::attacker()].life, 21);
}

/// Undying creature dying a second time stays dead
#[test]
fn test_undying_with_counter_dies() {
    let attacker = creature("Geralf's Messenger", 3, 2, "A")
        .with_keyword(Keyword::Undying)
        .with_counters(1, 0)
        .unwrap();
    let (result, _) = fight(vec![attacker], vec![creature("Ogre", 3, 3, "B")], &[(0, 0)]);

    assert!(result.destroyed_names().contains(&"Geralf's Messenger"));
}

/// Protection from black stops black blockers but not green ones
#[test]
fn test_protection_blocks_and_damage() {
    let knight = creature("White Knight", 2, 3, "A").with_protection([Color::Black]);
    let zombie = creature("Zombie", 2, 2, "B").with_colors([Color::Black]);
    assert!(!can_block(&knight, &zombie));

    let bear = creature("Bear", 2, 2, "B").with_colors([Color::Green]);
    let (result, sim) = fight(vec![knight], vec![bear], &[(0, 0)]);
    assert_eq!(result.destroyed_names(), vec!["Bear"]);
    assert_eq!(sim.attackers()[0].damage_marked, 2);
}

/// Flying + menace needs two blockers that can each block a flyer
#[test]
fn test_flying_menace_needs_two_reach_blockers() {
    let attacker = creature("Drake", 2, 2, "A")
        .with_keyword(Keyword::Flying)
        .with_keyword(Keyword::Menace);
    let spider = creature("Spider", 1, 4, "B").with_keyword(Keyword::Reach);
    let bear = creature("Bear", 2, 2, "B");

    let mut attackers = vec![attacker];
    let mut blockers = vec![spider.clone(), bear];
    attackers[0].blocked_by.extend([0, 1]);
    blockers[0].blocking = Some(0);
    blockers[1].blocking = Some(0);
    let err = validate_blocking(&attackers, &blockers, &CreatureMap::new()).unwrap_err();
    assert!(matches!(err, CombatError::IllegalBlock(_)));

    let mut blockers = vec![spider.clone(), spider];
    blockers[0].blocking = Some(0);
    blockers[1].blocking = Some(0);
    assert!(validate_blocking(&attackers, &blockers, &CreatureMap::new()).is_ok());
}

/// Bushido on both sides of a block
#[test]
fn test_bushido_mirror() {
    let samurai = |controller: &str| {
        creature("Samurai", 2, 2, controller)
            .with_keyword_count(Keyword::Bushido, 1)
            .unwrap()
    };
    let (result, sim) = fight(vec![samurai("A")], vec![samurai("B")], &[(0, 0)]);

    assert_eq!(result.creatures_destroyed.len(), 2);
    assert_eq!(sim.attackers()[0].effective_power(), 3);
    assert_eq!(sim.blockers()[0].effective_power(), 3);
}

/// Flanking against a flanker does nothing
#[test]
fn test_flanking_vs_flanking() {
    let knight = |controller: &str| {
        creature("Knight", 2, 2, controller)
            .with_keyword_count(Keyword::Flanking, 1)
            .unwrap()
    };
    let (_, sim) = fight(vec![knight("A")], vec![knight("B")], &[(0, 0)]);

    assert_eq!(sim.blockers()[0].effective_toughness(), 2);
}

/// Shadow limits who can block the shadow creature, not what it can block
#[test]
fn test_shadow_blocker_blocks_ordinary_attacker() {
    let goblin = creature("Goblin", 2, 2, "A");
    let shade = creature("Shade", 2, 2, "B").with_keyword(Keyword::Shadow);
    assert!(can_block(&goblin, &shade));
    assert!(!can_block(
        &creature("Shade", 2, 2, "A").with_keyword(Keyword::Shadow),
        &creature("Bear", 2, 2, "B")
    ));

    let (result, _) = fight(vec![goblin], vec![shade], &[(0, 0)]);
    assert_eq!(result.creatures_destroyed.len(), 2);
    assert_eq!(damage_to_defender(&result), 0);
}

/// Lifelink + afflict against a small blocker (CR 510.1c)
///
/// Only the 2 lethal damage is assigned to the 2/2, so lifelink gains 2.
/// Afflict is life loss and gains nothing.
#[test]
fn test_lifelink_excess_damage_on_small_blocker() {
    let tormentor = creature("Tormentor", 3, 3, "A")
        .with_keyword_count(Keyword::Afflict, 2)
        .unwrap()
        .with_keyword(Keyword::Lifelink);
    let (result, sim) = fight(vec![tormentor], vec![creature("Soldier", 2, 2, "B")], &[(0, 0)]);

    assert_eq!(result.destroyed_names(), vec!["Soldier"]);
    assert_eq!(damage_to_defender(&result), 2);
    assert_eq!(result.lifegain[&PlayerId::attacker()], 2);
    assert_eq!(sim.game_state().unwrap().players[&PlayerId::attacker()].life, 22);
    assert_eq!(sim.game_state().unwrap().players[&PlayerId::defender()].life, 18);
}
