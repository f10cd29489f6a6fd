//! Pokémon Red reward policy.
//!
//! The controller is paid for exploring: every coordinate `(x, y, map)` it reaches
//! for the first time outside a battle is worth [`PokemonRedRewards::seen_coord`].
//! Battles are judged by where the player stands once the battle flag clears. Back
//! on the tile where the battle started counts as a win, anywhere else (the game
//! warps the player to a Pokémon Center after a wipe-out) counts as a loss.

use std::collections::HashMap;

use gbneat_engine::{Button, ReadMemory};
use serde::{Deserialize, Serialize};

use crate::{
    action::Action,
    policy::{GamePolicy, InputStep, normalize_byte},
};

/// RAM addresses read by the Pokémon Red policy.
pub mod address {
    pub const X_POS: u16 = 0xD362;
    pub const Y_POS: u16 = 0xD361;
    pub const MAP_N: u16 = 0xD35E;
    /// Non-zero while a battle is running.
    pub const BATTLE_FLAG: u16 = 0xD057;
    /// Bitfield, one bit per badge.
    pub const BADGES: u16 = 0xD356;
}

pub const ACTIONS: &[Action] = &[
    Action::Noop,
    Action::Press(Button::A),
    Action::Press(Button::B),
    Action::Press(Button::Left),
    Action::Press(Button::Right),
    Action::Press(Button::Up),
    Action::Press(Button::Down),
    Action::Press(Button::Start),
    Action::Press(Button::Select),
];

/// Reward constants for Pokémon Red.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PokemonRedRewards {
    pub seen_coord: f64,
    pub battle_win: f64,
    pub battle_loss: f64,
    pub badge: f64,
}

impl Default for PokemonRedRewards {
    fn default() -> Self {
        Self {
            seen_coord: 1.0,
            battle_win: 10.0,
            battle_loss: -10.0,
            badge: 1000.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct MapCoords {
    pub x: u8,
    pub y: u8,
    pub map: u8,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PokemonRedSnapshot {
    pub coords: MapCoords,
    pub battle_flag: u8,
    pub badges: u8,
    /// The coordinates were recorded for the first time by this snapshot.
    pub first_visit: bool,
    /// Last coordinates recorded outside a battle before this snapshot was taken.
    pub pre_battle: Option<MapCoords>,
}

impl PokemonRedSnapshot {
    #[must_use]
    pub fn in_battle(&self) -> bool {
        self.battle_flag != 0
    }
}

#[derive(Debug, Clone)]
pub struct PokemonRedPolicy {
    rewards: PokemonRedRewards,
    seen: HashMap<MapCoords, u32>,
    last_coords: Option<MapCoords>,
}

impl PokemonRedPolicy {
    #[must_use]
    pub fn new(rewards: PokemonRedRewards) -> Self {
        Self {
            rewards,
            seen: HashMap::new(),
            last_coords: None,
        }
    }

    #[must_use]
    pub fn rewards(&self) -> &PokemonRedRewards {
        &self.rewards
    }

    /// Number of distinct coordinates visited so far.
    #[must_use]
    pub fn visited_count(&self) -> usize {
        self.seen.len()
    }

    /// How often `coords` has been observed outside a battle.
    #[must_use]
    pub fn visits(&self, coords: MapCoords) -> u32 {
        self.seen.get(&coords).copied().unwrap_or(0)
    }
}

impl GamePolicy for PokemonRedPolicy {
    type Snapshot = PokemonRedSnapshot;

    fn actions(&self) -> &'static [Action] {
        ACTIONS
    }

    fn frame_scale(&self) -> usize {
        2
    }

    fn scalar_count(&self) -> usize {
        5
    }

    fn intro_script(&self) -> Vec<InputStep> {
        let mut script = vec![
            InputStep::wait(500),
            InputStep::press(Button::Start, 300),
            InputStep::press(Button::A, 300),
        ];
        // Professor Oak's speech
        script.extend((0..16).map(|_| InputStep::press(Button::A, 300)));
        // player name
        script.push(InputStep::press(Button::Down, 300));
        script.extend((0..6).map(|_| InputStep::press(Button::A, 300)));
        // rival name
        script.push(InputStep::press(Button::Down, 300));
        script.extend((0..9).map(|_| InputStep::press(Button::A, 300)));
        script
    }

    fn snapshot(&mut self, memory: &mut dyn ReadMemory) -> PokemonRedSnapshot {
        let coords = MapCoords {
            x: memory.read_memory(address::X_POS),
            y: memory.read_memory(address::Y_POS),
            map: memory.read_memory(address::MAP_N),
        };
        let battle_flag = memory.read_memory(address::BATTLE_FLAG);
        let badges = u8::try_from(memory.read_memory(address::BADGES).count_ones())
            .unwrap_or(u8::MAX);

        let pre_battle = self.last_coords;
        let mut first_visit = false;
        if battle_flag == 0 {
            let visits = self.seen.entry(coords).or_insert(0);
            first_visit = *visits == 0;
            *visits += 1;
            self.last_coords = Some(coords);
        }

        PokemonRedSnapshot {
            coords,
            battle_flag,
            badges,
            first_visit,
            pre_battle,
        }
    }

    fn reward(&self, prev: &PokemonRedSnapshot, next: &PokemonRedSnapshot) -> f64 {
        let mut reward = 0.0;
        if prev.first_visit || next.first_visit {
            reward += self.rewards.seen_coord;
        }
        if prev.in_battle() && !next.in_battle() {
            if next.pre_battle == Some(next.coords) {
                reward += self.rewards.battle_win;
            } else {
                reward += self.rewards.battle_loss;
            }
        }
        if next.badges > prev.badges {
            reward += self.rewards.badge;
        }
        reward
    }

    fn is_game_over(&self, _snapshot: &PokemonRedSnapshot) -> bool {
        false
    }

    fn encode(&self, snapshot: &PokemonRedSnapshot, recent_actions: &[f64], out: &mut Vec<f64>) {
        out.push(normalize_byte(snapshot.coords.x));
        out.push(normalize_byte(snapshot.coords.y));
        out.push(normalize_byte(snapshot.coords.map));
        out.push(normalize_byte(snapshot.battle_flag));
        out.extend_from_slice(recent_actions);
        out.push(normalize_byte(snapshot.badges));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory(x: u8, y: u8, map: u8, battle: u8) -> Vec<u8> {
        let mut memory = vec![0u8; 0x10000];
        memory[usize::from(address::X_POS)] = x;
        memory[usize::from(address::Y_POS)] = y;
        memory[usize::from(address::MAP_N)] = map;
        memory[usize::from(address::BATTLE_FLAG)] = battle;
        memory
    }

    fn policy() -> PokemonRedPolicy {
        PokemonRedPolicy::new(PokemonRedRewards::default())
    }

    #[test]
    fn test_first_visit_is_rewarded_once() {
        let mut policy = policy();
        let mut mem = memory(3, 4, 1, 0);

        let first = policy.snapshot(&mut mem);
        let second = policy.snapshot(&mut mem);
        let third = policy.snapshot(&mut mem);

        assert!(first.first_visit);
        assert!(!second.first_visit);
        assert_eq!(policy.reward(&first, &second), 1.0);
        assert_eq!(policy.reward(&second, &third), 0.0);
        assert_eq!(policy.visits(MapCoords { x: 3, y: 4, map: 1 }), 3);
        assert_eq!(policy.visited_count(), 1);
    }

    #[test]
    fn test_coords_are_not_recorded_in_battle() {
        let mut policy = policy();
        let snapshot = policy.snapshot(&mut memory(9, 9, 9, 1));
        assert!(snapshot.in_battle());
        assert!(!snapshot.first_visit);
        assert_eq!(policy.visited_count(), 0);
    }

    #[test]
    fn test_battle_won_when_back_on_start_tile() {
        let mut policy = policy();
        let mut overworld = memory(5, 6, 2, 0);
        let _walk = policy.snapshot(&mut overworld);
        let start = policy.snapshot(&mut overworld);
        let battle = policy.snapshot(&mut memory(5, 6, 2, 1));
        let after = policy.snapshot(&mut overworld);

        assert_eq!(policy.reward(&start, &battle), 0.0);
        assert_eq!(policy.reward(&battle, &after), 10.0);
    }

    #[test]
    fn test_battle_lost_when_warped_away() {
        let mut policy = policy();
        let _walk = policy.snapshot(&mut memory(5, 6, 2, 0));
        let battle = policy.snapshot(&mut memory(5, 6, 2, 1));
        // the Pokémon Center tile has been visited before, so only the loss counts
        let _center = policy.snapshot(&mut memory(1, 1, 40, 0));
        let _back = policy.snapshot(&mut memory(5, 6, 2, 0));
        let battle_again = policy.snapshot(&mut memory(5, 6, 2, 1));
        let after = policy.snapshot(&mut memory(1, 1, 40, 0));

        assert_eq!(battle.pre_battle, Some(MapCoords { x: 5, y: 6, map: 2 }));
        assert_eq!(policy.reward(&battle_again, &after), -10.0);
    }

    #[test]
    fn test_badge_reward() {
        let policy = policy();
        let prev = PokemonRedSnapshot::default();
        let next = PokemonRedSnapshot {
            badges: 1,
            ..PokemonRedSnapshot::default()
        };
        assert_eq!(policy.reward(&prev, &next), 1000.0);
        assert_eq!(policy.reward(&next, &next), 0.0);
    }

    #[test]
    fn test_badges_are_counted_from_bitfield() {
        let mut policy = policy();
        let mut mem = memory(0, 0, 0, 0);
        mem[usize::from(address::BADGES)] = 0b0000_0101;
        assert_eq!(policy.snapshot(&mut mem).badges, 2);
    }

    #[test]
    fn test_never_game_over() {
        let policy = policy();
        assert!(!policy.is_game_over(&PokemonRedSnapshot::default()));
    }

    #[test]
    fn test_intro_script_length() {
        let script = policy().intro_script();
        assert_eq!(script.len(), 3 + 16 + 1 + 6 + 1 + 9);
        assert_eq!(script[0], InputStep::wait(500));
        assert_eq!(script[1], InputStep::press(Button::Start, 300));
    }

    #[test]
    fn test_observation_layout() {
        let policy = policy();
        assert_eq!(policy.observation_len(5), 5 + 5 + 80 * 72 * 3);

        let snapshot = PokemonRedSnapshot {
            coords: MapCoords {
                x: 255,
                y: 0,
                map: 0,
            },
            battle_flag: 0,
            badges: 0,
            ..PokemonRedSnapshot::default()
        };
        let mut out = vec![];
        policy.encode(&snapshot, &[0.25; 5], &mut out);
        assert_eq!(out, vec![1.0, 0.0, 0.0, 0.0, 0.25, 0.25, 0.25, 0.25, 0.25, 0.0]);
    }
}
