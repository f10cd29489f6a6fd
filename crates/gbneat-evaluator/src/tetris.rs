//! Tetris (DMG) reward policy.
//!
//! Rewards, all additive:
//!
//! | condition  | default | trigger                                   |
//! |------------|---------|-------------------------------------------|
//! | score      | 100     | score increased                           |
//! | level      | 1000    | level increased                           |
//! | new piece  | 1       | piece flag was `0x80` before the action   |
//! | game over  | -10     | game-state byte turned non-zero           |
//!
//! The observation is the five most recent actions, the falling piece's x/y, then
//! three 40x36 frames (screen downscaled by 4).

use gbneat_engine::{Button, ReadMemory};
use serde::{Deserialize, Serialize};

use crate::{
    action::Action,
    policy::{GamePolicy, normalize_byte},
};

/// RAM addresses read by the Tetris policy.
pub mod address {
    /// Score, 3 bytes of little-endian BCD.
    pub const SCORE: u16 = 0xC0A0;
    pub const LEVEL: u16 = 0xFFA9;
    /// Zero while a game is in progress.
    pub const GAME_STATE: u16 = 0xFFE1;
    /// Reads `0x80` on the frame a new piece spawns.
    pub const PIECE_CHANGE: u16 = 0xFFA0;
    pub const CURRENT_PIECE_Y: u16 = 0xC201;
    pub const CURRENT_PIECE_X: u16 = 0xC202;
}

const PIECE_SPAWNED: u8 = 0x80;

pub const ACTIONS: &[Action] = &[
    Action::Noop,
    Action::Press(Button::A),
    Action::Press(Button::B),
    Action::Press(Button::Left),
    Action::Press(Button::Right),
    Action::Press(Button::Up),
    Action::Press(Button::Down),
];

/// Reward constants for Tetris.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TetrisRewards {
    pub score: f64,
    pub level: f64,
    pub new_piece: f64,
    pub game_over: f64,
}

impl Default for TetrisRewards {
    fn default() -> Self {
        Self {
            score: 100.0,
            level: 1000.0,
            new_piece: 1.0,
            game_over: -10.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TetrisSnapshot {
    pub score: u32,
    pub level: u8,
    pub piece_flag: u8,
    pub game_state: u8,
    pub piece_x: u8,
    pub piece_y: u8,
}

/// Decodes little-endian packed BCD (two decimal digits per byte).
#[must_use]
pub fn decode_bcd(bytes: &[u8]) -> u32 {
    bytes.iter().rev().fold(0, |acc, &b| {
        acc * 100 + u32::from(b >> 4) * 10 + u32::from(b & 0x0F)
    })
}

#[derive(Debug, Clone)]
pub struct TetrisPolicy {
    rewards: TetrisRewards,
}

impl TetrisPolicy {
    #[must_use]
    pub fn new(rewards: TetrisRewards) -> Self {
        Self { rewards }
    }

    #[must_use]
    pub fn rewards(&self) -> &TetrisRewards {
        &self.rewards
    }
}

impl GamePolicy for TetrisPolicy {
    type Snapshot = TetrisSnapshot;

    fn actions(&self) -> &'static [Action] {
        ACTIONS
    }

    fn frame_scale(&self) -> usize {
        4
    }

    fn scalar_count(&self) -> usize {
        2
    }

    fn snapshot(&mut self, memory: &mut dyn ReadMemory) -> TetrisSnapshot {
        let score_bytes = [
            memory.read_memory(address::SCORE),
            memory.read_memory(address::SCORE + 1),
            memory.read_memory(address::SCORE + 2),
        ];
        TetrisSnapshot {
            score: decode_bcd(&score_bytes),
            level: memory.read_memory(address::LEVEL),
            piece_flag: memory.read_memory(address::PIECE_CHANGE),
            game_state: memory.read_memory(address::GAME_STATE),
            piece_x: memory.read_memory(address::CURRENT_PIECE_X),
            piece_y: memory.read_memory(address::CURRENT_PIECE_Y),
        }
    }

    fn reward(&self, prev: &TetrisSnapshot, next: &TetrisSnapshot) -> f64 {
        let mut reward = 0.0;
        if next.score > prev.score {
            reward += self.rewards.score;
        }
        if next.level > prev.level {
            reward += self.rewards.level;
        }
        if prev.piece_flag == PIECE_SPAWNED {
            reward += self.rewards.new_piece;
        }
        if !self.is_game_over(prev) && self.is_game_over(next) {
            reward += self.rewards.game_over;
        }
        reward
    }

    fn is_game_over(&self, snapshot: &TetrisSnapshot) -> bool {
        snapshot.game_state != 0
    }

    fn encode(&self, snapshot: &TetrisSnapshot, recent_actions: &[f64], out: &mut Vec<f64>) {
        out.extend_from_slice(recent_actions);
        out.push(normalize_byte(snapshot.piece_x));
        out.push(normalize_byte(snapshot.piece_y));
    }
}
