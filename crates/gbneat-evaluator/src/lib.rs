//! Reward shaping, observations and the episode loop for Game Boy controllers.
//!
//! This crate turns raw emulator state into the two signals a neuro-evolution run
//! needs: a feature vector for the controller to act on, and a scalar reward that
//! accumulates into the controller's fitness.
//!
//! # Architecture
//!
//! ```text
//! EpisodeRunner (tick loop, stall cutoff, terminal state)
//!     ↓ asks
//! GamePolicy (per game: memory snapshot, reward, observation encoding)
//!     ↓ reads
//! Emulator RAM / screen (gbneat-engine)
//! ```
//!
//! - [`policy`] - the [`GamePolicy`](policy::GamePolicy) trait shared by all games
//! - [`tetris`] - score/level/new-piece rewards, game-over detection
//! - [`pokemon_red`] - exploration and battle-outcome rewards
//! - [`episode`] - [`EpisodeRunner`](episode::EpisodeRunner), the `Init → Running → Terminal` loop
//! - [`game`] - the [`Game`](game::Game) selector that wires a policy into an episode
//! - [`action`] - controller actions and the per-candidate action log
//!
//! # Reward semantics
//!
//! Every reward condition is additive: a step that triggers several conditions
//! receives the sum of their constants, and a step that triggers none receives
//! exactly zero. Reward constants are plain config structs
//! ([`TetrisRewards`](tetris::TetrisRewards), [`PokemonRedRewards`](pokemon_red::PokemonRedRewards))
//! handed to the policy at construction.
//!
//! # Example
//!
//! ```
//! use gbneat_evaluator::tetris::{TetrisPolicy, TetrisRewards, TetrisSnapshot};
//! use gbneat_evaluator::policy::GamePolicy;
//!
//! let policy = TetrisPolicy::new(TetrisRewards::default());
//! let prev = TetrisSnapshot { score: 10, ..TetrisSnapshot::default() };
//! let next = TetrisSnapshot { score: 15, ..TetrisSnapshot::default() };
//! assert_eq!(policy.reward(&prev, &next), 100.0);
//! ```

pub mod action;
pub mod episode;
pub mod game;
pub mod pokemon_red;
pub mod policy;
pub mod tetris;
