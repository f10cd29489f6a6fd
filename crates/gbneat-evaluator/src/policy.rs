//! The per-game reward and observation contract.
//!
//! A [`GamePolicy`] knows where a game keeps its state in RAM, how to turn two
//! consecutive snapshots into a reward, and how to lay out the controller's input
//! vector. It does not drive the emulator. [`EpisodeRunner`](crate::episode::EpisodeRunner)
//! does that and calls back into the policy once per step.
//!
//! # Observation layout
//!
//! The runner assembles every observation the same way:
//!
//! ```text
//! [ policy.encode(snapshot, recent_actions) | frame history (newest first, interleaved) ]
//! ```
//!
//! All values are normalized to `[0, 1]`.

use std::fmt;

use gbneat_engine::{Button, ReadMemory, SCREEN_HEIGHT, SCREEN_WIDTH};

use crate::action::Action;

/// A scripted input used to get a game from power-on to a playable state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputStep {
    /// Button pressed before waiting, if any.
    pub button: Option<Button>,
    /// Frames to wait afterwards.
    pub wait: u32,
}

impl InputStep {
    #[must_use]
    pub const fn wait(frames: u32) -> Self {
        Self {
            button: None,
            wait: frames,
        }
    }

    #[must_use]
    pub const fn press(button: Button, frames: u32) -> Self {
        Self {
            button: Some(button),
            wait: frames,
        }
    }
}

/// Game-specific memory reading, reward shaping and observation encoding.
pub trait GamePolicy {
    /// Game state read from memory at one instant.
    type Snapshot: Clone + fmt::Debug;

    /// The controller's action set. Network output `i` selects `actions()[i]`.
    fn actions(&self) -> &'static [Action];

    /// Screen downscale factor used for the frame history.
    fn frame_scale(&self) -> usize;

    /// Number of recent frames kept in the observation.
    fn frame_history(&self) -> usize {
        3
    }

    /// Number of scalar features [`encode`](Self::encode) writes besides the recent actions.
    fn scalar_count(&self) -> usize;

    /// Inputs to play when the episode starts without a save state.
    fn intro_script(&self) -> Vec<InputStep> {
        vec![]
    }

    /// Reads the current game state.
    ///
    /// May update the policy's own bookkeeping (for example visited coordinates),
    /// but never touches the emulator beyond reading memory.
    fn snapshot(&mut self, memory: &mut dyn ReadMemory) -> Self::Snapshot;

    /// Reward for the transition `prev -> next`.
    ///
    /// Conditions that do not trigger contribute zero.
    fn reward(&self, prev: &Self::Snapshot, next: &Self::Snapshot) -> f64;

    /// Whether the game has ended.
    fn is_game_over(&self, snapshot: &Self::Snapshot) -> bool;

    /// Writes game scalars and the normalized recent actions into `out`.
    fn encode(&self, snapshot: &Self::Snapshot, recent_actions: &[f64], out: &mut Vec<f64>);

    /// Total observation length for `recent_actions` remembered actions.
    fn observation_len(&self, recent_actions: usize) -> usize {
        let scale = self.frame_scale();
        let frame_len = (SCREEN_WIDTH / scale) * (SCREEN_HEIGHT / scale);
        self.scalar_count() + recent_actions + frame_len * self.frame_history()
    }
}

/// Scales a raw memory byte to `[0, 1]`.
#[must_use]
pub fn normalize_byte(value: u8) -> f64 {
    f64::from(value) / 255.0
}

/// Scales an action index to `[0, 1]` given the size of the action set.
#[must_use]
#[expect(clippy::cast_precision_loss)]
pub fn normalize_action(index: usize, action_count: usize) -> f64 {
    if action_count <= 1 {
        return 0.0;
    }
    index as f64 / (action_count - 1) as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_action_bounds() {
        assert_eq!(normalize_action(0, 7), 0.0);
        assert_eq!(normalize_action(6, 7), 1.0);
        assert!((normalize_action(3, 7) - 0.5).abs() < 1e-12);
        assert_eq!(normalize_action(0, 1), 0.0);
    }

    #[test]
    fn test_normalize_byte_bounds() {
        assert_eq!(normalize_byte(0), 0.0);
        assert_eq!(normalize_byte(255), 1.0);
    }
}
