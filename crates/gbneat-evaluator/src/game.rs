use std::{path::Path, str::FromStr};

use gbneat_engine::Emulator;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::{
    episode::{Controller, EpisodeConfig, EpisodeError, EpisodeOutcome, EpisodeRunner},
    policy::GamePolicy,
    pokemon_red::{PokemonRedPolicy, PokemonRedRewards},
    tetris::{TetrisPolicy, TetrisRewards},
};

/// A supported game, selecting the policy and its defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, derive_more::Display)]
#[serde(rename_all = "kebab-case")]
pub enum Game {
    #[display("tetris")]
    Tetris,
    #[display("pokemon-red")]
    PokemonRed,
}

#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("unknown game '{input}' (expected 'tetris' or 'pokemon-red')")]
pub struct ParseGameError {
    input: String,
}

impl FromStr for Game {
    type Err = ParseGameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "tetris" => Ok(Game::Tetris),
            "pokemon-red" | "pokemonred" | "pokemon_red" => Ok(Game::PokemonRed),
            _ => Err(ParseGameError {
                input: s.to_owned(),
            }),
        }
    }
}

impl Game {
    pub const ALL: [Game; 2] = [Game::Tetris, Game::PokemonRed];

    #[must_use]
    pub fn default_rom_path(self) -> &'static Path {
        match self {
            Game::Tetris => Path::new("ROM/Tetris.gb"),
            Game::PokemonRed => Path::new("ROM/PokemonRed.gb"),
        }
    }

    #[must_use]
    pub fn default_state_path(self) -> &'static Path {
        match self {
            Game::Tetris => Path::new("ROM/states/game_start.state"),
            Game::PokemonRed => Path::new("ROM/states/has_pokedex.state"),
        }
    }

    #[must_use]
    pub fn default_episode_config(self) -> EpisodeConfig {
        match self {
            Game::Tetris => EpisodeConfig::default(),
            Game::PokemonRed => EpisodeConfig {
                wait_for_action: 150,
                ..EpisodeConfig::default()
            },
        }
    }

    /// Network input count for an observation with `history_len` recent actions.
    #[must_use]
    pub fn input_count(self, history_len: usize) -> usize {
        match self {
            Game::Tetris => tetris_policy().observation_len(history_len),
            Game::PokemonRed => pokemon_red_policy().observation_len(history_len),
        }
    }

    /// Network output count, one per action.
    #[must_use]
    pub fn output_count(self) -> usize {
        match self {
            Game::Tetris => tetris_policy().actions().len(),
            Game::PokemonRed => pokemon_red_policy().actions().len(),
        }
    }

    /// Plays one full episode of this game with the default reward constants.
    pub fn run_episode<E, C, R>(
        self,
        emulator: E,
        controller: C,
        config: EpisodeConfig,
        save_state: Option<&[u8]>,
        rng: &mut R,
    ) -> Result<EpisodeOutcome, EpisodeError>
    where
        E: Emulator,
        C: Controller,
        R: Rng + ?Sized,
    {
        match self {
            Game::Tetris => {
                EpisodeRunner::new(emulator, tetris_policy(), controller, config, rng)
                    .run(save_state)
            }
            Game::PokemonRed => {
                EpisodeRunner::new(emulator, pokemon_red_policy(), controller, config, rng)
                    .run(save_state)
            }
        }
    }
}

fn tetris_policy() -> TetrisPolicy {
    TetrisPolicy::new(TetrisRewards::default())
}

fn pokemon_red_policy() -> PokemonRedPolicy {
    PokemonRedPolicy::new(PokemonRedRewards::default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display_round_trip() {
        for game in Game::ALL {
            assert_eq!(game.to_string().parse::<Game>().unwrap(), game);
        }
        assert_eq!("Pokemon_Red".parse::<Game>().unwrap(), Game::PokemonRed);
        let err = "zelda".parse::<Game>().unwrap_err();
        assert!(err.to_string().contains("zelda"));
    }

    #[test]
    fn test_serde_names() {
        assert_eq!(
            serde_json::to_string(&Game::PokemonRed).unwrap(),
            "\"pokemon-red\""
        );
    }

    #[test]
    fn test_network_dimensions() {
        assert_eq!(Game::Tetris.input_count(5), 4327);
        assert_eq!(Game::Tetris.output_count(), 7);
        assert_eq!(Game::PokemonRed.input_count(5), 17290);
        assert_eq!(Game::PokemonRed.output_count(), 9);
    }

    #[test]
    fn test_episode_defaults() {
        let tetris = Game::Tetris.default_episode_config();
        assert_eq!(tetris.wait_for_action, 1);
        assert_eq!(tetris.stall_limit, 2000);
        assert_eq!(tetris.emulation_speed, 10);

        let pokemon = Game::PokemonRed.default_episode_config();
        assert_eq!(pokemon.wait_for_action, 150);
        assert_eq!(pokemon.stall_limit, 2000);
    }
}
