use std::path::Path;

use chrono::{DateTime, Utc};
use gbneat_evaluator::game::Game;
use gbneat_training::{config::GenomeConfig, genome::Genome, network::FeedForwardNetwork};
use serde::{Deserialize, Serialize};

use crate::util;

/// The best genome of a finished run.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WinnerModel {
    pub game: Game,
    pub trained_at: DateTime<Utc>,
    pub fitness: f64,
    pub genome: Genome,
}

impl WinnerModel {
    pub fn open<P>(path: P) -> anyhow::Result<Self>
    where
        P: AsRef<Path>,
    {
        util::read_json_file("winner model", path)
    }

    /// Compiles the genome for an observation with `history_len` recent actions.
    pub fn network(&self, history_len: usize) -> FeedForwardNetwork {
        let config = GenomeConfig::new(
            self.game.input_count(history_len),
            self.game.output_count(),
        );
        FeedForwardNetwork::create(&self.genome, &config)
    }
}
