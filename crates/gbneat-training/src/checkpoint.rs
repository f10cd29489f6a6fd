//! Periodic snapshots of the whole run state.

use std::{
    fs::File,
    io::{self, BufReader, BufWriter, Write as _},
    path::{Path, PathBuf},
};

use crate::population::PopulationState;

#[derive(Debug, derive_more::Display, derive_more::Error)]
pub enum CheckpointError {
    #[display("checkpoint {}: {source}", path.display())]
    Io { path: PathBuf, source: io::Error },
    #[display("malformed checkpoint {}: {source}", path.display())]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Writes `<prefix><generation>` every `interval` generations.
#[derive(Debug, Clone)]
pub struct Checkpointer {
    prefix: String,
    interval: usize,
    last: Option<usize>,
}

impl Checkpointer {
    pub const DEFAULT_INTERVAL: usize = 5;
    pub const DEFAULT_PREFIX: &str = "neat-checkpoint-";

    #[must_use]
    pub fn new(prefix: impl Into<String>, interval: usize) -> Self {
        Self {
            prefix: prefix.into(),
            interval: interval.max(1),
            last: None,
        }
    }

    #[must_use]
    pub fn path_for(&self, generation: usize) -> PathBuf {
        PathBuf::from(format!("{}{generation}", self.prefix))
    }

    /// Whether the generation that just ended is due for a checkpoint.
    #[must_use]
    pub fn is_due(&self, generation: usize) -> bool {
        match self.last {
            None => generation + 1 >= self.interval,
            Some(last) => generation.saturating_sub(last) >= self.interval,
        }
    }

    /// Saves `state` if `generation` is due. Returns the written path.
    pub fn end_generation(
        &mut self,
        generation: usize,
        state: &PopulationState,
    ) -> Result<Option<PathBuf>, CheckpointError> {
        if !self.is_due(generation) {
            return Ok(None);
        }
        let path = self.path_for(generation);
        save(&path, state)?;
        self.last = Some(generation);
        tracing::info!(generation, path = %path.display(), "saved checkpoint");
        Ok(Some(path))
    }
}

pub fn save(path: &Path, state: &PopulationState) -> Result<(), CheckpointError> {
    let io_error = |source| CheckpointError::Io {
        path: path.to_owned(),
        source,
    };
    let file = File::create(path).map_err(io_error)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer(&mut writer, state).map_err(|source| CheckpointError::Json {
        path: path.to_owned(),
        source,
    })?;
    writer.flush().map_err(io_error)?;
    Ok(())
}

pub fn restore(path: &Path) -> Result<PopulationState, CheckpointError> {
    let file = File::open(path).map_err(|source| CheckpointError::Io {
        path: path.to_owned(),
        source,
    })?;
    serde_json::from_reader(BufReader::new(file)).map_err(|source| CheckpointError::Json {
        path: path.to_owned(),
        source,
    })
}
