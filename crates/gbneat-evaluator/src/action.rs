//! Controller actions and the per-candidate action log.

use std::{
    fmt,
    fs::{self, File},
    io::{self, BufWriter, Write as _},
    path::{Path, PathBuf},
};

use gbneat_engine::Button;
use serde::{Deserialize, Serialize};

/// Fitness a candidate must exceed before its action log is written.
pub const ACTION_LOG_MIN_FITNESS: f64 = 1.0;

/// One controller decision: press a button for a frame, or do nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Action {
    Noop,
    Press(Button),
}

impl Action {
    #[must_use]
    pub const fn button(self) -> Option<Button> {
        match self {
            Action::Noop => None,
            Action::Press(button) => Some(button),
        }
    }

    /// Name written to the action log. Noop is the empty string.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Action::Noop => "",
            Action::Press(button) => button.name(),
        }
    }
}

/// Returns whether a candidate with `fitness` gets an action log.
#[must_use]
pub fn should_write_action_log(fitness: f64) -> bool {
    fitness > ACTION_LOG_MIN_FITNESS
}

/// Path of the action log for `candidate` inside `dir`.
pub fn action_log_path<K>(dir: &Path, candidate: K) -> PathBuf
where
    K: fmt::Display,
{
    dir.join(format!("{candidate}_actions.txt"))
}

/// Writes one action name per line to `<dir>/<candidate>_actions.txt`.
///
/// The directory is created if missing.
pub fn write_action_log<K>(dir: &Path, candidate: K, actions: &[Action]) -> io::Result<PathBuf>
where
    K: fmt::Display,
{
    fs::create_dir_all(dir)?;
    let path = action_log_path(dir, candidate);
    let mut writer = BufWriter::new(File::create(&path)?);
    for action in actions {
        writeln!(writer, "{}", action.name())?;
    }
    writer.flush()?;
    Ok(path)
}
