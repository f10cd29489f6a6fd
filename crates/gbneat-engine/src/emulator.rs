use std::{
    fs, io,
    path::{Path, PathBuf},
    thread,
    time::{Duration, Instant},
};

use crate::{Button, Screen};

/// Game Boy frames per second at normal speed.
pub const FRAMES_PER_SECOND: f64 = 59.7275;

#[derive(Debug, derive_more::Display, derive_more::Error)]
pub enum EmulatorError {
    #[display("failed to read {}: {source}", path.display())]
    Io { path: PathBuf, source: io::Error },
    #[display("failed to load ROM {}: {message}", path.display())]
    Rom { path: PathBuf, message: String },
    #[display("failed to restore save state: {message}")]
    SaveState { message: String },
    #[display("emulator backend error: {message}")]
    Backend { message: String },
    #[display("emulator has already been stopped")]
    Stopped,
}

/// Read-only access to the emulated address space.
///
/// Takes `&mut self` because some backends route reads through a memory
/// controller that tracks state.
pub trait ReadMemory {
    fn read_memory(&mut self, address: u16) -> u8;
}

/// Plain byte slices act as a flat address space. Addresses past the end read as
/// `0xFF`, like an open bus.
impl ReadMemory for [u8] {
    fn read_memory(&mut self, address: u16) -> u8 {
        self.get(usize::from(address)).copied().unwrap_or(0xFF)
    }
}

impl ReadMemory for Vec<u8> {
    fn read_memory(&mut self, address: u16) -> u8 {
        self.as_mut_slice().read_memory(address)
    }
}

/// An emulator instance driven frame by frame.
///
/// Each instance is owned by exactly one episode. Instances are never shared
/// between episodes or handed across worker processes.
pub trait Emulator: ReadMemory {
    /// Advances the emulator by `frames` frames.
    ///
    /// Returns `Ok(false)` once the emulator has asked to stop (for example the
    /// window was closed), mirroring a run loop condition.
    fn tick(&mut self, frames: u32) -> Result<bool, EmulatorError>;

    /// Presses `button` for a single frame. The release happens on the next tick.
    fn press(&mut self, button: Button) -> Result<(), EmulatorError>;

    /// Captures the current screen as luminance values.
    fn screen(&mut self) -> Screen;

    /// Restores a save state produced by the same backend.
    fn load_state(&mut self, state: &[u8]) -> Result<(), EmulatorError>;

    /// Sets the speed multiplier. `0` runs unthrottled.
    fn set_emulation_speed(&mut self, speed: u32);

    /// Stops the emulator. Further ticks report that the emulator stopped.
    fn stop(&mut self);
}

impl<E> ReadMemory for Box<E>
where
    E: ReadMemory + ?Sized,
{
    fn read_memory(&mut self, address: u16) -> u8 {
        (**self).read_memory(address)
    }
}

impl<E> Emulator for Box<E>
where
    E: Emulator + ?Sized,
{
    fn tick(&mut self, frames: u32) -> Result<bool, EmulatorError> {
        (**self).tick(frames)
    }

    fn press(&mut self, button: Button) -> Result<(), EmulatorError> {
        (**self).press(button)
    }

    fn screen(&mut self) -> Screen {
        (**self).screen()
    }

    fn load_state(&mut self, state: &[u8]) -> Result<(), EmulatorError> {
        (**self).load_state(state)
    }

    fn set_emulation_speed(&mut self, speed: u32) {
        (**self).set_emulation_speed(speed);
    }

    fn stop(&mut self) {
        (**self).stop();
    }
}

/// Reads a save-state file into memory.
pub fn read_save_state<P>(path: P) -> Result<Vec<u8>, EmulatorError>
where
    P: AsRef<Path>,
{
    let path = path.as_ref();
    fs::read(path).map_err(|source| EmulatorError::Io {
        path: path.to_owned(),
        source,
    })
}

/// Throttles frame production to a multiple of real-time speed.
#[derive(Debug, Clone)]
pub struct FramePacer {
    speed: u32,
    deadline: Option<Instant>,
}

impl FramePacer {
    #[must_use]
    pub fn new(speed: u32) -> Self {
        Self {
            speed,
            deadline: None,
        }
    }

    #[must_use]
    pub fn speed(&self) -> u32 {
        self.speed
    }

    pub fn set_speed(&mut self, speed: u32) {
        self.speed = speed;
        self.deadline = None;
    }

    /// Wall-clock budget for one frame, or `None` when unthrottled.
    #[must_use]
    pub fn frame_duration(&self) -> Option<Duration> {
        if self.speed == 0 {
            return None;
        }
        Some(Duration::from_secs_f64(
            1.0 / (FRAMES_PER_SECOND * f64::from(self.speed)),
        ))
    }

    /// Sleeps until the next frame is due.
    pub fn wait_frame(&mut self) {
        let Some(frame) = self.frame_duration() else {
            return;
        };
        let now = Instant::now();
        let deadline = self.deadline.map_or(now + frame, |d| d + frame);
        if deadline > now {
            thread::sleep(deadline - now);
            self.deadline = Some(deadline);
        } else {
            // fell behind; don't try to catch up with a burst of frames
            self.deadline = Some(now);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write as _;

    use super::*;

    #[test]
    fn test_slice_reads_past_end_as_open_bus() {
        let mut memory = vec![0u8; 4];
        memory[2] = 0x42;
        assert_eq!(memory.read_memory(2), 0x42);
        assert_eq!(memory.read_memory(4), 0xFF);
        assert_eq!(memory.read_memory(0xFFFF), 0xFF);
    }

    #[test]
    fn test_frame_pacer_unthrottled_at_speed_zero() {
        let mut pacer = FramePacer::new(0);
        assert_eq!(pacer.frame_duration(), None);
        pacer.wait_frame();
    }

    #[test]
    fn test_frame_pacer_scales_with_speed() {
        let normal = FramePacer::new(1).frame_duration().unwrap();
        let fast = FramePacer::new(10).frame_duration().unwrap();
        assert!(normal > fast);
        // durations are rounded to whole nanoseconds
        assert!(normal.as_nanos().abs_diff(fast.as_nanos() * 10) <= 10);
    }

    #[test]
    fn test_read_save_state() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&[1, 2, 3]).unwrap();
        assert_eq!(read_save_state(file.path()).unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn test_read_missing_save_state_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.state");
        let err = read_save_state(&path).unwrap_err();
        assert!(matches!(err, EmulatorError::Io { .. }));
        assert!(err.to_string().contains("missing.state"));
    }
}
