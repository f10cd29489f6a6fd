//! [`Emulator`] backend built on the `boytacean` Game Boy emulator.

use std::path::Path;

use boytacean::{
    gb::{GameBoy, GameBoyMode},
    pad::PadKey,
    state::StateManager,
};

use crate::{Button, Emulator, EmulatorError, FramePacer, ReadMemory, Screen};

/// A headless DMG instance.
pub struct BoytaceanEmulator {
    gb: GameBoy,
    held: Option<PadKey>,
    pacer: FramePacer,
    stopped: bool,
}

impl std::fmt::Debug for BoytaceanEmulator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoytaceanEmulator")
            .field("held", &self.held)
            .field("pacer", &self.pacer)
            .field("stopped", &self.stopped)
            .finish_non_exhaustive()
    }
}

impl BoytaceanEmulator {
    /// Boots `rom` without the boot ROM animation.
    pub fn open<P>(rom: P) -> Result<Self, EmulatorError>
    where
        P: AsRef<Path>,
    {
        let rom = rom.as_ref();
        let rom_error = |message: String| EmulatorError::Rom {
            path: rom.to_owned(),
            message,
        };
        let path = rom
            .to_str()
            .ok_or_else(|| rom_error("path is not valid UTF-8".to_owned()))?;

        let mut gb = GameBoy::new(Some(GameBoyMode::Dmg));
        gb.load(false).map_err(|e| rom_error(e.to_string()))?;
        gb.load_rom_file(path, None)
            .map_err(|e| rom_error(e.to_string()))?;
        tracing::debug!(rom = %rom.display(), "loaded ROM");

        Ok(Self {
            gb,
            held: None,
            pacer: FramePacer::new(0),
            stopped: false,
        })
    }

    fn release_held(&mut self) {
        if let Some(key) = self.held.take() {
            self.gb.key_lift(key);
        }
    }
}

fn pad_key(button: Button) -> PadKey {
    match button {
        Button::A => PadKey::A,
        Button::B => PadKey::B,
        Button::Left => PadKey::Left,
        Button::Right => PadKey::Right,
        Button::Up => PadKey::Up,
        Button::Down => PadKey::Down,
        Button::Start => PadKey::Start,
        Button::Select => PadKey::Select,
    }
}

impl ReadMemory for BoytaceanEmulator {
    fn read_memory(&mut self, address: u16) -> u8 {
        self.gb.read_memory(address)
    }
}

impl Emulator for BoytaceanEmulator {
    fn tick(&mut self, frames: u32) -> Result<bool, EmulatorError> {
        if self.stopped {
            return Ok(false);
        }
        for _ in 0..frames {
            self.gb.next_frame();
            self.release_held();
            self.pacer.wait_frame();
        }
        Ok(true)
    }

    fn press(&mut self, button: Button) -> Result<(), EmulatorError> {
        if self.stopped {
            return Err(EmulatorError::Stopped);
        }
        self.release_held();
        let key = pad_key(button);
        self.gb.key_press(key);
        self.held = Some(key);
        Ok(())
    }

    fn screen(&mut self) -> Screen {
        Screen::from_rgb_or_blank(&self.gb.frame_buffer()[..])
    }

    fn load_state(&mut self, state: &[u8]) -> Result<(), EmulatorError> {
        StateManager::load(state, &mut self.gb, None).map_err(|e| EmulatorError::SaveState {
            message: e.to_string(),
        })
    }

    fn set_emulation_speed(&mut self, speed: u32) {
        self.pacer.set_speed(speed);
    }

    fn stop(&mut self) {
        self.release_held();
        self.stopped = true;
    }
}
