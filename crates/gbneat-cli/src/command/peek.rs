use anyhow::Context as _;
use gbneat_engine::{Emulator as _, ReadMemory as _, read_save_state};
use gbneat_evaluator::game::Game;

use super::RomArg;
use crate::{emulator, util};

#[derive(Debug, Clone, clap::Args)]
pub(super) struct PeekArg {
    /// Game whose default ROM and save state are used
    #[arg(long, default_value = "tetris")]
    game: Game,
    #[command(flatten)]
    rom: RomArg,
    /// Address to print, hex (`0x` prefix) or decimal
    #[arg(long, default_value = "0xFFA0", value_parser = util::parse_address)]
    address: u16,
    /// Stop after this many frames
    #[arg(long)]
    frames: Option<u64>,
    /// Emulation speed multiplier, 0 for unthrottled
    #[arg(long, default_value_t = 5)]
    speed: u32,
}

pub(super) fn run(arg: &PeekArg) -> anyhow::Result<()> {
    let (rom, state) = arg.rom.resolve(arg.game)?;
    let mut emulator = emulator::open(&rom)?;
    if let Some(path) = &state {
        let bytes = read_save_state(path)?;
        emulator
            .load_state(&bytes)
            .with_context(|| format!("Failed to load save state {}", path.display()))?;
    }
    emulator.set_emulation_speed(arg.speed);

    let mut frame = 0_u64;
    while arg.frames.is_none_or(|n| frame < n) {
        if !emulator.tick(1)? {
            break;
        }
        let value = emulator.read_memory(arg.address);
        println!("{frame}: {:#06x} = {value:#04x}", arg.address);
        frame += 1;
    }
    emulator.stop();
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::Parser as _;

    use super::*;
    use crate::command::{CommandArgs, Mode};

    #[test]
    fn test_peek_defaults() {
        let args = CommandArgs::try_parse_from(["gbneat", "peek"]).unwrap();
        let Mode::Peek(arg) = args.mode else {
            panic!("expected peek");
        };
        assert_eq!(arg.game, Game::Tetris);
        assert_eq!(arg.address, 0xFFA0);
        assert_eq!(arg.speed, 5);
        assert_eq!(arg.frames, None);
    }

    #[test]
    fn test_peek_address_accepts_decimal() {
        let args =
            CommandArgs::try_parse_from(["gbneat", "peek", "--address", "49312", "--frames", "3"])
                .unwrap();
        let Mode::Peek(arg) = args.mode else {
            panic!("expected peek");
        };
        assert_eq!(arg.address, 0xC0A0);
        assert_eq!(arg.frames, Some(3));
    }
}
