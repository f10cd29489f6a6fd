use std::path::Path;

use gbneat_engine::Emulator;

#[cfg(feature = "boytacean")]
pub fn open(rom: &Path) -> anyhow::Result<Box<dyn Emulator>> {
    use anyhow::Context as _;
    use gbneat_engine::boytacean_backend::BoytaceanEmulator;

    let emulator = BoytaceanEmulator::open(rom)
        .with_context(|| format!("Failed to start emulator with ROM {}", rom.display()))?;
    Ok(Box::new(emulator))
}

#[cfg(not(feature = "boytacean"))]
pub fn open(rom: &Path) -> anyhow::Result<Box<dyn Emulator>> {
    anyhow::bail!(
        "cannot run {}: built without an emulator backend; rebuild with --features boytacean",
        rom.display()
    )
}

/// Fails unless an emulator backend was compiled in.
pub fn ensure_backend() -> anyhow::Result<()> {
    anyhow::ensure!(
        cfg!(feature = "boytacean"),
        "built without an emulator backend; rebuild with --features boytacean"
    );
    Ok(())
}
