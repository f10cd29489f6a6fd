use tracing_subscriber::filter::{EnvFilter, LevelFilter};

mod command;
mod emulator;
mod evaluation;
mod model;
mod util;

fn main() -> anyhow::Result<()> {
    // stdout carries worker results, so diagnostics stay on stderr
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .init();

    command::run()
}
