//! skiff CLI entry point.

use clap::Parser;
use color_eyre::eyre::Result;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use skiff::cli::Cli;
use skiff::exec;

fn main() -> Result<()> {
    // A process re-executed by `skiff exec` joins the target container's
    // namespaces here and never returns. This must happen while the
    // process is still single-threaded: joining a mount namespace fails
    // once other threads exist, so it runs before the tokio runtime
    // spawns its workers.
    exec::maybe_enter_container();

    color_eyre::install()?;

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(EnvFilter::from_default_env().add_directive("skiff=info".parse()?))
        .init();

    let cli = Cli::parse();
    tokio::runtime::Runtime::new()?.block_on(cli.execute())
}
