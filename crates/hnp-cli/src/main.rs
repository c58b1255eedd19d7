//! `hnp`: protocol toolchain and game server launcher.

mod cli;
mod commands;

use std::fs::OpenOptions;
use std::sync::Mutex;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use cli::{Cli, Command, CommonArgs, ProtoCommand, ServerCommand};

/// Stderr, or the log file under `--log-folder`.
fn log_writer(common: &CommonArgs) -> anyhow::Result<BoxMakeWriter> {
    let Some(path) = common.log_path() else {
        return Ok(BoxMakeWriter::new(std::io::stderr));
    };
    if let Some(folder) = path.parent() {
        std::fs::create_dir_all(folder).with_context(|| format!("creating {}", folder.display()))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("opening {}", path.display()))?;
    Ok(BoxMakeWriter::new(Mutex::new(file)))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = if cli.common.debug { "debug" } else { cli.common.log_level.as_str() };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_ansi(cli.common.log_folder.is_none())
                .with_writer(log_writer(&cli.common)?),
        )
        .with(filter)
        .init();

    match &cli.command {
        Command::Version => println!("hnp {}", env!("CARGO_PKG_VERSION")),
        Command::Config { action } => commands::config(&cli.common, action)?,
        Command::Proto { action } => match action {
            ProtoCommand::Validate { proto_file } => commands::proto_validate(&cli.common, proto_file)?,
            ProtoCommand::Gen(args) => commands::proto_gen(&cli.common, args)?,
        },
        Command::Server { action } => match action {
            ServerCommand::Run(args) => commands::server_run(&cli.common, args).await?,
            ServerCommand::Admin(args) => commands::server_admin(&cli.common, args).await?,
        },
    }
    Ok(())
}
