//! Command-line surface.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use hnp::{ServerConfig, CONFIG_FILE_NAME};

#[derive(Parser, Debug)]
#[command(
    name = "hnp",
    version,
    about = "HOP 'N POP 16: multiplayer toolchain and game server for PICO-8 web games",
    after_help = "for details visit: https://github.com/DonBattery/hopnpop16"
)]
pub struct Cli {
    #[command(flatten)]
    pub common: CommonArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Args, Debug)]
pub struct CommonArgs {
    /// Root folder of configuration files and protocol definitions.
    #[arg(long, short = 'r', env = "HOPNPOP16_ROOT", default_value = ".", global = true)]
    pub root: PathBuf,

    /// Configuration file, relative to the root folder.
    #[arg(long, short = 'c', env = "HOPNPOP16_CONFIG_FILE", default_value = CONFIG_FILE_NAME, global = true)]
    pub config_file: PathBuf,

    /// Log level (trace, debug, info, warn, error). `RUST_LOG` wins if set.
    #[arg(long, env = "HOPNPOP16_LOG_LEVEL", default_value = "info", global = true)]
    pub log_level: String,

    /// Shorthand for `--log-level debug`.
    #[arg(long, short = 'd', env = "HOPNPOP16_DEBUG_MODE", global = true)]
    pub debug: bool,

    /// Append logs to `hnp.log` in this folder, relative to the root,
    /// instead of writing them to stderr.
    #[arg(long, env = "HOPNPOP16_LOG_FOLDER", global = true)]
    pub log_folder: Option<PathBuf>,
}

impl CommonArgs {
    pub fn config_path(&self) -> PathBuf {
        self.root.join(&self.config_file)
    }

    pub fn log_path(&self) -> Option<PathBuf> {
        self.log_folder
            .as_ref()
            .map(|folder| self.root.join(folder).join(LOG_FILE_NAME))
    }
}

pub const LOG_FILE_NAME: &str = "hnp.log";

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print version and exit.
    #[command(visible_alias = "ver")]
    Version,

    /// Manage configuration.
    Config {
        #[command(subcommand)]
        action: ConfigCommand,
    },

    /// Protocol toolchain.
    Proto {
        #[command(subcommand)]
        action: ProtoCommand,
    },

    /// Run or administer the game server.
    Server {
        #[command(subcommand)]
        action: ServerCommand,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Write the default configuration file under the root folder.
    Create {
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
    /// Check the configuration file and the protocol it points to.
    Validate,
}

#[derive(Subcommand, Debug)]
pub enum ProtoCommand {
    /// Validate a protocol file and print its messages.
    Validate {
        #[arg(default_value = "protocol.toml")]
        proto_file: PathBuf,
    },
    /// Generate client bindings (and optionally rewrite the HTML shell).
    Gen(GenArgs),
}

#[derive(Args, Debug)]
pub struct GenArgs {
    #[arg(default_value = "protocol.toml")]
    pub proto_file: PathBuf,

    /// Output folder.
    #[arg(long = "out-folder", short = 'o', default_value = ".")]
    pub out: PathBuf,

    /// Include the GPIO debugger.
    #[arg(long)]
    pub with_debugger: bool,

    /// Embed the generated scripts into the HTML shell.
    #[arg(long)]
    pub embed: bool,

    /// Reference the generated scripts from the HTML shell.
    #[arg(long)]
    pub import: bool,

    /// Remove every generated block from the HTML shell.
    #[arg(long)]
    pub remove: bool,

    /// Remove only the debugger from the HTML shell.
    #[arg(long)]
    pub remove_debugger: bool,

    /// HTML shell exported by PICO-8.
    #[arg(long)]
    pub html: Option<PathBuf>,

    /// Prefix for script and stylesheet URLs in imported tags.
    #[arg(long, default_value = "")]
    pub asset_prefix: String,
}

#[derive(Subcommand, Debug)]
pub enum ServerCommand {
    /// Start the game server.
    Run(RunArgs),
    /// Perform an admin action against a running server.
    Admin(AdminArgs),
}

/// Overrides applied on top of the configuration file.
#[derive(Args, Debug, Default)]
pub struct ServerOverrides {
    #[arg(long, env = "HOPNPOP16_HOST")]
    pub host: Option<String>,

    #[arg(long, env = "HOPNPOP16_PORT")]
    pub port: Option<u16>,

    #[arg(long, env = "HOPNPOP16_ADMIN_PORT")]
    pub admin_port: Option<u16>,

    #[arg(long, env = "HOPNPOP16_ADMIN_HEADER")]
    pub admin_header: Option<String>,

    #[arg(long, env = "HOPNPOP16_ADMIN_SECRET", hide_env_values = true)]
    pub admin_secret: Option<String>,
}

impl ServerOverrides {
    pub fn apply(&self, config: &mut ServerConfig) {
        if let Some(host) = &self.host {
            config.host = host.clone();
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(port) = self.admin_port {
            config.admin_port = port;
        }
        if let Some(header) = &self.admin_header {
            config.admin_header = header.clone();
        }
        if let Some(secret) = &self.admin_secret {
            config.admin_secret = secret.clone();
        }
    }
}

#[derive(Args, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub server: ServerOverrides,

    #[arg(long, env = "HOPNPOP16_MAX_ROOMS")]
    pub max_rooms: Option<usize>,

    #[arg(long, env = "HOPNPOP16_MAX_CONN_PER_ROOM")]
    pub max_conn_per_room: Option<usize>,

    /// Seconds an empty room is kept alive.
    #[arg(long, env = "HOPNPOP16_GRACE_PERIOD")]
    pub grace_period: Option<u64>,

    /// Protocol file, relative to the root folder.
    #[arg(long, env = "HOPNPOP16_PROTOCOL_FILE")]
    pub protocol_file: Option<PathBuf>,
}

impl RunArgs {
    pub fn apply(&self, config: &mut ServerConfig) {
        self.server.apply(config);
        if let Some(n) = self.max_rooms {
            config.max_rooms = n;
        }
        if let Some(n) = self.max_conn_per_room {
            config.max_conn_per_room = n;
        }
        if let Some(secs) = self.grace_period {
            config.grace_period_secs = secs;
        }
        if let Some(path) = &self.protocol_file {
            config.protocol_file = path.clone();
        }
    }
}

#[derive(Args, Debug)]
pub struct AdminArgs {
    /// list-rooms, shutdown or shutdown-room.
    pub action: String,

    /// Room id for shutdown-room.
    pub room: Option<u32>,

    /// Base URL of the server, without port.
    #[arg(long, short = 'u', env = "HOPNPOP16_HOST_URL", default_value = "http://localhost")]
    pub host_url: String,

    #[command(flatten)]
    pub server: ServerOverrides,
}
