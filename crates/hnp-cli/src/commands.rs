//! Command implementations.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use hnp::{HnpServerBuilder, ServerConfig};
use hnp_admin::{AdminAction, AdminClient, AdminResponse};
use hnp_codegen::{generate, GenerateOptions, HtmlDocument};
use hnp_schema::{validate_all, ProtocolSchema, ValidatedSchema};

use crate::cli::{AdminArgs, CommonArgs, ConfigCommand, GenArgs, RunArgs};

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

/// Loads the configuration file, falling back to defaults when absent.
pub fn load_config(common: &CommonArgs) -> Result<ServerConfig> {
    let path = common.config_path();
    if !path.exists() {
        tracing::debug!(path = %path.display(), "no config file, using defaults");
        return Ok(ServerConfig::default());
    }
    ServerConfig::load(&path).with_context(|| format!("loading {}", path.display()))
}

pub fn config(common: &CommonArgs, action: &ConfigCommand) -> Result<()> {
    match action {
        ConfigCommand::Create { force } => {
            let path = common.config_path();
            if path.exists() && !force {
                bail!("{} already exists (use --force to overwrite)", path.display());
            }
            ServerConfig::default()
                .save(&path)
                .with_context(|| format!("writing {}", path.display()))?;
            println!("created {}", path.display());
        }
        ConfigCommand::Validate => {
            let config = load_config(common)?;
            config.validate().context("invalid configuration")?;
            let proto = common.root.join(&config.protocol_file);
            let schema = load_schema(&proto)?;
            println!(
                "configuration ok: {} messages, fingerprint {:#010x}",
                schema.messages().len(),
                schema.fingerprint()
            );
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Protocol
// ---------------------------------------------------------------------------

/// Loads and validates a protocol file, printing every problem found.
fn load_schema(path: &Path) -> Result<ValidatedSchema> {
    let schema = ProtocolSchema::load(path).with_context(|| format!("loading {}", path.display()))?;
    match validate_all(&schema) {
        Ok(validated) => Ok(validated),
        Err(errors) => {
            for error in &errors {
                eprintln!("  {error}");
            }
            bail!("{} has {} validation error(s)", path.display(), errors.len());
        }
    }
}

fn resolve(root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() { path.to_path_buf() } else { root.join(path) }
}

pub fn proto_validate(common: &CommonArgs, proto_file: &Path) -> Result<()> {
    let schema = load_schema(&resolve(&common.root, proto_file))?;
    println!("{:<4} {:<24} {:<16} {:>6}  FIELDS", "TAG", "NAME", "DIRECTION", "BYTES");
    for message in schema.messages() {
        let fields = message
            .fields
            .iter()
            .map(|f| format!("{}:{}{}", f.name, f.ty, if f.optional { "?" } else { "" }))
            .collect::<Vec<_>>()
            .join(" ");
        println!(
            "{:<4} {:<24} {:<16} {:>6}  {}",
            message.tag,
            message.name,
            message.direction.to_string(),
            message.max_frame_size(),
            fields
        );
    }
    println!("fingerprint {:#010x}", schema.fingerprint());
    Ok(())
}

pub fn proto_gen(common: &CommonArgs, args: &GenArgs) -> Result<()> {
    let schema = load_schema(&resolve(&common.root, &args.proto_file))?;

    let html = match &args.html {
        Some(path) => {
            let path = resolve(&common.root, path);
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("reading {}", path.display()))?;
            let name = path
                .file_name()
                .and_then(|n| n.to_str())
                .context("HTML path has no file name")?;
            Some(HtmlDocument::new(name, content))
        }
        None => None,
    };

    let options = GenerateOptions {
        with_debugger: args.with_debugger,
        embed: args.embed,
        import: args.import,
        remove: args.remove,
        remove_debugger: args.remove_debugger,
        html,
        asset_prefix: args.asset_prefix.clone(),
    };
    let assets = generate(&schema, &options)?;

    let out = resolve(&common.root, &args.out);
    for path in assets.write_to(&out)? {
        println!("wrote {}", path.display());
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Server
// ---------------------------------------------------------------------------

pub async fn server_run(common: &CommonArgs, args: &RunArgs) -> Result<()> {
    let mut config = load_config(common)?;
    args.apply(&mut config);
    config.validate().context("invalid configuration")?;

    let proto = resolve(&common.root, &config.protocol_file);
    let schema = load_schema(&proto)?;

    let server = HnpServerBuilder::new()
        .config(config)
        .build(&schema)
        .await
        .context("starting server")?;
    tracing::info!(
        addr = %server.local_addr()?,
        admin = ?server.admin_addr(),
        "listening"
    );

    let handle = server.handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupt received, shutting down");
            handle.stop();
        }
    });

    server.run().await?;
    Ok(())
}

pub async fn server_admin(common: &CommonArgs, args: &AdminArgs) -> Result<()> {
    let mut config = load_config(common)?;
    args.server.apply(&mut config);

    let action = AdminAction::parse(&args.action, args.room)?;
    let base_url = format!("{}:{}", args.host_url.trim_end_matches('/'), config.admin_port);
    let client = AdminClient::new(base_url, config.admin_header, config.admin_secret);

    match client.execute(action).await? {
        AdminResponse::Rooms { rooms } => {
            if rooms.is_empty() {
                println!("no rooms");
            }
            for room in rooms {
                println!(
                    "{:<8} {:>3}/{:<3} {}",
                    room.id.to_string(),
                    room.members,
                    room.capacity,
                    room.state
                );
            }
        }
        AdminResponse::ShutDown { room: Some(room) } => println!("{room} shut down"),
        AdminResponse::ShutDown { room: None } => println!("server shutting down"),
    }
    Ok(())
}
