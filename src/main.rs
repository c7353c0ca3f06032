//! nvbridge - Neovim frontend adapter
//!
//! nvbridge attaches to an embedded Neovim process over msgpack-RPC,
//! decodes its batched redraw notifications and publishes them as an
//! ordered stream of UI actions that a rendering layer can apply.
//!
//! Run standalone it acts as a headless driver: it spawns the editor,
//! attaches, negotiates a grid and logs every action it would hand to a
//! renderer. That is mostly useful for debugging a frontend without one.
//!
//! # Quick Start
//!
//! ```text
//! nvbridge                    # attach to `nvim` from PATH
//! nvbridge src/lib.rs         # open a file
//! nvbridge --nvim /opt/nvim   # explicit binary
//! nvbridge --font "Iosevka:16"
//! ```

mod config;
mod core;
mod emitter;
mod font;
mod geometry;
mod plugin;

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use tracing::{debug, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use crate::config::Config;
use crate::core::adapter::UiAdapter;
use crate::plugin::NullPluginHost;

/// Viewport assumed by the headless driver; a real host would feed its
/// actual window size here.
const HEADLESS_VIEWPORT: (u32, u32) = (1280, 800);

/// Version string from Cargo.toml
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Command line options
struct CliArgs {
    /// Explicit config file path
    config_path: Option<PathBuf>,
    /// Editor binary override
    editor_path: Option<String>,
    /// Font override as (family, optional size)
    font: Option<(String, Option<f32>)>,
    /// Ex commands to run after attach (`+cmd`, vim style)
    commands: Vec<String>,
    /// Files to open
    files: Vec<PathBuf>,
}

fn print_version() {
    eprintln!("nvbridge {}", VERSION);
}

fn print_help() {
    eprintln!("nvbridge {} - Neovim frontend adapter", VERSION);
    eprintln!();
    eprintln!("Usage: nvbridge [OPTIONS] [+COMMAND...] [FILES...]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --nvim <PATH>         Editor binary (default: nvim from PATH)");
    eprintln!("  --font <FAMILY:SIZE>  Font family and pixel size");
    eprintln!("  --config <PATH>       Config file (default: ~/.nvbridge/config.toml)");
    eprintln!("  -v, --version         Show version");
    eprintln!("  -h, --help            Show this help");
    eprintln!();
    eprintln!("Configuration: ~/.nvbridge/config.toml");
    eprintln!("Log file:      ~/.nvbridge/nvbridge.log");
}

fn parse_args() -> Result<CliArgs, String> {
    let args: Vec<String> = env::args().collect();
    let mut cli = CliArgs {
        config_path: None,
        editor_path: None,
        font: None,
        commands: Vec::new(),
        files: Vec::new(),
    };
    let mut i = 1;

    while i < args.len() {
        match args[i].as_str() {
            "-h" | "--help" => {
                print_help();
                std::process::exit(0);
            }
            "-v" | "--version" => {
                print_version();
                std::process::exit(0);
            }
            "--nvim" => {
                i += 1;
                if i >= args.len() {
                    return Err("Missing path after --nvim".to_string());
                }
                cli.editor_path = Some(args[i].clone());
            }
            "--font" => {
                i += 1;
                if i >= args.len() {
                    return Err("Missing value after --font".to_string());
                }
                cli.font = Some(parse_font_spec(&args[i])?);
            }
            "--config" => {
                i += 1;
                if i >= args.len() {
                    return Err("Missing path after --config".to_string());
                }
                cli.config_path = Some(PathBuf::from(&args[i]));
            }
            arg if arg.starts_with('+') && arg.len() > 1 => {
                cli.commands.push(arg[1..].to_string());
            }
            arg if arg.starts_with('-') => {
                return Err(format!("Unknown argument: {}. Use -h for help.", arg));
            }
            file => {
                cli.files.push(PathBuf::from(file));
            }
        }
        i += 1;
    }

    Ok(cli)
}

/// Parse `FAMILY:SIZE`; the size part is optional.
fn parse_font_spec(spec: &str) -> Result<(String, Option<f32>), String> {
    if spec.is_empty() {
        return Err("Empty font spec".to_string());
    }
    match spec.rsplit_once(':') {
        Some((family, size)) if !family.is_empty() => {
            let size: f32 = size
                .parse()
                .map_err(|_| format!("Invalid font size in `{}`", spec))?;
            Ok((family.to_string(), Some(size)))
        }
        Some(_) => Err(format!("Invalid font spec `{}`", spec)),
        None => Ok((spec.to_string(), None)),
    }
}

fn init_logging() {
    let log_path = Config::data_dir()
        .map(|dir| dir.join("nvbridge.log"))
        .unwrap_or_else(|| PathBuf::from("nvbridge.log"));

    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .ok();

    if let Some(file) = log_file {
        let subscriber = FmtSubscriber::builder()
            .with_max_level(Level::DEBUG)
            .with_writer(std::sync::Mutex::new(file))
            .with_ansi(false)
            .finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    }
}

fn main() -> anyhow::Result<()> {
    let cli = match parse_args() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!("Use --help for usage information");
            std::process::exit(1);
        }
    };

    init_logging();
    info!("nvbridge starting...");

    // Load configuration and fold in command line overrides
    let mut config = match &cli.config_path {
        Some(path) => Config::load_from(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => Config::load(),
    };
    if let Some(path) = cli.editor_path {
        config.editor.path = path;
    }
    if let Some((family, size)) = cli.font {
        config.font.family = family;
        if let Some(size) = size {
            config.font.size = size;
        }
    }

    info!("Editor: {}", config.editor.path);
    info!("Font: {} {}px", config.font.family, config.font.size);
    if let Some(grid) = config.fixed_grid() {
        info!("Fixed grid: {}x{}", grid.cols, grid.rows);
    }

    // Spawn and attach; both failures are fatal
    let mut adapter = UiAdapter::start(&config, cli.files, Box::new(NullPluginHost))
        .context("failed to start the editor session")?;

    // The headless driver just logs what a renderer would consume
    adapter.subscribe_actions(|action| debug!(?action, "ui action"));
    adapter.subscribe_modes(|mode| info!(mode, "mode changed"));

    match adapter.set_font(&config.font.family, config.font.size) {
        Ok(metrics) => info!(
            "Cell metrics: {:.1}x{:.1}px",
            metrics.width, metrics.height
        ),
        Err(err) => warn!("font measurement failed, keeping attach grid: {err}"),
    }
    adapter.set_viewport(HEADLESS_VIEWPORT.0, HEADLESS_VIEWPORT.1);

    if let Some(grid) = adapter.grid() {
        info!("Grid: {}x{}", grid.cols, grid.rows);
    }

    for command in &cli.commands {
        if let Err(err) = adapter.command(command) {
            warn!("command `{}` failed: {}", command, err);
        }
    }

    // Pump until the editor goes away
    while adapter.pump_wait(Duration::from_millis(100)) {}

    info!("Session ended in state {:?}", adapter.state());
    adapter.shutdown();
    Ok(())
}
