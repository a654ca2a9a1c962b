//! Launch surface: parses host/port/mountpoint from the command line,
//! installs structured logging, optionally daemonizes, then hands a
//! [`webhdfs_fuse::adapter::RemoteFs`] to `fuser::mount2`.

use std::path::PathBuf;

use clap::Parser;
use daemonize::Daemonize;
use fuser::MountOption;

use webhdfs_fuse::adapter::RemoteFs;
use webhdfs_fuse::config::{Config, FileConfig, DEFAULT_PORT};

#[derive(Parser, Debug)]
#[command(name = "webhdfs-fuse", about = "Mount a WebHDFS-compatible namespace over FUSE")]
struct Cli {
    /// Namenode host.
    #[arg(long)]
    host: String,

    /// Namenode HTTP port.
    #[arg(long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Local directory to mount onto.
    mountpoint: PathBuf,

    /// Run in the foreground instead of daemonizing.
    #[arg(long)]
    foreground: bool,

    /// Verbose logging.
    #[arg(long)]
    debug: bool,

    /// Optional config.toml for kernel cache TTL / scratch dir tuning.
    #[arg(long)]
    config: Option<PathBuf>,
}

fn init_tracing(debug: bool) {
    let filter = if debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(filter))
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    let file = cli
        .config
        .as_deref()
        .map(FileConfig::load)
        .unwrap_or_default();

    let config = Config {
        host: cli.host,
        port: cli.port,
        mountpoint: cli.mountpoint.clone(),
        debug: cli.debug,
        foreground: cli.foreground,
        file,
    };

    if !config.foreground {
        if let Err(e) = Daemonize::new().start() {
            tracing::error!(error = %e, "failed to daemonize");
            std::process::exit(1);
        }
    }

    let fs = match RemoteFs::new(config.clone()) {
        Ok(fs) => fs,
        Err(e) => {
            tracing::error!(error = %e, "failed to initialize filesystem");
            std::process::exit(1);
        }
    };

    let options = [
        MountOption::FSName("webhdfs".to_string()),
        MountOption::AutoUnmount,
    ];

    tracing::info!(host = %config.host, port = config.port, mountpoint = ?config.mountpoint, "mounting");

    match fuser::mount2(fs, &config.mountpoint, &options) {
        Ok(()) => std::process::exit(0),
        Err(e) => {
            tracing::error!(error = %e, "mount failed");
            std::process::exit(1);
        }
    }
}
