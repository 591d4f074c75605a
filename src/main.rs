use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use r4fs::{
    app::App,
    catalog::SupabaseCatalog,
    config::Config,
    download::queue,
    fuse,
};
use tokio::runtime::Runtime;

#[derive(Parser)]
#[command(name = "r4fs")]
#[command(version, about = "Radio4000 as a read-only FUSE filesystem", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Mount the filesystem and start the download worker
    Mount {
        /// Mount point (overrides settings and R4_MOUNT_POINT)
        #[arg(long)]
        mount_point: Option<PathBuf>,

        /// Download root (overrides settings and R4_DOWNLOAD_DIR)
        #[arg(long)]
        download_dir: Option<PathBuf>,
    },
    /// Stop downloads and unmount
    Unmount,
    /// Report mount state and configured paths
    Status,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut config = Config::load()?;

    let default_filter = if config.settings.mount.debug {
        "r4fs=debug,info"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .with_target(true)
        .init();

    match cli.command {
        Commands::Mount {
            mount_point,
            download_dir,
        } => {
            if let Some(mount_point) = mount_point {
                config.mount_point = mount_point;
            }
            if let Some(download_dir) = download_dir {
                config.download_root = download_dir;
            }
            run_mount(config)
        }
        Commands::Unmount => run_unmount(config),
        Commands::Status => run_status(config),
    }
}

fn run_mount(config: Config) -> anyhow::Result<()> {
    config.ensure_layout()?;
    let (api_url, api_key) = {
        let (url, key) = config.credentials()?;
        (url.to_string(), key.to_string())
    };
    let catalog = Arc::new(SupabaseCatalog::new(&api_url, &api_key)?);
    let app = App::new(config, catalog, &api_url);

    let rt = Runtime::new()?;
    app.enqueue_download_list()?;
    rt.spawn(queue::run_worker(app.clone()));

    tracing::info!(
        mount_point = %app.config.mount_point.display(),
        download_root = %app.config.download_root.display(),
        "mounting radio4000"
    );
    // Blocks until the filesystem is unmounted.
    fuse::mount(app.clone(), rt.handle().clone())?;

    rt.block_on(app.stop_downloads());
    tracing::info!("unmounted");
    Ok(())
}

fn run_unmount(config: Config) -> anyhow::Result<()> {
    let mount_point = &config.mount_point;
    tracing::info!(mount_point = %mount_point.display(), "unmounting");
    let fusermount = std::process::Command::new("fusermount")
        .arg("-u")
        .arg(mount_point)
        .status();
    match fusermount {
        Ok(status) if status.success() => return Ok(()),
        Ok(status) => tracing::debug!(%status, "fusermount failed, trying umount"),
        Err(e) => tracing::debug!(error = %e, "fusermount unavailable, trying umount"),
    }
    let status = std::process::Command::new("umount").arg(mount_point).status()?;
    anyhow::ensure!(status.success(), "umount {} failed", mount_point.display());
    Ok(())
}

fn run_status(config: Config) -> anyhow::Result<()> {
    let mounted = is_mounted(&config.mount_point);
    println!(
        "mounted:       {}",
        if mounted { "yes" } else { "no" }
    );
    println!("mount point:   {}", config.mount_point.display());
    println!("download root: {}", config.download_root.display());
    println!("settings:      {}", config.settings_file.display());
    Ok(())
}

fn is_mounted(mount_point: &std::path::Path) -> bool {
    let Ok(mounts) = std::fs::read_to_string("/proc/mounts") else {
        return false;
    };
    let needle = mount_point.to_string_lossy();
    mounts
        .lines()
        .filter_map(|line| line.split_whitespace().nth(1))
        .any(|mounted| mounted == needle)
}
