use anyhow::Result;
use clap::{Parser, Subcommand};
use sqfssync::{RepositoryConfig, SyncOrchestrator};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "sqfssync")]
#[command(about = "Download, verify and mount the latest SquashFS repository snapshot", long_about = None)]
#[command(version)]
struct Args {
    /// Repository mount location
    #[arg(short, long)]
    location: PathBuf,

    /// Base URL for snapshot downloads
    #[arg(short, long)]
    sync_uri: String,

    /// Remote image file name (strftime date fields are substituted)
    #[arg(long, default_value = sqfssync::config::DEFAULT_IMAGE_FILE)]
    file: String,

    /// Skip digest verification
    #[arg(long)]
    no_verify: bool,

    /// Digest-list resource name
    #[arg(long, default_value = sqfssync::config::DEFAULT_DIGEST_FILE)]
    digest_file: String,

    /// Verifying key for signed digest lists (hex-encoded ed25519)
    #[arg(long)]
    key: Option<PathBuf>,

    /// uid mount option
    #[arg(long, default_value = "portage")]
    uid: String,

    /// gid mount option
    #[arg(long, default_value = "portage")]
    gid: String,

    /// mode mount option
    #[arg(long, default_value = "0555")]
    mode: String,

    /// Extra mount options, appended verbatim
    #[arg(long)]
    mount_opts: Option<String>,

    /// Scratch directory for downloads
    #[arg(long)]
    tmpdir: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch the latest snapshot and remount it
    Update,
    /// Create the repository location if needed, then update
    New,
    /// Report whether the repository location exists
    Exists,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize tracing
    let log_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(format!("sqfssync={}", log_level))
        .init();

    let config = RepositoryConfig {
        location: args.location,
        sync_uri: args.sync_uri,
        image_file: args.file,
        verify: !args.no_verify,
        digest_file: args.digest_file,
        key_path: args.key,
        uid: args.uid,
        gid: args.gid,
        mode: args.mode,
        extra_mount_opts: args.mount_opts,
        temp_dir: args.tmpdir,
    };
    let sync = SyncOrchestrator::new(config);

    let outcome = match args.command {
        Command::Exists => {
            println!("{}", sync.exists());
            return Ok(());
        }
        Command::Update => sync.update().await,
        Command::New => sync.bootstrap().await,
    };

    if outcome.success {
        info!("✅ Snapshot sync completed successfully");
        Ok(())
    } else {
        std::process::exit(i32::from(outcome.code));
    }
}
