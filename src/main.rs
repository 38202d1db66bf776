//! CLI entry point for `mailfs`.

use std::path::PathBuf;
use std::sync::{mpsc, Arc};
use std::time::Duration;

use anyhow::Context;
use clap::{CommandFactory, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};

use mailfs::config::{Config, Overrides};
use mailfs::fetch::ImapSource;
use mailfs::index::snapshot::{MailboxIndex, SnapshotHolder};
use mailfs::index::tree::{InodeNode, InodeTree};
use mailfs::refresh::{RefreshStats, Refresher};
use mailfs::vfs::{fuse, VfsOperations};

#[derive(Parser)]
#[command(
    name = "mailfs",
    version,
    about = "Mount an IMAP mailbox as a read-only filesystem",
    long_about = "Mount an IMAP mailbox as a read-only filesystem.\n\n\
                  Messages appear twice: under sender/<address>/ and under \
                  timeline/<year>/<month>/<day>/. The mailbox is re-fetched \
                  periodically and the tree replaced atomically."
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Configuration file (default: ~/.config/mailfs/config.toml)
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// IMAP server host
    #[arg(long, env = "IMAP_HOST", global = true)]
    host: Option<String>,

    /// IMAP user name
    #[arg(long, env = "IMAP_USER", global = true)]
    user: Option<String>,

    /// IMAP password
    #[arg(long, env = "IMAP_PASS", hide_env_values = true, global = true)]
    password: Option<String>,

    /// Fetch only the first N messages
    #[arg(long, env = "MSG_LIMIT", value_name = "N", global = true)]
    limit: Option<u32>,

    /// Seconds between refreshes
    #[arg(long, env = "REFRESH_INTERVAL", value_name = "SECS", global = true)]
    refresh_interval: Option<u64>,
}

#[derive(Subcommand)]
enum Commands {
    /// Mount the mailbox (the default command)
    Mount {
        /// Directory to mount on (default: from config, else /mnt)
        mountpoint: Option<PathBuf>,
    },
    /// Fetch once and print the directory tree
    Tree {
        #[arg(long)]
        json: bool,
    },
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
    /// Generate a man page
    Manpage,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logging depends on the config, so a bad file is reported after setup.
    let (mut config, config_error) = match mailfs::config::read_config(cli.config.as_deref()) {
        Ok(config) => (config, None),
        Err(e) => (Config::default(), Some(e)),
    };

    let log_level = match cli.verbose {
        0 => config.general.log_level.clone(),
        1 => "info".to_string(),
        2 => "debug".to_string(),
        _ => "trace".to_string(),
    };
    setup_logging(&log_level, &config);

    let config_path = mailfs::config::config_file_path(cli.config.as_deref());
    match config_error {
        Some(e) => tracing::warn!(error = %e, "Failed to load config, using defaults"),
        None => tracing::debug!(path = ?config_path, "Using configuration"),
    }

    let mountpoint = match &cli.command {
        Some(Commands::Mount { mountpoint }) => mountpoint.clone(),
        _ => None,
    };
    config.apply(Overrides {
        host: cli.host,
        user: cli.user,
        password: cli.password,
        message_limit: cli.limit,
        refresh_interval_secs: cli.refresh_interval,
        mountpoint,
    });

    match cli.command {
        Some(Commands::Mount { .. }) | None => cmd_mount(&config),
        Some(Commands::Tree { json }) => cmd_tree(&config, json),
        Some(Commands::Completions { shell }) => cmd_completions(shell),
        Some(Commands::Manpage) => cmd_manpage(),
    }
}

/// Set up tracing with stderr output and optional file logging.
fn setup_logging(level: &str, config: &Config) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    let log_dir = mailfs::config::cache_dir(config);
    if std::fs::create_dir_all(&log_dir).is_ok() {
        let file_appender =
            tracing_appender::rolling::never(&log_dir, mailfs::config::LOG_FILE_NAME);
        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(file_appender);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .with(file_layer)
            .init();
        tracing::debug!(
            path = %mailfs::config::log_file_path(config).display(),
            "Logging to file"
        );
    } else {
        // Fall back to stderr only
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .init();
    }
}

/// Run the first refresh under a spinner. Failure here is fatal.
fn initial_refresh(refresher: &Refresher, host: &str) -> anyhow::Result<RefreshStats> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
    pb.set_message(format!("Fetching mailbox from {host}"));
    pb.enable_steady_tick(Duration::from_millis(100));

    let stats = refresher.refresh();
    pb.finish_and_clear();
    stats.with_context(|| format!("Initial fetch from {host} failed"))
}

/// Fetch, mount, refresh periodically, and unmount on SIGINT/SIGTERM.
fn cmd_mount(config: &Config) -> anyhow::Result<()> {
    config.validate()?;
    let mountpoint = config.mount.mountpoint.clone();

    tracing::info!(
        host = %config.imap.host,
        mailbox = %config.imap.mailbox,
        mountpoint = %mountpoint.display(),
        "Starting mailfs"
    );

    let holder = Arc::new(SnapshotHolder::new());
    let refresher = Refresher::new(
        Box::new(ImapSource::new(config.imap.clone())),
        Arc::clone(&holder),
    );
    let stats = initial_refresh(&refresher, &config.imap.host)?;

    let session = fuse::mount(VfsOperations::new(holder), &mountpoint, &config.mount)
        .with_context(|| format!("Cannot mount on {}", mountpoint.display()))?;

    let (signal_tx, signal_rx) = mpsc::channel();
    ctrlc::set_handler(move || {
        let _ = signal_tx.send(());
    })
    .context("Cannot install signal handler")?;

    let (stop_tx, stop_rx) = mpsc::channel::<()>();
    let interval = config.mount.refresh_interval();
    std::thread::Builder::new()
        .name("refresh".to_string())
        .spawn(move || refresher.run_periodic(interval, stop_rx))
        .context("Cannot start refresh thread")?;

    println!(
        "  Mounted {} message(s) on {} (refresh every {}s). Press Ctrl-C to unmount.",
        stats.indexed,
        mountpoint.display(),
        interval.as_secs()
    );

    // Either a signal or a dropped handler ends the wait.
    let _ = signal_rx.recv();
    tracing::info!("Shutting down");

    // The refresh thread may be blocked in a fetch; it is not joined.
    drop(stop_tx);
    drop(session);
    tracing::info!(mountpoint = %mountpoint.display(), "Unmounted");
    Ok(())
}

/// Fetch once and print the tree that would be mounted.
fn cmd_tree(config: &Config, json: bool) -> anyhow::Result<()> {
    config.validate()?;
    let holder = Arc::new(SnapshotHolder::new());
    let refresher = Refresher::new(
        Box::new(ImapSource::new(config.imap.clone())),
        Arc::clone(&holder),
    );
    let stats = initial_refresh(&refresher, &config.imap.host)?;
    let snapshot = holder.load();

    if json {
        print_tree_json(&snapshot, &stats)?;
    } else {
        print_tree_text(&snapshot, &stats);
    }
    Ok(())
}

/// Print the tree as indented text with file sizes.
fn print_tree_text(snapshot: &MailboxIndex, stats: &RefreshStats) {
    fn walk(tree: &InodeTree, node: &InodeNode, depth: usize) {
        use humansize::{format_size, BINARY};

        for child in node.children().unwrap_or_default() {
            let Some(child) = tree.get(*child) else {
                continue;
            };
            let indent = "  ".repeat(depth + 1);
            match child.meta() {
                Some(meta) => println!(
                    "{indent}{:<60} {:>10}",
                    child.name,
                    format_size(meta.size(), BINARY)
                ),
                None => {
                    println!("{indent}{}/", child.name);
                    walk(tree, child, depth + 1);
                }
            }
        }
    }

    println!();
    println!("  /");
    walk(&snapshot.tree, snapshot.tree.root(), 0);
    println!();
    println!(
        "  {} message(s) indexed, {} skipped, {} inodes",
        stats.indexed, stats.skipped, stats.inodes
    );
    println!();
}

/// Print the tree as nested JSON.
fn print_tree_json(snapshot: &MailboxIndex, stats: &RefreshStats) -> anyhow::Result<()> {
    fn node_json(tree: &InodeTree, node: &InodeNode) -> serde_json::Value {
        match node.meta() {
            Some(meta) => serde_json::json!({
                "name": node.name,
                "inode": node.id,
                "type": "file",
                "uid": meta.uid,
                "size": meta.size(),
                "timestamp": meta.timestamp,
            }),
            None => {
                let children: Vec<serde_json::Value> = node
                    .children()
                    .unwrap_or_default()
                    .iter()
                    .filter_map(|id| tree.get(*id))
                    .map(|child| node_json(tree, child))
                    .collect();
                serde_json::json!({
                    "name": node.name,
                    "inode": node.id,
                    "type": "directory",
                    "children": children,
                })
            }
        }
    }

    let output = serde_json::json!({
        "stats": stats,
        "root": node_json(&snapshot.tree, snapshot.tree.root()),
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

/// Generate shell completions and print to stdout.
fn cmd_completions(shell: clap_complete::Shell) -> anyhow::Result<()> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "mailfs", &mut std::io::stdout());
    Ok(())
}

/// Generate a man page and print to stdout.
fn cmd_manpage() -> anyhow::Result<()> {
    let cmd = Cli::command();
    let man = clap_mangen::Man::new(cmd);
    let mut buf = Vec::new();
    man.render(&mut buf)?;
    std::io::Write::write_all(&mut std::io::stdout(), &buf)?;
    Ok(())
}
