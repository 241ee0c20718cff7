use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use console::Emoji;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use tokio_util::sync::CancellationToken;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use podkeep::config::STORAGE_ROOT_ENV;
use podkeep::{
    DownloadStatus, Episode, HttpMediaTransfer, JsonPodcastRepository, ManagerError,
    NoopReporter, Podcast, PodcastManager, ProgressEvent, ProgressReporter, ReqwestClient,
    RssFeedSource, SharedProgressReporter, StorageSettings, default_storage_root,
};

// Emoji with fallback for terminals without Unicode support
static MICROPHONE: Emoji<'_, '_> = Emoji("🎙️  ", "");
static HEADPHONES: Emoji<'_, '_> = Emoji("🎧 ", "[i] ");
static DOWNLOAD: Emoji<'_, '_> = Emoji("📥 ", "[v] ");
static SUCCESS: Emoji<'_, '_> = Emoji("✅ ", "[+] ");
static FAILURE: Emoji<'_, '_> = Emoji("❌ ", "[!] ");
static PARTY: Emoji<'_, '_> = Emoji("🎉 ", "[*] ");
static FOLDER: Emoji<'_, '_> = Emoji("📁 ", "");
static CROSS: Emoji<'_, '_> = Emoji("✗ ", "x ");

type Manager = PodcastManager<
    RssFeedSource<ReqwestClient>,
    HttpMediaTransfer<ReqwestClient>,
    JsonPodcastRepository,
>;

/// Keep track of podcast subscriptions and downloaded episodes
#[derive(Parser, Debug)]
#[command(name = "podkeep")]
#[command(about = "Keep track of podcast subscriptions and downloaded episodes")]
#[command(version)]
struct Cli {
    /// Storage root for the podcast store and downloaded media
    #[arg(long, global = true, env = STORAGE_ROOT_ENV)]
    root: Option<PathBuf>,

    /// Quiet mode - suppress progress output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Subscribe to a podcast feed (URL or local RSS file)
    Subscribe { feed: String },

    /// Re-fetch the feed of one or all podcasts
    Refresh {
        /// Podcast id
        #[arg(required_unless_present = "all", conflicts_with = "all")]
        id: Option<String>,

        /// Refresh every subscribed podcast
        #[arg(long)]
        all: bool,
    },

    /// List subscribed podcasts
    List,

    /// List the episodes of a podcast
    Episodes { id: String },

    /// Download a single episode
    Download {
        podcast_id: String,
        episode_id: String,
    },

    /// Download every episode that is not downloaded yet
    DownloadAll {
        id: String,

        /// Number of episodes grouped per batch
        #[arg(short, long, default_value = "5")]
        chunk_size: usize,
    },

    /// Unsubscribe from a podcast (downloaded files are kept)
    Remove { id: String },
}

impl Cli {
    fn log_level(&self) -> &str {
        match self.verbose {
            0 if self.quiet => "error",
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }
}

fn init_logging(cli: &Cli) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(cli.log_level()))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Progress reporter using indicatif for terminal output
struct IndicatifReporter {
    multi: MultiProgress,
    bars: Mutex<HashMap<String, ProgressBar>>,
    main_bar: ProgressBar,
}

impl IndicatifReporter {
    fn new() -> Self {
        let multi = MultiProgress::new();

        let main_style = ProgressStyle::default_bar()
            .template("{spinner:.green} {wide_msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());

        let main_bar = multi.add(ProgressBar::new_spinner());
        main_bar.set_style(main_style);
        main_bar.enable_steady_tick(std::time::Duration::from_millis(100));

        Self {
            multi,
            bars: Mutex::new(HashMap::new()),
            main_bar,
        }
    }

    fn bars(&self) -> MutexGuard<'_, HashMap<String, ProgressBar>> {
        self.bars.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn get_or_create_bar(&self, episode_id: &str) -> ProgressBar {
        let mut bars = self.bars();

        if let Some(bar) = bars.get(episode_id) {
            return bar.clone();
        }

        let style = ProgressStyle::default_bar()
            .template(&format!(
                "  {DOWNLOAD}[{{bar:30.cyan/blue}}] {{bytes}}/{{total_bytes}} {{wide_msg}}"
            ))
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▓░");

        let bar = self.multi.add(ProgressBar::new(0));
        bar.set_style(style);
        bars.insert(episode_id.to_string(), bar.clone());
        bar
    }

    fn finish_bar(&self, episode_id: &str) {
        if let Some(bar) = self.bars().remove(episode_id) {
            bar.finish_and_clear();
        }
    }

    fn finish(&self) {
        self.main_bar.finish_and_clear();
    }
}

impl ProgressReporter for IndicatifReporter {
    fn report(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::DownloadStarting {
                episode_id,
                episode_title,
                content_length,
            } => {
                let bar = self.get_or_create_bar(&episode_id);
                bar.set_length(content_length.unwrap_or(0));
                bar.set_position(0);
                bar.set_message(truncate_title(&episode_title, 40));
            }

            ProgressEvent::DownloadProgress {
                episode_id,
                bytes_downloaded,
                total_bytes,
            } => {
                let bar = self.get_or_create_bar(&episode_id);
                if let Some(total) = total_bytes {
                    bar.set_length(total);
                }
                bar.set_position(bytes_downloaded);
            }

            ProgressEvent::Finalizing { episode_id } => {
                self.get_or_create_bar(&episode_id)
                    .set_message("Finalizing...".dimmed().to_string());
            }

            ProgressEvent::DownloadCompleted {
                episode_id,
                episode_title,
                bytes_downloaded,
            } => {
                let bar = self.get_or_create_bar(&episode_id);
                bar.set_position(bytes_downloaded);
                self.finish_bar(&episode_id);
                self.multi
                    .println(format!(
                        "  {SUCCESS}{}",
                        truncate_title(&episode_title, 60).green()
                    ))
                    .ok();
            }

            ProgressEvent::DownloadFailed {
                episode_id,
                episode_title,
                error,
            } => {
                let bar = self.get_or_create_bar(&episode_id);
                bar.abandon_with_message(format!(
                    "{FAILURE}{} - {}",
                    truncate_title(&episode_title, 30).red(),
                    error.red()
                ));
                self.bars().remove(&episode_id);
            }

            ProgressEvent::BatchProgress {
                completed,
                total,
                fraction,
            } => {
                self.main_bar.set_message(format!(
                    "{HEADPHONES}{}/{} episodes ({:.0}%)",
                    completed.to_string().cyan(),
                    total.to_string().cyan(),
                    fraction * 100.0
                ));
            }
        }
    }
}

fn truncate_title(title: &str, max_len: usize) -> String {
    if title.chars().count() <= max_len {
        title.to_string()
    } else {
        let truncated: String = title.chars().take(max_len.saturating_sub(3)).collect();
        format!("{truncated}...")
    }
}

fn status_marker(status: DownloadStatus) -> colored::ColoredString {
    match status {
        DownloadStatus::NotStarted => "·".dimmed(),
        DownloadStatus::InProgress => "…".yellow(),
        DownloadStatus::Completed => "✓".green(),
        DownloadStatus::Failed => "✗".red(),
    }
}

fn print_podcast(podcast: &Podcast) {
    println!(
        "{HEADPHONES}{} {}",
        podcast.title.bold().green(),
        format!("[{}]", podcast.id()).dimmed()
    );
    println!(
        "   {} episodes, {} downloaded, updated {}",
        podcast.episodes().len().to_string().cyan(),
        podcast
            .count_with_status(DownloadStatus::Completed)
            .to_string()
            .green(),
        podcast.last_updated.format("%Y-%m-%d %H:%M")
    );
}

fn print_episode(episode: &Episode) {
    let date = episode
        .published_at
        .map(|dt| dt.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "undated".to_string());
    println!(
        "  {} {} {} {}",
        status_marker(episode.download_status()),
        date.dimmed(),
        truncate_title(&episode.title, 60),
        format!("[{}]", episode.id()).dimmed()
    );
}

fn make_reporter(quiet: bool) -> (SharedProgressReporter, Option<Arc<IndicatifReporter>>) {
    if quiet {
        (NoopReporter::shared(), None)
    } else {
        let reporter = Arc::new(IndicatifReporter::new());
        (reporter.clone(), Some(reporter))
    }
}

/// Cancel the token on the first Ctrl-C
fn cancel_on_ctrl_c(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\n{}", "Cancelling...".yellow());
            cancel.cancel();
        }
    });
}

async fn run(cli: &Cli, manager: &Manager, cancel: &CancellationToken) -> Result<()> {
    match &cli.command {
        Command::Subscribe { feed } => {
            let podcast = manager
                .subscribe(feed, cancel)
                .await
                .with_context(|| format!("Failed to subscribe to {feed}"))?;
            print_podcast(&podcast);
        }

        Command::Refresh { id, all } => {
            let ids: Vec<String> = if *all {
                manager
                    .list()
                    .await?
                    .iter()
                    .map(|p| p.id().to_string())
                    .collect()
            } else {
                id.iter().cloned().collect()
            };

            let mut failed = 0;
            for id in &ids {
                match manager.refresh(id, cancel).await {
                    Ok(podcast) => print_podcast(&podcast),
                    Err(e) if e.is_cancelled() || !*all => {
                        return Err(e).with_context(|| format!("Failed to refresh {id}"));
                    }
                    Err(e) => {
                        failed += 1;
                        println!("  {CROSS}{} - {}", id.yellow(), e.to_string().dimmed());
                    }
                }
            }
            if failed > 0 {
                anyhow::bail!("{failed} of {} podcasts failed to refresh", ids.len());
            }
        }

        Command::List => {
            let podcasts = manager.list().await?;
            if podcasts.is_empty() {
                println!("{}", "No subscriptions yet".dimmed());
            }
            for podcast in &podcasts {
                print_podcast(podcast);
            }
        }

        Command::Episodes { id } => {
            let podcast = manager.get(id).await?;
            print_podcast(&podcast);
            for episode in podcast.episodes() {
                print_episode(episode);
            }
        }

        Command::Download {
            podcast_id,
            episode_id,
        } => {
            let (reporter, bars) = make_reporter(cli.quiet);
            let result = manager
                .download_episode(podcast_id, episode_id, &reporter, cancel)
                .await;
            if let Some(bars) = bars {
                bars.finish();
            }

            let episode = result.context("Download failed")?;
            if let Some(path) = episode.local_file_path() {
                println!("{FOLDER}{}", path.display().to_string().cyan());
            }
        }

        Command::DownloadAll { id, chunk_size } => {
            let (reporter, bars) = make_reporter(cli.quiet);
            let result = manager
                .download_all_episodes(id, *chunk_size, &reporter, cancel)
                .await;
            if let Some(bars) = bars {
                bars.finish();
            }

            let summary = result.context("Download failed")?;
            println!(
                "\n{PARTY}{} {} downloaded, {} already present",
                "Done:".bold().green(),
                summary.downloaded.to_string().green().bold(),
                summary.skipped.to_string().yellow()
            );
        }

        Command::Remove { id } => {
            manager.remove(id).await?;
            println!("{SUCCESS}Removed {}", id.cyan());
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli);

    let root = cli.root.clone().unwrap_or_else(default_storage_root);
    if !cli.quiet {
        println!(
            "\n{}{} {}\n",
            MICROPHONE,
            "podkeep".bold().magenta(),
            format!("- {}", root.display()).dimmed()
        );
    }

    let settings = StorageSettings::shared(root);
    let client = ReqwestClient::new();
    let manager = PodcastManager::new(
        RssFeedSource::new(client.clone()),
        HttpMediaTransfer::new(client),
        JsonPodcastRepository::new(settings.clone()),
        settings,
    );

    let recovered = manager
        .recover_interrupted()
        .await
        .context("Failed to load podcast store")?;
    if recovered > 0 {
        warn!(recovered, "Reset interrupted downloads");
    }

    let cancel = CancellationToken::new();
    cancel_on_ctrl_c(cancel.clone());

    match run(&cli, &manager, &cancel).await {
        Err(e)
            if e.downcast_ref::<ManagerError>()
                .is_some_and(ManagerError::is_cancelled) =>
        {
            eprintln!("{FAILURE}{}", "Cancelled".red());
            std::process::exit(130);
        }
        result => result,
    }
}
