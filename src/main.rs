use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use secrecy::SecretString;
use std::future::Future;
use std::io::Write;
use std::path::PathBuf;
use tokio::sync::broadcast::error::RecvError;

use presswire::config::Config;
use presswire::pipeline::{BatchSummary, ItemOutcome, Pipeline, PipelineError, PipelineEvent};
use presswire::publish::PostStatus;
use presswire::rewrite::{Style, Tone};
use presswire::storage::{ContentItem, Credentials, Database, DatabaseError};
use presswire::util::{collapse_whitespace, display_width, strip_control_chars, truncate_to_width};

const TITLE_COLUMN_WIDTH: usize = 56;

/// Get the default config directory path (~/.config/presswire/)
fn default_config_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(".config").join("presswire"))
}

#[derive(Parser, Debug)]
#[command(
    name = "presswire",
    version,
    about = "Fetch posts, rewrite them with a language model, publish them to WordPress"
)]
struct Args {
    /// Directory holding config.toml and the state database
    #[arg(long, value_name = "DIR", global = true)]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Add content to the library
    Fetch {
        #[command(subcommand)]
        source: FetchSource,
    },
    /// Show the library
    List,
    /// Show one item's original and rewritten body
    Show { id: String },
    /// Flip selection on items
    Toggle {
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Select every item
    SelectAll,
    /// Deselect every item
    DeselectAll,
    /// Remove items from the library
    Delete {
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Test WordPress credentials and save them if they work
    Connect {
        #[arg(long)]
        site_url: String,
        #[arg(long)]
        username: String,
        /// Application password (prompted for when omitted)
        #[arg(long)]
        password: Option<String>,
    },
    /// Save or clear the language model API key
    ApiKey {
        #[arg(required_unless_present = "clear")]
        key: Option<String>,
        #[arg(long, conflicts_with = "key")]
        clear: bool,
    },
    /// Rewrite every selected item
    Rewrite {
        #[arg(long, value_enum)]
        tone: Option<Tone>,
        #[arg(long, value_enum)]
        style: Option<Style>,
        /// Skip the SEO instruction
        #[arg(long)]
        no_seo: bool,
        /// Key for this run only (falls back to OPENAI_API_KEY, then the saved key)
        #[arg(long)]
        api_key: Option<String>,
    },
    /// Publish every selected, rewritten item
    Publish {
        #[arg(long, value_enum)]
        status: Option<PostStatus>,
    },
    /// Show posts created by `publish`
    History {
        /// Forget every recorded post
        #[arg(long)]
        clear: bool,
    },
}

#[derive(Subcommand, Debug)]
enum FetchSource {
    /// Scrape one or more pages
    Url {
        #[arg(required = true)]
        urls: Vec<String>,
    },
    /// Import every entry of an RSS or Atom feed
    Rss { feed_url: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config_dir = match args.config_dir {
        Some(dir) => dir,
        None => default_config_dir()?,
    };
    prepare_config_dir(&config_dir)?;

    let config = Config::load(&config_dir.join("config.toml")).context("Failed to load config")?;

    let db_path = config_dir.join("presswire.db");
    let db_path_str = db_path
        .to_str()
        .ok_or_else(|| anyhow::anyhow!("Invalid UTF-8 in database path"))?;
    let db = match Database::open(db_path_str).await {
        Ok(db) => db,
        Err(DatabaseError::InstanceLocked) => {
            eprintln!("Error: Another presswire process appears to be running. Please close it and try again.");
            std::process::exit(1);
        }
        Err(e) => return Err(anyhow::anyhow!("Failed to open database: {}", e)),
    };

    let pipeline = Pipeline::new(db, config)?;
    run(&pipeline, args.command).await
}

fn prepare_config_dir(config_dir: &std::path::Path) -> Result<()> {
    if !config_dir.exists() {
        std::fs::create_dir_all(config_dir).context("Failed to create config directory")?;
        eprintln!("Created config directory: {}", config_dir.display());
    }

    // Credentials and the API key live here: user-only access.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        match std::fs::metadata(config_dir) {
            Ok(metadata) => {
                let mut perms = metadata.permissions();
                perms.set_mode(0o700);
                if let Err(e) = std::fs::set_permissions(config_dir, perms) {
                    tracing::warn!(
                        path = %config_dir.display(),
                        error = %e,
                        "Failed to set config directory permissions to 0700"
                    );
                }
            }
            Err(e) => {
                tracing::warn!(
                    path = %config_dir.display(),
                    error = %e,
                    "Failed to read config directory metadata"
                );
            }
        }
    }

    Ok(())
}

async fn run(pipeline: &Pipeline, command: Command) -> Result<()> {
    let library = pipeline.library();

    match command {
        Command::Fetch {
            source: FetchSource::Url { urls },
        } => {
            let summary = with_progress(pipeline, pipeline.fetch_urls(&urls)).await?;
            print_summary(&summary, "fetched");
        }
        Command::Fetch {
            source: FetchSource::Rss { feed_url },
        } => {
            let added = with_progress(pipeline, pipeline.fetch_feed(&feed_url)).await?;
            println!("Imported {} item(s) from feed", added);
        }
        Command::List => print_library(&library.list().await?),
        Command::Show { id } => {
            let item = library
                .get(&id)
                .await?
                .ok_or_else(|| anyhow::anyhow!("No item with id {}", id))?;
            print_item(&item);
        }
        Command::Toggle { ids } => {
            for id in ids {
                match library.toggle_select(&id).await? {
                    Some(true) => println!("Selected {}", id),
                    Some(false) => println!("Deselected {}", id),
                    None => eprintln!("No item with id {}", id),
                }
            }
        }
        Command::SelectAll => {
            let count = library.set_all(true).await?;
            println!("Selected {} item(s)", count);
        }
        Command::DeselectAll => {
            let count = library.set_all(false).await?;
            println!("Deselected {} item(s)", count);
        }
        Command::Delete { ids } => {
            for id in ids {
                if library.remove(&id).await? {
                    println!("Deleted {}", id);
                } else {
                    eprintln!("No item with id {}", id);
                }
            }
        }
        Command::Connect {
            site_url,
            username,
            password,
        } => {
            let password = match password {
                Some(p) => p,
                None => prompt_line("Application password: ")?,
            };
            let credentials = Credentials::new(site_url, username, password);
            if pipeline.connect(&credentials).await? {
                println!("Connected to {}. Credentials saved.", credentials.base_url());
            } else {
                anyhow::bail!(
                    "Could not connect to {}. Check the URL, username and application password.",
                    credentials.base_url()
                );
            }
        }
        Command::ApiKey { key, clear } => {
            let db = pipeline.database();
            if clear {
                if db.clear_api_key().await? {
                    println!("API key cleared");
                } else {
                    println!("No API key was saved");
                }
            } else if let Some(key) = key.filter(|k| !k.trim().is_empty()) {
                db.save_api_key(&key).await?;
                println!("API key saved");
            } else {
                anyhow::bail!("API key must not be empty");
            }
        }
        Command::Rewrite {
            tone,
            style,
            no_seo,
            api_key,
        } => {
            let mut options = pipeline.config().rewrite.options();
            if let Some(tone) = tone {
                options.tone = tone;
            }
            if let Some(style) = style {
                options.style = style;
            }
            if no_seo {
                options.seo = false;
            }
            let api_key = api_key
                .or_else(|| std::env::var("OPENAI_API_KEY").ok())
                .map(SecretString::from);

            let summary =
                with_progress(pipeline, pipeline.rewrite_selected(options, api_key)).await?;
            print_summary(&summary, "rewritten");
        }
        Command::Publish { status } => {
            let status = status.unwrap_or(pipeline.config().publish.status);
            let summary = with_progress(pipeline, pipeline.publish_selected(status)).await?;
            print_summary(&summary, "published");
        }
        Command::History { clear } => {
            let history = pipeline.history();
            if clear {
                let count = history.clear().await?;
                println!("Cleared {} record(s)", count);
            } else {
                let posts = history.list().await?;
                if posts.is_empty() {
                    println!("No posts published yet");
                }
                for post in posts {
                    println!(
                        "{}  #{:<6} {}  {}",
                        post.date.format("%Y-%m-%d %H:%M"),
                        post.post_id,
                        truncate_to_width(&strip_control_chars(&post.title), TITLE_COLUMN_WIDTH),
                        post.url
                    );
                }
            }
        }
    }

    Ok(())
}

/// Drive a batch while printing one progress line per finished item, then the
/// library counts once the library reports a change.
async fn with_progress<F, T>(pipeline: &Pipeline, batch: F) -> Result<T, PipelineError>
where
    F: Future<Output = Result<T, PipelineError>>,
{
    let mut rx = pipeline.events().subscribe();
    let library = pipeline.library().clone();
    let printer = tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(PipelineEvent::ItemFinished {
                    progress, report, ..
                }) => {
                    let title = strip_control_chars(&report.title).into_owned();
                    match report.outcome {
                        ItemOutcome::Success(message) => {
                            eprintln!("[{:>3}%] ok     {}: {}", progress, title, message)
                        }
                        ItemOutcome::Failure(message) => {
                            eprintln!("[{:>3}%] failed {}: {}", progress, title, message)
                        }
                    }
                }
                Ok(PipelineEvent::LibraryChanged) => {
                    match library.stats().await {
                        Ok(stats) => {
                            eprintln!("{} items • {} selected", stats.total, stats.selected)
                        }
                        Err(e) => tracing::warn!(error = %e, "Failed to read library"),
                    }
                    break;
                }
                Err(RecvError::Closed) => break,
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "Progress printer lagged");
                }
            }
        }
    });

    let result = batch.await;
    match &result {
        Ok(_) => {
            let _ = printer.await;
        }
        Err(_) => printer.abort(),
    }
    result
}

fn print_summary(summary: &BatchSummary, verb: &str) {
    println!(
        "{} {}, {} failed",
        summary.tally.succeeded, verb, summary.tally.failed
    );
}

fn print_library(items: &[ContentItem]) {
    let selected = items.iter().filter(|i| i.selected).count();
    println!("{} items • {} selected", items.len(), selected);
    if items.is_empty() {
        return;
    }
    println!();

    for item in items {
        let title = collapse_whitespace(&strip_control_chars(&item.title));
        let title = truncate_to_width(&title, TITLE_COLUMN_WIDTH);
        let padding = TITLE_COLUMN_WIDTH.saturating_sub(display_width(&title));
        println!(
            "[{}] {} {}{}  {}",
            if item.selected { "x" } else { " " },
            if item.reformed_text().is_some() { "R" } else { "-" },
            title,
            " ".repeat(padding),
            item.id
        );
    }
}

fn print_item(item: &ContentItem) {
    println!("{}", strip_control_chars(&item.title));
    println!("Source:   {}", item.url);
    println!("Date:     {}", item.date.format("%Y-%m-%d %H:%M"));
    println!("Selected: {}", if item.selected { "yes" } else { "no" });
    if !item.excerpt.is_empty() {
        println!("Excerpt:  {}", strip_control_chars(&item.excerpt));
    }
    println!();
    println!("Original:");
    println!("{}", strip_control_chars(&item.content));
    println!();
    match item.reformed_text() {
        Some(text) => {
            println!("Rewritten:");
            println!("{}", strip_control_chars(text));
        }
        None => println!("Not rewritten yet"),
    }
}

fn prompt_line(prompt: &str) -> Result<String> {
    eprint!("{}", prompt);
    std::io::stderr().flush()?;
    let mut line = String::new();
    std::io::stdin()
        .read_line(&mut line)
        .context("Failed to read from stdin")?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}
