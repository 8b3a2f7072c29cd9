use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use secrecy::SecretString;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use skimly::config::{Config, ACCESS_TOKEN_ENV};
use skimly::content::check_embeddable;
use skimly::feedly::{build_http_client, FeedlyClient, FeedlyError};
use skimly::model::{ArticleCount, SortOrder, ALL_FEEDS_ID};
use skimly::reader::{ReaderSession, ReaderView, SkipReason, SyncOutcome};
use skimly::util::{format_age, terminal_line, validate_url_for_open};

/// Widest line printed for remote text.
const LINE_WIDTH: usize = 100;

type Session = ReaderSession<Arc<FeedlyClient>>;

/// Get the config directory path (~/.config/skimly/)
fn get_config_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(".config").join("skimly"))
}

#[derive(Parser, Debug)]
#[command(name = "skimly", about = "Terminal Feedly reader with batched mark-as-read sync")]
struct Args {
    /// Config file (defaults to ~/.config/skimly/config.toml)
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List subscriptions grouped by category, with unread counts
    Feeds,

    /// List unread entries of a feed (all feeds when --feed is omitted)
    Entries {
        #[arg(long)]
        feed: Option<String>,
        /// Entries to fetch: 10, 25, 50 or 100
        #[arg(long)]
        count: Option<u32>,
        /// newest or oldest
        #[arg(long)]
        sort: Option<String>,
    },

    /// Show one unread entry and whether its page can be embedded
    Show {
        entry_id: String,
        #[arg(long)]
        feed: Option<String>,
        /// Open the article in the system browser
        #[arg(long)]
        open: bool,
    },

    /// Mark the given entries read and sync them in one batch
    Read {
        #[arg(required = true)]
        entry_ids: Vec<String>,
        #[arg(long)]
        feed: Option<String>,
    },

    /// Mark every listed unread entry read and sync them in one batch
    ReadAll {
        #[arg(long)]
        feed: Option<String>,
        #[arg(long)]
        count: Option<u32>,
    },

    /// Check whether a page allows being embedded in a frame
    EmbedCheck { url: String },
}

/// `--feed all` and a missing `--feed` both mean the aggregate view.
fn feed_arg(feed: Option<String>) -> String {
    match feed.as_deref().map(str::trim) {
        None | Some("") | Some("all") => ALL_FEEDS_ID.to_string(),
        Some(id) => id.to_string(),
    }
}

fn explain(err: FeedlyError, action: &str) -> anyhow::Error {
    if err.is_unauthorized() {
        anyhow::anyhow!(
            "{action}: Feedly rejected the access token. Set {ACCESS_TOKEN_ENV} or update access_token in your config."
        )
    } else {
        anyhow::Error::new(err).context(action.to_string())
    }
}

async fn load_entries(session: &Session, client: &FeedlyClient, feed: &str, count: ArticleCount) -> Result<()> {
    session.select_feed(feed);
    let entries = client
        .fetch_entries(feed, count)
        .await
        .map_err(|e| explain(e, "Failed to load entries"))?;
    tracing::debug!(feed = %feed, count = entries.len(), "Loaded entries");
    session.replace_entries(entries);
    Ok(())
}

fn print_entries(session: &Session, order: SortOrder) {
    session.with_view(|view| {
        let entries = view.sorted_entries(order);
        if entries.is_empty() {
            println!("No unread entries.");
            return;
        }
        for entry in entries {
            println!(
                "{}  {}",
                terminal_line(&entry.title, LINE_WIDTH),
                format_age(entry.age_timestamp)
            );
            println!("    {} | {}", terminal_line(&entry.source, 40), entry.id);
        }
    });
}

/// Why `mark_entry` left an entry the user named out of the queue.
fn unmarked_reason(view: &ReaderView, entry_id: &str) -> &'static str {
    match view.entries().iter().find(|entry| entry.id == entry_id) {
        None => "not an unread entry of this feed",
        Some(entry) if entry.resolve_feed_id(view.selected_feed_id()).is_none() => {
            "Feedly did not report its feed; retry with --feed <feed id>"
        }
        Some(_) => "already queued",
    }
}

/// Report a sync and turn a failure into a non-zero exit.
fn report_sync(session: &Session, outcome: SyncOutcome) -> Result<()> {
    match outcome {
        SyncOutcome::Committed { synced, removed } => {
            println!("Marked {synced} entries read ({removed} removed from the list).");
            Ok(())
        }
        SyncOutcome::Skipped(SkipReason::EmptyQueue) => {
            println!("Nothing to mark as read.");
            Ok(())
        }
        SyncOutcome::Skipped(SkipReason::AlreadySyncing) => {
            println!("A sync is already running.");
            Ok(())
        }
        SyncOutcome::Failed => {
            let message = session.error().unwrap_or_default();
            anyhow::bail!("{message} {} entries are still pending.", session.pending_count())
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let config_path = match args.config {
        Some(path) => path,
        None => get_config_dir()?.join("config.toml"),
    };
    let mut config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;
    config.apply_env(|key| std::env::var(key).ok());

    let http = build_http_client().context("Failed to create HTTP client")?;

    if let Command::EmbedCheck { url } = &args.command {
        let check = check_embeddable(&http, url).await?;
        println!("{}", serde_json::to_string(&check)?);
        return Ok(());
    }

    let token: SecretString = match config.access_token.take() {
        Some(token) => token,
        None => {
            eprintln!("Error: No Feedly access token configured.");
            eprintln!();
            eprintln!("Set {ACCESS_TOKEN_ENV}, or add to {}:", config_path.display());
            eprintln!("  access_token = \"<your token>\"");
            std::process::exit(1);
        }
    };

    let client = Arc::new(
        FeedlyClient::new(
            http.clone(),
            &config.base_url,
            token,
            Duration::from_secs(config.request_timeout_secs),
        )
        .context("Invalid Feedly base URL")?,
    );
    let session: Session = ReaderSession::new(Arc::clone(&client));

    match args.command {
        Command::Feeds => {
            let feeds = client
                .fetch_feeds()
                .await
                .map_err(|e| explain(e, "Failed to load feeds"))?;
            if feeds.is_empty() {
                println!("No subscriptions.");
                return Ok(());
            }
            session.replace_feeds(feeds);
            session.with_view(|view| {
                for group in view.grouped_feeds() {
                    println!("{}", terminal_line(group.name, LINE_WIDTH));
                    for feed in group.feeds {
                        println!(
                            "  {} ({})  {}",
                            terminal_line(&feed.title, 60),
                            feed.unread_count,
                            feed.id
                        );
                    }
                }
            });
        }

        Command::Entries { feed, count, sort } => {
            let count = count.map_or(config.article_count, ArticleCount::from_requested);
            let order = match sort {
                Some(raw) => raw.parse::<SortOrder>().map_err(anyhow::Error::msg)?,
                None => config.sort_order,
            };
            load_entries(&session, &client, &feed_arg(feed), count).await?;
            print_entries(&session, order);
        }

        Command::Show { entry_id, feed, open } => {
            load_entries(&session, &client, &feed_arg(feed), config.article_count).await?;
            if !session.select_entry(&entry_id) {
                anyhow::bail!("Entry {entry_id} is not among the unread entries of this feed");
            }
            let entry = session
                .with_view(|view| view.selected_entry().cloned())
                .context("No entry selected")?;

            println!("{}", terminal_line(&entry.title, LINE_WIDTH));
            println!("{} | {}", terminal_line(&entry.source, 60), format_age(entry.age_timestamp));
            println!();
            println!("{}", terminal_line(&entry.summary, 4 * LINE_WIDTH));

            let Some(url) = entry.url.as_deref() else {
                println!();
                println!("No article link available.");
                return Ok(());
            };
            println!();
            println!("{}", terminal_line(url, LINE_WIDTH));

            match check_embeddable(&http, url).await {
                Ok(check) if check.embeddable => println!("Page can be embedded."),
                Ok(check) => println!("{}", check.reason.unwrap_or_default()),
                Err(e) => tracing::debug!(error = %e, url = %url, "Skipping embed check"),
            }

            if open {
                let url = validate_url_for_open(url).context("Refusing to open article link")?;
                open::that(url.as_str()).context("Failed to open browser")?;
            }
        }

        Command::Read { entry_ids, feed } => {
            load_entries(&session, &client, &feed_arg(feed), ArticleCount::Hundred).await?;
            for id in &entry_ids {
                if !session.mark_entry(id, true) {
                    let reason = session.with_view(|view| unmarked_reason(view, id));
                    eprintln!("Skipping {id}: {reason}");
                }
            }
            let outcome = session.sync().await;
            report_sync(&session, outcome)?;
        }

        Command::ReadAll { feed, count } => {
            let count = count.map_or(config.article_count, ArticleCount::from_requested);
            load_entries(&session, &client, &feed_arg(feed), count).await?;
            let queued = session.mark_all_visible();
            tracing::info!(queued, "Queued visible entries");
            let outcome = session.sync().await;
            report_sync(&session, outcome)?;
        }

        Command::EmbedCheck { .. } => {}
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use skimly::model::Entry;

    fn entry(id: &str, feed_id: &str) -> Entry {
        Entry {
            id: id.to_string(),
            feed_id: feed_id.to_string(),
            title: id.to_string(),
            summary: String::new(),
            source: "Example".to_string(),
            published: 0,
            age_timestamp: 0,
            url: None,
        }
    }

    #[test]
    fn test_unmarked_reason_distinguishes_cases() {
        let mut view = ReaderView::new();
        view.select_feed(ALL_FEEDS_ID);
        view.replace_entries(vec![entry("orphan", ""), entry("owned", "feed/1")]);

        assert_eq!(unmarked_reason(&view, "missing"), "not an unread entry of this feed");
        assert!(unmarked_reason(&view, "orphan").contains("--feed"));
        assert_eq!(unmarked_reason(&view, "owned"), "already queued");
    }

    #[test]
    fn test_unmarked_reason_in_single_feed_view() {
        let mut view = ReaderView::new();
        view.select_feed("feed/1");
        view.replace_entries(vec![entry("orphan", "")]);

        assert_eq!(unmarked_reason(&view, "orphan"), "already queued");
    }

    #[test]
    fn test_feed_arg_defaults_to_aggregate() {
        assert_eq!(feed_arg(None), ALL_FEEDS_ID);
        assert_eq!(feed_arg(Some("all".to_string())), ALL_FEEDS_ID);
        assert_eq!(feed_arg(Some(" feed/1 ".to_string())), "feed/1");
    }
}
