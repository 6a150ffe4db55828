use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::collections::BTreeSet;
use std::path::PathBuf;

use brief_sync::config::Config;
use brief_sync::model::{ArticleRecord, DailyReel};
use brief_sync::preferences::{Preferences, KNOWN_CATEGORIES, KNOWN_REGIONS};
use brief_sync::remote::{RefreshTrigger, StoreClient};
use brief_sync::storage::{Database, DatabaseError};
use brief_sync::sync::{
    check_new_articles, FeedPage, FeedQuery, FeedSession, PageOutcome, SyncEngine,
};
use brief_sync::util::{single_line, truncate_to_width};

/// Column budget for one title line.
const TITLE_WIDTH: usize = 72;

/// Get the config directory path (~/.config/brief/)
fn get_config_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(".config").join("brief"))
}

/// The user's locale, used to pick default interests.
fn system_locale() -> Option<String> {
    ["LC_ALL", "LC_MESSAGES", "LANG"]
        .iter()
        .filter_map(|var| std::env::var(var).ok())
        .find(|v| !v.trim().is_empty())
}

#[derive(Parser, Debug)]
#[command(name = "brief", about = "Filtered news feed with offline cache")]
struct Args {
    /// Config file (default: ~/.config/brief/config.toml)
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Reset local database (delete and recreate)
    #[arg(long)]
    reset_db: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch one page of the feed
    Feed {
        #[arg(long, default_value_t = 0)]
        page: usize,
        /// Single category instead of your interests ("All" for interests)
        #[arg(long)]
        category: Option<String>,
        /// Region filter (default: saved region)
        #[arg(long)]
        region: Option<String>,
    },
    /// Walk several pages, merging as the feed view does
    More {
        #[arg(long, default_value_t = 3)]
        pages: usize,
        #[arg(long)]
        category: Option<String>,
    },
    /// Show today's briefing
    Reel,
    /// Show the cached first page without touching the network
    Cached {
        /// Drop the cached page instead of showing it
        #[arg(long)]
        clear: bool,
    },
    /// Ask upstream to re-crawl, then fetch the first page
    Refresh,
    /// Ask upstream to re-crawl only
    Trigger,
    /// Register a keyword alert
    Watch { keyword: String },
    /// Set the device push token used for keyword alerts
    Token {
        #[arg(required_unless_present = "clear")]
        token: Option<String>,
        /// Forget the stored token
        #[arg(long, conflicts_with = "token")]
        clear: bool,
    },
    /// List bookmarks
    Bookmarks,
    /// Toggle a bookmark by link or id
    Bookmark {
        key: String,
        /// Remove instead of toggling
        #[arg(long)]
        remove: bool,
    },
    /// Show reading history
    History {
        #[arg(long)]
        clear: bool,
    },
    /// Mark an article as read by link or id
    Read { key: String },
    /// Show or set interests
    Interests { categories: Vec<String> },
    /// Show or set the region
    Region { region: Option<String> },
    /// Report articles added since the last check
    Check,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing for debug logging
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let config_dir = get_config_dir()?;
    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir).context("Failed to create config directory")?;
    }

    // Directory holds the push token and API key: user-only access
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Err(e) =
            std::fs::set_permissions(&config_dir, std::fs::Permissions::from_mode(0o700))
        {
            tracing::warn!(
                path = %config_dir.display(),
                error = %e,
                "Failed to set config directory permissions to 0700"
            );
        }
    }

    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| config_dir.join("config.toml"));
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load {}", config_path.display()))?;
    config.validate().context("Invalid configuration")?;
    tracing::debug!(?config, "Configuration loaded");

    let db_path = config_dir.join("brief.db");
    if args.reset_db && db_path.exists() {
        std::fs::remove_file(&db_path).context("Failed to delete database")?;
        println!("Database reset.");
    }

    let db_path_str = db_path
        .to_str()
        .ok_or_else(|| anyhow::anyhow!("Invalid UTF-8 in database path"))?;
    let db = match Database::open(db_path_str).await {
        Ok(db) => db,
        Err(DatabaseError::InstanceLocked) => {
            eprintln!("Error: Another instance of brief appears to be running. Please close it and try again.");
            std::process::exit(1);
        }
        Err(e) => {
            return Err(anyhow::anyhow!("Failed to open database: {}", e));
        }
    };

    let mut prefs = Preferences::new(db.clone());
    if let Some(locale) = system_locale() {
        prefs = prefs.with_locale(locale);
    }

    let store = StoreClient::new(
        &config.store_url,
        config.resolved_api_key(),
        config.request_timeout(),
    )
    .context("Failed to create store client")?;
    let mut engine = SyncEngine::new(store, db).with_probe_limit(config.probe_limit);
    if let Some(url) = &config.refresh_trigger_url {
        let trigger = RefreshTrigger::new(url, config.trigger_timeout())
            .context("Invalid refresh_trigger_url")?;
        engine = engine.with_trigger(trigger);
    }

    run(args.command, &engine, &prefs, &config).await
}

async fn run(
    command: Command,
    engine: &SyncEngine<StoreClient>,
    prefs: &Preferences,
    config: &Config,
) -> Result<()> {
    match command {
        Command::Feed {
            page,
            category,
            region,
        } => {
            let region = match region {
                Some(r) => r,
                None => prefs.region().await?,
            };
            let query = FeedQuery::new(prefs.interests().await?, config.page_size)
                .with_region(region)
                .with_category(category)
                .with_page(page);
            let result = engine.fetch_page(&query).await;
            print_page(&result, page.saturating_mul(config.page_size));
        }
        Command::More { pages, category } => {
            let query = FeedQuery::new(prefs.interests().await?, config.page_size)
                .with_region(prefs.region().await?)
                .with_category(category);
            let mut session = FeedSession::new(query);
            session.seed_from_cache(engine.cached_feed().await);
            for _ in 0..pages {
                match session.load_next(engine).await {
                    Some(PageOutcome::Failed(e)) => {
                        eprintln!("Fetch failed: {e}");
                        break;
                    }
                    Some(_) => {}
                    None => break,
                }
            }
            if session.is_showing_cache() {
                println!("(showing cached articles)");
            }
            print_articles(session.items(), 0);
            if session.has_more() {
                println!("... more available");
            }
        }
        Command::Reel => match engine.fetch_morning_reel().await {
            Some(reel) => print_reel(&reel),
            None => println!("No briefing available."),
        },
        Command::Cached { clear: true } => {
            engine.clear_cache().await?;
            println!("Cache cleared.");
        }
        Command::Cached { clear: false } => {
            let snapshot = engine.cache_snapshot().await;
            if snapshot.items.is_empty() {
                println!("Cache is empty.");
            } else if let Some(written_at) = &snapshot.written_at {
                println!("Cached at {written_at} UTC");
            }
            print_articles(&snapshot.items, 0);
        }
        Command::Refresh => {
            let query = FeedQuery::new(prefs.interests().await?, config.page_size)
                .with_region(prefs.region().await?);
            let result = engine.refresh(&query).await;
            print_page(&result, 0);
        }
        Command::Trigger => {
            if engine.trigger_remote_refresh().await {
                println!("Refresh requested.");
            } else {
                println!("Refresh request was not accepted.");
            }
        }
        Command::Watch { keyword } => {
            if engine.add_watchlist_keyword(&keyword).await {
                println!("Watching \"{}\".", keyword.trim());
            } else {
                anyhow::bail!("Keyword not registered (is a push token set? see `brief token`)");
            }
        }
        Command::Token { clear: true, .. } => {
            prefs.clear_push_token().await?;
            println!("Push token cleared.");
        }
        Command::Token { token, clear: false } => {
            let token = token.unwrap_or_default();
            if token.trim().is_empty() {
                anyhow::bail!("Push token is blank");
            }
            prefs.set_push_token(&token).await?;
            println!("Push token saved.");
        }
        Command::Bookmarks => {
            let bookmarks = prefs.bookmarks().await?;
            if bookmarks.is_empty() {
                println!("No bookmarks.");
            }
            print_articles(&bookmarks, 0);
        }
        Command::Bookmark { key, remove } => {
            if remove {
                if prefs.remove_bookmark(&key).await? {
                    println!("Bookmark removed.");
                } else {
                    println!("Not bookmarked.");
                }
            } else {
                let article = find_known_article(engine, prefs, &key).await?;
                if prefs.toggle_bookmark(&article).await? {
                    println!("Bookmarked: {}", single_line(&article.title));
                } else {
                    println!("Bookmark removed: {}", single_line(&article.title));
                }
            }
        }
        Command::History { clear } => {
            if clear {
                prefs.clear_history().await?;
                println!("History cleared.");
            } else {
                print_articles(&prefs.history().await?, 0);
            }
        }
        Command::Read { key } => {
            let article = find_known_article(engine, prefs, &key).await?;
            prefs.add_to_history(&article).await?;
            println!("{}", single_line(&article.title));
            println!("{}", article.best_summary());
            if !article.link.is_empty() {
                println!("{}", article.link);
            }
        }
        Command::Interests { categories } => {
            if !categories.is_empty() {
                for c in &categories {
                    if !KNOWN_CATEGORIES.contains(&c.as_str()) {
                        tracing::warn!(category = %c, "Unknown category, saving anyway");
                    }
                }
                let set: BTreeSet<String> = categories.into_iter().collect();
                prefs.save_interests(&set).await?;
            }
            for c in prefs.interests().await? {
                println!("{c}");
            }
        }
        Command::Region { region } => {
            if let Some(region) = region {
                if !KNOWN_REGIONS.contains(&region.as_str()) {
                    tracing::warn!(region = %region, "Unknown region, saving anyway");
                }
                prefs.set_region(&region).await?;
            }
            println!("{}", prefs.region().await?);
        }
        Command::Check => {
            let report = check_new_articles(engine.store(), engine.database()).await?;
            match report {
                Some(new) => println!("{} new: {}", new.new_count, single_line(&new.top_headline)),
                None => println!("No new articles."),
            }
        }
    }
    Ok(())
}

/// Look up an article the user has seen: cached feed, bookmarks, then history.
async fn find_known_article(
    engine: &SyncEngine<StoreClient>,
    prefs: &Preferences,
    key: &str,
) -> Result<ArticleRecord> {
    let mut pools = vec![engine.cached_feed().await];
    pools.push(prefs.bookmarks().await?);
    pools.push(prefs.history().await?);

    pools
        .into_iter()
        .flatten()
        .find(|a| a.matches_key(key))
        .ok_or_else(|| anyhow::anyhow!("No known article with link or id '{key}'"))
}

fn print_page(page: &FeedPage, offset: usize) {
    match &page.outcome {
        PageOutcome::Loaded => {}
        PageOutcome::Empty => println!("No articles."),
        PageOutcome::FallbackApplied => {
            println!("Nothing matched your filters. Latest articles:")
        }
        PageOutcome::EmptyInterestSet => {
            println!("No interests selected. Pick some with `brief interests`.")
        }
        PageOutcome::Failed(e) => eprintln!("Fetch failed: {e}"),
    }
    print_articles(&page.articles, offset);
}

fn print_articles(articles: &[ArticleRecord], offset: usize) {
    for (i, article) in articles.iter().enumerate() {
        let title = single_line(&article.title);
        let title = truncate_to_width(&title, TITLE_WIDTH);
        let category = if article.category.is_empty() {
            "-"
        } else {
            article.category.as_str()
        };
        println!(
            "{:>3}. [{}] {}",
            offset.saturating_add(i + 1),
            category,
            title
        );
        let mut details = Vec::new();
        let source = single_line(&article.source);
        if !source.is_empty() {
            details.push(source.into_owned());
        }
        if let Some(published) = article.published_at() {
            details.push(published.format("%Y-%m-%d %H:%M").to_string());
        }
        if let Some(score) = article.trust() {
            details.push(format!("trust {score}"));
        }
        if !details.is_empty() {
            println!("     {}", details.join(" | "));
        }
    }
}

fn print_reel(reel: &DailyReel) {
    println!("{}", single_line(&reel.title));
    if !reel.summary.is_empty() {
        println!("{}", reel.summary);
    }
    println!();
    print_articles(&reel.stories, 0);
}
