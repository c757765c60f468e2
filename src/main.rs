use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use secrecy::SecretString;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use newswave::api::HttpArticleClient;
use newswave::config::Config;
use newswave::model::{filter_articles, Article, ArticleDraft, ArticlePatch, CategoryFilter};
use newswave::query::{ArticleQueries, QueryCache};
use newswave::storage::{atomic_write, FavoritesRepository, FileStore};
use newswave::util::{display_width, single_line, strip_control_chars, truncate_to_width};
use newswave::view::FavoritesView;

/// Largest file accepted by `import` and the `admin` commands (8 MB)
const MAX_INPUT_FILE_SIZE: u64 = 8 * 1024 * 1024;

/// Fallback when `COLUMNS` is unset or invalid
const DEFAULT_TERMINAL_WIDTH: usize = 100;

/// Get the config directory path (~/.config/newswave/)
fn get_config_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    let config_dir = PathBuf::from(home).join(".config").join("newswave");
    Ok(config_dir)
}

fn terminal_width() -> usize {
    std::env::var("COLUMNS")
        .ok()
        .and_then(|c| c.trim().parse::<usize>().ok())
        .filter(|&w| w >= 20)
        .unwrap_or(DEFAULT_TERMINAL_WIDTH)
}

#[derive(Parser, Debug)]
#[command(
    name = "newswave",
    version,
    about = "News aggregator client with offline favorites"
)]
struct Args {
    /// Config file (default: ~/.config/newswave/config.toml)
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List articles, optionally filtered
    Articles {
        /// Category slug ("all" lists every category)
        #[arg(long, value_name = "SLUG")]
        category: Option<String>,
        /// Case-insensitive text search over title, description and category
        #[arg(long, value_name = "QUERY")]
        search: Option<String>,
    },
    /// Show one article in full
    Article { id: String },
    /// List categories
    Categories,
    /// List favorites, newest first
    Favorites {
        #[arg(long, value_name = "QUERY")]
        search: Option<String>,
    },
    /// Toggle an article in favorites
    Favorite { id: String },
    /// Remove an article from favorites
    Unfavorite { id: String },
    /// Export favorites to a JSON file
    Export {
        /// Output path (default: ./newswave-favorites-<timestamp>.json)
        #[arg(long, short, value_name = "PATH")]
        output: Option<PathBuf>,
    },
    /// Replace favorites with the contents of an exported JSON file
    Import { file: PathBuf },
    /// Article management on the server
    #[command(subcommand)]
    Admin(AdminCommand),
}

#[derive(Subcommand, Debug)]
enum AdminCommand {
    /// Create an article from a JSON file
    Create { file: PathBuf },
    /// Apply a partial update from a JSON file
    Update { id: String, file: PathBuf },
    /// Delete an article
    Delete { id: String },
}

/// Everything a command may need, built once from the config.
struct Session {
    favorites: FavoritesView<FileStore>,
    repository: Arc<FavoritesRepository<FileStore>>,
    queries: ArticleQueries<HttpArticleClient>,
    width: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing for debug logging
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config_dir = get_config_dir()?;
    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| config_dir.join("config.toml"));
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?
        .with_env_overrides();
    tracing::debug!(config = ?config, "Effective configuration");

    let favorites_path = config.favorites_path(&config_dir);
    if let Some(parent) = favorites_path.parent() {
        ensure_private_dir(parent)?;
    }

    let repository = Arc::new(FavoritesRepository::new(FileStore::open(&favorites_path)));
    let client = HttpArticleClient::new(
        &config.api_base_url,
        config.request_timeout(),
        config.api_token.clone().map(SecretString::from),
    )
    .context("Failed to create API client")?;
    let cache = QueryCache::new(config.cache_max_entries).with_retries(config.query_retries);

    let mut session = Session {
        favorites: FavoritesView::new(Arc::clone(&repository)),
        repository,
        queries: ArticleQueries::new(client, cache),
        width: terminal_width(),
    };

    run(&mut session, args.command).await
}

/// Create `dir` if needed and restrict it to the current user on Unix.
fn ensure_private_dir(dir: &Path) -> Result<()> {
    if dir.as_os_str().is_empty() || dir.exists() {
        return Ok(());
    }
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create directory {}", dir.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Err(e) = std::fs::set_permissions(dir, std::fs::Permissions::from_mode(0o700)) {
            tracing::warn!(
                path = %dir.display(),
                error = %e,
                "Failed to set directory permissions to 0700"
            );
        }
    }
    Ok(())
}

async fn run(ctx: &mut Session, command: Command) -> Result<()> {
    match command {
        Command::Articles { category, search } => {
            let articles = match category.as_deref() {
                None | Some("all") => ctx.queries.articles().await,
                Some(slug) => ctx.queries.articles_by_category(slug).await,
            }
            .context("Failed to load articles")?;

            let shown = filter_articles(
                &articles,
                CategoryFilter::from(category.as_deref()),
                search.as_deref().unwrap_or(""),
            );
            if shown.is_empty() {
                println!("No articles found.");
            }
            for article in shown {
                let starred = ctx.favorites.is_favorite(&article.id);
                print_row(article, starred, ctx.width);
            }
        }
        Command::Article { id } => {
            let article = ctx
                .queries
                .article(&id)
                .await
                .with_context(|| format!("Failed to load article {id}"))?;
            let starred = ctx.favorites.is_favorite(&article.id);
            print_article(&article, starred);
        }
        Command::Categories => {
            let categories = ctx
                .queries
                .categories()
                .await
                .context("Failed to load categories")?;
            for category in categories.iter() {
                println!(
                    "{} {:<16} {}",
                    strip_control_chars(&category.icon),
                    strip_control_chars(&category.slug),
                    strip_control_chars(&category.name)
                );
            }
        }
        Command::Favorites { search } => {
            let favorites = ctx.favorites.search(search.as_deref().unwrap_or(""));
            if favorites.is_empty() {
                println!("No favorites yet.");
            }
            for article in &favorites {
                print_row(article, true, ctx.width);
            }
        }
        Command::Favorite { id } => {
            let existing = ctx.favorites.favorites().iter().find(|a| a.id == id).cloned();
            let article = match existing {
                Some(article) => article,
                None => ctx
                    .queries
                    .article(&id)
                    .await
                    .with_context(|| format!("Failed to load article {id}"))?
                    .as_ref()
                    .clone(),
            };
            let was_favorite = ctx.favorites.is_favorite(&id);
            let now_favorite = ctx.favorites.toggle(&article);
            if now_favorite == was_favorite {
                anyhow::bail!(
                    "Failed to save favorites to {}",
                    ctx.repository.store().path().display()
                );
            }
            let title = strip_control_chars(&article.title);
            if now_favorite {
                println!("Added to favorites: {title}");
            } else {
                println!("Removed from favorites: {title}");
            }
        }
        Command::Unfavorite { id } => {
            if !ctx.favorites.is_favorite(&id) {
                println!("Article {id} is not a favorite.");
            } else if ctx.favorites.remove(&id) {
                println!("Removed from favorites: {id}");
            } else {
                anyhow::bail!(
                    "Failed to save favorites to {}",
                    ctx.repository.store().path().display()
                );
            }
        }
        Command::Export { output } => {
            let path = output.unwrap_or_else(|| {
                PathBuf::from(format!(
                    "newswave-favorites-{}.json",
                    Utc::now().timestamp_millis()
                ))
            });
            let json = ctx.favorites.export();
            atomic_write(&path, json.as_bytes())
                .with_context(|| format!("Failed to write export to {}", path.display()))?;
            let count = ctx.favorites.favorites().len();
            println!("Exported {count} favorites to {}", path.display());
        }
        Command::Import { file } => {
            let text = read_input_file(&file)?;
            let count = ctx
                .repository
                .try_import(&text)
                .with_context(|| format!("Failed to import {}", file.display()))?;
            ctx.favorites.reload();
            println!("Imported {count} favorites from {}", file.display());
        }
        Command::Admin(admin) => run_admin(ctx, admin).await?,
    }
    Ok(())
}

async fn run_admin(ctx: &Session, command: AdminCommand) -> Result<()> {
    match command {
        AdminCommand::Create { file } => {
            let text = read_input_file(&file)?;
            let draft: ArticleDraft = serde_json::from_str(&text)
                .with_context(|| format!("{} is not a valid article draft", file.display()))?;
            let created = ctx
                .queries
                .create_article(&draft)
                .await
                .context("Failed to create article")?;
            tracing::info!(id = %created.id, "Created article");
            println!("Created article {}", created.id);
        }
        AdminCommand::Update { id, file } => {
            let text = read_input_file(&file)?;
            let patch: ArticlePatch = serde_json::from_str(&text)
                .with_context(|| format!("{} is not a valid article update", file.display()))?;
            if patch.is_empty() {
                anyhow::bail!("{} contains no fields to update", file.display());
            }
            let updated = ctx
                .queries
                .update_article(&id, &patch)
                .await
                .with_context(|| format!("Failed to update article {id}"))?;
            tracing::info!(id = %updated.id, "Updated article");
            println!("Updated article {}", updated.id);
        }
        AdminCommand::Delete { id } => {
            ctx.queries
                .delete_article(&id)
                .await
                .with_context(|| format!("Failed to delete article {id}"))?;
            tracing::info!(id = %id, "Deleted article");
            println!("Deleted article {id}");
        }
    }
    Ok(())
}

/// Read a user-supplied input file, rejecting anything that is not a
/// reasonably sized regular file.
fn read_input_file(path: &Path) -> Result<String> {
    let canonical = path
        .canonicalize()
        .with_context(|| format!("Failed to resolve file: {}", path.display()))?;
    let metadata = std::fs::metadata(&canonical)?;
    if !metadata.is_file() {
        anyhow::bail!("{} is not a regular file", path.display());
    }
    if metadata.len() > MAX_INPUT_FILE_SIZE {
        anyhow::bail!(
            "{} is too large ({} bytes, max {})",
            path.display(),
            metadata.len(),
            MAX_INPUT_FILE_SIZE
        );
    }
    std::fs::read_to_string(&canonical)
        .with_context(|| format!("Failed to read file: {}", canonical.display()))
}

fn format_date(article: &Article) -> String {
    match article.published_at() {
        Some(date) => date.format("%Y-%m-%d %H:%M").to_string(),
        None => strip_control_chars(&article.published_at).into_owned(),
    }
}

/// One listing line: marker, id, category, title (truncated to fit), source.
fn print_row(article: &Article, starred: bool, width: usize) {
    let marker = if starred { '*' } else { ' ' };
    let prefix = format!(
        "{marker} {:<8} {:<14}",
        strip_control_chars(&article.id),
        strip_control_chars(&article.category)
    );
    let source = strip_control_chars(&article.source.name);
    let suffix = format!("  [{}]", truncate_to_width(&source, 24));
    let available = width
        .saturating_sub(display_width(&prefix) + 1)
        .saturating_sub(display_width(&suffix));
    let title = strip_control_chars(&article.title);
    println!(
        "{prefix} {}{suffix}",
        truncate_to_width(&single_line(&title), available)
    );
}

fn print_article(article: &Article, starred: bool) {
    let title = strip_control_chars(&article.title);
    println!("{}{}", title, if starred { "  *" } else { "" });
    println!("{}", "=".repeat(display_width(&title).min(80)));
    let byline = match &article.author {
        Some(author) => format!(
            "{} | {} | {}",
            strip_control_chars(&article.source.name),
            strip_control_chars(author),
            format_date(article)
        ),
        None => format!(
            "{} | {}",
            strip_control_chars(&article.source.name),
            format_date(article)
        ),
    };
    println!("{byline}");
    println!();
    println!("{}", strip_control_chars(&single_line(&article.description)));
    for paragraph in article.paragraphs() {
        println!();
        println!("{}", strip_control_chars(paragraph));
    }
    println!();
    println!("{}", strip_control_chars(&article.url));
}
