use anyhow::{bail, Context, Result};
use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use newsdesk::ai::{Analyzer, ChatClient};
use newsdesk::api::{Article, NewsClient, CATEGORIES};
use newsdesk::app::{rotate_banner, App};
use newsdesk::config::Config;
use newsdesk::storage::{Database, DatabaseError};
use newsdesk::util::{decode, encode, strip_control_chars, truncate_to_width};

const TITLE_WIDTH: usize = 76;

/// Get the config directory path (~/.config/newsdesk/)
fn get_config_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(".config").join("newsdesk"))
}

#[derive(Parser, Debug)]
#[command(
    name = "newsdesk",
    about = "News headlines, saved articles and AI article analysis"
)]
struct Args {
    /// Database file (default: ~/.config/newsdesk/news.db)
    #[arg(long, value_name = "PATH", global = true)]
    db: Option<PathBuf>,

    /// Config file (default: ~/.config/newsdesk/config.toml)
    #[arg(long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Top headlines for a category (default: last selected)
    Headlines { category: Option<String> },
    /// Search all articles
    Search { query: String },
    /// List categories or toggle a favorite
    Categories {
        #[command(subcommand)]
        action: Option<CategoryAction>,
    },
    /// Headlines across all favorite categories
    Feed,
    /// Manage saved articles
    Saved {
        #[command(subcommand)]
        action: Option<SavedAction>,
    },
    /// AI analysis of headline N in the selected category
    Analyze(AnalyzeArgs),
    /// Rotate through the top headlines
    Banner {
        /// Number of rotations before exiting (default: until Ctrl-C)
        #[arg(long)]
        cycles: Option<usize>,
    },
    /// Percent-encode text (space becomes '+')
    Encode { text: String },
    /// Decode percent-encoded text
    Decode { text: String },
}

#[derive(Subcommand, Debug)]
enum CategoryAction {
    List,
    Toggle { name: String },
}

#[derive(Subcommand, Debug)]
enum SavedAction {
    List,
    /// Save headline N in the selected category
    Add { index: usize },
    Remove { url: String },
    Clear,
    Count,
}

#[derive(ClapArgs, Debug)]
struct AnalyzeArgs {
    /// 1-based headline number
    index: usize,
    #[arg(long)]
    summary: bool,
    #[arg(long)]
    sentiment: bool,
    #[arg(long)]
    insights: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    // Pure text helpers need no config or database
    match &args.command {
        Command::Encode { text } => {
            println!("{}", encode(text));
            return Ok(());
        }
        Command::Decode { text } => {
            println!("{}", decode(text).context("Input is not valid percent-encoded UTF-8")?);
            return Ok(());
        }
        _ => {}
    }

    let config_dir = get_config_dir()?;
    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir).context("Failed to create config directory")?;
        tracing::info!(path = %config_dir.display(), "Created config directory");
    }

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
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;
    tracing::debug!(?config, "Configuration loaded");

    let db_path = args.db.clone().unwrap_or_else(|| config_dir.join("news.db"));
    let db_path_str = db_path
        .to_str()
        .ok_or_else(|| anyhow::anyhow!("Invalid UTF-8 in database path"))?;
    let db = match Database::open(db_path_str).await {
        Ok(db) => db,
        Err(DatabaseError::InstanceLocked) => {
            eprintln!(
                "Error: Another instance of newsdesk appears to be running. Please close it and try again."
            );
            std::process::exit(1);
        }
        Err(e) => {
            return Err(anyhow::anyhow!("Failed to open database: {}", e));
        }
    };

    let http = reqwest::Client::builder()
        .user_agent(concat!("newsdesk/", env!("CARGO_PKG_VERSION")))
        .connect_timeout(Duration::from_secs(10))
        .build()
        .context("Failed to build HTTP client")?;
    let news = NewsClient::from_config(http.clone(), &config).context("Invalid news_base_url")?;
    let chat = ChatClient::from_config(http, &config).context("Invalid ai_base_url")?;

    let mut app = App::new(db, Arc::new(news), Arc::new(Analyzer::new(chat)));

    run(&mut app, &config, args.command).await
}

async fn run(app: &mut App, config: &Config, command: Command) -> Result<()> {
    match command {
        Command::Headlines { category } => {
            let category = match category {
                Some(name) => resolve_category(&name)?,
                None => selected_category(app, config).await,
            };
            app.select_category(&category);
            app.run_until_idle().await;
            println!("{} headlines", strip_control_chars(&category));
            print_articles(&app.articles);
        }
        Command::Search { query } => {
            app.search(&query);
            app.run_until_idle().await;
            print_articles(&app.search_results);
        }
        Command::Categories { action } => match action.unwrap_or(CategoryAction::List) {
            CategoryAction::List => {
                let favorites = app.db.get_favorite_categories().await?;
                print_categories(&favorites);
            }
            CategoryAction::Toggle { name } => {
                let name = resolve_category(&name)?;
                app.toggle_favorite_category(&name);
                app.run_until_idle().await;
                print_categories(&app.favorite_categories);
            }
        },
        Command::Feed => {
            app.favorite_categories = app.db.get_favorite_categories().await?;
            if app.favorite_categories.is_empty() {
                println!("No favorite categories. Add one with: newsdesk categories toggle <NAME>");
                return Ok(());
            }
            app.load_category_articles();
            app.run_until_idle().await;
            println!(
                "Headlines from {}",
                strip_control_chars(&app.favorite_categories.join(", "))
            );
            print_articles(&app.category_articles);
        }
        Command::Saved { action } => run_saved(app, config, action.unwrap_or(SavedAction::List)).await?,
        Command::Analyze(analyze) => {
            let article = headline(app, config, analyze.index).await?;
            let all = !(analyze.summary || analyze.sentiment || analyze.insights);
            if all {
                app.request_all_analysis(&article);
            } else {
                if analyze.summary {
                    app.request_summary(&article);
                }
                if analyze.sentiment {
                    app.request_sentiment(&article);
                }
                if analyze.insights {
                    app.request_insights(&article);
                }
            }
            app.run_until_idle().await;
            print_analysis(app, &article);
        }
        Command::Banner { cycles } => {
            let category = selected_category(app, config).await;
            app.select_category(&category);
            app.run_until_idle().await;

            let banner: Vec<String> = app
                .banner_articles()
                .iter()
                .map(|a| title_line(&a.title))
                .collect();
            if banner.is_empty() {
                println!("No headlines to show");
                return Ok(());
            }

            let rotation = rotate_banner(banner.len(), config.banner_interval(), cycles, |i| {
                println!("[{}/{}] {}", i + 1, banner.len(), banner[i]);
            });
            tokio::select! {
                _ = rotation => {}
                _ = tokio::signal::ctrl_c() => {}
            }
        }
        Command::Encode { .. } | Command::Decode { .. } => {}
    }

    if let Some(status) = &app.status_message {
        eprintln!("{}", strip_control_chars(status));
    }
    Ok(())
}

async fn run_saved(app: &mut App, config: &Config, action: SavedAction) -> Result<()> {
    match action {
        SavedAction::List => {
            app.refresh_saved().await;
            if app.saved_articles.is_empty() {
                println!("No saved articles");
            }
            for saved in &app.saved_articles {
                println!("{}", title_line(&saved.title));
                println!("     {}", strip_control_chars(&saved.url));
            }
        }
        SavedAction::Add { index } => {
            let article = headline(app, config, index).await?;
            app.add_saved(&article);
            app.run_until_idle().await;
        }
        SavedAction::Remove { url } => {
            app.remove_saved(&url);
            app.run_until_idle().await;
        }
        SavedAction::Clear => {
            app.clear_saved();
            app.run_until_idle().await;
        }
        SavedAction::Count => {
            println!("{}", app.db.count_favorites().await?);
        }
    }
    Ok(())
}

/// Match a category name against the catalogue, ignoring case.
fn resolve_category(name: &str) -> Result<String> {
    match CATEGORIES.iter().find(|c| c.eq_ignore_ascii_case(name.trim())) {
        Some(category) => Ok(category.to_string()),
        None => bail!(
            "Unknown category '{}'. Choose one of: {}",
            name,
            CATEGORIES.join(", ")
        ),
    }
}

async fn selected_category(app: &App, config: &Config) -> String {
    match app.db.get_selected_category().await {
        Ok(Some(category)) => category,
        Ok(None) => config.default_category.clone(),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to read selected category");
            config.default_category.clone()
        }
    }
}

/// Fetch the selected category's headlines and return the 1-based `index`.
async fn headline(app: &mut App, config: &Config, index: usize) -> Result<Article> {
    let category = selected_category(app, config).await;
    app.select_category(&category);
    app.run_until_idle().await;

    if index == 0 || index > app.articles.len() {
        bail!(
            "No headline {} in {} (have {})",
            index,
            category,
            app.articles.len()
        );
    }
    Ok(app.articles[index - 1].clone())
}

/// An API-supplied title made safe to print on one terminal line.
fn title_line(title: &str) -> String {
    truncate_to_width(&strip_control_chars(title), TITLE_WIDTH).into_owned()
}

fn print_articles(articles: &[Article]) {
    if articles.is_empty() {
        println!("No articles");
        return;
    }
    for (i, article) in articles.iter().enumerate() {
        println!("{:>3}. {}", i + 1, title_line(&article.title));
        println!("     {}", strip_control_chars(&article.url));
    }
}

fn print_categories(favorites: &[String]) {
    for category in CATEGORIES {
        let mark = if favorites.iter().any(|f| f == category) {
            '*'
        } else {
            ' '
        };
        println!("{} {}", mark, category);
    }
}

fn print_analysis(app: &App, article: &Article) {
    println!("{}", title_line(&article.title));

    if let Some(summary) = &app.ai_summary {
        println!("\nSummary");
        match &summary.error {
            Some(e) => println!("  {}", strip_control_chars(e)),
            None => println!("  {}", strip_control_chars(&summary.summary)),
        }
    }

    if let Some(sentiment) = &app.sentiment {
        println!("\nSentiment");
        println!(
            "  {} ({} confidence)",
            strip_control_chars(&sentiment.sentiment),
            strip_control_chars(&sentiment.confidence)
        );
        if let Some(e) = &sentiment.error {
            println!("  {}", strip_control_chars(e));
        } else if !sentiment.explanation.is_empty() {
            println!("  {}", strip_control_chars(&sentiment.explanation));
        }
    }

    if let Some(insights) = &app.insights {
        println!("\nKey insights");
        if let Some(e) = &insights.error {
            println!("  {}", strip_control_chars(e));
        }
        for insight in &insights.insights {
            println!("  - {}", strip_control_chars(insight));
        }
    }
}
