//! Presentation state: observable cells plus the actions that update them.
//!
//! Every action that touches the network or disk spawns one task onto the
//! [`App`]'s [`JoinSet`]. Tasks report back through an [`AppEvent`] channel
//! and only [`handle_app_event`] mutates the cells, so all state changes
//! happen on whichever task owns the `App`. Dropping the `App` aborts any
//! outstanding work.

mod banner;
mod events;
mod tasks;

pub use banner::{rotate_banner, BannerRotator, BANNER_SIZE};
pub use events::{handle_app_event, AppEvent};
pub use tasks::Task;

use std::collections::{HashSet, VecDeque};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinSet;

use crate::ai::{AiSummary, Analyzer, ArticleInsights, SentimentAnalysis};
use crate::api::{Article, NewsClient, DEFAULT_CATEGORY};
use crate::storage::{Database, FavoriteArticle, FavoritesWatch};
use tasks::catch_task_panic;

const EVENT_CHANNEL_CAPACITY: usize = 64;

pub struct App {
    pub db: Database,
    news: Arc<NewsClient>,
    analyzer: Arc<Analyzer>,

    // ------------------------------------------------------------------------
    // Observable cells
    // ------------------------------------------------------------------------
    /// Headlines for `selected_category`.
    pub articles: Vec<Article>,
    pub selected_category: String,
    pub search_query: String,
    pub search_results: Vec<Article>,
    pub favorite_categories: Vec<String>,
    /// Headlines across every favorite category, deduplicated by url.
    pub category_articles: Vec<Article>,
    /// Saved articles, newest first. Follows the favorites table.
    pub saved_articles: Vec<FavoriteArticle>,
    /// The article the AI cells currently describe.
    pub ai_article_url: Option<String>,
    pub ai_summary: Option<AiSummary>,
    pub sentiment: Option<SentimentAnalysis>,
    pub insights: Option<ArticleInsights>,
    /// Number of AI calls still outstanding for `ai_generation`.
    pub ai_in_flight: usize,
    pub status_message: Option<String>,

    // ------------------------------------------------------------------------
    // Request generations
    // ------------------------------------------------------------------------
    // Each spawn bumps its family's counter and tags the task with it. The
    // event handler discards results whose tag is no longer current.
    pub headlines_generation: u64,
    pub search_generation: u64,
    pub category_articles_generation: u64,
    pub ai_generation: u64,
    /// Tag of the category toggle currently in flight.
    pub favorite_categories_generation: u64,

    // Category toggles run one at a time, in the order they were asked for
    category_toggles: VecDeque<String>,
    category_toggle_in_flight: bool,
    saved_watch: FavoritesWatch,
    tasks: JoinSet<()>,
    event_tx: mpsc::Sender<AppEvent>,
    event_rx: mpsc::Receiver<AppEvent>,
}

impl App {
    pub fn new(db: Database, news: Arc<NewsClient>, analyzer: Arc<Analyzer>) -> Self {
        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let saved_watch = db.watch_favorites();

        Self {
            db,
            news,
            analyzer,
            articles: Vec::new(),
            selected_category: DEFAULT_CATEGORY.to_string(),
            search_query: String::new(),
            search_results: Vec::new(),
            favorite_categories: Vec::new(),
            category_articles: Vec::new(),
            saved_articles: Vec::new(),
            ai_article_url: None,
            ai_summary: None,
            sentiment: None,
            insights: None,
            ai_in_flight: 0,
            status_message: None,
            headlines_generation: 0,
            search_generation: 0,
            category_articles_generation: 0,
            ai_generation: 0,
            favorite_categories_generation: 0,
            category_toggles: VecDeque::new(),
            category_toggle_in_flight: false,
            saved_watch,
            tasks: JoinSet::new(),
            event_tx,
            event_rx,
        }
    }

    /// Restore persisted state and kick off the initial fetches.
    ///
    /// Uses the stored category selection when there is one, otherwise
    /// `default_category`.
    pub async fn start(&mut self, default_category: &str) {
        let selected = match self.db.get_selected_category().await {
            Ok(Some(category)) => category,
            Ok(None) => default_category.to_string(),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read selected category");
                default_category.to_string()
            }
        };

        match self.db.get_favorite_categories().await {
            Ok(categories) => self.favorite_categories = categories,
            Err(e) => tracing::warn!(error = %e, "Failed to read favorite categories"),
        }

        self.refresh_saved().await;
        self.select_category(&selected);
        self.load_category_articles();
    }

    pub fn set_status(&mut self, message: impl Into<String>) {
        self.status_message = Some(message.into());
    }

    pub fn is_ai_loading(&self) -> bool {
        self.ai_in_flight > 0
    }

    /// The articles the rotating banner cycles through.
    pub fn banner_articles(&self) -> &[Article] {
        &self.articles[..self.articles.len().min(BANNER_SIZE)]
    }

    pub fn pending_tasks(&self) -> usize {
        self.tasks.len()
    }

    // ========================================================================
    // News
    // ========================================================================

    /// Persist the selection and replace `articles` with its headlines.
    pub fn select_category(&mut self, category: &str) {
        self.selected_category = category.to_string();
        self.headlines_generation = self.headlines_generation.wrapping_add(1);
        let generation = self.headlines_generation;

        let db = self.db.clone();
        let news = Arc::clone(&self.news);
        let category = category.to_string();

        tracing::debug!(category = %category, generation, "Spawning headlines fetch");
        self.spawn_task(Task::Headlines, async move {
            if let Err(e) = db.set_selected_category(&category).await {
                tracing::warn!(category = %category, error = %e, "Failed to persist selected category");
            }
            let result = news
                .top_headlines(&category)
                .await
                .map(|response| response.articles)
                .map_err(|e| e.to_string());
            AppEvent::HeadlinesLoaded {
                category,
                generation,
                result,
            }
        });
    }

    /// Update the search text. An empty query clears the results without a
    /// request; any other text, whitespace included, is sent as typed.
    pub fn search(&mut self, query: &str) {
        self.search_query = query.to_string();
        self.search_generation = self.search_generation.wrapping_add(1);
        let generation = self.search_generation;

        if query.is_empty() {
            self.search_results.clear();
            return;
        }

        let news = Arc::clone(&self.news);
        let query = query.to_string();

        tracing::debug!(query = %query, generation, "Spawning search");
        self.spawn_task(Task::Search, async move {
            let result = news
                .search(&query)
                .await
                .map(|response| response.articles)
                .map_err(|e| e.to_string());
            AppEvent::SearchCompleted {
                query,
                generation,
                result,
            }
        });
    }

    /// Add or remove a favorite category, then refetch category articles.
    ///
    /// Toggles queue behind the one in flight, so each result reflects every
    /// earlier toggle and the cell always ends on the stored list.
    pub fn toggle_favorite_category(&mut self, name: &str) {
        self.category_toggles.push_back(name.to_string());
        self.start_next_category_toggle();
    }

    fn start_next_category_toggle(&mut self) {
        if self.category_toggle_in_flight {
            return;
        }
        let Some(name) = self.category_toggles.pop_front() else {
            return;
        };

        self.category_toggle_in_flight = true;
        self.favorite_categories_generation = self.favorite_categories_generation.wrapping_add(1);
        let generation = self.favorite_categories_generation;
        let db = self.db.clone();

        tracing::debug!(category = %name, generation, "Spawning favorite category toggle");
        self.spawn_task(Task::FavoriteCategory { generation }, async move {
            let result = db
                .toggle_favorite_category(&name)
                .await
                .map_err(|e| format!("{:#}", e));
            AppEvent::FavoriteCategoriesChanged { generation, result }
        });
    }

    /// Release the in-flight toggle slot and start the next queued toggle.
    /// Returns false when nothing was left to start.
    fn finish_category_toggle(&mut self) -> bool {
        self.category_toggle_in_flight = false;
        if self.category_toggles.is_empty() {
            return false;
        }
        self.start_next_category_toggle();
        true
    }

    /// Fetch headlines for every favorite category, one after another.
    ///
    /// A failing category contributes nothing. The merged list keeps the
    /// first article seen for each url.
    pub fn load_category_articles(&mut self) {
        self.category_articles_generation = self.category_articles_generation.wrapping_add(1);
        let generation = self.category_articles_generation;

        if self.favorite_categories.is_empty() {
            self.category_articles.clear();
            return;
        }

        let categories = self.favorite_categories.clone();
        let news = Arc::clone(&self.news);

        self.spawn_task(Task::CategoryArticles, async move {
            let mut merged = Vec::new();
            for category in &categories {
                match news.top_headlines(category).await {
                    Ok(response) => merged.extend(response.articles),
                    Err(e) => {
                        tracing::warn!(category = %category, error = %e, "Favorite category fetch failed");
                    }
                }
            }
            AppEvent::CategoryArticlesLoaded {
                generation,
                articles: dedup_by_url(merged),
            }
        });
    }

    // ========================================================================
    // AI Analysis
    // ========================================================================

    pub fn request_summary(&mut self, article: &Article) {
        let generation = self.begin_ai_call(article);
        let analyzer = Arc::clone(&self.analyzer);
        let article = article.clone();

        self.spawn_task(Task::Ai { generation }, async move {
            let summary = analyzer.summarize(&article).await;
            AppEvent::SummaryReady {
                generation,
                summary,
            }
        });
    }

    pub fn request_sentiment(&mut self, article: &Article) {
        let generation = self.begin_ai_call(article);
        let analyzer = Arc::clone(&self.analyzer);
        let article = article.clone();

        self.spawn_task(Task::Ai { generation }, async move {
            let sentiment = analyzer.analyze_sentiment(&article).await;
            AppEvent::SentimentReady {
                generation,
                sentiment,
            }
        });
    }

    pub fn request_insights(&mut self, article: &Article) {
        let generation = self.begin_ai_call(article);
        let analyzer = Arc::clone(&self.analyzer);
        let article = article.clone();

        self.spawn_task(Task::Ai { generation }, async move {
            let insights = analyzer.generate_insights(&article).await;
            AppEvent::InsightsReady {
                generation,
                insights,
            }
        });
    }

    /// Fire all three analyses. They complete in no particular order.
    pub fn request_all_analysis(&mut self, article: &Article) {
        self.request_summary(article);
        self.request_sentiment(article);
        self.request_insights(article);
    }

    /// Reset the AI cells. Results still in flight are discarded on arrival.
    pub fn clear_ai_analysis(&mut self) {
        self.reset_ai();
        self.ai_article_url = None;
    }

    fn begin_ai_call(&mut self, article: &Article) -> u64 {
        if self.ai_article_url.as_deref() != Some(article.url.as_str()) {
            self.reset_ai();
            self.ai_article_url = Some(article.url.clone());
        }
        self.ai_in_flight += 1;
        self.ai_generation
    }

    fn reset_ai(&mut self) {
        self.ai_summary = None;
        self.sentiment = None;
        self.insights = None;
        self.ai_in_flight = 0;
        self.ai_generation = self.ai_generation.wrapping_add(1);
    }

    // ========================================================================
    // Saved Articles
    // ========================================================================

    pub fn add_saved(&mut self, article: &Article) {
        let db = self.db.clone();
        let article = article.clone();

        self.spawn_task(Task::Saved, async move {
            let result = db
                .add_to_favorites(&article)
                .await
                .map(|()| format!("Saved: {}", article.title))
                .map_err(|e| format!("{:#}", e));
            AppEvent::SavedUpdated { result }
        });
    }

    pub fn remove_saved(&mut self, url: &str) {
        let db = self.db.clone();
        let url = url.to_string();

        self.spawn_task(Task::Saved, async move {
            let result = match db.delete_favorite(&url).await {
                Ok(true) => Ok("Removed from saved articles".to_string()),
                Ok(false) => Ok("Article was not saved".to_string()),
                Err(e) => Err(format!("{:#}", e)),
            };
            AppEvent::SavedUpdated { result }
        });
    }

    pub fn toggle_saved(&mut self, article: &Article) {
        let db = self.db.clone();
        let article = article.clone();

        self.spawn_task(Task::Saved, async move {
            let result = match db.toggle_favorite(&article).await {
                Ok(true) => Ok(format!("Saved: {}", article.title)),
                Ok(false) => Ok(format!("Removed: {}", article.title)),
                Err(e) => Err(format!("{:#}", e)),
            };
            AppEvent::SavedUpdated { result }
        });
    }

    pub fn clear_saved(&mut self) {
        let db = self.db.clone();

        self.spawn_task(Task::Saved, async move {
            let result = db
                .delete_all_favorites()
                .await
                .map(|n| format!("Cleared {} saved articles", n))
                .map_err(|e| format!("{:#}", e));
            AppEvent::SavedUpdated { result }
        });
    }

    /// Re-run the saved-articles query.
    pub async fn refresh_saved(&mut self) {
        match self.saved_watch.favorites().await {
            Ok(saved) => self.saved_articles = saved,
            Err(e) => tracing::warn!(error = %e, "Failed to load saved articles"),
        }
    }

    async fn sync_saved(&mut self) {
        if self.saved_watch.has_changed() {
            self.refresh_saved().await;
        }
    }

    // ========================================================================
    // Task Driving
    // ========================================================================

    /// Handle events until every spawned task has finished and its result
    /// has been applied.
    pub async fn run_until_idle(&mut self) {
        loop {
            tokio::select! {
                biased;
                Some(event) = self.event_rx.recv() => {
                    handle_app_event(self, event);
                    self.sync_saved().await;
                }
                joined = self.tasks.join_next() => match joined {
                    Some(Ok(())) => {}
                    Some(Err(e)) if e.is_cancelled() => {}
                    Some(Err(e)) => tracing::error!(error = %e, "Task failed to join"),
                    None => match self.event_rx.try_recv() {
                        Ok(event) => {
                            handle_app_event(self, event);
                            self.sync_saved().await;
                        }
                        Err(_) => break,
                    },
                },
            }
        }
        self.sync_saved().await;
    }

    fn spawn_task<F>(&mut self, task: Task, work: F)
    where
        F: Future<Output = AppEvent> + Send + 'static,
    {
        let tx = self.event_tx.clone();
        self.tasks.spawn(async move {
            let event = match catch_task_panic(work).await {
                Ok(event) => event,
                Err(error) => AppEvent::TaskPanicked { task, error },
            };
            if let Err(e) = tx.send(event).await {
                tracing::warn!(task = %task, error = %e, "Failed to send task result (receiver dropped)");
            }
        });
    }
}

/// Keep the first article for each url, preserving order.
pub fn dedup_by_url(articles: Vec<Article>) -> Vec<Article> {
    let mut seen = HashSet::new();
    articles
        .into_iter()
        .filter(|article| seen.insert(article.url.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::ChatClient;
    use pretty_assertions::assert_eq;
    use std::time::Duration;
    use tokio::sync::oneshot;

    async fn test_app() -> App {
        let db = Database::open(":memory:").await.unwrap();
        // Loopback port 9 is never contacted by these tests
        let news = NewsClient::new(
            reqwest::Client::new(),
            "http://127.0.0.1:9",
            None,
            "us",
            Duration::from_secs(1),
        )
        .unwrap();
        let chat = ChatClient::new(
            reqwest::Client::new(),
            "http://127.0.0.1:9",
            None,
            "gpt-3.5-turbo",
            Duration::from_secs(1),
        )
        .unwrap();
        App::new(db, Arc::new(news), Arc::new(Analyzer::new(chat)))
    }

    fn article(url: &str, title: &str) -> Article {
        Article {
            title: title.to_string(),
            description: None,
            url_to_image: None,
            url: url.to_string(),
            content: Some(format!("{} body", title)),
        }
    }

    fn ok_summary(text: &str) -> AiSummary {
        AiSummary {
            summary: text.to_string(),
            success: true,
            error: None,
        }
    }

    #[test]
    fn test_dedup_by_url_first_wins() {
        let merged = vec![
            article("https://a", "A from tech"),
            article("https://b", "B"),
            article("https://a", "A from science"),
        ];
        let deduped = dedup_by_url(merged);
        assert_eq!(deduped.len(), 2);
        assert_eq!(deduped[0].title, "A from tech");
        assert_eq!(deduped[1].url, "https://b");
    }

    #[test]
    fn test_dedup_keeps_same_content_different_url() {
        let mut a = article("https://a", "Same");
        let mut b = article("https://b", "Same");
        a.content = Some("identical".to_string());
        b.content = Some("identical".to_string());
        assert_eq!(dedup_by_url(vec![a, b]).len(), 2);
    }

    #[tokio::test]
    async fn test_stale_headlines_dropped() {
        let mut app = test_app().await;
        app.headlines_generation = 2;

        handle_app_event(
            &mut app,
            AppEvent::HeadlinesLoaded {
                category: "Sports".to_string(),
                generation: 1,
                result: Ok(vec![article("https://old", "Old")]),
            },
        );
        assert!(app.articles.is_empty());

        handle_app_event(
            &mut app,
            AppEvent::HeadlinesLoaded {
                category: "Technology".to_string(),
                generation: 2,
                result: Ok(vec![article("https://new", "New")]),
            },
        );
        assert_eq!(app.articles.len(), 1);
        assert_eq!(app.articles[0].url, "https://new");
    }

    #[tokio::test]
    async fn test_headline_failure_clears_list() {
        let mut app = test_app().await;
        app.articles = vec![article("https://x", "X")];
        app.headlines_generation = 1;

        handle_app_event(
            &mut app,
            AppEvent::HeadlinesLoaded {
                category: "General".to_string(),
                generation: 1,
                result: Err("HTTP error: status 500".to_string()),
            },
        );
        assert!(app.articles.is_empty());
        assert!(app.status_message.is_some());
    }

    #[tokio::test]
    async fn test_blank_search_clears_without_task() {
        let mut app = test_app().await;
        app.search_results = vec![article("https://x", "X")];

        app.search("");

        assert!(app.search_results.is_empty());
        assert_eq!(app.pending_tasks(), 0);
    }

    #[tokio::test]
    async fn test_whitespace_search_spawns_request() {
        let mut app = test_app().await;

        app.search("  ");

        assert_eq!(app.search_query, "  ");
        assert_eq!(app.pending_tasks(), 1);
    }

    #[tokio::test]
    async fn test_out_of_order_category_events_keep_latest() {
        let mut app = test_app().await;
        app.favorite_categories_generation = 2;
        app.category_toggle_in_flight = true;

        handle_app_event(
            &mut app,
            AppEvent::FavoriteCategoriesChanged {
                generation: 2,
                result: Ok(vec!["Sports".to_string(), "Health".to_string()]),
            },
        );
        handle_app_event(
            &mut app,
            AppEvent::FavoriteCategoriesChanged {
                generation: 1,
                result: Ok(vec!["Sports".to_string()]),
            },
        );

        assert_eq!(app.favorite_categories, vec!["Sports", "Health"]);
        assert!(!app.category_toggle_in_flight);
    }

    #[tokio::test]
    async fn test_category_toggles_run_one_at_a_time() {
        let mut app = test_app().await;

        app.toggle_favorite_category("Sports");
        app.toggle_favorite_category("Health");
        app.toggle_favorite_category("Sports");
        app.toggle_favorite_category("Science");
        assert_eq!(app.pending_tasks(), 1);

        app.run_until_idle().await;

        let stored = app.db.get_favorite_categories().await.unwrap();
        assert_eq!(stored, vec!["Health", "Science"]);
        assert_eq!(app.favorite_categories, stored);
        assert_eq!(app.favorite_categories_generation, 4);
    }

    async fn explode_toggle() -> AppEvent {
        panic!("toggle exploded")
    }

    #[tokio::test]
    async fn test_panicked_toggle_releases_queue() {
        let mut app = test_app().await;
        app.category_toggle_in_flight = true;
        app.favorite_categories_generation = 1;
        app.category_toggles.push_back("Health".to_string());

        app.spawn_task(Task::FavoriteCategory { generation: 1 }, explode_toggle());
        app.run_until_idle().await;

        assert_eq!(app.favorite_categories, vec!["Health"]);
        assert_eq!(
            app.db.get_favorite_categories().await.unwrap(),
            vec!["Health"]
        );
    }

    #[tokio::test]
    async fn test_clear_ai_discards_late_results() {
        let mut app = test_app().await;
        let a = article("https://a", "A");

        let generation = app.begin_ai_call(&a);
        assert!(app.is_ai_loading());

        app.clear_ai_analysis();
        assert!(!app.is_ai_loading());

        handle_app_event(
            &mut app,
            AppEvent::SummaryReady {
                generation,
                summary: ok_summary("late"),
            },
        );
        assert_eq!(app.ai_summary, None);
        assert!(!app.is_ai_loading());
    }

    #[tokio::test]
    async fn test_loading_flag_tracks_outstanding_calls() {
        let mut app = test_app().await;
        let a = article("https://a", "A");

        let generation = app.begin_ai_call(&a);
        app.begin_ai_call(&a);
        assert_eq!(app.ai_in_flight, 2);

        handle_app_event(
            &mut app,
            AppEvent::SummaryReady {
                generation,
                summary: ok_summary("done"),
            },
        );
        assert!(app.is_ai_loading());

        handle_app_event(
            &mut app,
            AppEvent::InsightsReady {
                generation,
                insights: ArticleInsights::failed("boom"),
            },
        );
        assert!(!app.is_ai_loading());
        assert_eq!(app.ai_summary.as_ref().map(|s| s.summary.as_str()), Some("done"));
        assert!(app.insights.as_ref().is_some_and(|i| !i.success));
    }

    #[tokio::test]
    async fn test_new_article_resets_ai_cells() {
        let mut app = test_app().await;
        let a = article("https://a", "A");
        let b = article("https://b", "B");

        let first = app.begin_ai_call(&a);
        handle_app_event(
            &mut app,
            AppEvent::SummaryReady {
                generation: first,
                summary: ok_summary("about a"),
            },
        );
        assert!(app.ai_summary.is_some());

        let second = app.begin_ai_call(&b);
        assert_ne!(first, second);
        assert_eq!(app.ai_summary, None);
        assert_eq!(app.ai_article_url.as_deref(), Some("https://b"));
    }

    async fn explode() -> AppEvent {
        panic!("analysis exploded")
    }

    #[tokio::test]
    async fn test_panicked_task_surfaces_on_status() {
        let mut app = test_app().await;
        let generation = app.begin_ai_call(&article("https://a", "A"));

        app.spawn_task(Task::Ai { generation }, explode());
        app.run_until_idle().await;

        assert_eq!(
            app.status_message.as_deref(),
            Some("Internal error in AI analysis task")
        );
        assert!(!app.is_ai_loading());
    }

    #[tokio::test]
    async fn test_drop_aborts_outstanding_tasks() {
        let mut app = test_app().await;
        let (guard_tx, guard_rx) = oneshot::channel::<()>();

        app.spawn_task(Task::Search, async move {
            let _guard = guard_tx;
            std::future::pending::<AppEvent>().await
        });
        assert_eq!(app.pending_tasks(), 1);

        drop(app);
        assert!(guard_rx.await.is_err());
    }

    #[tokio::test]
    async fn test_saved_articles_follow_store() {
        let mut app = test_app().await;

        app.add_saved(&article("https://a", "A"));
        app.run_until_idle().await;
        assert_eq!(app.saved_articles.len(), 1);
        assert_eq!(app.status_message.as_deref(), Some("Saved: A"));

        // Mutation through another handle is picked up too
        app.db.add_to_favorites(&article("https://b", "B")).await.unwrap();
        app.run_until_idle().await;
        assert_eq!(app.saved_articles.len(), 2);

        app.clear_saved();
        app.run_until_idle().await;
        assert!(app.saved_articles.is_empty());
    }

    #[tokio::test]
    async fn test_toggle_saved_twice() {
        let mut app = test_app().await;
        let a = article("https://a", "A");

        app.toggle_saved(&a);
        app.run_until_idle().await;
        assert_eq!(app.saved_articles.len(), 1);

        app.toggle_saved(&a);
        app.run_until_idle().await;
        assert!(app.saved_articles.is_empty());
        assert_eq!(app.status_message.as_deref(), Some("Removed: A"));
    }

    #[tokio::test]
    async fn test_banner_articles_capped() {
        let mut app = test_app().await;
        app.articles = (0..6)
            .map(|i| article(&format!("https://{i}"), &format!("T{i}")))
            .collect();
        assert_eq!(app.banner_articles().len(), BANNER_SIZE);

        app.articles.truncate(2);
        assert_eq!(app.banner_articles().len(), 2);
    }
}
