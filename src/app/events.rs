use super::tasks::Task;
use super::App;
use crate::ai::{AiSummary, ArticleInsights, SentimentAnalysis};
use crate::api::Article;

/// Completion messages sent from background tasks to the state owner.
///
/// Every fetch family carries the generation it was spawned under; the
/// handler drops any result whose generation is no longer current.
#[derive(Debug)]
pub enum AppEvent {
    HeadlinesLoaded {
        category: String,
        generation: u64,
        result: Result<Vec<Article>, String>,
    },
    SearchCompleted {
        query: String,
        generation: u64,
        result: Result<Vec<Article>, String>,
    },
    /// The favorite-categories preference was rewritten.
    FavoriteCategoriesChanged {
        generation: u64,
        result: Result<Vec<String>, String>,
    },
    /// Headlines for every favorite category, merged and deduplicated.
    CategoryArticlesLoaded {
        generation: u64,
        articles: Vec<Article>,
    },
    SummaryReady {
        generation: u64,
        summary: AiSummary,
    },
    SentimentReady {
        generation: u64,
        sentiment: SentimentAnalysis,
    },
    InsightsReady {
        generation: u64,
        insights: ArticleInsights,
    },
    /// A saved-articles mutation finished. `Ok` carries a status message.
    SavedUpdated {
        result: Result<String, String>,
    },
    TaskPanicked {
        task: Task,
        error: String,
    },
}

/// Apply one event to the state cells.
pub fn handle_app_event(app: &mut App, event: AppEvent) {
    match event {
        AppEvent::HeadlinesLoaded {
            category,
            generation,
            result,
        } => handle_headlines_loaded(app, category, generation, result),
        AppEvent::SearchCompleted {
            query,
            generation,
            result,
        } => handle_search_completed(app, query, generation, result),
        AppEvent::FavoriteCategoriesChanged { generation, result } => {
            handle_favorite_categories_changed(app, generation, result)
        }
        AppEvent::CategoryArticlesLoaded {
            generation,
            articles,
        } => {
            if generation != app.category_articles_generation {
                tracing::debug!(
                    expected = app.category_articles_generation,
                    got = generation,
                    "Ignoring stale category articles (generation mismatch)"
                );
                return;
            }
            tracing::debug!(count = articles.len(), "Favorite category articles loaded");
            app.category_articles = articles;
        }
        AppEvent::SummaryReady {
            generation,
            summary,
        } => {
            if accept_ai_result(app, generation, "summary") {
                app.ai_summary = Some(summary);
            }
        }
        AppEvent::SentimentReady {
            generation,
            sentiment,
        } => {
            if accept_ai_result(app, generation, "sentiment") {
                app.sentiment = Some(sentiment);
            }
        }
        AppEvent::InsightsReady {
            generation,
            insights,
        } => {
            if accept_ai_result(app, generation, "insights") {
                app.insights = Some(insights);
            }
        }
        AppEvent::SavedUpdated { result } => match result {
            Ok(message) => app.set_status(message),
            Err(e) => {
                tracing::warn!(error = %e, "Saved articles update failed");
                app.set_status(format!("Saved articles: {}", e));
            }
        },
        AppEvent::TaskPanicked { task, error } => {
            tracing::error!(task = %task, error = %error, "Background task panicked");
            app.set_status(format!("Internal error in {} task", task));
            match task {
                Task::Ai { generation } if generation == app.ai_generation => {
                    app.ai_in_flight = app.ai_in_flight.saturating_sub(1);
                }
                Task::FavoriteCategory { generation }
                    if generation == app.favorite_categories_generation =>
                {
                    app.finish_category_toggle();
                }
                _ => {}
            }
        }
    }
}

fn handle_headlines_loaded(
    app: &mut App,
    category: String,
    generation: u64,
    result: Result<Vec<Article>, String>,
) {
    if generation != app.headlines_generation {
        tracing::debug!(
            expected = app.headlines_generation,
            got = generation,
            category = %category,
            "Ignoring stale headlines (generation mismatch)"
        );
        return;
    }

    match result {
        Ok(articles) => {
            tracing::debug!(category = %category, count = articles.len(), "Headlines loaded");
            app.articles = articles;
        }
        Err(e) => {
            tracing::warn!(category = %category, error = %e, "Failed to load headlines");
            app.articles.clear();
            app.set_status(format!("Failed to load {} headlines", category));
        }
    }
}

fn handle_favorite_categories_changed(
    app: &mut App,
    generation: u64,
    result: Result<Vec<String>, String>,
) {
    if generation != app.favorite_categories_generation {
        tracing::debug!(
            expected = app.favorite_categories_generation,
            got = generation,
            "Ignoring stale favorite categories (generation mismatch)"
        );
        return;
    }

    match result {
        Ok(categories) => {
            app.favorite_categories = categories;
            // Queued toggles refetch once the last of them lands
            if !app.finish_category_toggle() {
                app.load_category_articles();
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, "Failed to update favorite categories");
            app.set_status(format!("Could not update favorite categories: {}", e));
            app.finish_category_toggle();
        }
    }
}

fn handle_search_completed(
    app: &mut App,
    query: String,
    generation: u64,
    result: Result<Vec<Article>, String>,
) {
    if generation != app.search_generation {
        tracing::debug!(
            expected = app.search_generation,
            got = generation,
            query = %query,
            "Ignoring stale search result (generation mismatch)"
        );
        return;
    }

    match result {
        Ok(articles) => {
            tracing::debug!(query = %query, count = articles.len(), "Search completed");
            app.search_results = articles;
        }
        Err(e) => {
            tracing::warn!(query = %query, error = %e, "Search failed");
            app.search_results.clear();
            app.set_status(format!("Search failed: {}", e));
        }
    }
}

/// Check an AI completion against the current generation, releasing one
/// unit of the loading counter when it is accepted.
fn accept_ai_result(app: &mut App, generation: u64, kind: &str) -> bool {
    if generation != app.ai_generation {
        tracing::debug!(
            expected = app.ai_generation,
            got = generation,
            kind,
            "Ignoring stale AI result (generation mismatch)"
        );
        return false;
    }
    app.ai_in_flight = app.ai_in_flight.saturating_sub(1);
    true
}
