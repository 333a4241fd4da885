use thiserror::Error;

use crate::api::Article;

// ============================================================================
// Error Types
// ============================================================================

/// Database-specific errors with user-friendly messages
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Another instance of the application has locked the database
    #[error("Another instance of newsdesk appears to be running. Please close it and try again.")]
    InstanceLocked,

    /// Migration failed
    #[error("Database migration failed: {0}")]
    Migration(String),

    /// Generic database error
    #[error("Database error: {0}")]
    Other(#[from] sqlx::Error),
}

impl DatabaseError {
    /// Check if a sqlx error indicates database locking
    pub(crate) fn from_sqlx(err: sqlx::Error) -> Self {
        if is_lock_message(&err.to_string()) {
            return DatabaseError::InstanceLocked;
        }
        DatabaseError::Other(err)
    }
}

/// SQLITE_BUSY (5), SQLITE_LOCKED (6) and SQLITE_CANTOPEN (14) all surface as
/// one of these messages.
pub(crate) fn is_lock_message(message: &str) -> bool {
    let lower = message.to_lowercase();
    lower.contains("database is locked")
        || lower.contains("database table is locked")
        || lower.contains("sqlite_busy")
        || lower.contains("sqlite_locked")
        || lower.contains("unable to open database file")
}

// ============================================================================
// Data Structures
// ============================================================================

/// An article the user saved locally, keyed by its URL.
///
/// `saved_at` is milliseconds since the Unix epoch.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct FavoriteArticle {
    pub url: String,
    pub title: String,
    pub description: Option<String>,
    pub url_to_image: Option<String>,
    pub content: Option<String>,
    pub saved_at: i64,
}

impl FavoriteArticle {
    /// Project an API article into a saved row stamped with the current time.
    pub fn from_article(article: &Article) -> Self {
        Self {
            url: article.url.clone(),
            title: article.title.clone(),
            description: article.description.clone(),
            url_to_image: article.url_to_image.clone(),
            content: article.content.clone(),
            saved_at: chrono::Utc::now().timestamp_millis(),
        }
    }

    pub fn into_article(self) -> Article {
        Article {
            title: self.title,
            description: self.description,
            url_to_image: self.url_to_image,
            url: self.url,
            content: self.content,
        }
    }
}
