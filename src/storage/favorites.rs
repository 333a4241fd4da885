use anyhow::{Context, Result};
use tokio::sync::watch;

use super::schema::Database;
use super::types::FavoriteArticle;
use crate::api::Article;

impl Database {
    // ========================================================================
    // Favorite Article Operations
    // ========================================================================

    /// Insert a favorite, replacing any existing row with the same URL.
    pub async fn insert_favorite(&self, favorite: &FavoriteArticle) -> Result<()> {
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO favorite_articles
                (url, title, description, url_to_image, content, saved_at)
            VALUES (?, ?, ?, ?, ?, ?)
        "#,
        )
        .bind(&favorite.url)
        .bind(&favorite.title)
        .bind(&favorite.description)
        .bind(&favorite.url_to_image)
        .bind(&favorite.content)
        .bind(favorite.saved_at)
        .execute(&self.pool)
        .await
        .with_context(|| format!("Failed to save favorite {}", favorite.url))?;

        self.notify_favorites_changed();
        Ok(())
    }

    /// Save an API article as a favorite, stamped with the current time.
    pub async fn add_to_favorites(&self, article: &Article) -> Result<()> {
        self.insert_favorite(&FavoriteArticle::from_article(article))
            .await
    }

    pub async fn get_favorite(&self, url: &str) -> Result<Option<FavoriteArticle>> {
        let row = sqlx::query_as::<_, FavoriteArticle>(
            r#"
            SELECT url, title, description, url_to_image, content, saved_at
            FROM favorite_articles
            WHERE url = ?
        "#,
        )
        .bind(url)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    pub async fn is_favorite(&self, url: &str) -> Result<bool> {
        let row: (bool,) =
            sqlx::query_as("SELECT EXISTS(SELECT 1 FROM favorite_articles WHERE url = ?)")
                .bind(url)
                .fetch_one(&self.pool)
                .await?;
        Ok(row.0)
    }

    /// Remove a favorite by URL. Returns true if a row was deleted.
    pub async fn delete_favorite(&self, url: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM favorite_articles WHERE url = ?")
            .bind(url)
            .execute(&self.pool)
            .await?;

        let removed = result.rows_affected() > 0;
        if removed {
            self.notify_favorites_changed();
        }
        Ok(removed)
    }

    /// Remove every favorite. Returns the number of rows deleted.
    pub async fn delete_all_favorites(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM favorite_articles")
            .execute(&self.pool)
            .await?;

        let removed = result.rows_affected();
        if removed > 0 {
            self.notify_favorites_changed();
        }
        Ok(removed)
    }

    pub async fn count_favorites(&self) -> Result<i64> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM favorite_articles")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.0)
    }

    /// All favorites, most recently saved first.
    ///
    /// Rows saved within the same millisecond fall back to insertion order
    /// (rowid), newest first.
    pub async fn get_all_favorites(&self) -> Result<Vec<FavoriteArticle>> {
        let rows = sqlx::query_as::<_, FavoriteArticle>(
            r#"
            SELECT url, title, description, url_to_image, content, saved_at
            FROM favorite_articles
            ORDER BY saved_at DESC, rowid DESC
        "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Remove the article if it is saved, otherwise save it.
    ///
    /// Returns the new saved state (`true` = now a favorite).
    pub async fn toggle_favorite(&self, article: &Article) -> Result<bool> {
        let favorite = FavoriteArticle::from_article(article);
        let mut tx = self.pool.begin().await?;

        let deleted = sqlx::query("DELETE FROM favorite_articles WHERE url = ?")
            .bind(&article.url)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        if deleted == 0 {
            sqlx::query(
                r#"
                INSERT INTO favorite_articles
                    (url, title, description, url_to_image, content, saved_at)
                VALUES (?, ?, ?, ?, ?, ?)
            "#,
            )
            .bind(&favorite.url)
            .bind(&favorite.title)
            .bind(&favorite.description)
            .bind(&favorite.url_to_image)
            .bind(&favorite.content)
            .bind(favorite.saved_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        self.notify_favorites_changed();

        let saved = deleted == 0;
        tracing::debug!(url = %article.url, saved, "Favorite toggled");
        Ok(saved)
    }

    // ========================================================================
    // Change Notification
    // ========================================================================

    /// Subscribe to favorites changes.
    ///
    /// The returned handle wakes after every mutation made through any clone
    /// of this database and re-runs whichever query the caller asks for.
    pub fn watch_favorites(&self) -> FavoritesWatch {
        FavoritesWatch {
            db: self.clone(),
            revision: self.favorites_revision.subscribe(),
        }
    }

    fn notify_favorites_changed(&self) {
        self.favorites_revision.send_modify(|rev| *rev = rev.wrapping_add(1));
    }
}

/// Push-based view over the favorites table.
///
/// Mirrors an observable query: read the current value, then await
/// [`FavoritesWatch::changed`] and read again.
pub struct FavoritesWatch {
    db: Database,
    revision: watch::Receiver<u64>,
}

impl FavoritesWatch {
    /// Wait for the next mutation. Returns `false` if the change channel closed.
    pub async fn changed(&mut self) -> bool {
        self.revision.changed().await.is_ok()
    }

    /// True when a mutation happened since the last query through this handle.
    pub fn has_changed(&self) -> bool {
        self.revision.has_changed().unwrap_or(false)
    }

    /// Current list of favorites, marking the latest change as seen.
    pub async fn favorites(&mut self) -> Result<Vec<FavoriteArticle>> {
        self.revision.borrow_and_update();
        self.db.get_all_favorites().await
    }

    pub async fn count(&mut self) -> Result<i64> {
        self.revision.borrow_and_update();
        self.db.count_favorites().await
    }

    pub async fn contains(&mut self, url: &str) -> Result<bool> {
        self.revision.borrow_and_update();
        self.db.is_favorite(url).await
    }
}
