use anyhow::{bail, Context, Result};

use super::schema::Database;
use crate::util::strip_control_chars;

/// Preference key holding the JSON-encoded list of favorite categories.
pub const FAVORITE_CATEGORIES_KEY: &str = "favorite_categories";

/// Preference key holding the last selected headline category.
pub const SELECTED_CATEGORY_KEY: &str = "session.category";

impl Database {
    // ========================================================================
    // User Preferences Operations
    // ========================================================================

    /// Get a single preference value by key, or `None` if not set.
    pub async fn get_preference(&self, key: &str) -> Result<Option<String>> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT value FROM user_preferences WHERE key = ?")
                .bind(key)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.map(|(value,)| value))
    }

    /// Set a preference value (UPSERT), refreshing its timestamp.
    pub async fn set_preference(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO user_preferences (key, value, updated_at)
            VALUES (?, ?, datetime('now'))
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
        "#,
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Get all preferences whose key starts with `prefix`, ordered by key.
    pub async fn get_preferences_by_prefix(&self, prefix: &str) -> Result<Vec<(String, String)>> {
        let pattern = format!("{}%", prefix);
        let rows: Vec<(String, String)> =
            sqlx::query_as("SELECT key, value FROM user_preferences WHERE key LIKE ? ORDER BY key")
                .bind(&pattern)
                .fetch_all(&self.pool)
                .await?;

        Ok(rows)
    }

    // ========================================================================
    // Favorite Categories
    // ========================================================================

    /// The user's favorite categories in the order they were added.
    ///
    /// Returns an empty list when the preference was never written. A value
    /// that no longer decodes is logged and treated the same way.
    pub async fn get_favorite_categories(&self) -> Result<Vec<String>> {
        let Some(raw) = self.get_preference(FAVORITE_CATEGORIES_KEY).await? else {
            return Ok(Vec::new());
        };
        Ok(decode_categories(&raw))
    }

    /// Replace the stored list with `categories`, re-encoding the whole list.
    pub async fn set_favorite_categories(&self, categories: &[String]) -> Result<()> {
        let encoded =
            serde_json::to_string(categories).context("Failed to encode favorite categories")?;
        self.set_preference(FAVORITE_CATEGORIES_KEY, &encoded).await
    }

    /// Remove `name` from the favorites if present, otherwise append it.
    ///
    /// The read and the rewrite run in one transaction, so the stored list is
    /// always the post-mutation set. Returns that set.
    ///
    /// The transaction opens with a write so it holds the write lock before it
    /// reads. Concurrent toggles then queue on the busy timeout instead of
    /// failing to upgrade a shared lock.
    pub async fn toggle_favorite_category(&self, name: &str) -> Result<Vec<String>> {
        let name = sanitize_category_name(name)?;
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO user_preferences (key, value, updated_at)
            VALUES (?, '[]', datetime('now'))
            ON CONFLICT(key) DO NOTHING
        "#,
        )
        .bind(FAVORITE_CATEGORIES_KEY)
        .execute(&mut *tx)
        .await?;

        let row: Option<(String,)> =
            sqlx::query_as("SELECT value FROM user_preferences WHERE key = ?")
                .bind(FAVORITE_CATEGORIES_KEY)
                .fetch_optional(&mut *tx)
                .await?;
        let mut categories = row.map(|(raw,)| decode_categories(&raw)).unwrap_or_default();

        let removed = if let Some(pos) = categories.iter().position(|c| *c == name) {
            categories.remove(pos);
            true
        } else {
            categories.push(name.clone());
            false
        };

        let encoded =
            serde_json::to_string(&categories).context("Failed to encode favorite categories")?;
        sqlx::query(
            r#"
            INSERT INTO user_preferences (key, value, updated_at)
            VALUES (?, ?, datetime('now'))
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
        "#,
        )
        .bind(FAVORITE_CATEGORIES_KEY)
        .bind(&encoded)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        tracing::info!(category = %name, removed, total = categories.len(), "Favorite categories updated");
        Ok(categories)
    }

    // ========================================================================
    // Selected Category
    // ========================================================================

    pub async fn get_selected_category(&self) -> Result<Option<String>> {
        self.get_preference(SELECTED_CATEGORY_KEY).await
    }

    pub async fn set_selected_category(&self, name: &str) -> Result<()> {
        let name = sanitize_category_name(name)?;
        self.set_preference(SELECTED_CATEGORY_KEY, &name).await
    }
}

/// Strip control characters and surrounding whitespace; reject empty names.
fn sanitize_category_name(name: &str) -> Result<String> {
    let sanitized = strip_control_chars(name);
    let trimmed = sanitized.trim();
    if trimmed.is_empty() {
        bail!("Category name cannot be empty or whitespace-only");
    }
    Ok(trimmed.to_owned())
}

fn decode_categories(raw: &str) -> Vec<String> {
    match serde_json::from_str::<Vec<String>>(raw) {
        Ok(list) => list,
        Err(e) => {
            tracing::warn!(error = %e, "Stored favorite categories are not a JSON list, ignoring");
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Database;
    use pretty_assertions::assert_eq;

    async fn test_db() -> Database {
        Database::open(":memory:").await.unwrap()
    }

    #[tokio::test]
    async fn test_get_preference_missing() {
        let db = test_db().await;
        assert_eq!(db.get_preference("nonexistent.key").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_set_preference_upsert() {
        let db = test_db().await;
        db.set_preference("session.category", "Sports").await.unwrap();
        db.set_preference("session.category", "Health").await.unwrap();

        assert_eq!(
            db.get_preference("session.category").await.unwrap(),
            Some("Health".to_string())
        );
    }

    #[tokio::test]
    async fn test_get_preferences_by_prefix() {
        let db = test_db().await;
        db.set_preference("session.category", "Sports").await.unwrap();
        db.set_preference("session.query", "rust").await.unwrap();
        db.set_preference("sessions_total", "3").await.unwrap();

        let prefs = db.get_preferences_by_prefix("session.").await.unwrap();
        assert_eq!(
            prefs,
            vec![
                ("session.category".to_string(), "Sports".to_string()),
                ("session.query".to_string(), "rust".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_favorite_categories_absent_is_empty() {
        let db = test_db().await;
        assert!(db.get_favorite_categories().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_favorite_categories_stored_as_json() {
        let db = test_db().await;
        db.set_favorite_categories(&["Sports".to_string(), "Health".to_string()])
            .await
            .unwrap();

        assert_eq!(
            db.get_preference(FAVORITE_CATEGORIES_KEY).await.unwrap(),
            Some(r#"["Sports","Health"]"#.to_string())
        );
        assert_eq!(
            db.get_favorite_categories().await.unwrap(),
            vec!["Sports", "Health"]
        );
    }

    #[tokio::test]
    async fn test_toggle_adds_then_removes() {
        let db = test_db().await;

        let after_add = db.toggle_favorite_category("Technology").await.unwrap();
        assert_eq!(after_add, vec!["Technology"]);
        assert_eq!(db.get_favorite_categories().await.unwrap(), after_add);

        db.toggle_favorite_category("Sports").await.unwrap();
        let after_remove = db.toggle_favorite_category("Technology").await.unwrap();
        assert_eq!(after_remove, vec!["Sports"]);
        assert_eq!(db.get_favorite_categories().await.unwrap(), vec!["Sports"]);
    }

    #[tokio::test]
    async fn test_toggle_preserves_insertion_order() {
        let db = test_db().await;
        for name in ["Health", "Business", "Science"] {
            db.toggle_favorite_category(name).await.unwrap();
        }
        assert_eq!(
            db.get_favorite_categories().await.unwrap(),
            vec!["Health", "Business", "Science"]
        );
    }

    #[tokio::test]
    async fn test_toggle_sanitizes_name() {
        let db = test_db().await;
        let list = db.toggle_favorite_category("  Sports\x1b[0m ").await.unwrap();
        assert_eq!(list, vec!["Sports"]);

        assert!(db.toggle_favorite_category("   ").await.is_err());
        assert_eq!(db.get_favorite_categories().await.unwrap(), vec!["Sports"]);
    }

    #[tokio::test]
    async fn test_corrupt_value_treated_as_absent() {
        let db = test_db().await;
        db.set_preference(FAVORITE_CATEGORIES_KEY, "not json").await.unwrap();
        assert!(db.get_favorite_categories().await.unwrap().is_empty());

        let list = db.toggle_favorite_category("Science").await.unwrap();
        assert_eq!(list, vec!["Science"]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_toggles_on_file_db_all_land() {
        let dir = std::env::temp_dir().join(format!(
            "newsdesk-prefs-concurrent-{}",
            std::process::id()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("prefs.db");
        let db = Database::open(path.to_str().unwrap()).await.unwrap();

        let names: Vec<String> = (0..7).map(|i| format!("Category{}", i)).collect();
        for round in 0..20 {
            let toggles = names.iter().map(|name| {
                let db = db.clone();
                let name = name.clone();
                tokio::spawn(async move { db.toggle_favorite_category(&name).await })
            });
            for result in futures::future::join_all(toggles).await {
                result.unwrap().unwrap();
            }

            let mut stored = db.get_favorite_categories().await.unwrap();
            stored.sort();
            if round % 2 == 0 {
                assert_eq!(stored, names, "round {} should add every name", round);
            } else {
                assert!(stored.is_empty(), "round {} should remove every name", round);
            }
        }

        drop(db);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_selected_category_round_trip() {
        let db = test_db().await;
        assert_eq!(db.get_selected_category().await.unwrap(), None);

        db.set_selected_category("Business").await.unwrap();
        assert_eq!(
            db.get_selected_category().await.unwrap(),
            Some("Business".to_string())
        );
    }
}
