//! Integration tests for saved articles and category preferences.
//!
//! Each test creates its own in-memory SQLite database for isolation.
//! These tests exercise the storage layer end-to-end, verifying that
//! favorites, preferences and the change watch compose correctly.

use newsdesk::api::Article;
use newsdesk::storage::{Database, FavoriteArticle, FAVORITE_CATEGORIES_KEY};

async fn test_db() -> Database {
    Database::open(":memory:").await.unwrap()
}

fn test_article(slug: &str, title: &str) -> Article {
    Article {
        title: title.to_string(),
        description: Some(format!("{} description", title)),
        url_to_image: Some(format!("https://img.example.com/{}.jpg", slug)),
        url: format!("https://example.com/{}", slug),
        content: None,
    }
}

fn favorite_at(slug: &str, saved_at: i64) -> FavoriteArticle {
    FavoriteArticle {
        saved_at,
        ..FavoriteArticle::from_article(&test_article(slug, slug))
    }
}

// ============================================================================
// Saved Articles
// ============================================================================

#[tokio::test]
async fn test_toggle_on_fresh_store_adds_then_removes() {
    let db = test_db().await;
    let article = test_article("one", "One");

    assert!(db.toggle_favorite(&article).await.unwrap());
    assert!(db.is_favorite(&article.url).await.unwrap());
    assert_eq!(db.count_favorites().await.unwrap(), 1);

    assert!(!db.toggle_favorite(&article).await.unwrap());
    assert!(!db.is_favorite(&article.url).await.unwrap());
    assert_eq!(db.count_favorites().await.unwrap(), 0);
}

#[tokio::test]
async fn test_saved_list_newest_first() {
    let db = test_db().await;
    db.insert_favorite(&favorite_at("old", 1_000)).await.unwrap();
    db.insert_favorite(&favorite_at("new", 3_000)).await.unwrap();
    db.insert_favorite(&favorite_at("mid", 2_000)).await.unwrap();

    let urls: Vec<String> = db
        .get_all_favorites()
        .await
        .unwrap()
        .into_iter()
        .map(|f| f.url)
        .collect();
    assert_eq!(
        urls,
        vec![
            "https://example.com/new",
            "https://example.com/mid",
            "https://example.com/old"
        ]
    );
}

#[tokio::test]
async fn test_resaving_replaces_by_url() {
    let db = test_db().await;
    let mut article = test_article("story", "Draft headline");
    db.add_to_favorites(&article).await.unwrap();

    article.title = "Final headline".to_string();
    db.add_to_favorites(&article).await.unwrap();

    assert_eq!(db.count_favorites().await.unwrap(), 1);
    let saved = db.get_favorite(&article.url).await.unwrap().unwrap();
    assert_eq!(saved.title, "Final headline");
}

#[tokio::test]
async fn test_delete_all_then_count() {
    let db = test_db().await;
    for slug in ["a", "b", "c"] {
        db.add_to_favorites(&test_article(slug, slug)).await.unwrap();
    }

    assert_eq!(db.delete_all_favorites().await.unwrap(), 3);
    assert_eq!(db.count_favorites().await.unwrap(), 0);
    assert!(db.get_all_favorites().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_watch_sees_mutations_from_clones() {
    let db = test_db().await;
    let mut watch = db.watch_favorites();
    assert!(!watch.has_changed());

    let writer = db.clone();
    let article = test_article("watched", "Watched");
    let handle = tokio::spawn(async move {
        writer.add_to_favorites(&article).await.unwrap();
    });

    assert!(watch.changed().await);
    handle.await.unwrap();

    assert_eq!(watch.count().await.unwrap(), 1);
    assert!(watch.contains("https://example.com/watched").await.unwrap());
    assert!(!watch.has_changed());
}

// ============================================================================
// Category Preferences
// ============================================================================

#[tokio::test]
async fn test_favorite_categories_toggle_sequence() {
    let db = test_db().await;
    assert!(db.get_favorite_categories().await.unwrap().is_empty());

    assert_eq!(
        db.toggle_favorite_category("Sports").await.unwrap(),
        vec!["Sports"]
    );
    assert_eq!(
        db.toggle_favorite_category("Health").await.unwrap(),
        vec!["Sports", "Health"]
    );
    assert_eq!(
        db.toggle_favorite_category("Sports").await.unwrap(),
        vec!["Health"]
    );
    assert_eq!(db.get_favorite_categories().await.unwrap(), vec!["Health"]);
}

#[tokio::test]
async fn test_corrupt_category_preference_reads_as_empty() {
    let db = test_db().await;
    db.set_preference(FAVORITE_CATEGORIES_KEY, "not json")
        .await
        .unwrap();

    assert!(db.get_favorite_categories().await.unwrap().is_empty());

    // The next toggle rewrites the whole list
    assert_eq!(
        db.toggle_favorite_category("Science").await.unwrap(),
        vec!["Science"]
    );
}

#[tokio::test]
async fn test_selected_category_persists_across_reopen() {
    let dir = std::env::temp_dir().join(format!("newsdesk-test-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("prefs.db");
    let path_str = path.to_str().unwrap();

    {
        let db = Database::open(path_str).await.unwrap();
        db.set_selected_category("Entertainment").await.unwrap();
    }

    let db = Database::open(path_str).await.unwrap();
    assert_eq!(
        db.get_selected_category().await.unwrap().as_deref(),
        Some("Entertainment")
    );

    drop(db);
    let _ = std::fs::remove_dir_all(&dir);
}
