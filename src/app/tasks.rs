use futures::FutureExt;
use std::fmt;
use std::panic::AssertUnwindSafe;

/// The kind of background work a task performs.
///
/// AI and category-toggle tasks carry the generation they were spawned under
/// so a panic releases their in-flight state only while it is still current.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Task {
    Headlines,
    Search,
    FavoriteCategory { generation: u64 },
    CategoryArticles,
    Ai { generation: u64 },
    Saved,
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Task::Headlines => "headlines",
            Task::Search => "search",
            Task::FavoriteCategory { .. } => "favorite category",
            Task::CategoryArticles => "category articles",
            Task::Ai { .. } => "AI analysis",
            Task::Saved => "saved articles",
        };
        f.write_str(name)
    }
}

/// Run a future, turning a panic into `Err(message)`.
pub(crate) async fn catch_task_panic<F, T>(future: F) -> Result<T, String>
where
    F: std::future::Future<Output = T>,
{
    AssertUnwindSafe(future)
        .catch_unwind()
        .await
        .map_err(|panic| {
            if let Some(s) = panic.downcast_ref::<&'static str>() {
                s.to_string()
            } else if let Some(s) = panic.downcast_ref::<String>() {
                s.clone()
            } else {
                "Unknown panic".to_string()
            }
        })
}
