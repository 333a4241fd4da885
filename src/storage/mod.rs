mod favorites;
mod preferences;
mod schema;
mod types;

pub use favorites::FavoritesWatch;
pub use preferences::{FAVORITE_CATEGORIES_KEY, SELECTED_CATEGORY_KEY};
pub use schema::Database;
pub use types::{DatabaseError, FavoriteArticle};
