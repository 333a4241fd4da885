//! News API client: top headlines by category and free-text search.
//!
//! Requests go to a newsapi.org-compatible endpoint and deserialize into a
//! list of [`Article`] values. The client does not retry, paginate or cache;
//! callers decide what a failure means for them.

mod http;
mod news;

pub use news::{Article, NewsClient, NewsError, NewsResponse, CATEGORIES, DEFAULT_CATEGORY};

pub(crate) use http::{check_base_url, read_limited_text, ReadError};
