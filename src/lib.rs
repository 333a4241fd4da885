//! newsdesk: category headlines, search, saved articles and AI-assisted
//! article analysis over a news API and a local SQLite store.

pub mod ai;
pub mod api;
pub mod app;
pub mod config;
pub mod storage;
pub mod util;

pub use app::App;
pub use config::Config;
