pub mod latest_news;

pub use latest_news::{LatestNewsTool, NewsItem, NEWS_UNAVAILABLE};
