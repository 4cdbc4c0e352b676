//! Clients for the external services the bot talks to.

pub mod content;
pub mod notion;
pub mod slack;

pub use content::{ContentService, HttpFetcher, PageFetcher};
pub use notion::NotionClient;
pub use slack::{SlackApi, SlackWebClient};
