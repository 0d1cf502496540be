//! Scraping services
//!
//! The web session backend and the scraping operations built on top of the
//! lease coordinator.

mod scrape;
mod video_id;
mod web;

pub use scrape::ScrapeService;
pub use video_id::extract_video_id;
pub use web::{WebSession, WebSessionBackend, DEFAULT_USER_AGENT, PLATFORM_BASE_URL};
