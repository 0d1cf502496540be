//! API request handlers

pub mod hashtag;
pub mod health;
pub mod proxy;
pub mod search;
pub mod sound;
pub mod trending;
pub mod user;
pub mod video;
