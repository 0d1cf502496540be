//! Scraping operations
//!
//! Every public method runs inside exactly one lease. Item lists are paged
//! with the platform's `cursor`/`hasMore` protocol until `count` items have
//! been collected.

use std::future::Future;

use bytes::Bytes;
use serde_json::Value;
use tracing::{error, info, instrument};

use super::web::{WebSession, WebSessionBackend};
use crate::error::{GatewayError, Result};
use crate::models::{DownloadInfo, DownloadUrls, UpstreamHealth, VideoQuality};
use crate::session::{Lease, LeaseCoordinator};

const TRENDING_PATH: &str = "/api/recommend/item_list/";
const USER_DETAIL_PATH: &str = "/api/user/detail/";
const USER_POSTS_PATH: &str = "/api/post/item_list/";
const USER_LIST_PATH: &str = "/api/user/list/";
const VIDEO_DETAIL_PATH: &str = "/api/item/detail/";
const COMMENTS_PATH: &str = "/api/comment/list/";
const HASHTAG_DETAIL_PATH: &str = "/api/challenge/detail/";
const HASHTAG_ITEMS_PATH: &str = "/api/challenge/item_list/";
const SEARCH_USERS_PATH: &str = "/api/search/user/full/";
const SEARCH_VIDEOS_PATH: &str = "/api/search/item/full/";
const SOUND_DETAIL_PATH: &str = "/api/music/detail/";
const SOUND_ITEMS_PATH: &str = "/api/music/item_list/";

/// `scene` values of the user list endpoint
const FOLLOWERS_SCENE: &str = "67";
const FOLLOWING_SCENE: &str = "21";

/// Items requested per page
const PAGE_SIZE: usize = 30;
/// Hard cap on pages fetched for one call
const MAX_PAGES: usize = 10;

/// Scraping facade over the lease coordinator
pub struct ScrapeService {
    coordinator: LeaseCoordinator<WebSessionBackend>,
}

impl ScrapeService {
    pub fn new(coordinator: LeaseCoordinator<WebSessionBackend>) -> Self {
        Self { coordinator }
    }

    pub fn coordinator(&self) -> &LeaseCoordinator<WebSessionBackend> {
        &self.coordinator
    }

    #[instrument(skip(self, ms_token))]
    pub async fn trending_videos(&self, count: u32, ms_token: Option<String>) -> Result<Vec<Value>> {
        self.lease("trending videos", ms_token, move |lease| async move {
            collect_items(&lease.session, TRENDING_PATH, &[], "itemList", count).await
        })
        .await
    }

    #[instrument(skip(self, ms_token))]
    pub async fn user_info(&self, username: &str, ms_token: Option<String>) -> Result<Value> {
        let username = username.to_string();
        self.lease("user info", ms_token, move |lease| async move {
            user_detail(&lease.session, &username).await
        })
        .await
    }

    #[instrument(skip(self, ms_token))]
    pub async fn user_videos(
        &self,
        username: &str,
        count: u32,
        ms_token: Option<String>,
    ) -> Result<Vec<Value>> {
        let username = username.to_string();
        self.lease("user videos", ms_token, move |lease| async move {
            let detail = user_detail(&lease.session, &username).await?;
            let sec_uid = string_at(&detail, &["user", "secUid"])
                .ok_or_else(|| GatewayError::NotFound(format!("user {}", username)))?;

            collect_items(
                &lease.session,
                USER_POSTS_PATH,
                &[("secUid", sec_uid)],
                "itemList",
                count,
            )
            .await
        })
        .await
    }

    #[instrument(skip(self, ms_token))]
    pub async fn video_info(&self, video_id: &str, ms_token: Option<String>) -> Result<Value> {
        let video_id = video_id.to_string();
        self.lease("video info", ms_token, move |lease| async move {
            video_detail(&lease.session, &video_id).await
        })
        .await
    }

    #[instrument(skip(self, ms_token))]
    pub async fn video_comments(
        &self,
        video_id: &str,
        count: u32,
        ms_token: Option<String>,
    ) -> Result<Vec<Value>> {
        let video_id = video_id.to_string();
        self.lease("video comments", ms_token, move |lease| async move {
            collect_items(
                &lease.session,
                COMMENTS_PATH,
                &[("aweme_id", video_id)],
                "comments",
                count,
            )
            .await
        })
        .await
    }

    /// Media URLs and metadata for a video
    #[instrument(skip(self, ms_token))]
    pub async fn download_info(
        &self,
        video_id: &str,
        quality: VideoQuality,
        watermark: bool,
        ms_token: Option<String>,
    ) -> Result<DownloadInfo> {
        let video_id = video_id.to_string();
        self.lease("video download info", ms_token, move |lease| async move {
            let item = video_detail(&lease.session, &video_id).await?;
            Ok(DownloadInfo::from_video(&video_id, &item, quality, watermark))
        })
        .await
    }

    /// Fetch the video file itself
    ///
    /// Detail lookup and download share one lease, so the media is fetched
    /// with the same token and proxy that resolved its URL.
    #[instrument(skip(self, ms_token))]
    pub async fn video_bytes(
        &self,
        video_id: &str,
        quality: VideoQuality,
        watermark: bool,
        ms_token: Option<String>,
    ) -> Result<Bytes> {
        let video_id = video_id.to_string();
        self.lease("video download", ms_token, move |lease| async move {
            let item = video_detail(&lease.session, &video_id).await?;
            let urls = DownloadUrls::from_video(&item);
            let url = urls.pick(quality, watermark).ok_or_else(|| {
                GatewayError::NotFound(format!("downloadable media for video {}", video_id))
            })?;
            lease.session.get_bytes(url).await
        })
        .await
    }

    #[instrument(skip(self, ms_token))]
    pub async fn user_followers(
        &self,
        username: &str,
        count: u32,
        ms_token: Option<String>,
    ) -> Result<Vec<Value>> {
        self.user_list("user followers", username, FOLLOWERS_SCENE, count, ms_token)
            .await
    }

    #[instrument(skip(self, ms_token))]
    pub async fn user_following(
        &self,
        username: &str,
        count: u32,
        ms_token: Option<String>,
    ) -> Result<Vec<Value>> {
        self.user_list("user following", username, FOLLOWING_SCENE, count, ms_token)
            .await
    }

    async fn user_list(
        &self,
        operation: &'static str,
        username: &str,
        scene: &'static str,
        count: u32,
        ms_token: Option<String>,
    ) -> Result<Vec<Value>> {
        let username = username.to_string();
        self.lease(operation, ms_token, move |lease| async move {
            let detail = user_detail(&lease.session, &username).await?;
            let sec_uid = string_at(&detail, &["user", "secUid"])
                .ok_or_else(|| GatewayError::NotFound(format!("user {}", username)))?;

            collect_items(
                &lease.session,
                USER_LIST_PATH,
                &[("secUid", sec_uid), ("scene", scene.to_string())],
                "userList",
                count,
            )
            .await
        })
        .await
    }

    #[instrument(skip(self, ms_token))]
    pub async fn hashtag_info(&self, name: &str, ms_token: Option<String>) -> Result<Value> {
        let name = name.to_string();
        self.lease("hashtag info", ms_token, move |lease| async move {
            hashtag_detail(&lease.session, &name).await
        })
        .await
    }

    #[instrument(skip(self, ms_token))]
    pub async fn hashtag_videos(
        &self,
        name: &str,
        count: u32,
        ms_token: Option<String>,
    ) -> Result<Vec<Value>> {
        let name = name.to_string();
        self.lease("hashtag videos", ms_token, move |lease| async move {
            let detail = hashtag_detail(&lease.session, &name).await?;
            let challenge_id = string_at(&detail, &["challenge", "id"])
                .ok_or_else(|| GatewayError::NotFound(format!("hashtag #{}", name)))?;

            collect_items(
                &lease.session,
                HASHTAG_ITEMS_PATH,
                &[("challengeID", challenge_id)],
                "itemList",
                count,
            )
            .await
        })
        .await
    }

    #[instrument(skip(self, ms_token))]
    pub async fn search_users(
        &self,
        query: &str,
        count: u32,
        ms_token: Option<String>,
    ) -> Result<Vec<Value>> {
        let query = query.to_string();
        self.lease("user search", ms_token, move |lease| async move {
            collect_items(
                &lease.session,
                SEARCH_USERS_PATH,
                &[("keyword", query)],
                "user_list",
                count,
            )
            .await
        })
        .await
    }

    #[instrument(skip(self, ms_token))]
    pub async fn search_videos(
        &self,
        query: &str,
        count: u32,
        ms_token: Option<String>,
    ) -> Result<Vec<Value>> {
        let query = query.to_string();
        self.lease("video search", ms_token, move |lease| async move {
            collect_items(
                &lease.session,
                SEARCH_VIDEOS_PATH,
                &[("keyword", query)],
                "item_list",
                count,
            )
            .await
        })
        .await
    }

    #[instrument(skip(self, ms_token))]
    pub async fn sound_info(&self, sound_id: &str, ms_token: Option<String>) -> Result<Value> {
        let sound_id = sound_id.to_string();
        self.lease("sound info", ms_token, move |lease| async move {
            let body = lease
                .session
                .get_json(SOUND_DETAIL_PATH, &[("musicId", sound_id.clone())])
                .await?;
            take_at(body, &["musicInfo"])
                .ok_or_else(|| GatewayError::NotFound(format!("sound {}", sound_id)))
        })
        .await
    }

    #[instrument(skip(self, ms_token))]
    pub async fn sound_videos(
        &self,
        sound_id: &str,
        count: u32,
        ms_token: Option<String>,
    ) -> Result<Vec<Value>> {
        let sound_id = sound_id.to_string();
        self.lease("sound videos", ms_token, move |lease| async move {
            collect_items(
                &lease.session,
                SOUND_ITEMS_PATH,
                &[("musicID", sound_id)],
                "itemList",
                count,
            )
            .await
        })
        .await
    }

    /// Live upstream check: fetch a single trending video with a pooled token
    pub async fn check_upstream(&self) -> UpstreamHealth {
        match self.trending_videos(1, None).await {
            Ok(videos) => {
                info!(fetched = videos.len(), "Upstream health check succeeded");
                UpstreamHealth::healthy(videos.len())
            }
            Err(e) => UpstreamHealth::unhealthy(&e),
        }
    }

    /// Run one operation under a pooled lease, or under `ms_token` when given
    async fn lease<T, F, Fut>(
        &self,
        operation: &'static str,
        ms_token: Option<String>,
        body: F,
    ) -> Result<T>
    where
        F: FnOnce(Lease<WebSession>) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let result = match ms_token {
            Some(token) => self.coordinator.with_credential(token, body).await,
            None => self.coordinator.with_lease(body).await,
        };

        if let Err(e) = &result {
            error!(operation, error = %e, "Scrape operation failed");
        }
        result
    }
}

async fn user_detail(session: &WebSession, username: &str) -> Result<Value> {
    let body = session
        .get_json(USER_DETAIL_PATH, &[("uniqueId", username.to_string())])
        .await?;
    take_at(body, &["userInfo"]).ok_or_else(|| GatewayError::NotFound(format!("user {}", username)))
}

async fn video_detail(session: &WebSession, video_id: &str) -> Result<Value> {
    let body = session
        .get_json(VIDEO_DETAIL_PATH, &[("itemId", video_id.to_string())])
        .await?;
    take_at(body, &["itemInfo", "itemStruct"])
        .ok_or_else(|| GatewayError::NotFound(format!("video {}", video_id)))
}

async fn hashtag_detail(session: &WebSession, name: &str) -> Result<Value> {
    let body = session
        .get_json(HASHTAG_DETAIL_PATH, &[("challengeName", name.to_string())])
        .await?;
    take_at(body, &["challengeInfo"])
        .ok_or_else(|| GatewayError::NotFound(format!("hashtag #{}", name)))
}

/// Page through a list endpoint until `count` items are collected
async fn collect_items(
    session: &WebSession,
    path: &str,
    query: &[(&str, String)],
    list_key: &str,
    count: u32,
) -> Result<Vec<Value>> {
    let wanted = count as usize;
    let mut items: Vec<Value> = Vec::with_capacity(wanted);
    let mut cursor = "0".to_string();

    for _ in 0..MAX_PAGES {
        let remaining = wanted - items.len();
        let mut page_query = query.to_vec();
        page_query.push(("count", remaining.min(PAGE_SIZE).to_string()));
        page_query.push(("cursor", cursor.clone()));

        let mut body = session.get_json(path, &page_query).await?;
        let page = match body.get_mut(list_key).map(Value::take) {
            Some(Value::Array(page)) if !page.is_empty() => page,
            _ => break,
        };
        items.extend(page);

        if items.len() >= wanted || !has_more(&body) {
            break;
        }
        match next_cursor(&body) {
            Some(next) => cursor = next,
            None => break,
        }
    }

    items.truncate(wanted);
    Ok(items)
}

fn has_more(body: &Value) -> bool {
    match body.get("hasMore").or_else(|| body.get("has_more")) {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_i64().unwrap_or(0) != 0,
        _ => false,
    }
}

fn next_cursor(body: &Value) -> Option<String> {
    match body.get("cursor")? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Move the value at `path` out of `body`
fn take_at(mut body: Value, path: &[&str]) -> Option<Value> {
    let mut current = &mut body;
    for key in path {
        current = current.get_mut(*key)?;
    }
    match current.take() {
        Value::Null => None,
        value => Some(value),
    }
}

/// String or number at `path`, rendered as a string
fn string_at(value: &Value, path: &[&str]) -> Option<String> {
    let mut current = value;
    for key in path {
        current = current.get(*key)?;
    }
    match current {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
